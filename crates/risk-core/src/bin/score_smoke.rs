use anyhow::Context;
use iabp_risk_core::config::Config;
use iabp_risk_core::pipeline::RiskContext;
use iabp_risk_core::schema::ScoreRequest;

fn main() -> anyhow::Result<()> {
    // 1) 模型目录：与 server 相同的默认值（RISK_MODEL_DIR / RISK_CONFIG），命令行参数优先
    let mut args = std::env::args().skip(1);
    let mut cfg = Config::from_env()?;
    if let Some(dir) = args.next() {
        cfg.model_dir = dir.into();
    }

    // 2) 载入 schema + classifier（启动失败直接退出）
    let ctx = RiskContext::load(&cfg)?;

    // 3) 构造输入：只给部分字段，其余走默认值
    let raw = args
        .next()
        .unwrap_or_else(|| r#"{"age": 70, "beta_blocker_use": "Yes"}"#.to_string());
    let inputs: serde_json::Value = serde_json::from_str(&raw).context("parse inputs json")?;
    let inputs = inputs
        .as_object()
        .cloned()
        .context("inputs must be a JSON object")?;

    // 4) assemble + score
    let resp = ctx.assess(&ScoreRequest {
        trace_id: None,
        inputs,
    })?;

    println!("row_len={}", resp.features.len());
    for (name, v) in resp.features.iter() {
        println!("  {:<24} {:>10.3}", name, v);
    }
    println!("probability={} ({:?})", resp.probability_pct, resp.source);
    println!("tier={} badge=\"{}\"", resp.tier, resp.badge.text);

    Ok(())
}
