// crates/risk-core/src/schema.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::features::FeatureVector;
use crate::presentation::Badge;
use crate::scorer::ScoreSource;
use crate::tier::RiskTier;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreRequest {
    /// 可选：客户端传入；否则服务端生成
    #[serde(default)]
    pub trace_id: Option<Uuid>,

    /// Form values keyed by feature name; missing fields take defaults.
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

/// The core result: probability plus its tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub probability: f64,
    pub tier: RiskTier,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreResponse {
    pub trace_id: Uuid,
    pub probability: f64,
    /// e.g. `"30.0%"`
    pub probability_pct: String,
    pub tier: RiskTier,
    pub badge: Badge,
    pub source: ScoreSource,
    /// The row actually fed to the model, after defaults and coercion.
    pub features: FeatureVector,
    /// 分段耗时（微秒）
    pub timings_us: TimingsUs,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimingsUs {
    pub feature: u64,
    pub score: u64,
    pub total: u64,
}
