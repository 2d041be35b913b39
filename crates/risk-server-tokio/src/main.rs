use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use iabp_risk_core::{
    config::Config,
    pipeline::RiskContext,
    presentation::FormLayout,
    schema::{ScoreRequest, ScoreResponse},
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
struct AppState {
    ctx: RiskContext,
    prom: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // metrics recorder（进程内全局一次）
    let prom = PrometheusBuilder::new().install_recorder()?;

    // 模型与 schema 启动时加载一次；失败则不对外服务
    let cfg = Config::from_env()?;
    let ctx = match RiskContext::load(&cfg) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!(model_dir = %cfg.model_dir.display(), "failed to load model: {e:#}");
            return Err(e);
        }
    };

    let addr = cfg.socket_addr()?;
    let app = router(AppState { ctx, prom });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("risk-server-tokio listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/score", post(score))
        .route("/form", get(form))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn score(
    State(st): State<AppState>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, (StatusCode, String)> {
    st.ctx
        .assess(&req)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("scoring failed: {e}")))
}

async fn form(State(st): State<AppState>) -> Json<FormLayout> {
    Json(st.ctx.form())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics(State(st): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, st.prom.render())
}
