use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::{
    config::{Config, ENV_MODEL_DIR},
    features::{assemble, FeatureVector},
    meta::FeatureSchema,
    model::{load_model, Classifier, ModelError, MODEL_FILE},
    presentation::{badge, form_layout, format_pct, FormLayout},
    schema::{ScoreRequest, ScoreResponse, ScoredResult, TimingsUs},
    scorer::{score, Score},
    util::now_us,
};

/// Loaded schema + classifier. Immutable after construction and cheap to clone.
#[derive(Debug, Clone)]
pub struct RiskContext {
    schema: Arc<FeatureSchema>,
    model: Arc<dyn Classifier>,
}

impl RiskContext {
    /// Pair a schema with a classifier, refusing a model trained on a different column order.
    pub fn new(schema: FeatureSchema, model: Arc<dyn Classifier>) -> Result<Self> {
        if let Some(names) = model.feature_names() {
            if names != schema.features() {
                bail!(
                    "model feature order does not match schema: model={:?} schema={:?}",
                    names,
                    schema.features()
                );
            }
        }
        Ok(Self {
            schema: Arc::new(schema),
            model,
        })
    }

    pub fn load(cfg: &Config) -> Result<Self> {
        let load = || -> Result<Self> {
            let schema = FeatureSchema::load(&cfg.meta_path())?;
            let model = load_model(&cfg.model_path())?;
            Self::new(schema, model)
        };
        load().with_context(|| {
            format!(
                "load model dir {} (set {ENV_MODEL_DIR} to point at the exported artifacts)",
                cfg.model_dir.display()
            )
        })
    }

    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let schema = FeatureSchema::load_from_dir(dir)?;
        let model = load_model(&dir.join(MODEL_FILE))?;
        Self::new(schema, model)
    }

    #[inline]
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    #[inline]
    pub fn model(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    pub fn assemble(&self, raw: &Map<String, Value>) -> FeatureVector {
        assemble(raw, &self.schema)
    }

    pub fn score_vector(&self, x: &FeatureVector) -> Result<Score, ModelError> {
        score(x, self.model.as_ref())
    }

    /// assemble -> score -> tier
    pub fn score(&self, raw: &Map<String, Value>) -> Result<ScoredResult, ModelError> {
        let x = self.assemble(raw);
        let s = self.score_vector(&x)?;
        Ok(ScoredResult {
            probability: s.probability,
            tier: self.schema.thresholds().tier(s.probability),
        })
    }

    /// Full request path with timings, metrics and display strings.
    pub fn assess(&self, req: &ScoreRequest) -> Result<ScoreResponse, ModelError> {
        let t0 = Instant::now();
        let trace_id = req.trace_id.unwrap_or_else(Uuid::new_v4);
        let mut timings = TimingsUs::default();

        let t_feat = Instant::now();
        let features = self.assemble(&req.inputs);
        timings.feature = now_us(t_feat);
        metrics::histogram!("stage_feature_us").record(timings.feature as f64);

        let t_score = Instant::now();
        let s = match self.score_vector(&features) {
            Ok(s) => s,
            Err(e) => {
                metrics::counter!("score_error_total").increment(1);
                tracing::warn!(%trace_id, error = %e, "scoring failed");
                return Err(e);
            }
        };
        timings.score = now_us(t_score);
        metrics::histogram!("stage_score_us").record(timings.score as f64);

        let thresholds = self.schema.thresholds();
        let tier = thresholds.tier(s.probability);
        metrics::counter!("risk_tier_total", "tier" => tier.as_str()).increment(1);

        timings.total = now_us(t0);
        metrics::histogram!("e2e_us").record(timings.total as f64);

        tracing::debug!(
            %trace_id,
            probability = s.probability,
            %tier,
            source = ?s.source,
            "scored"
        );

        Ok(ScoreResponse {
            trace_id,
            probability: s.probability,
            probability_pct: format_pct(s.probability),
            tier,
            badge: badge(tier, thresholds),
            source: s.source,
            features,
            timings_us: timings,
        })
    }

    pub fn form(&self) -> FormLayout {
        form_layout(&self.schema)
    }
}
