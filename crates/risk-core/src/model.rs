//! Trained classifier behind a small trait seam.
//!
//! The production artifact (`model.json`) is a linear model exported from
//! the training notebook. Two flavours exist:
//! - `logistic_regression`: exposes class probabilities and the raw margin
//! - `linear_decision`: margin only (e.g. a linear SVM export)

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::features::FeatureVector;
use crate::util::sigmoid;

pub const MODEL_FILE: &str = "model.json";

#[derive(Debug, Error)]
pub enum ModelError {
    /// The model does not implement this capability at all.
    #[error("model does not support {0}")]
    Unsupported(&'static str),
    #[error("input has {found} features, model expects {expected}")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("model produced a non-finite {0}")]
    NonFinite(&'static str),
    #[error("model failure: {0}")]
    Failed(String),
}

/// Binary classifier over an assembled feature row.
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Column names the model was trained on, when the artifact records them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Per-class probabilities for one row; index 1 is the positive class.
    fn predict_proba(&self, x: &FeatureVector) -> Result<Vec<f64>, ModelError>;

    /// Raw decision score (log-odds margin) for one row.
    fn decision_function(&self, _x: &FeatureVector) -> Result<f64, ModelError> {
        Err(ModelError::Unsupported("decision_function"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.coef.len() == self.feature_names.len(),
            "model has {} coefficients for {} features",
            self.coef.len(),
            self.feature_names.len()
        );
        ensure!(
            self.coef.iter().all(|c| c.is_finite()) && self.intercept.is_finite(),
            "model contains non-finite coefficients"
        );
        Ok(())
    }

    pub fn margin(&self, x: &FeatureVector) -> Result<f64, ModelError> {
        if x.len() != self.coef.len() {
            return Err(ModelError::ShapeMismatch {
                expected: self.coef.len(),
                found: x.len(),
            });
        }
        let z = self.intercept
            + self
                .coef
                .iter()
                .zip(x.values())
                .map(|(w, v)| w * v)
                .sum::<f64>();
        if !z.is_finite() {
            return Err(ModelError::NonFinite("decision score"));
        }
        Ok(z)
    }
}

#[derive(Debug, Clone)]
pub struct LogisticRegression(pub LinearModel);

impl Classifier for LogisticRegression {
    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.0.feature_names)
    }

    fn predict_proba(&self, x: &FeatureVector) -> Result<Vec<f64>, ModelError> {
        let p = sigmoid(self.0.margin(x)?);
        Ok(vec![1.0 - p, p])
    }

    fn decision_function(&self, x: &FeatureVector) -> Result<f64, ModelError> {
        self.0.margin(x)
    }
}

#[derive(Debug, Clone)]
pub struct LinearDecision(pub LinearModel);

impl Classifier for LinearDecision {
    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.0.feature_names)
    }

    fn predict_proba(&self, _x: &FeatureVector) -> Result<Vec<f64>, ModelError> {
        Err(ModelError::Unsupported("predict_proba"))
    }

    fn decision_function(&self, x: &FeatureVector) -> Result<f64, ModelError> {
        self.0.margin(x)
    }
}

/// On-disk layout of `model.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    LogisticRegression(LinearModel),
    LinearDecision(LinearModel),
}

impl ModelArtifact {
    pub fn into_classifier(self) -> Result<Arc<dyn Classifier>> {
        Ok(match self {
            Self::LogisticRegression(m) => {
                m.validate()?;
                Arc::new(LogisticRegression(m))
            }
            Self::LinearDecision(m) => {
                m.validate()?;
                Arc::new(LinearDecision(m))
            }
        })
    }
}

pub fn load_model(path: &Path) -> Result<Arc<dyn Classifier>> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("read {}: {}", MODEL_FILE, path.display()))?;
    let artifact: ModelArtifact = serde_json::from_str(&s)
        .with_context(|| format!("parse {}: {}", MODEL_FILE, path.display()))?;
    let model = artifact
        .into_classifier()
        .with_context(|| format!("load {}: {}", MODEL_FILE, path.display()))?;
    tracing::info!(path = %path.display(), model = ?model, "classifier loaded");
    Ok(model)
}
