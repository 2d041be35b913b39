use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;
use crate::model::{Classifier, ModelError};
use crate::util::{clamp01, sigmoid};

const POSITIVE_CLASS: usize = 1;

/// Which model interface produced the probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    PredictProba,
    DecisionFunction,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub probability: f64,
    pub source: ScoreSource,
}

/// Positive-class probability for one assembled row.
///
/// Falls back to `sigmoid(decision_function)` only when the model reports
/// `predict_proba` as unsupported; every other error is returned as is.
pub fn score(x: &FeatureVector, model: &dyn Classifier) -> Result<Score, ModelError> {
    let (p, source) = match model.predict_proba(x) {
        Ok(classes) => {
            let p = classes.get(POSITIVE_CLASS).copied().ok_or_else(|| {
                ModelError::Failed(format!(
                    "predict_proba returned {} classes, expected at least 2",
                    classes.len()
                ))
            })?;
            (p, ScoreSource::PredictProba)
        }
        Err(ModelError::Unsupported(what)) => {
            tracing::debug!(unsupported = what, "falling back to decision_function");
            metrics::counter!("scorer_decision_fallback_total").increment(1);
            let z = model.decision_function(x)?;
            (sigmoid(z), ScoreSource::DecisionFunction)
        }
        Err(e) => return Err(e),
    };

    if !p.is_finite() {
        return Err(ModelError::NonFinite("probability"));
    }
    Ok(Score {
        probability: clamp01(p),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::FeatureSchema;
    use crate::tier::RiskThresholds;

    #[derive(Debug)]
    enum Mock {
        Proba(Vec<f64>),
        DecisionOnly(f64),
        Broken,
        NoCapability,
    }

    impl Classifier for Mock {
        fn predict_proba(&self, _x: &FeatureVector) -> Result<Vec<f64>, ModelError> {
            match self {
                Mock::Proba(p) => Ok(p.clone()),
                Mock::DecisionOnly(_) | Mock::NoCapability => {
                    Err(ModelError::Unsupported("predict_proba"))
                }
                Mock::Broken => Err(ModelError::ShapeMismatch { expected: 3, found: 2 }),
            }
        }

        fn decision_function(&self, _x: &FeatureVector) -> Result<f64, ModelError> {
            match self {
                Mock::DecisionOnly(z) => Ok(*z),
                _ => Err(ModelError::Unsupported("decision_function")),
            }
        }
    }

    fn row() -> FeatureVector {
        let s = FeatureSchema::new(
            &["age", "beta_blocker_use"],
            &["beta_blocker_use"],
            RiskThresholds::new(0.2, 0.5).unwrap(),
        )
        .unwrap();
        FeatureVector::defaults(&s)
    }

    #[test]
    fn takes_positive_class_probability() {
        let s = score(&row(), &Mock::Proba(vec![0.7, 0.3])).unwrap();
        assert_eq!(s.probability, 0.3);
        assert_eq!(s.source, ScoreSource::PredictProba);
    }

    #[test]
    fn falls_back_to_logistic_of_decision_score() {
        let s = score(&row(), &Mock::DecisionOnly(0.0)).unwrap();
        assert!((s.probability - 0.5).abs() < 1e-12);
        assert_eq!(s.source, ScoreSource::DecisionFunction);

        let hi = score(&row(), &Mock::DecisionOnly(3.0)).unwrap();
        assert!(hi.probability > 0.95 && hi.probability <= 1.0);
    }

    #[test]
    fn other_failures_propagate_without_fallback() {
        let err = score(&row(), &Mock::Broken).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { .. }));
    }

    #[test]
    fn missing_both_capabilities_is_an_error() {
        let err = score(&row(), &Mock::NoCapability).unwrap_err();
        assert!(matches!(err, ModelError::Unsupported("decision_function")));
    }

    #[test]
    fn single_class_output_is_rejected() {
        assert!(matches!(
            score(&row(), &Mock::Proba(vec![1.0])),
            Err(ModelError::Failed(_))
        ));
    }

    #[test]
    fn probability_stays_in_unit_interval() {
        let s = score(&row(), &Mock::Proba(vec![-0.2, 1.2])).unwrap();
        assert_eq!(s.probability, 1.0);
        assert!(matches!(
            score(&row(), &Mock::Proba(vec![0.0, f64::NAN])),
            Err(ModelError::NonFinite(_))
        ));
    }
}
