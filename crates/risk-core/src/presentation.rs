//! Data the form layer needs to render inputs and the result badge.
//! No markup is produced here, only labels, widget kinds and strings.

use serde::{Deserialize, Serialize};

use crate::meta::{FeatureKind, FeatureSchema};
use crate::tier::{RiskThresholds, RiskTier};

pub const TITLE: &str = "AMI–IABP One-Year Mortality Risk Calculator";
pub const CAPTION: &str = "Prediction of one-year mortality in AMI patients supported with IABP \
(logistic regression; internal training, external validation).";
pub const OUTCOME: &str = "Predicted 1-Year Mortality";
pub const DISCLAIMER: &str = "This estimate is intended to support, not replace, clinical judgment, \
and should be interpreted within the broader clinical context.";

pub const BINARY_CHOICES: [&str; 2] = ["No", "Yes"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    /// Style hook: `low`, `inter` or `high`.
    pub class: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub kind: FeatureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<[&'static str; 2]>,
    pub default: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormSection {
    pub title: String,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormLayout {
    pub title: &'static str,
    pub caption: &'static str,
    pub outcome: &'static str,
    pub disclaimer: &'static str,
    pub thresholds: RiskThresholds,
    pub sections: Vec<FormSection>,
}

/// Whole percent, truncated toward zero: 0.2 -> 20, 0.505 -> 50.
#[inline]
fn whole_pct(x: f64) -> i64 {
    (x * 100.0).trunc() as i64
}

pub fn badge(tier: RiskTier, t: RiskThresholds) -> Badge {
    let (lo, hi) = (whole_pct(t.low), whole_pct(t.high));
    let (class, text) = match tier {
        RiskTier::Low => ("low", format!("Low Risk (< {lo}%)")),
        RiskTier::Intermediate => ("inter", format!("Intermediate Risk ({lo}–{hi}%)")),
        RiskTier::High => ("high", format!("High Risk (≥ {hi}%)")),
    };
    Badge {
        class: class.to_string(),
        text,
    }
}

/// `0.3` -> `"30.0%"`.
pub fn format_pct(p: f64) -> String {
    format!("{:.1}%", p * 100.0)
}

pub fn form_layout(schema: &FeatureSchema) -> FormLayout {
    let sections = schema
        .groups()
        .iter()
        .map(|g| FormSection {
            title: g.title.clone(),
            fields: g
                .features
                .iter()
                .filter_map(|name| {
                    let kind = schema.kind_of(name)?;
                    Some(FormField {
                        name: name.clone(),
                        label: schema.label(name),
                        kind,
                        choices: (kind == FeatureKind::Binary).then_some(BINARY_CHOICES),
                        default: 0.0,
                    })
                })
                .collect(),
        })
        .collect();

    FormLayout {
        title: TITLE,
        caption: CAPTION,
        outcome: OUTCOME,
        disclaimer: DISCLAIMER,
        thresholds: schema.thresholds(),
        sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thr() -> RiskThresholds {
        RiskThresholds::new(0.2, 0.5).unwrap()
    }

    #[test]
    fn badge_text_per_tier() {
        assert_eq!(
            badge(RiskTier::Low, thr()),
            Badge { class: "low".into(), text: "Low Risk (< 20%)".into() }
        );
        assert_eq!(badge(RiskTier::Intermediate, thr()).text, "Intermediate Risk (20–50%)");
        assert_eq!(badge(RiskTier::High, thr()).text, "High Risk (≥ 50%)");
        assert_eq!(badge(RiskTier::Intermediate, thr()).class, "inter");
    }

    #[test]
    fn badge_percent_truncates() {
        let t = RiskThresholds::new(0.125, 0.679).unwrap();
        assert_eq!(badge(RiskTier::Intermediate, t).text, "Intermediate Risk (12–67%)");
    }

    #[test]
    fn pct_has_one_decimal() {
        assert_eq!(format_pct(0.3), "30.0%");
        assert_eq!(format_pct(0.12345), "12.3%");
        assert_eq!(format_pct(1.0), "100.0%");
    }

    #[test]
    fn form_lists_every_feature_with_widget_kind() {
        let schema = FeatureSchema::new(
            &["age", "beta_blocker_use", "custom_score"],
            &["beta_blocker_use"],
            thr(),
        )
        .unwrap();
        let form = form_layout(&schema);
        let fields: Vec<&FormField> = form.sections.iter().flat_map(|s| &s.fields).collect();
        assert_eq!(fields.len(), 3);

        let bb = fields.iter().find(|f| f.name == "beta_blocker_use").unwrap();
        assert_eq!(bb.kind, FeatureKind::Binary);
        assert_eq!(bb.choices, Some(["No", "Yes"]));
        assert_eq!(bb.label, "Beta Blocker Use");

        let age = fields.iter().find(|f| f.name == "age").unwrap();
        assert_eq!(age.choices, None);
        assert_eq!(form.sections.last().unwrap().title, "Other");
    }
}
