//! Feature schema artifact (`features.json`).
//!
//! The schema fixes the column order the classifier was trained on, which
//! columns are 0/1 coded, the human-readable labels shown by the form, and
//! the two risk cut points. It is read once at startup and never mutated.

use anyhow::{anyhow, bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::tier::RiskThresholds;

pub const META_FILE: &str = "features.json";

/// Clinical grouping used by the AMI-IABP form when the artifact carries none.
const DEFAULT_GROUPS: &[(&str, &[&str])] = &[
    ("Demographics & Hospitalization", &["age", "ICU_LOS"]),
    ("Hematology", &["hemoglobin_min", "hemoglobin_max", "rbc_count_max"]),
    ("Renal Function", &["creatinine_min", "creatinine_max", "eGFR_CKD_EPI_21"]),
    (
        "Inflammatory / Immune Markers",
        &[
            "neutrophils_abs_min",
            "eosinophils_abs_max",
            "neutrophils_pct_min",
            "eosinophils_pct_max",
        ],
    ),
    ("Metabolic & Biochemistry", &["sodium_max", "lactate_max", "AST_min"]),
    ("Hemodynamics", &["dbp_post_iabp"]),
    (
        "Therapies & Interventions",
        &["beta_blocker_use", "ticagrelor_use", "invasive_ventilation"],
    ),
];

const OTHER_GROUP: &str = "Other";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Binary,
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGroup {
    pub title: String,
    pub features: Vec<String>,
}

/// On-disk layout of `features.json`.
#[derive(Debug, Deserialize)]
struct MetaFile {
    features: Vec<String>,
    #[serde(default)]
    binary_features: Vec<String>,
    #[serde(default)]
    labels: HashMap<String, String>,
    risk_thresholds: RiskThresholds,
    #[serde(default)]
    groups: Vec<FeatureGroup>,
}

#[derive(Debug, Clone)]
pub struct FeatureSchema {
    names: Arc<[String]>,
    kinds: Vec<FeatureKind>,
    labels: HashMap<String, String>,
    thresholds: RiskThresholds,
    groups: Vec<FeatureGroup>,
}

impl FeatureSchema {
    /// Build a schema without labels or groups. Handy for embedding and tests.
    pub fn new<S: AsRef<str>>(
        features: &[S],
        binary_features: &[S],
        thresholds: RiskThresholds,
    ) -> Result<Self> {
        Self::from_meta(MetaFile {
            features: features.iter().map(|s| s.as_ref().to_string()).collect(),
            binary_features: binary_features
                .iter()
                .map(|s| s.as_ref().to_string())
                .collect(),
            labels: HashMap::new(),
            risk_thresholds: thresholds,
            groups: vec![],
        })
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let meta: MetaFile = serde_json::from_str(s).context("parse feature schema")?;
        Self::from_meta(meta)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("read {}: {}", META_FILE, path.display()))?;
        let schema = Self::from_json_str(&s)
            .with_context(|| format!("load {}: {}", META_FILE, path.display()))?;
        tracing::info!(
            path = %path.display(),
            features = schema.len(),
            binary = schema.kinds.iter().filter(|k| **k == FeatureKind::Binary).count(),
            thr_low = schema.thresholds.low,
            thr_high = schema.thresholds.high,
            "feature schema loaded"
        );
        Ok(schema)
    }

    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load(&dir.join(META_FILE))
    }

    fn from_meta(meta: MetaFile) -> Result<Self> {
        ensure!(!meta.features.is_empty(), "feature schema lists no features");

        let mut seen: HashSet<&str> = HashSet::with_capacity(meta.features.len());
        for name in &meta.features {
            ensure!(!name.trim().is_empty(), "feature schema contains an empty name");
            if !seen.insert(name.as_str()) {
                bail!("duplicate feature in schema: {name}");
            }
        }

        // binary_features and labels are lookup tables; names outside `features` have no effect
        let binary: HashSet<&str> = meta.binary_features.iter().map(String::as_str).collect();
        let unknown_binary: Vec<&str> = binary
            .iter()
            .copied()
            .filter(|b| !seen.contains(b))
            .collect();
        if !unknown_binary.is_empty() {
            tracing::warn!(?unknown_binary, "ignoring binary_features not listed in features");
        }
        let unknown_labels: Vec<&str> = meta
            .labels
            .keys()
            .map(String::as_str)
            .filter(|k| !seen.contains(k))
            .collect();
        if !unknown_labels.is_empty() {
            tracing::warn!(?unknown_labels, "ignoring labels for features not listed in features");
        }

        meta.risk_thresholds.validate()?;

        let kinds = meta
            .features
            .iter()
            .map(|n| {
                if binary.contains(n.as_str()) {
                    FeatureKind::Binary
                } else {
                    FeatureKind::Continuous
                }
            })
            .collect();

        let groups = if meta.groups.is_empty() {
            resolve_groups(&meta.features, builtin_groups())?
        } else {
            resolve_groups(&meta.features, meta.groups)?
        };

        let mut labels = meta.labels;
        labels.retain(|k, _| meta.features.contains(k));

        Ok(Self {
            names: meta.features.into(),
            kinds,
            labels,
            thresholds: meta.risk_thresholds,
            groups,
        })
    }

    /// Feature names in training order.
    #[inline]
    pub fn features(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub(crate) fn shared_names(&self) -> Arc<[String]> {
        Arc::clone(&self.names)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FeatureKind)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.kinds.iter().copied())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<FeatureKind> {
        self.index_of(name).map(|i| self.kinds[i])
    }

    pub fn is_binary(&self, name: &str) -> bool {
        self.kind_of(name) == Some(FeatureKind::Binary)
    }

    #[inline]
    pub fn thresholds(&self) -> RiskThresholds {
        self.thresholds
    }

    /// Display label: the artifact's label if present, else a title-cased name.
    pub fn label(&self, name: &str) -> String {
        self.labels
            .get(name)
            .cloned()
            .unwrap_or_else(|| pretty(name))
    }

    /// Form sections in display order; every feature appears in exactly one group.
    pub fn groups(&self) -> &[FeatureGroup] {
        &self.groups
    }
}

/// `ICU_LOS` -> `Icu Los`, `hba1c_max` -> `Hba1C Max`.
///
/// Underscores become spaces, then a letter is upper-cased when it follows a
/// non-letter (space, digit, punctuation) and lower-cased otherwise.
pub fn pretty(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut prev_letter = false;
    for c in code.chars().map(|c| if c == '_' { ' ' } else { c }) {
        if c.is_alphabetic() {
            if prev_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(c);
            prev_letter = false;
        }
    }
    out
}

fn builtin_groups() -> Vec<FeatureGroup> {
    DEFAULT_GROUPS
        .iter()
        .map(|(title, feats)| FeatureGroup {
            title: (*title).to_string(),
            features: feats.iter().map(|f| (*f).to_string()).collect(),
        })
        .collect()
}

/// Keep only known features, drop empty groups, and collect leftovers under "Other".
fn resolve_groups(features: &[String], groups: Vec<FeatureGroup>) -> Result<Vec<FeatureGroup>> {
    let known: HashSet<&str> = features.iter().map(String::as_str).collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(groups.len() + 1);

    for g in groups {
        let mut members = Vec::with_capacity(g.features.len());
        for f in g.features {
            if !known.contains(f.as_str()) {
                continue;
            }
            if !placed.insert(f.clone()) {
                return Err(anyhow!("feature {f} appears in more than one form group"));
            }
            members.push(f);
        }
        if !members.is_empty() {
            out.push(FeatureGroup {
                title: g.title,
                features: members,
            });
        }
    }

    let rest: Vec<String> = features
        .iter()
        .filter(|f| !placed.contains(f.as_str()))
        .cloned()
        .collect();
    if !rest.is_empty() {
        out.push(FeatureGroup {
            title: OTHER_GROUP.to_string(),
            features: rest,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: &str = r#"{
        "features": ["age", "ICU_LOS", "lactate_max", "beta_blocker_use", "frailty_index"],
        "binary_features": ["beta_blocker_use"],
        "labels": {"age": "Age (years)", "ICU_LOS": "ICU length of stay (days)"},
        "risk_thresholds": {"low": 0.2, "high": 0.5}
    }"#;

    #[test]
    fn parses_artifact_and_keeps_order() {
        let s = FeatureSchema::from_json_str(META).unwrap();
        assert_eq!(
            s.features(),
            &["age", "ICU_LOS", "lactate_max", "beta_blocker_use", "frailty_index"]
        );
        assert!(s.is_binary("beta_blocker_use"));
        assert_eq!(s.kind_of("age"), Some(FeatureKind::Continuous));
        assert_eq!(s.kind_of("nope"), None);
        assert_eq!(s.thresholds(), RiskThresholds { low: 0.2, high: 0.5 });
    }

    #[test]
    fn labels_fall_back_to_title_case() {
        let s = FeatureSchema::from_json_str(META).unwrap();
        assert_eq!(s.label("age"), "Age (years)");
        assert_eq!(s.label("lactate_max"), "Lactate Max");
        assert_eq!(pretty("eGFR_CKD_EPI_21"), "Egfr Ckd Epi 21");
    }

    #[test]
    fn builtin_groups_cover_every_feature_once() {
        let s = FeatureSchema::from_json_str(META).unwrap();
        let titles: Vec<&str> = s.groups().iter().map(|g| g.title.as_str()).collect();
        assert_eq!(
            titles,
            [
                "Demographics & Hospitalization",
                "Metabolic & Biochemistry",
                "Therapies & Interventions",
                "Other"
            ]
        );
        let placed: usize = s.groups().iter().map(|g| g.features.len()).sum();
        assert_eq!(placed, s.len());
        assert_eq!(s.groups()[3].features, ["frailty_index"]);
    }

    #[test]
    fn explicit_groups_override_builtin() {
        let s = FeatureSchema::from_json_str(
            r#"{
                "features": ["a", "b"],
                "risk_thresholds": {"low": 0.1, "high": 0.9},
                "groups": [{"title": "Only B", "features": ["b", "ghost"]}]
            }"#,
        )
        .unwrap();
        assert_eq!(s.groups().len(), 2);
        assert_eq!(s.groups()[0].features, ["b"]);
        assert_eq!(s.groups()[1].title, "Other");
    }

    #[test]
    fn rejects_inconsistent_artifacts() {
        let cases = [
            r#"{"features": [], "risk_thresholds": {"low": 0.2, "high": 0.5}}"#,
            r#"{"features": ["a", "a"], "risk_thresholds": {"low": 0.2, "high": 0.5}}"#,
            r#"{"features": ["a"], "risk_thresholds": {"low": 0.6, "high": 0.5}}"#,
            r#"{"features": ["a"]}"#,
            r#"{"features": ["a", "b"], "risk_thresholds": {"low": 0.2, "high": 0.5},
                "groups": [{"title": "x", "features": ["a"]}, {"title": "y", "features": ["a"]}]}"#,
        ];
        for c in cases {
            assert!(FeatureSchema::from_json_str(c).is_err(), "accepted: {c}");
        }
    }

    #[test]
    fn extra_binary_and_label_names_are_ignored() {
        let s = FeatureSchema::from_json_str(
            r#"{
                "features": ["age"],
                "binary_features": ["sex"],
                "labels": {"age": "Age", "sex": "Sex"},
                "risk_thresholds": {"low": 0.2, "high": 0.5}
            }"#,
        )
        .unwrap();
        assert_eq!(s.features(), &["age"]);
        assert_eq!(s.kind_of("age"), Some(FeatureKind::Continuous));
        assert_eq!(s.kind_of("sex"), None);
        assert!(!s.is_binary("sex"));
        assert_eq!(s.label("age"), "Age");
        let placed: Vec<&String> = s.groups().iter().flat_map(|g| &g.features).collect();
        assert_eq!(placed, ["age"]);
    }

    #[test]
    fn pretty_capitalizes_after_any_non_letter() {
        assert_eq!(pretty("hba1c_max"), "Hba1C Max");
        assert_eq!(pretty("ICU_LOS"), "Icu Los");
        assert_eq!(pretty("AST_min"), "Ast Min");
        assert_eq!(pretty("o2-sat"), "O2-Sat");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = FeatureSchema::load_from_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(format!("{err:#}").contains(META_FILE));
    }
}
