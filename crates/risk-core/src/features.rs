//! Feature assembly: loosely typed form values -> fixed-order model input.
//!
//! All duck typing of form payloads lives in [`coerce_binary`] and
//! [`coerce_continuous`]. Everything downstream sees a [`FeatureVector`],
//! which can only be produced from a [`FeatureSchema`] and therefore always
//! has the schema's length and column order.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::meta::{FeatureKind, FeatureSchema};

/// A single coerced feature value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Binary(u8),
    Continuous(f64),
}

impl FeatureValue {
    #[inline]
    pub fn default_for(kind: FeatureKind) -> Self {
        match kind {
            FeatureKind::Binary => Self::Binary(0),
            FeatureKind::Continuous => Self::Continuous(0.0),
        }
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Binary(b) => b as f64,
            Self::Continuous(x) => x,
        }
    }
}

/// Numbers are truncated toward zero before the non-zero test, so 0.5 -> 0.
#[inline]
fn truncated_flag(x: f64) -> Option<u8> {
    x.is_finite().then(|| u8::from(x.trunc() != 0.0))
}

/// Yes/No style coercion. `None` means the value was not recognizable.
pub fn coerce_binary(v: &Value) -> Option<u8> {
    match v {
        Value::Bool(b) => Some(u8::from(*b)),
        Value::Number(n) => n.as_f64().and_then(truncated_flag),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Some(1),
            "no" | "n" | "false" | "0" | "" => Some(0),
            other => other.parse::<f64>().ok().and_then(truncated_flag),
        },
        _ => None,
    }
}

/// Numeric coercion. `None` means the value is not a finite number.
pub fn coerce_continuous(v: &Value) -> Option<f64> {
    let x = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    x.is_finite().then_some(x)
}

/// Coerce one raw value for a feature of the given kind.
///
/// Absent and `null` values take the kind's default silently; unusable
/// values also take the default but are reported through the returned flag.
pub fn coerce(kind: FeatureKind, raw: Option<&Value>) -> (FeatureValue, bool) {
    let v = match raw {
        None | Some(Value::Null) => return (FeatureValue::default_for(kind), false),
        Some(v) => v,
    };
    let coerced = match kind {
        FeatureKind::Binary => coerce_binary(v).map(FeatureValue::Binary),
        FeatureKind::Continuous => coerce_continuous(v).map(FeatureValue::Continuous),
    };
    match coerced {
        Some(fv) => (fv, false),
        None => (FeatureValue::default_for(kind), true),
    }
}

/// Model input row, named by the schema it was assembled against.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// All-defaults row for `schema` (binary 0, continuous 0.0).
    pub fn defaults(schema: &FeatureSchema) -> Self {
        let values = schema
            .iter()
            .map(|(_, kind)| FeatureValue::default_for(kind).as_f64())
            .collect();
        Self {
            names: schema.shared_names(),
            values,
        }
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut m = serializer.serialize_map(Some(self.len()))?;
        for (name, v) in self.iter() {
            m.serialize_entry(name, &v)?;
        }
        m.end()
    }
}

/// Build the model row for `raw` in schema order.
///
/// Never fails: missing fields take defaults and unusable values are
/// replaced by the default for their kind. Fields not in the schema are ignored.
pub fn assemble(raw: &Map<String, Value>, schema: &FeatureSchema) -> FeatureVector {
    let mut values = Vec::with_capacity(schema.len());
    let mut defaulted = 0u64;

    for (name, kind) in schema.iter() {
        let (fv, substituted) = coerce(kind, raw.get(name));
        if substituted {
            defaulted += 1;
            tracing::debug!(feature = name, raw = ?raw.get(name), "unusable value, using default");
        }
        values.push(fv.as_f64());
    }

    if defaulted > 0 {
        metrics::counter!("assembler_coerced_default_total").increment(defaulted);
    }
    let unknown: Vec<&str> = raw
        .keys()
        .filter(|k| schema.index_of(k).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        tracing::debug!(?unknown, "ignoring fields not in feature schema");
    }

    FeatureVector {
        names: schema.shared_names(),
        values,
    }
}
