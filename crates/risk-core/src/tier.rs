use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Intermediate,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Intermediate => "intermediate",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Intermediate => write!(f, "Intermediate"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Two cut points partitioning [0, 1] into Low / Intermediate / High.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub low: f64,
    pub high: f64,
}

impl RiskThresholds {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        let t = Self { low, high };
        t.validate()?;
        Ok(t)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.low.is_finite() && self.high.is_finite(),
            "risk thresholds must be finite: low={} high={}",
            self.low,
            self.high
        );
        ensure!(
            (0.0..=1.0).contains(&self.low) && (0.0..=1.0).contains(&self.high),
            "risk thresholds must lie in [0, 1]: low={} high={}",
            self.low,
            self.high
        );
        ensure!(
            self.low < self.high,
            "risk thresholds must satisfy low < high: low={} high={}",
            self.low,
            self.high
        );
        Ok(())
    }

    #[inline]
    pub fn tier(&self, p: f64) -> RiskTier {
        tier(p, self.low, self.high)
    }
}

/// Half-open intervals: a probability equal to a cut point belongs to the tier above it.
#[inline]
pub fn tier(p: f64, thr_low: f64, thr_high: f64) -> RiskTier {
    if p < thr_low {
        RiskTier::Low
    } else if p < thr_high {
        RiskTier::Intermediate
    } else {
        RiskTier::High
    }
}
