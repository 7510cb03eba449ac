//! Confidence tiers and experience weights.

use engram_core::Payload;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Weight given to an experience whose tier is absent or unknown.
pub const DEFAULT_WEIGHT: f64 = 0.5;

/// How well an experience's outcome was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Gold,
    Silver,
    Bronze,
    Abandoned,
}

impl ConfidenceTier {
    pub fn weight(&self) -> f64 {
        match self {
            Self::Gold => 1.0,
            Self::Silver => 0.8,
            Self::Bronze => 0.5,
            Self::Abandoned => 0.2,
        }
    }
}

impl FromStr for ConfidenceTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gold" => Ok(Self::Gold),
            "silver" => Ok(Self::Silver),
            "bronze" => Ok(Self::Bronze),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(format!("unknown confidence tier '{other}'")),
        }
    }
}

/// Weight for a tier name; unknown or missing tiers get [`DEFAULT_WEIGHT`].
pub fn tier_weight(tier: Option<&str>) -> f64 {
    tier.and_then(|t| t.parse::<ConfidenceTier>().ok())
        .map_or(DEFAULT_WEIGHT, |t| t.weight())
}

/// Clustering weight of a stored experience.
///
/// An explicit numeric `confidence_weight` wins; otherwise the
/// `confidence_tier` name decides.
pub fn experience_weight(payload: &Payload) -> f32 {
    if let Some(w) = payload
        .get("confidence_weight")
        .and_then(|v| v.as_f64())
        .filter(|w| w.is_finite() && *w >= 0.0)
    {
        return w as f32;
    }
    tier_weight(payload.get("confidence_tier").and_then(|v| v.as_str())) as f32
}
