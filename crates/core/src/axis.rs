//! Clustering axes.
//!
//! The same experience corpus is embedded along four independent views.
//! Each axis is clustered on its own, and cluster ids are scoped by axis
//! (`"{axis}_{label}"`).

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One independent clustering view over the experience corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Complete narrative
    Full,
    /// Problem-solving strategy used
    Strategy,
    /// Unexpected outcomes
    Surprise,
    /// Why a hypothesis was wrong
    RootCause,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::Full, Axis::Strategy, Axis::Surprise, Axis::RootCause];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Strategy => "strategy",
            Self::Surprise => "surprise",
            Self::RootCause => "root_cause",
        }
    }

    /// Vector-store collection holding this axis' experience embeddings.
    pub fn collection(&self) -> String {
        format!("experiences_{}", self.as_str())
    }

    /// Axis-scoped cluster id for a label.
    pub fn cluster_id(&self, label: i64) -> String {
        format!("{}_{}", self.as_str(), label)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidAxis { axis: s.to_string() })
    }
}

/// Parse `"{axis}_{label}"` into its parts.
///
/// Splits on the *last* underscore so `root_cause_3` parses correctly.
/// Labels must be non-negative: noise is never a cluster.
pub fn parse_cluster_id(cluster_id: &str) -> Result<(Axis, i64), ValidationError> {
    let (axis_part, label_part) = cluster_id
        .rsplit_once('_')
        .ok_or_else(|| ValidationError::InvalidClusterId(cluster_id.to_string()))?;

    let label: i64 = label_part
        .parse()
        .map_err(|_| ValidationError::InvalidClusterId(cluster_id.to_string()))?;
    if label < 0 {
        return Err(ValidationError::InvalidClusterId(cluster_id.to_string()));
    }

    let axis = axis_part.parse::<Axis>()?;
    Ok((axis, label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_axes() {
        for axis in Axis::ALL {
            assert_eq!(axis.as_str().parse::<Axis>().unwrap(), axis);
        }
    }

    #[test]
    fn invalid_axis_rejected() {
        let err = "domain".parse::<Axis>().unwrap_err();
        assert!(err.to_string().contains("domain"));
    }

    #[test]
    fn cluster_id_round_trip() {
        assert_eq!(parse_cluster_id("full_0").unwrap(), (Axis::Full, 0));
        assert_eq!(parse_cluster_id("root_cause_12").unwrap(), (Axis::RootCause, 12));
        assert_eq!(Axis::Surprise.cluster_id(3), "surprise_3");
    }

    #[test]
    fn malformed_cluster_ids() {
        assert!(matches!(
            parse_cluster_id("full"),
            Err(ValidationError::InvalidClusterId(_))
        ));
        assert!(matches!(
            parse_cluster_id("full_x"),
            Err(ValidationError::InvalidClusterId(_))
        ));
        assert!(matches!(
            parse_cluster_id("full_-1"),
            Err(ValidationError::InvalidClusterId(_))
        ));
        assert!(matches!(
            parse_cluster_id("domain_1"),
            Err(ValidationError::InvalidAxis { .. })
        ));
    }

    #[test]
    fn collection_names() {
        assert_eq!(Axis::RootCause.collection(), "experiences_root_cause");
    }
}
