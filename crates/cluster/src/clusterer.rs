//! Matrix-level clustering and weighted centroids.

use engram_config::ClusteringConfig;
use engram_core::error::ClusterError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::hdbscan::{Hdbscan, HdbscanParams};

/// Flat clustering of one embedding matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
    /// One label per row; `-1` is noise
    pub labels: Vec<i64>,
    pub n_clusters: usize,
    pub noise_count: usize,
    /// Membership strength per row, in [0, 1]
    pub probabilities: Vec<f64>,
}

/// One discovered cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub label: i64,
    /// Weighted mean of member vectors
    pub centroid: Vec<f32>,
    /// Member ids in encounter order
    pub member_ids: Vec<String>,
    pub size: usize,
    pub avg_weight: f64,
}

#[derive(Debug, Clone)]
pub struct Clusterer {
    hdbscan: Hdbscan,
}

impl Clusterer {
    pub fn new(params: HdbscanParams) -> Result<Self, ClusterError> {
        Ok(Self {
            hdbscan: Hdbscan::new(params)?,
        })
    }

    pub fn from_config(config: &ClusteringConfig) -> Result<Self, ClusterError> {
        Self::new(HdbscanParams {
            min_cluster_size: config.min_cluster_size,
            min_samples: config.min_samples,
            selection_method: config.selection_method.parse()?,
        })
    }

    pub fn params(&self) -> &HdbscanParams {
        self.hdbscan.params()
    }

    /// Cluster rows under cosine distance.
    ///
    /// Weights are checked against the row count but do not move the
    /// density estimate; they only shape centroids.
    pub fn cluster(
        &self,
        embeddings: &[Vec<f32>],
        weights: Option<&[f32]>,
    ) -> Result<ClusterResult, ClusterError> {
        check_matrix(embeddings)?;
        if let Some(w) = weights
            && w.len() != embeddings.len()
        {
            return Err(ClusterError::WeightsMismatch {
                weights: w.len(),
                embeddings: embeddings.len(),
            });
        }

        let normalized: Vec<Vec<f64>> = embeddings.iter().map(|row| normalize(row)).collect();
        let fitted = self.hdbscan.fit(&normalized);

        let noise_count = fitted.labels.iter().filter(|&&l| l < 0).count();
        let n_clusters = fitted
            .labels
            .iter()
            .copied()
            .max()
            .map_or(0, |max| (max + 1).max(0) as usize);

        tracing::debug!(
            points = embeddings.len(),
            n_clusters,
            noise_count,
            "HDBSCAN complete"
        );

        Ok(ClusterResult {
            labels: fitted.labels,
            n_clusters,
            noise_count,
            probabilities: fitted.probabilities,
        })
    }

    /// Weighted centroid per non-noise label, sorted by label.
    ///
    /// Missing weights count as 1.0.
    pub fn compute_centroids(
        embeddings: &[Vec<f32>],
        labels: &[i64],
        ids: &[String],
        weights: Option<&[f32]>,
    ) -> Result<Vec<ClusterInfo>, ClusterError> {
        if embeddings.len() != labels.len() || embeddings.len() != ids.len() {
            return Err(ClusterError::LengthMismatch {
                embeddings: embeddings.len(),
                labels: labels.len(),
                ids: ids.len(),
            });
        }
        if let Some(w) = weights
            && w.len() != embeddings.len()
        {
            return Err(ClusterError::WeightsMismatch {
                weights: w.len(),
                embeddings: embeddings.len(),
            });
        }
        if embeddings.is_empty() {
            return Ok(Vec::new());
        }
        let dim = check_matrix(embeddings)?;

        struct Acc {
            sum: Vec<f64>,
            total_weight: f64,
            member_ids: Vec<String>,
        }

        let mut groups: BTreeMap<i64, Acc> = BTreeMap::new();
        for (i, (row, &label)) in embeddings.iter().zip(labels).enumerate() {
            if label < 0 {
                continue;
            }
            let w = weights.map_or(1.0, |w| f64::from(w[i]));
            let acc = groups.entry(label).or_insert_with(|| Acc {
                sum: vec![0.0; dim],
                total_weight: 0.0,
                member_ids: Vec::new(),
            });
            for (s, &x) in acc.sum.iter_mut().zip(row) {
                *s += w * f64::from(x);
            }
            acc.total_weight += w;
            acc.member_ids.push(ids[i].clone());
        }

        groups
            .into_iter()
            .map(|(label, acc)| {
                if acc.total_weight == 0.0 {
                    return Err(ClusterError::ZeroWeight { label });
                }
                let size = acc.member_ids.len();
                Ok(ClusterInfo {
                    label,
                    centroid: acc
                        .sum
                        .iter()
                        .map(|s| (s / acc.total_weight) as f32)
                        .collect(),
                    member_ids: acc.member_ids,
                    size,
                    avg_weight: acc.total_weight / size as f64,
                })
            })
            .collect()
    }
}

/// Reject empty or ragged input; returns the row length.
fn check_matrix(embeddings: &[Vec<f32>]) -> Result<usize, ClusterError> {
    let Some(first) = embeddings.first() else {
        return Err(ClusterError::EmptyInput);
    };
    let dim = first.len();
    if dim == 0 {
        return Err(ClusterError::EmptyInput);
    }
    for (row, v) in embeddings.iter().enumerate() {
        if v.len() != dim {
            return Err(ClusterError::NotTwoDimensional {
                row,
                expected: dim,
                actual: v.len(),
            });
        }
    }
    Ok(dim)
}

fn normalize(row: &[f32]) -> Vec<f64> {
    let norm = row
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 {
        return vec![0.0; row.len()];
    }
    row.iter().map(|&x| f64::from(x) / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("exp_{i}")).collect()
    }

    fn unit(dim: usize, k: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[k] = 1.0;
        v
    }

    /// Two tight angular blobs plus one point opposite both.
    fn blobs() -> Vec<Vec<f32>> {
        let dim = 16;
        let mut rows = Vec::new();
        for k in 2..8 {
            let mut v = unit(dim, 0);
            v[k] = 0.05;
            rows.push(v);
        }
        for k in 8..14 {
            let mut v = unit(dim, 1);
            v[k] = 0.05;
            rows.push(v);
        }
        let mut outlier = vec![0.0; dim];
        outlier[0] = -1.0;
        outlier[1] = -1.0;
        rows.push(outlier);
        rows
    }

    #[test]
    fn separates_angular_blobs() {
        let clusterer = Clusterer::new(HdbscanParams::default()).unwrap();
        let result = clusterer.cluster(&blobs(), None).unwrap();

        assert_eq!(result.labels.len(), 13);
        assert_eq!(result.n_clusters, 2);
        let a = result.labels[0];
        let b = result.labels[6];
        assert!(a >= 0 && b >= 0 && a != b);
        assert!(result.labels[..6].iter().all(|&l| l == a));
        assert!(result.labels[6..12].iter().all(|&l| l == b));
        assert_eq!(result.labels[12], -1);
        assert_eq!(result.noise_count, 1);
        assert!(result.probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn scale_does_not_change_labels() {
        let clusterer = Clusterer::new(HdbscanParams::default()).unwrap();
        let scaled: Vec<Vec<f32>> = blobs()
            .into_iter()
            .enumerate()
            .map(|(i, row)| row.iter().map(|x| x * (1.0 + i as f32)).collect())
            .collect();
        let plain = clusterer.cluster(&blobs(), None).unwrap();
        let scaled = clusterer.cluster(&scaled, None).unwrap();
        assert_eq!(plain.labels, scaled.labels);
    }

    #[test]
    fn small_input_is_all_noise() {
        let clusterer = Clusterer::new(HdbscanParams::default()).unwrap();
        let rows = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
        let result = clusterer.cluster(&rows, None).unwrap();
        assert_eq!(result.labels, vec![-1, -1, -1]);
        assert_eq!(result.n_clusters, 0);
        assert_eq!(result.noise_count, 3);
    }

    #[test]
    fn rejects_bad_input() {
        let clusterer = Clusterer::new(HdbscanParams::default()).unwrap();
        assert_eq!(clusterer.cluster(&[], None), Err(ClusterError::EmptyInput));
        assert_eq!(
            clusterer.cluster(&[vec![], vec![]], None),
            Err(ClusterError::EmptyInput)
        );
        assert!(matches!(
            clusterer.cluster(&[vec![1.0, 0.0], vec![1.0]], None),
            Err(ClusterError::NotTwoDimensional { row: 1, .. })
        ));
        assert!(matches!(
            clusterer.cluster(&[vec![1.0], vec![2.0]], Some(&[1.0])),
            Err(ClusterError::WeightsMismatch { weights: 1, embeddings: 2 })
        ));
    }

    #[test]
    fn from_config_rejects_unknown_method() {
        let config = ClusteringConfig {
            selection_method: "kmeans".into(),
            ..ClusteringConfig::default()
        };
        assert!(matches!(
            Clusterer::from_config(&config),
            Err(ClusterError::InvalidParameter(_))
        ));
        assert!(Clusterer::from_config(&ClusteringConfig::default()).is_ok());
    }

    #[test]
    fn centroids_of_two_groups() {
        let rows = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![10.0, 10.0],
            vec![11.0, 10.0],
            vec![10.0, 11.0],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let out = Clusterer::compute_centroids(&rows, &labels, &ids(6), None).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].label, 0);
        assert_eq!(out[0].size, 3);
        assert_eq!(out[1].size, 3);
        assert_eq!(out[0].member_ids, vec!["exp_0", "exp_1", "exp_2"]);
        assert!((out[0].centroid[0] - 1.0 / 3.0).abs() < 1e-6);
        assert!((out[1].centroid[1] - 31.0 / 3.0).abs() < 1e-5);
        assert_eq!(out[0].avg_weight, 1.0);
    }

    #[test]
    fn weighted_centroid() {
        let rows = vec![vec![0.0, 0.0], vec![10.0, 10.0]];
        let labels = vec![0, 0];

        let plain = Clusterer::compute_centroids(&rows, &labels, &ids(2), None).unwrap();
        assert_eq!(plain[0].centroid, vec![5.0, 5.0]);

        let weighted =
            Clusterer::compute_centroids(&rows, &labels, &ids(2), Some(&[0.1, 0.9])).unwrap();
        assert!((weighted[0].centroid[0] - 9.0).abs() < 1e-5);
        assert!((weighted[0].centroid[1] - 9.0).abs() < 1e-5);
        assert!((weighted[0].avg_weight - 0.5).abs() < 1e-6);
    }

    #[test]
    fn noise_is_excluded_and_labels_sorted() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
        let labels = vec![2, -1, 0, 2];
        let out = Clusterer::compute_centroids(&rows, &labels, &ids(4), None).unwrap();
        let got: Vec<i64> = out.iter().map(|c| c.label).collect();
        assert_eq!(got, vec![0, 2]);
        assert_eq!(out[1].member_ids, vec!["exp_0", "exp_3"]);
        assert_eq!(out[1].centroid, vec![2.5]);
    }

    #[test]
    fn centroid_errors() {
        let rows = vec![vec![1.0], vec![2.0]];
        assert!(matches!(
            Clusterer::compute_centroids(&rows, &[0], &ids(2), None),
            Err(ClusterError::LengthMismatch { .. })
        ));
        assert!(matches!(
            Clusterer::compute_centroids(&rows, &[0, 0], &ids(2), Some(&[1.0])),
            Err(ClusterError::WeightsMismatch { .. })
        ));
        assert_eq!(
            Clusterer::compute_centroids(&rows, &[0, 0], &ids(2), Some(&[0.0, 0.0])),
            Err(ClusterError::ZeroWeight { label: 0 })
        );
    }
}
