//! The consensus gate.
//!
//! A candidate is accepted when it sits no further from the cluster
//! centroid than a typical member does:
//! `d(candidate) <= mean(d(member)) + k * std(d(member))`, with cosine
//! distance and population standard deviation.

use engram_memory::cosine_distance;

use crate::types::ValidationResult;

/// Judge an embedded candidate against a centroid and its members.
pub fn evaluate_candidate(
    candidate: &[f32],
    centroid: &[f32],
    members: &[Vec<f32>],
    std_multiplier: f64,
) -> ValidationResult {
    let member_distances: Vec<f64> = members
        .iter()
        .map(|m| cosine_distance(m, centroid))
        .collect();
    evaluate_distances(
        cosine_distance(candidate, centroid),
        &member_distances,
        std_multiplier,
    )
}

/// The gate on precomputed distances.
pub fn evaluate_distances(
    candidate_distance: f64,
    member_distances: &[f64],
    std_multiplier: f64,
) -> ValidationResult {
    let Some((mean, std)) = mean_std(member_distances) else {
        return ValidationResult::rejected("Cluster has no members");
    };
    let threshold = mean + std_multiplier * std;

    let mut result = ValidationResult {
        valid: candidate_distance <= threshold,
        similarity: None,
        reason: None,
        candidate_distance: Some(candidate_distance),
        mean_distance: Some(mean),
        std_distance: Some(std),
        threshold: Some(threshold),
    };
    if result.valid {
        result.similarity = Some(1.0 - candidate_distance);
    } else {
        result.reason = Some(format!(
            "Value too far from centroid (distance={candidate_distance:.3}, \
             threshold={threshold:.3} [mean={mean:.3} + {std_multiplier}*std={std:.3}])"
        ));
    }
    result
}

/// Mean and population standard deviation.
fn mean_std(xs: &[f64]) -> Option<(f64, f64)> {
    if xs.is_empty() {
        return None;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_far_candidate_is_rejected_with_numbers() {
        let r = evaluate_distances(0.30, &[0.10, 0.30], 0.5);
        assert!(!r.valid);
        let reason = r.reason.unwrap();
        assert!(reason.starts_with("Value too far from centroid"));
        assert!(reason.contains("distance=0.300"));
        assert!(reason.contains("threshold=0.250"));
        assert!(reason.contains("[mean=0.200 + 0.5*std=0.100]"));
        assert!(r.similarity.is_none());
        assert!((r.threshold.unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn candidate_at_centroid_is_accepted() {
        let centroid = vec![1.0, 1.0];
        let members = vec![vec![1.0, 0.8], vec![0.8, 1.0]];
        let r = evaluate_candidate(&[2.0, 2.0], &centroid, &members, 0.5);
        assert!(r.valid);
        assert!(r.candidate_distance.unwrap().abs() < 1e-9);
        assert!((r.similarity.unwrap() - 1.0).abs() < 1e-9);
        assert!(r.reason.is_none());
    }

    #[test]
    fn boundary_is_inclusive() {
        let r = evaluate_distances(0.2, &[0.2, 0.2, 0.2], 0.5);
        assert!(r.valid);
        assert_eq!(r.std_distance, Some(0.0));
    }

    #[test]
    fn no_members_is_rejected() {
        let r = evaluate_distances(0.0, &[], 0.5);
        assert!(!r.valid);
        assert_eq!(r.reason.as_deref(), Some("Cluster has no members"));
    }

    #[test]
    fn population_std() {
        let (mean, std) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(mean, 5.0);
        assert_eq!(std, 2.0);
    }
}
