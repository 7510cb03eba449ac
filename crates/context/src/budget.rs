//! Budget allocation across source categories.

use engram_core::candidate::{SourceKind, SourceWeights};
use engram_core::error::ValidationError;
use std::collections::{BTreeMap, BTreeSet};

/// Parse requested category names into a set of kinds.
///
/// Duplicates collapse. Every unknown name is reported in one error.
pub fn parse_categories<S: AsRef<str>>(
    categories: &[S],
) -> Result<BTreeSet<SourceKind>, ValidationError> {
    let mut kinds = BTreeSet::new();
    let mut unknown: Vec<String> = Vec::new();

    for name in categories {
        let name = name.as_ref();
        match SourceKind::from_category(name) {
            Some(kind) => {
                kinds.insert(kind);
            }
            None => {
                if !unknown.iter().any(|u| u == name) {
                    unknown.push(name.to_string());
                }
            }
        }
    }

    if !unknown.is_empty() {
        return Err(ValidationError::UnknownCategories {
            names: unknown,
            valid: SourceKind::category_names(),
        });
    }
    Ok(kinds)
}

/// Split `max_tokens` across the requested categories by weight.
///
/// Each share is `floor(max_tokens * weight / total_weight)`, so the sum
/// never exceeds `max_tokens` and falls short by less than the number of
/// categories. Iteration order of the result is section order.
pub fn distribute_budget<S: AsRef<str>>(
    categories: &[S],
    max_tokens: usize,
    weights: &SourceWeights,
) -> Result<BTreeMap<SourceKind, usize>, ValidationError> {
    let kinds = parse_categories(categories)?;
    Ok(split(&kinds, max_tokens, weights))
}

pub(crate) fn split(
    kinds: &BTreeSet<SourceKind>,
    max_tokens: usize,
    weights: &SourceWeights,
) -> BTreeMap<SourceKind, usize> {
    let total: u128 = kinds.iter().map(|k| weights.weight(*k) as u128).sum();

    kinds
        .iter()
        .map(|&kind| {
            let share = if total == 0 {
                0
            } else {
                (max_tokens as u128 * weights.weight(kind) as u128 / total) as usize
            };
            (kind, share)
        })
        .collect()
}
