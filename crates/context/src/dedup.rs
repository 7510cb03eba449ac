//! Near-duplicate suppression within one category's candidate pool.
//!
//! Items are visited in descending relevance; an item survives only if it
//! is not a duplicate of one already kept, so of any duplicate pair the
//! more relevant one wins. Two items are duplicates when they share a
//! locator identity (same file, same experience, same commit) or when the
//! [`NearDuplicate`] judge says their texts match.

use engram_core::candidate::CandidateItem;
use std::collections::HashMap;
use std::collections::HashSet;

/// Decides whether two texts are near-duplicates.
pub trait NearDuplicate: Send + Sync {
    fn is_duplicate(&self, a: &str, b: &str) -> bool;
}

/// Sequence-similarity judge.
///
/// Similarity is `2 * LCS(a, b) / (|a| + |b|)` over the first
/// `prefix_chars` characters of each text, where LCS is the longest
/// common subsequence.
#[derive(Debug, Clone, Copy)]
pub struct SequenceSimilarity {
    threshold: f64,
    prefix_chars: usize,
}

impl SequenceSimilarity {
    pub fn new(threshold: f64, prefix_chars: usize) -> Self {
        Self {
            threshold,
            prefix_chars,
        }
    }

    /// Similarity ratio of the two bounded prefixes, in [0, 1].
    pub fn ratio(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().take(self.prefix_chars).collect();
        let b: Vec<char> = b.chars().take(self.prefix_chars).collect();
        similarity_ratio(&a, &b)
    }
}

impl Default for SequenceSimilarity {
    fn default() -> Self {
        Self::new(0.90, 1000)
    }
}

impl NearDuplicate for SequenceSimilarity {
    fn is_duplicate(&self, a: &str, b: &str) -> bool {
        let a: Vec<char> = a.chars().take(self.prefix_chars).collect();
        let b: Vec<char> = b.chars().take(self.prefix_chars).collect();

        let total = a.len() + b.len();
        if total == 0 {
            return true;
        }
        // Even a perfect subsequence match cannot reach the threshold
        let best = 2.0 * a.len().min(b.len()) as f64 / total as f64;
        if best < self.threshold {
            return false;
        }

        similarity_ratio(&a, &b) >= self.threshold
    }
}

/// `2 * LCS / (|a| + |b|)`; two empty inputs are identical.
pub fn similarity_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(a, b) as f64 / total as f64
}

/// Length of the longest common subsequence.
///
/// Bit-parallel over `a` (Hyyrö's formulation): one pass over `b`, with
/// `ceil(|a| / 64)` word operations per character.
pub fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let words = a.len().div_ceil(64);
    let mut masks: HashMap<char, Vec<u64>> = HashMap::new();
    for (i, &c) in a.iter().enumerate() {
        let m = masks.entry(c).or_insert_with(|| vec![0u64; words]);
        m[i / 64] |= 1u64 << (i % 64);
    }

    let mut v = vec![u64::MAX; words];
    for c in b {
        let Some(m) = masks.get(c) else {
            continue;
        };
        let mut carry = 0u64;
        for i in 0..words {
            let vi = v[i];
            let u = vi & m[i];
            let (sum, c1) = vi.overflowing_add(u);
            let (sum, c2) = sum.overflowing_add(carry);
            carry = u64::from(c1 || c2);
            v[i] = sum | (vi & !m[i]);
        }
    }

    let mut zeros = 0usize;
    for (i, word) in v.iter().enumerate() {
        let bits = if i + 1 == words && a.len() % 64 != 0 {
            a.len() % 64
        } else {
            64
        };
        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        zeros += bits - (word & mask).count_ones() as usize;
    }
    zeros
}

/// Outcome of deduplicating one pool.
#[derive(Debug, Clone)]
pub struct Deduplicated {
    /// Survivors, most relevant first
    pub kept: Vec<CandidateItem>,
    /// How many candidates were suppressed
    pub removed: usize,
}

/// Suppress duplicates, keeping the more relevant item of each pair.
///
/// Ties in relevance keep the earlier item.
pub fn deduplicate(items: &[CandidateItem], judge: &dyn NearDuplicate) -> Deduplicated {
    let mut ordered: Vec<&CandidateItem> = items.iter().collect();
    ordered.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

    let mut kept: Vec<CandidateItem> = Vec::with_capacity(ordered.len());
    let mut keys: HashSet<String> = HashSet::new();
    let mut removed = 0;

    for item in ordered {
        let key = item.locator.identity_key();
        if key.as_ref().is_some_and(|k| keys.contains(k)) {
            removed += 1;
            continue;
        }

        if kept.iter().any(|k| judge.is_duplicate(&k.content, &item.content)) {
            removed += 1;
            continue;
        }

        if let Some(k) = key {
            keys.insert(k);
        }
        kept.push(item.clone());
    }

    Deduplicated { kept, removed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::candidate::{Locator, SourceKind};

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    /// Quadratic reference implementation.
    fn lcs_reference(a: &[char], b: &[char]) -> usize {
        let mut prev = vec![0usize; b.len() + 1];
        for &x in a {
            let mut cur = vec![0usize; b.len() + 1];
            for (j, &y) in b.iter().enumerate() {
                cur[j + 1] = if x == y {
                    prev[j] + 1
                } else {
                    prev[j + 1].max(cur[j])
                };
            }
            prev = cur;
        }
        prev[b.len()]
    }

    fn item(id: &str, content: &str, relevance: f32) -> CandidateItem {
        CandidateItem::new(id, SourceKind::Memory, content, relevance)
    }

    #[test]
    fn lcs_small_cases() {
        assert_eq!(lcs_len(&chars("ab"), &chars("ab")), 2);
        assert_eq!(lcs_len(&chars("abcde"), &chars("ace")), 3);
        assert_eq!(lcs_len(&chars("abc"), &chars("xyz")), 0);
        assert_eq!(lcs_len(&chars(""), &chars("abc")), 0);
    }

    #[test]
    fn lcs_matches_reference_across_word_boundaries() {
        let a = "the quick brown fox jumps over the lazy dog; ".repeat(4);
        let b = "a quick brown cat leaps over one lazy dog! ".repeat(4);
        for (x, y) in [(&a, &b), (&b, &a)] {
            let (x, y) = (chars(x), chars(y));
            assert!(x.len() > 128);
            assert_eq!(lcs_len(&x, &y), lcs_reference(&x, &y));
        }
    }

    #[test]
    fn ratio_of_identical_and_disjoint() {
        let s = SequenceSimilarity::default();
        assert_eq!(s.ratio("same text", "same text"), 1.0);
        assert_eq!(s.ratio("aaaa", "bbbb"), 0.0);
        assert_eq!(s.ratio("", ""), 1.0);
    }

    #[test]
    fn one_char_edit_is_duplicate() {
        let s = SequenceSimilarity::default();
        assert!(s.is_duplicate(
            "Always run the full test suite before merging.",
            "Always run the full test suite before merging!"
        ));
        assert!(!s.is_duplicate("Prefer small commits.", "Document public APIs thoroughly."));
    }

    #[test]
    fn length_prefilter_rejects() {
        let s = SequenceSimilarity::default();
        assert!(!s.is_duplicate("abc", "abcabcabcabc"));
    }

    #[test]
    fn only_prefix_is_compared() {
        let s = SequenceSimilarity::new(0.9, 10);
        assert!(s.is_duplicate("0123456789 tail one", "0123456789 completely different"));
    }

    #[test]
    fn keeps_higher_relevance_member() {
        let items = vec![
            item("low", "Prefer explicit error types over strings.", 0.4),
            item("high", "Prefer explicit error types over strings!", 0.9),
            item("other", "Benchmark before optimizing hot loops.", 0.6),
        ];
        let out = deduplicate(&items, &SequenceSimilarity::default());
        let ids: Vec<&str> = out.kept.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "other"]);
        assert_eq!(out.removed, 1);
    }

    #[test]
    fn identity_key_duplicates_regardless_of_text() {
        let loc = Locator::Code {
            file_path: "src/lib.rs".into(),
            start_line: 1,
        };
        let items = vec![
            item("a", "fn alpha() {}", 0.5).with_locator(loc.clone()),
            item("b", "struct Completely { different: bool }", 0.8).with_locator(loc),
        ];
        let out = deduplicate(&items, &SequenceSimilarity::default());
        assert_eq!(out.kept.len(), 1);
        assert_eq!(out.kept[0].id, "b");
    }

    #[test]
    fn ties_keep_earlier_item() {
        let items = vec![item("first", "same", 0.5), item("second", "same", 0.5)];
        let out = deduplicate(&items, &SequenceSimilarity::default());
        assert_eq!(out.kept.len(), 1);
        assert_eq!(out.kept[0].id, "first");
    }

    #[test]
    fn empty_pool() {
        let out = deduplicate(&[], &SequenceSimilarity::default());
        assert!(out.kept.is_empty());
        assert_eq!(out.removed, 0);
    }
}
