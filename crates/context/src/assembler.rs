//! Context assembly pipeline.
//!
//! Builds one markdown document from per-category candidate pools:
//!
//! 1. Validate the requested categories and split the token budget
//! 2. Deduplicate each pool
//! 3. Consume candidates in descending relevance, capping each item,
//!    until the category budget is spent
//! 4. Concatenate sections in fixed order: Memories, Code, Experiences,
//!    Values, Commits
//!
//! # Determinism
//!
//! Identical inputs always produce identical outputs. No random or
//! time-dependent logic is used during assembly.

use crate::budget;
use crate::cap::cap_item_tokens;
use crate::dedup::{NearDuplicate, SequenceSimilarity, deduplicate};
use crate::token::{self, CHARS_PER_TOKEN};
use engram_config::ContextConfig;
use engram_core::candidate::{CandidateItem, SourceKind, SourceWeights};
use engram_core::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Types ─────────────────────────────────────────────────────────────────

/// The assembled document plus accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Markdown document, trailing whitespace trimmed.
    pub content: String,
    /// `estimate_tokens(content)`; never above the requested maximum.
    pub token_count: usize,
    /// Items included across all sections.
    pub item_count: usize,
    /// True if any item was capped or any candidate dropped for budget.
    pub truncated: bool,
    /// Per-category statistics, in section order.
    #[serde(default)]
    pub categories: Vec<CategoryStats>,
    /// IDs of included items that were capped.
    #[serde(default)]
    pub truncated_items: Vec<String>,
}

impl AssembledContext {
    /// The zero result: no content, no items, nothing truncated.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Statistics for a single category section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    /// Category name (`memories`, `code`, ...).
    pub category: String,
    /// Tokens allocated to this category.
    pub budget: usize,
    /// Estimated tokens of the rendered section.
    pub tokens_used: usize,
    /// Items rendered.
    pub items_included: usize,
    /// Candidates supplied before deduplication.
    pub items_available: usize,
    /// Candidates suppressed as duplicates.
    pub duplicates_removed: usize,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Stateless; create one and reuse it.
pub struct ContextAssembler {
    weights: SourceWeights,
    max_item_fraction: f64,
    judge: Box<dyn NearDuplicate>,
}

impl ContextAssembler {
    pub fn new(
        weights: SourceWeights,
        max_item_fraction: f64,
        judge: Box<dyn NearDuplicate>,
    ) -> Self {
        Self {
            weights,
            max_item_fraction,
            judge,
        }
    }

    /// Assembler with the configured weights, cap and dedup settings.
    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(
            config.weights,
            config.max_item_fraction,
            Box::new(SequenceSimilarity::new(
                config.similarity_threshold,
                config.dedup_prefix_chars,
            )),
        )
    }

    /// Assemble a document from candidate pools.
    ///
    /// Pools for categories that were not requested are ignored; requested
    /// categories without a pool render nothing.
    pub fn assemble<S: AsRef<str>>(
        &self,
        pools: &HashMap<SourceKind, Vec<CandidateItem>>,
        categories: &[S],
        max_tokens: usize,
    ) -> Result<AssembledContext, ValidationError> {
        let kinds = budget::parse_categories(categories)?;
        if kinds.is_empty() {
            return Ok(AssembledContext::empty());
        }
        let budgets = budget::split(&kinds, max_tokens, &self.weights);

        let mut document = String::new();
        let mut result = AssembledContext::empty();

        for (kind, category_budget) in budgets {
            let pool = pools.get(&kind).map(Vec::as_slice).unwrap_or(&[]);
            let section =
                self.render_section(kind.category(), kind.title(), pool, category_budget);

            document.push_str(&section.text);
            result.item_count += section.stats.items_included;
            result.truncated |= section.truncated;
            result.truncated_items.extend(section.capped_ids);
            result.categories.push(section.stats);
        }

        let content = document.trim_end().to_string();
        result.token_count = token::estimate_tokens(&content);
        result.content = content;

        tracing::debug!(
            tokens = result.token_count,
            max_tokens,
            items = result.item_count,
            truncated = result.truncated,
            "Context assembled"
        );
        Ok(result)
    }

    // ── Section renderer ──────────────────────────────────────────────────

    pub(crate) fn render_section(
        &self,
        category: &str,
        title: &str,
        pool: &[CandidateItem],
        category_budget: usize,
    ) -> Section {
        let mut stats = CategoryStats {
            category: category.to_string(),
            budget: category_budget,
            tokens_used: 0,
            items_included: 0,
            items_available: pool.len(),
            duplicates_removed: 0,
        };

        if pool.is_empty() {
            return Section::empty(stats, false);
        }

        let budget_chars = category_budget.saturating_mul(CHARS_PER_TOKEN);
        let header = format!("## {title}\n\n");
        let mut used = token::char_count(&header);
        if used > budget_chars {
            return Section::empty(stats, true);
        }

        let deduped = deduplicate(pool, self.judge.as_ref());
        stats.duplicates_removed = deduped.removed;

        let mut body = String::new();
        let mut capped_ids = Vec::new();
        let mut truncated = false;

        for item in &deduped.kept {
            let capped = cap_item_tokens(
                &item.content,
                category_budget,
                &item.locator,
                self.max_item_fraction,
            );
            if capped.content.trim().is_empty() {
                truncated = true;
                continue;
            }

            let cost = token::char_count(&capped.content) + 2;
            if used + cost > budget_chars {
                truncated = true;
                break;
            }

            used += cost;
            body.push_str(&capped.content);
            body.push_str("\n\n");
            stats.items_included += 1;
            if capped.truncated {
                truncated = true;
                capped_ids.push(item.id.clone());
            }
        }

        if stats.items_included == 0 {
            return Section::empty(stats, truncated);
        }

        let text = format!("{header}{body}");
        stats.tokens_used = token::estimate_tokens(&text);
        Section {
            text,
            stats,
            truncated,
            capped_ids,
        }
    }
}

pub(crate) struct Section {
    pub(crate) text: String,
    pub(crate) stats: CategoryStats,
    pub(crate) truncated: bool,
    pub(crate) capped_ids: Vec<String>,
}

impl Section {
    fn empty(stats: CategoryStats, truncated: bool) -> Self {
        Self {
            text: String::new(),
            stats,
            truncated,
            capped_ids: Vec::new(),
        }
    }
}
