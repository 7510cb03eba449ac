//! Premortem documents.
//!
//! Before starting work in a domain, surface what went wrong there before:
//! common failures, how a strategy has fared, surprises, root causes, and
//! the principles that apply. Each part is a titled section built by the
//! same renderer as regular context, so dedup, capping and the character
//! accounting carry over unchanged.

use crate::assembler::{AssembledContext, ContextAssembler};
use crate::token::{self, CHARS_PER_TOKEN};
use engram_core::axis::Axis;
use engram_core::candidate::CandidateItem;

/// Which retrieval feeds a premortem section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PremortemPart {
    Axis(Axis),
    Values,
}

impl PremortemPart {
    /// Sections in document order. `strategy` only appears when a
    /// strategy was named.
    pub fn ordered(with_strategy: bool) -> Vec<PremortemPart> {
        let mut parts = vec![Self::Axis(Axis::Full)];
        if with_strategy {
            parts.push(Self::Axis(Axis::Strategy));
        }
        parts.extend([
            Self::Axis(Axis::Surprise),
            Self::Axis(Axis::RootCause),
            Self::Values,
        ]);
        parts
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Axis(Axis::Full) => "Common Failures",
            Self::Axis(Axis::Strategy) => "Strategy Performance",
            Self::Axis(Axis::Surprise) => "Unexpected Outcomes",
            Self::Axis(Axis::RootCause) => "Root Causes to Watch",
            Self::Values => "Relevant Principles",
        }
    }

    /// Key used in per-section statistics.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Axis(axis) => axis.as_str(),
            Self::Values => "values",
        }
    }

    /// Retrieval query for this part.
    pub fn query(&self, domain: &str, strategy: Option<&str>) -> String {
        match self {
            Self::Axis(Axis::Full) => format!("failures and issues in {domain}"),
            Self::Axis(Axis::Strategy) => {
                format!("outcomes using {} strategy", strategy.unwrap_or(domain))
            }
            Self::Axis(Axis::Surprise) => format!("unexpected outcomes in {domain}"),
            Self::Axis(Axis::RootCause) => format!("why hypotheses fail in {domain}"),
            Self::Values => match strategy {
                Some(s) => format!("principles for {domain} using {s}"),
                None => format!("principles for {domain}"),
            },
        }
    }
}

/// Document heading: `# Premortem: {domain}[ with {strategy}]`.
pub fn heading(domain: &str, strategy: Option<&str>) -> String {
    match strategy {
        Some(s) => format!("# Premortem: {domain} with {s}"),
        None => format!("# Premortem: {domain}"),
    }
}

impl ContextAssembler {
    /// Render a premortem document within `max_tokens`.
    ///
    /// The heading is charged first; what remains is split evenly across
    /// the sections that have candidates. Sections render in the order
    /// given. If the heading alone does not fit, the result is empty.
    pub fn assemble_premortem(
        &self,
        heading: &str,
        sections: &[(PremortemPart, Vec<CandidateItem>)],
        max_tokens: usize,
    ) -> AssembledContext {
        let has_items = sections.iter().any(|(_, items)| !items.is_empty());
        let head = format!("{heading}\n\n");
        let budget_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);
        let head_chars = token::char_count(&head);
        if head_chars > budget_chars {
            return AssembledContext {
                truncated: has_items,
                ..AssembledContext::empty()
            };
        }

        let remaining = (budget_chars - head_chars) / CHARS_PER_TOKEN;
        let filled = sections.iter().filter(|(_, items)| !items.is_empty()).count();
        let share = if filled == 0 { 0 } else { remaining / filled };

        let mut document = head;
        let mut result = AssembledContext::empty();
        for (part, items) in sections {
            let budget = if items.is_empty() { 0 } else { share };
            let section = self.render_section(part.key(), part.title(), items, budget);

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
            "Premortem assembled"
        );
        result
    }
}
