//! Token-bounded, deduplicated, multi-source context assembly.
//!
//! # Pipeline
//!
//! | Stage | Module | Rule |
//! |-------|--------|------|
//! | Estimate / truncate | [`token`] | 4 chars per token, cut at a late line break |
//! | Allocate | [`budget`] | weighted floor split across categories |
//! | Deduplicate | [`dedup`] | higher relevance wins a near-duplicate pair |
//! | Cap | [`cap`] | one item ≤ a fixed fraction of its category budget |
//! | Assemble | [`assembler`] | fixed section order, never over budget |
//! | Serve | [`service`] | concurrent fetch, failed sources become empty |
//!
//! [`premortem`] reuses the section renderer for a warnings document built
//! from past failures along each experience axis.

pub mod assembler;
pub mod budget;
pub mod cap;
pub mod dedup;
pub mod premortem;
pub mod service;
pub mod token;

pub use assembler::{AssembledContext, CategoryStats, ContextAssembler};
pub use budget::{distribute_budget, parse_categories};
pub use cap::{CappedItem, cap_item_tokens};
pub use dedup::{NearDuplicate, SequenceSimilarity, deduplicate};
pub use premortem::PremortemPart;
pub use service::{CandidateSource, ContextService, StaticSource};
pub use token::{estimate_tokens, truncate_to_tokens};
