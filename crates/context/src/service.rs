//! Async context service.
//!
//! Validates a request, fetches each category's candidates concurrently,
//! and runs the assembler on the blocking pool. A source that fails or
//! times out contributes an empty pool; the request still succeeds.

use async_trait::async_trait;
use engram_config::ContextConfig;
use engram_core::axis::Axis;
use engram_core::candidate::{CandidateItem, SourceKind};
use engram_core::error::{Error, Result, ValidationError};
use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::assembler::{AssembledContext, ContextAssembler};
use crate::budget::parse_categories;
use crate::premortem::{self, PremortemPart};

/// Principles included in a premortem.
const PREMORTEM_VALUE_LIMIT: usize = 5;

/// Supplies pre-ranked candidates for one category.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn fetch(&self, kind: SourceKind, query: &str, limit: usize)
    -> Result<Vec<CandidateItem>>;

    /// Experiences retrieved along one axis.
    ///
    /// Defaults to the experience category for `full` and nothing for the
    /// other axes.
    async fn fetch_axis(
        &self,
        axis: Axis,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CandidateItem>> {
        match axis {
            Axis::Full => self.fetch(SourceKind::Experience, query, limit).await,
            _ => Ok(Vec::new()),
        }
    }
}

/// Candidates held in memory, returned in their given order.
///
/// The query is not used: pools are assumed already ranked for it.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pools: HashMap<SourceKind, Vec<CandidateItem>>,
    axes: HashMap<Axis, Vec<CandidateItem>>,
}

impl StaticSource {
    pub fn new(pools: HashMap<SourceKind, Vec<CandidateItem>>) -> Self {
        Self {
            pools,
            axes: HashMap::new(),
        }
    }

    /// Serve `items` for `axis` from [`CandidateSource::fetch_axis`].
    pub fn with_axis(mut self, axis: Axis, items: Vec<CandidateItem>) -> Self {
        self.axes.insert(axis, items);
        self
    }

    /// Group a flat candidate list by kind, preserving order.
    pub fn from_items(items: Vec<CandidateItem>) -> Self {
        let mut pools: HashMap<SourceKind, Vec<CandidateItem>> = HashMap::new();
        for item in items {
            pools.entry(item.kind).or_default().push(item);
        }
        Self::new(pools)
    }
}

#[async_trait]
impl CandidateSource for StaticSource {
    async fn fetch(
        &self,
        kind: SourceKind,
        _query: &str,
        limit: usize,
    ) -> Result<Vec<CandidateItem>> {
        Ok(self
            .pools
            .get(&kind)
            .map(|items| items.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch_axis(
        &self,
        axis: Axis,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CandidateItem>> {
        match self.axes.get(&axis) {
            Some(items) => Ok(items.iter().take(limit).cloned().collect()),
            None if axis == Axis::Full => self.fetch(SourceKind::Experience, query, limit).await,
            None => Ok(Vec::new()),
        }
    }
}

pub struct ContextService {
    source: Arc<dyn CandidateSource>,
    assembler: Arc<ContextAssembler>,
    config: ContextConfig,
}

impl ContextService {
    pub fn new(source: Arc<dyn CandidateSource>, config: ContextConfig) -> Self {
        let assembler = Arc::new(ContextAssembler::from_config(&config));
        Self {
            source,
            assembler,
            config,
        }
    }

    /// Assemble context for `query` from the requested categories.
    ///
    /// `limit` caps candidates fetched per category; `max_tokens` bounds
    /// the document. Both are range-checked, never clamped.
    pub async fn assemble_context(
        &self,
        query: &str,
        categories: &[String],
        limit: usize,
        max_tokens: usize,
    ) -> Result<AssembledContext> {
        let kinds = parse_categories(categories)?;
        self.check_limits(limit, max_tokens)?;

        if query.trim().is_empty() || kinds.is_empty() {
            return Ok(AssembledContext::empty());
        }

        info!(
            categories = ?categories,
            limit,
            max_tokens,
            "Assembling context"
        );

        let timeout = self.source_timeout();
        let fetches = kinds.iter().map(|&kind| {
            let source = Arc::clone(&self.source);
            async move {
                let items =
                    or_empty(kind.category(), timeout, source.fetch(kind, query, limit)).await;
                (kind, items)
            }
        });
        let pools: HashMap<SourceKind, Vec<CandidateItem>> =
            join_all(fetches).await.into_iter().collect();

        let assembler = Arc::clone(&self.assembler);
        let requested: Vec<String> = kinds.iter().map(|k| k.category().to_string()).collect();
        let assembled = tokio::task::spawn_blocking(move || {
            assembler.assemble(&pools, &requested, max_tokens)
        })
        .await
        .map_err(|e| Error::Internal(format!("context assembly task failed: {e}")))??;

        info!(
            tokens = assembled.token_count,
            items = assembled.item_count,
            truncated = assembled.truncated,
            "Context ready"
        );
        Ok(assembled)
    }

    /// Assemble a premortem for work in `domain`.
    ///
    /// Retrieves past failures, surprises and root causes (plus strategy
    /// outcomes when `strategy` is named) and relevant values concurrently.
    /// Each retrieval that fails or times out renders as an empty section.
    pub async fn premortem_context(
        &self,
        domain: &str,
        strategy: Option<&str>,
        limit: usize,
        max_tokens: usize,
    ) -> Result<AssembledContext> {
        self.check_limits(limit, max_tokens)?;

        let domain = domain.trim();
        if domain.is_empty() {
            return Ok(AssembledContext::empty());
        }
        let strategy = strategy.map(str::trim).filter(|s| !s.is_empty());

        info!(domain, strategy, limit, max_tokens, "Assembling premortem");

        let timeout = self.source_timeout();
        let fetches = PremortemPart::ordered(strategy.is_some())
            .into_iter()
            .map(|part| {
                let source = Arc::clone(&self.source);
                let query = part.query(domain, strategy);
                async move {
                    let items = match part {
                        PremortemPart::Axis(axis) => {
                            or_empty(axis.as_str(), timeout, source.fetch_axis(axis, &query, limit))
                                .await
                        }
                        PremortemPart::Values => {
                            let n = limit.min(PREMORTEM_VALUE_LIMIT);
                            or_empty("values", timeout, source.fetch(SourceKind::Value, &query, n))
                                .await
                        }
                    };
                    (part, items)
                }
            });
        let sections = join_all(fetches).await;

        let assembler = Arc::clone(&self.assembler);
        let heading = premortem::heading(domain, strategy);
        let assembled = tokio::task::spawn_blocking(move || {
            assembler.assemble_premortem(&heading, &sections, max_tokens)
        })
        .await
        .map_err(|e| Error::Internal(format!("premortem assembly task failed: {e}")))?;

        info!(
            tokens = assembled.token_count,
            items = assembled.item_count,
            "Premortem ready"
        );
        Ok(assembled)
    }

    fn check_limits(&self, limit: usize, max_tokens: usize) -> Result<()> {
        if limit < 1 || limit > self.config.max_limit {
            return Err(out_of_range("Limit", limit, 1, self.config.max_limit).into());
        }
        if max_tokens > self.config.max_tokens_limit {
            return Err(
                out_of_range("max_tokens", max_tokens, 0, self.config.max_tokens_limit).into(),
            );
        }
        Ok(())
    }

    fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.config.source_timeout_ms)
    }
}

/// Await a retrieval, turning failure or timeout into an empty pool.
async fn or_empty<F>(source: &str, timeout: Duration, fetch: F) -> Vec<CandidateItem>
where
    F: Future<Output = Result<Vec<CandidateItem>>>,
{
    match tokio::time::timeout(timeout, fetch).await {
        Ok(Ok(items)) => items,
        Ok(Err(e)) => {
            warn!(source, error = %e, "Source failed, treating as empty");
            Vec::new()
        }
        Err(_) => {
            warn!(
                source,
                timeout_ms = timeout.as_millis() as u64,
                "Source timed out, treating as empty"
            );
            Vec::new()
        }
    }
}

fn out_of_range(param: &str, value: usize, min: usize, max: usize) -> ValidationError {
    ValidationError::OutOfRange {
        param: param.to_string(),
        value: value as i64,
        min: min as i64,
        max: max as i64,
    }
}
