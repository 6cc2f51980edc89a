//! [`Reranker`]: maps a batch of items and a strategy tag to new scores.
//!
//! An `async_trait`-based component boundary; `NoopReranker` below is a
//! pass-through-by-default reference implementation.

use crate::context::RagtuneContext;
use crate::error::CoreError;
use crate::pool::PoolItem;
use std::collections::HashMap;

/// Contract: fallible. Result keys must be a subset of the input ids.
/// Missing ids imply "dropped"; the Controller (not the Reranker) performs
/// the pool transition.
#[async_trait::async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        items: &[PoolItem],
        strategy: &str,
        context: &RagtuneContext,
    ) -> Result<HashMap<String, f64>, CoreError>;
}

/// A Reranker that leaves every item's current score unchanged. Useful as a
/// registry default and in tests that don't care about reranking behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReranker;

#[async_trait::async_trait]
impl Reranker for NoopReranker {
    async fn rerank(
        &self,
        items: &[PoolItem],
        _strategy: &str,
        _context: &RagtuneContext,
    ) -> Result<HashMap<String, f64>, CoreError> {
        Ok(items
            .iter()
            .map(|item| (item.doc_id.clone(), item.final_score()))
            .collect())
    }
}
