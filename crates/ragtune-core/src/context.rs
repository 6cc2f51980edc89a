//! [`RagtuneContext`]: the per-request value passed to every component.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation handle for one request. Checked by the
/// Controller at its next suspension point (loop-head, between retrieval
/// rounds); never interrupts a call already in flight.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Passed by value (cheaply cloned) to every component call. Copy-on-modify:
/// reformulated-query variants are produced by [`Self::with_query`]; no
/// component mutates a shared context in place.
#[derive(Debug, Clone)]
pub struct RagtuneContext {
    query: String,
    metadata: HashMap<String, serde_json::Value>,
}

impl RagtuneContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Produce a copy with `query` overridden, leaving `self` untouched.
    /// Used by the Controller to build a reformulated-query variant.
    pub fn with_query(&self, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            metadata: self.metadata.clone(),
        }
    }
}
