//! [`ScoredDocument`]: the unit retrieved from a backend and the unit
//! returned in [`crate::controller::ControllerOutput`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A document as returned by an adapter boundary (Retriever, Assembler).
///
/// Immutable outside the pool: once constructed, a `ScoredDocument` is never
/// mutated in place. The [`crate::pool::CandidatePool`] owns the mutable
/// lifecycle (`PoolItem`); this type is the read-only shape exchanged across
/// component boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// Stable identifier, unique within a request.
    pub doc_id: String,
    /// Document text.
    pub content: String,
    /// Free-form metadata carried from retrieval.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// The retrieval (or final) score associated with this document.
    pub score: f64,
}

impl ScoredDocument {
    pub fn new(doc_id: impl Into<String>, content: impl Into<String>, score: f64) -> Self {
        Self {
            doc_id: doc_id.into(),
            content: content.into(),
            metadata: HashMap::new(),
            score,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}
