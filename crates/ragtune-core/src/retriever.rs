//! [`Retriever`]: adapter boundary; returns an ordered candidate list for a
//! query.

use crate::context::RagtuneContext;
use crate::doc::ScoredDocument;
use crate::error::CoreError;
use crate::util::jaccard_similarity;

/// Contract: fallible. Exceptions on the original query are fatal to the
/// request; on reformulated-query rewrites they are recoverable. The trait
/// itself doesn't distinguish the two cases — that's the Controller's
/// concern based on which retrieval round is in flight.
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        context: &RagtuneContext,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, CoreError>;
}

/// Deterministic in-memory reference Retriever: scores a fixed corpus by
/// term overlap against the query. Sufficient to exercise the Controller
/// end-to-end; not a production retrieval stack.
pub struct StaticRetriever {
    corpus: Vec<(String, String)>,
}

impl StaticRetriever {
    pub fn new(corpus: Vec<(String, String)>) -> Self {
        Self { corpus }
    }
}

#[async_trait::async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(
        &self,
        context: &RagtuneContext,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, CoreError> {
        let mut scored: Vec<ScoredDocument> = self
            .corpus
            .iter()
            .map(|(doc_id, content)| {
                let score = jaccard_similarity(context.query(), content);
                ScoredDocument::new(doc_id.clone(), content.clone(), score)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap()
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}
