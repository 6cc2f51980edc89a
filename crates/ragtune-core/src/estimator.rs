//! [`Estimator`]: a pure function from pool + context to per-item priority
//! values.

use crate::context::RagtuneContext;
use crate::pool::{CandidatePool, PoolItem, PoolState};
use crate::util::jaccard_similarity;
use std::collections::HashMap;
use std::sync::Arc;

/// A read-only view handed to Estimators: the currently eligible
/// (`CANDIDATE`) items to value, and the already-`RERANKED` "winners" some
/// variants compare against. Built fresh each loop iteration by the
/// Controller from [`CandidatePool::get_eligible`] / [`CandidatePool::get_active_items`].
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub eligible: Vec<PoolItem>,
    pub reranked: Vec<PoolItem>,
}

impl PoolSnapshot {
    pub fn from_pool(pool: &CandidatePool) -> Self {
        let eligible = pool.get_eligible();
        let reranked = pool
            .get_active_items()
            .into_iter()
            .filter(|item| item.state == PoolState::Reranked)
            .collect();
        Self { eligible, reranked }
    }
}

/// Contract: pure, deterministic given identical inputs. Must not mutate
/// pool, tracker, or context. May return a subset of ids; the returned
/// domain must be a subset of `snapshot.eligible`.
pub trait Estimator: Send + Sync {
    fn value(&self, snapshot: &PoolSnapshot, context: &RagtuneContext) -> HashMap<String, f64>;
}

fn baseline_value(item: &PoolItem) -> f64 {
    item.sources.values().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Identity: `priority_value = max(sources.values())`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineEstimator;

impl Estimator for BaselineEstimator {
    fn value(&self, snapshot: &PoolSnapshot, _context: &RagtuneContext) -> HashMap<String, f64> {
        snapshot
            .eligible
            .iter()
            .map(|item| (item.doc_id.clone(), baseline_value(item).max(0.0)))
            .collect()
    }
}

/// Boosts each candidate by a bounded [0,1] similarity measure against the
/// set of reranked winners so far, added to the baseline value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityEstimator;

impl Estimator for SimilarityEstimator {
    fn value(&self, snapshot: &PoolSnapshot, _context: &RagtuneContext) -> HashMap<String, f64> {
        snapshot
            .eligible
            .iter()
            .map(|item| {
                let base = baseline_value(item).max(0.0);
                let boost = snapshot
                    .reranked
                    .iter()
                    .map(|winner| jaccard_similarity(&item.content, &winner.content))
                    .fold(0.0_f64, f64::max)
                    .clamp(0.0, 1.0);
                (item.doc_id.clone(), base + boost)
            })
            .collect()
    }
}

/// How a [`CompositeEstimator`] merges per-doc values across its
/// sub-estimators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    Mean,
    Max,
    /// Take the minimum sub-estimate: a conservative, gating-style merge.
    Pessimistic,
}

/// Runs a list of estimators in declaration order and merges their outputs
/// per `merge`.
pub struct CompositeEstimator {
    pub estimators: Vec<Arc<dyn Estimator>>,
    pub merge: MergeRule,
}

impl CompositeEstimator {
    pub fn new(estimators: Vec<Arc<dyn Estimator>>, merge: MergeRule) -> Self {
        Self { estimators, merge }
    }
}

impl Estimator for CompositeEstimator {
    fn value(&self, snapshot: &PoolSnapshot, context: &RagtuneContext) -> HashMap<String, f64> {
        let mut per_doc: HashMap<String, Vec<f64>> = HashMap::new();
        for estimator in &self.estimators {
            for (id, value) in estimator.value(snapshot, context) {
                per_doc.entry(id).or_default().push(value);
            }
        }
        per_doc
            .into_iter()
            .map(|(id, values)| {
                let merged = match self.merge {
                    MergeRule::Mean => values.iter().sum::<f64>() / values.len() as f64,
                    MergeRule::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    MergeRule::Pessimistic => values.iter().copied().fold(f64::INFINITY, f64::min),
                };
                (id, merged)
            })
            .collect()
    }
}
