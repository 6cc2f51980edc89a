//! [`Scheduler`]: a pure function from pool + budget snapshot to an optional
//! next batch proposal.
//!
//! A pure policy over the current pool and remaining-budget view; no clock,
//! no mutation, no side effects.

use crate::estimator::PoolSnapshot;
use crate::pool::PoolItem;
use crate::tracker::RemainingView;
use std::collections::HashMap;

/// A proposed next batch of ids to rerank together under one strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProposal {
    pub doc_ids: Vec<String>,
    pub strategy: String,
    pub expected_cost: HashMap<String, f64>,
}

/// Contract: pure. No state mutation, no budget consumption.
pub trait Scheduler: Send + Sync {
    fn select_batch(&self, snapshot: &PoolSnapshot, remaining: &RemainingView) -> Option<BatchProposal>;
}

/// The core's reference Scheduler: deterministic priority-ranked batching
/// with optional two-tier strategy escalation.
pub struct DefaultScheduler {
    pub target_batch_size: usize,
    pub cheap_strategy: String,
    pub expensive_strategy: String,
    /// Escalate to `expensive_strategy` once fewer than this many items
    /// remain eligible after the proposed batch. `0` disables this trigger.
    pub escalate_below_eligible: usize,
    /// Escalate once the mean of the top-3 reranked scores drops below this
    /// threshold. `None` disables this trigger.
    pub confidence_threshold: Option<f64>,
    /// Per-strategy token cost per document, for `expected_cost.tokens`.
    pub tokens_per_doc: HashMap<String, f64>,
}

impl DefaultScheduler {
    pub fn new(
        target_batch_size: usize,
        cheap_strategy: impl Into<String>,
        expensive_strategy: impl Into<String>,
    ) -> Self {
        Self {
            target_batch_size,
            cheap_strategy: cheap_strategy.into(),
            expensive_strategy: expensive_strategy.into(),
            escalate_below_eligible: 0,
            confidence_threshold: None,
            tokens_per_doc: HashMap::new(),
        }
    }

    pub fn with_escalation(mut self, escalate_below_eligible: usize, confidence_threshold: f64) -> Self {
        self.escalate_below_eligible = escalate_below_eligible;
        self.confidence_threshold = Some(confidence_threshold);
        self
    }

    pub fn with_token_cost(mut self, strategy: impl Into<String>, tokens_per_doc: f64) -> Self {
        self.tokens_per_doc.insert(strategy.into(), tokens_per_doc);
        self
    }

    fn choose_strategy(&self, eligible_after_batch: usize, snapshot: &PoolSnapshot) -> String {
        let below_n =
            self.escalate_below_eligible > 0 && eligible_after_batch < self.escalate_below_eligible;

        let confidence_crossed = self
            .confidence_threshold
            .map(|threshold| {
                if snapshot.reranked.is_empty() {
                    return false;
                }
                let mut scores: Vec<f64> = snapshot.reranked.iter().map(|i| i.final_score()).collect();
                scores.sort_by(|a, b| b.partial_cmp(a).unwrap());
                let k = scores.len().min(3);
                let mean_top_k = scores[..k].iter().sum::<f64>() / k as f64;
                mean_top_k < threshold
            })
            .unwrap_or(false);

        if below_n || confidence_crossed {
            self.expensive_strategy.clone()
        } else {
            self.cheap_strategy.clone()
        }
    }
}

impl Scheduler for DefaultScheduler {
    fn select_batch(&self, snapshot: &PoolSnapshot, remaining: &RemainingView) -> Option<BatchProposal> {
        let mut eligible = snapshot.eligible.clone();
        eligible.sort_by(|a, b| {
            b.priority_value
                .partial_cmp(&a.priority_value)
                .unwrap()
                .then_with(|| a.initial_rank.cmp(&b.initial_rank))
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });

        let remaining_rerank_docs = remaining.get("rerank_docs");
        let cap = if remaining_rerank_docs.is_finite() {
            remaining_rerank_docs.floor().max(0.0) as usize
        } else {
            usize::MAX
        };
        let batch_size = self.target_batch_size.min(eligible.len()).min(cap);
        if batch_size == 0 {
            return None;
        }

        let batch: Vec<PoolItem> = eligible.into_iter().take(batch_size).collect();
        let doc_ids: Vec<String> = batch.iter().map(|item| item.doc_id.clone()).collect();
        let eligible_after = snapshot.eligible.len() - batch_size;
        let strategy = self.choose_strategy(eligible_after, snapshot);

        let mut expected_cost = HashMap::new();
        expected_cost.insert("rerank_docs".to_string(), batch_size as f64);
        expected_cost.insert("rerank_calls".to_string(), 1.0);
        if let Some(tokens_per_doc) = self.tokens_per_doc.get(&strategy) {
            expected_cost.insert("tokens".to_string(), tokens_per_doc * batch_size as f64);
        }

        Some(BatchProposal {
            doc_ids,
            strategy,
            expected_cost,
        })
    }
}

/// Runs a list of Schedulers and merges their proposals per the §9
/// "pessimistic merge for gating decisions" rule: if any sub-scheduler
/// declines to propose a batch (votes to stop), the Composite declines too.
/// Otherwise the first sub-scheduler's batch and cost win, but the strategy
/// tag escalates if any other sub-scheduler chose a different (more
/// expensive) one.
pub struct CompositeScheduler {
    pub schedulers: Vec<std::sync::Arc<dyn Scheduler>>,
}

impl CompositeScheduler {
    pub fn new(schedulers: Vec<std::sync::Arc<dyn Scheduler>>) -> Self {
        Self { schedulers }
    }
}

impl Scheduler for CompositeScheduler {
    fn select_batch(&self, snapshot: &PoolSnapshot, remaining: &RemainingView) -> Option<BatchProposal> {
        let mut proposals = Vec::with_capacity(self.schedulers.len());
        for scheduler in &self.schedulers {
            proposals.push(scheduler.select_batch(snapshot, remaining)?);
        }
        let mut primary = proposals.remove(0);
        if let Some(escalated) = proposals.into_iter().find(|p| p.strategy != primary.strategy) {
            primary.strategy = escalated.strategy;
        }
        Some(primary)
    }
}
