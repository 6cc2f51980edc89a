//! [`CandidatePool`]: exclusive owner of all [`PoolItem`]s for a request.

use crate::doc::ScoredDocument;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of a [`PoolItem`]. See the legal-transitions table in
/// [`CandidatePool::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolState {
    Candidate,
    InFlight,
    Reranked,
    Dropped,
}

/// One distinct document identifier under consideration in the current
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolItem {
    pub doc_id: String,
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub state: PoolState,
    /// round tag -> retrieval score observed in that round.
    pub sources: HashMap<String, f64>,
    pub initial_rank: i64,
    pub appearances_count: u32,
    pub priority_value: f64,
    pub reranker_score: Option<f64>,
    pub reranker_strategy: Option<String>,
}

impl PoolItem {
    fn max_source_score(&self) -> f64 {
        self.sources
            .values()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Precedence: reranker_score > priority_value (if > 0) > max(sources) > 0.
    pub fn final_score(&self) -> f64 {
        if let Some(score) = self.reranker_score {
            return score;
        }
        if self.priority_value > 0.0 {
            return self.priority_value;
        }
        let max_source = self.max_source_score();
        if max_source.is_finite() {
            max_source
        } else {
            0.0
        }
    }

    pub fn to_scored_document(&self) -> ScoredDocument {
        ScoredDocument {
            doc_id: self.doc_id.clone(),
            content: self.content.clone(),
            metadata: self.metadata.clone(),
            score: self.final_score(),
        }
    }
}

fn is_legal_transition(from: PoolState, to: PoolState) -> bool {
    matches!(
        (from, to),
        (PoolState::Candidate, PoolState::InFlight)
            | (PoolState::Candidate, PoolState::Dropped)
            | (PoolState::InFlight, PoolState::Reranked)
            | (PoolState::InFlight, PoolState::Dropped)
            | (PoolState::Reranked, PoolState::Dropped)
    )
}

/// Exclusive owner of all [`PoolItem`]s. O(1) lookup by `doc_id`; preserves
/// insertion order via a parallel `order` vector rather than an ordered-map
/// dependency, since the teacher's dependency stack doesn't carry one.
#[derive(Debug, Default)]
pub struct CandidatePool {
    items: HashMap<String, PoolItem>,
    order: Vec<String>,
    max_pool_size: Option<usize>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pool_size(mut self, max_pool_size: usize) -> Self {
        self.max_pool_size = Some(max_pool_size);
        self
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, doc_id: &str) -> Option<&PoolItem> {
        self.items.get(doc_id)
    }

    pub fn items_for(&self, ids: &[String]) -> Vec<PoolItem> {
        ids.iter().filter_map(|id| self.items.get(id).cloned()).collect()
    }

    /// Admit `docs` retrieved under `round_tag`, with `base_rank` as the rank
    /// of the first document in this batch. New doc_ids become `CANDIDATE`
    /// items; previously-seen doc_ids are merged per invariant 6 (provenance
    /// merge) rather than re-created.
    #[tracing::instrument(skip(self, docs), fields(round_tag = %round_tag, count = docs.len()))]
    pub fn admit(&mut self, docs: &[ScoredDocument], round_tag: &str, base_rank: i64) {
        for (offset, doc) in docs.iter().enumerate() {
            let rank = base_rank + offset as i64;
            match self.items.get_mut(&doc.doc_id) {
                Some(existing) => {
                    let entry = existing
                        .sources
                        .entry(round_tag.to_string())
                        .or_insert(f64::NEG_INFINITY);
                    *entry = entry.max(doc.score);
                    existing.appearances_count += 1;
                    existing.initial_rank = existing.initial_rank.min(rank);
                }
                None => {
                    let mut sources = HashMap::new();
                    sources.insert(round_tag.to_string(), doc.score);
                    let item = PoolItem {
                        doc_id: doc.doc_id.clone(),
                        content: doc.content.clone(),
                        metadata: doc.metadata.clone(),
                        state: PoolState::Candidate,
                        sources,
                        initial_rank: rank,
                        appearances_count: 1,
                        priority_value: 0.0,
                        reranker_score: None,
                        reranker_strategy: None,
                    };
                    self.order.push(doc.doc_id.clone());
                    self.items.insert(doc.doc_id.clone(), item);
                }
            }
        }
        self.enforce_cap();
    }

    fn enforce_cap(&mut self) {
        let Some(cap) = self.max_pool_size else {
            return;
        };
        if self.order.len() <= cap {
            return;
        }
        let items = &self.items;
        let mut candidates: Vec<String> = self
            .order
            .iter()
            .filter(|id| items[id.as_str()].state == PoolState::Candidate)
            .cloned()
            .collect();
        candidates.sort_by(|a, b| {
            let sa = items[a.as_str()].max_source_score();
            let sb = items[b.as_str()].max_source_score();
            sb.partial_cmp(&sa).unwrap().then_with(|| a.cmp(b))
        });
        let non_candidate_count = self.order.len() - candidates.len();
        let keep_count = cap.saturating_sub(non_candidate_count);
        let to_remove: Vec<String> = candidates.into_iter().skip(keep_count).collect();
        for id in to_remove {
            self.items.remove(&id);
            self.order.retain(|x| x != &id);
        }
    }

    /// Validate and apply a state transition for every id in `ids`. Atomic:
    /// if any id would perform an illegal transition, nothing is mutated and
    /// [`CoreError::IllegalTransition`] is returned. Unknown ids are skipped
    /// (returned in the result, and logged as a warning) rather than failing
    /// the whole batch.
    #[tracing::instrument(skip(self, ids), fields(target = ?target, count = ids.len()))]
    pub fn transition(&mut self, ids: &[String], target: PoolState) -> CoreResult<Vec<String>> {
        let mut known = Vec::new();
        let mut skipped = Vec::new();
        for id in ids {
            match self.items.get(id) {
                Some(item) => {
                    if !is_legal_transition(item.state, target) {
                        return Err(error_stack::Report::new(CoreError::IllegalTransition {
                            doc_id: id.clone(),
                            from: format!("{:?}", item.state),
                            to: format!("{:?}", target),
                        }));
                    }
                    known.push(id.clone());
                }
                None => {
                    tracing::warn!(doc_id = %id, "unknown doc_id in transition request");
                    skipped.push(id.clone());
                }
            }
        }
        for id in &known {
            self.items.get_mut(id).unwrap().state = target;
        }
        Ok(skipped)
    }

    /// For each `(id, score)` pair, requires `id` to currently be
    /// `IN_FLIGHT`; writes `reranker_score`/`reranker_strategy` and
    /// transitions to `RERANKED`. Every id currently `IN_FLIGHT` but absent
    /// from `scores` is transitioned to `DROPPED` (§4.2, fixing the "post
    /// rerank drop of non-returned ids" open question to always drop).
    pub fn update_scores(&mut self, scores: &HashMap<String, f64>, strategy: &str) -> CoreResult<()> {
        for id in scores.keys() {
            match self.items.get(id) {
                Some(item) if item.state == PoolState::InFlight => {}
                Some(item) => {
                    return Err(error_stack::Report::new(CoreError::IllegalTransition {
                        doc_id: id.clone(),
                        from: format!("{:?}", item.state),
                        to: "RERANKED".into(),
                    }));
                }
                None => return Err(error_stack::Report::new(CoreError::UnknownId(id.clone()))),
            }
        }

        let in_flight_ids: Vec<String> = self
            .order
            .iter()
            .filter(|id| self.items[id.as_str()].state == PoolState::InFlight)
            .cloned()
            .collect();

        for id in &in_flight_ids {
            let item = self.items.get_mut(id).unwrap();
            if let Some(score) = scores.get(id) {
                item.reranker_score = Some(*score);
                item.reranker_strategy = Some(strategy.to_string());
                item.state = PoolState::Reranked;
            } else {
                item.state = PoolState::Dropped;
            }
        }
        Ok(())
    }

    /// Writes `priority_value` only for items currently `CANDIDATE`;
    /// silently ignores ids in any other state (Estimator purity guarantee).
    pub fn apply_priorities(&mut self, priorities: &HashMap<String, f64>) {
        for (id, value) in priorities {
            if let Some(item) = self.items.get_mut(id)
                && item.state == PoolState::Candidate
            {
                item.priority_value = *value;
            }
        }
    }

    /// Items in `CANDIDATE ∪ RERANKED`, sorted by `final_score()` desc, then
    /// `initial_rank` asc, then `doc_id` asc.
    pub fn get_active_items(&self) -> Vec<PoolItem> {
        let mut items: Vec<PoolItem> = self
            .order
            .iter()
            .filter_map(|id| self.items.get(id))
            .filter(|item| matches!(item.state, PoolState::Candidate | PoolState::Reranked))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.final_score()
                .partial_cmp(&a.final_score())
                .unwrap()
                .then_with(|| a.initial_rank.cmp(&b.initial_rank))
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        items
    }

    /// Items in `CANDIDATE`, in insertion order (the Scheduler applies its
    /// own sort per §4.4).
    pub fn get_eligible(&self) -> Vec<PoolItem> {
        self.order
            .iter()
            .filter_map(|id| self.items.get(id))
            .filter(|item| item.state == PoolState::Candidate)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, score: f64) -> ScoredDocument {
        ScoredDocument::new(id, format!("content-{id}"), score)
    }

    #[test]
    fn admit_creates_candidate_items_with_rank_offsets() {
        let mut pool = CandidatePool::new();
        pool.admit(&[doc("A", 0.9), doc("B", 0.8)], "original", 0);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get("A").unwrap().initial_rank, 0);
        assert_eq!(pool.get("B").unwrap().initial_rank, 1);
        assert_eq!(pool.get("A").unwrap().state, PoolState::Candidate);
    }

    #[test]
    fn admit_merges_provenance_on_re_admission() {
        let mut pool = CandidatePool::new();
        pool.admit(&[doc("A", 0.9), doc("B", 0.8), doc("C", 0.7)], "original", 0);
        pool.admit(&[doc("C", 0.95), doc("D", 0.6)], "rewrite_0", 0);

        assert_eq!(pool.len(), 4);
        let c = pool.get("C").unwrap();
        assert_eq!(c.appearances_count, 2);
        assert_eq!(c.initial_rank, 0);
        assert_eq!(c.sources.get("original"), Some(&0.7));
        assert_eq!(c.sources.get("rewrite_0"), Some(&0.95));
    }

    #[test]
    fn admit_twice_is_idempotent_beyond_appearances_count() {
        let mut pool = CandidatePool::new();
        pool.admit(&[doc("A", 0.9)], "original", 0);
        pool.admit(&[doc("A", 0.9)], "original", 0);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get("A").unwrap().appearances_count, 2);
    }

    #[test]
    fn legal_transition_succeeds() {
        let mut pool = CandidatePool::new();
        pool.admit(&[doc("A", 0.9)], "original", 0);
        let skipped = pool.transition(&["A".to_string()], PoolState::InFlight).unwrap();
        assert!(skipped.is_empty());
        assert_eq!(pool.get("A").unwrap().state, PoolState::InFlight);
    }

    #[test]
    fn illegal_transition_fails_and_leaves_state_unchanged() {
        let mut pool = CandidatePool::new();
        pool.admit(&[doc("A", 0.9), doc("B", 0.8)], "original", 0);
        pool.transition(&["A".to_string()], PoolState::InFlight).unwrap();
        // RERANKED -> IN_FLIGHT must always fail.
        pool.update_scores(&HashMap::from([("A".to_string(), 0.5)]), "ce")
            .unwrap();
        let err = pool
            .transition(&["A".to_string()], PoolState::InFlight)
            .unwrap_err();
        assert!(format!("{err}").contains("illegal transition"));
        assert_eq!(pool.get("A").unwrap().state, PoolState::Reranked);
        // B is untouched by the failed batch.
        assert_eq!(pool.get("B").unwrap().state, PoolState::Candidate);
    }

    #[test]
    fn illegal_transition_is_atomic_across_a_batch() {
        let mut pool = CandidatePool::new();
        pool.admit(&[doc("A", 0.9), doc("B", 0.8)], "original", 0);
        pool.transition(&["A".to_string()], PoolState::InFlight).unwrap();
        // A is IN_FLIGHT (legal to drop), B is CANDIDATE (legal to drop too) —
        // make B illegal by first reranking it out to a terminal state.
        pool.transition(&["B".to_string()], PoolState::Dropped).unwrap();
        let err = pool
            .transition(&["A".to_string(), "B".to_string()], PoolState::Dropped)
            .err();
        // B is DROPPED already, DROPPED -> DROPPED is not in the legal table.
        assert!(err.is_some());
        // A must remain IN_FLIGHT: the batch must not have partially applied.
        assert_eq!(pool.get("A").unwrap().state, PoolState::InFlight);
    }

    #[test]
    fn transition_skips_unknown_ids_without_failing() {
        let mut pool = CandidatePool::new();
        pool.admit(&[doc("A", 0.9)], "original", 0);
        let skipped = pool
            .transition(&["A".to_string(), "ghost".to_string()], PoolState::InFlight)
            .unwrap();
        assert_eq!(skipped, vec!["ghost".to_string()]);
        assert_eq!(pool.get("A").unwrap().state, PoolState::InFlight);
    }

    #[test]
    fn update_scores_drops_non_returned_in_flight_ids() {
        let mut pool = CandidatePool::new();
        pool.admit(&[doc("A", 0.9), doc("B", 0.8)], "original", 0);
        pool.transition(&["A".to_string(), "B".to_string()], PoolState::InFlight)
            .unwrap();
        pool.update_scores(&HashMap::from([("A".to_string(), 0.95)]), "ce")
            .unwrap();
        assert_eq!(pool.get("A").unwrap().state, PoolState::Reranked);
        assert_eq!(pool.get("A").unwrap().reranker_score, Some(0.95));
        assert_eq!(pool.get("B").unwrap().state, PoolState::Dropped);
    }

    #[test]
    fn update_scores_empty_is_a_no_op_when_nothing_in_flight() {
        let mut pool = CandidatePool::new();
        pool.admit(&[doc("A", 0.9)], "original", 0);
        pool.update_scores(&HashMap::new(), "ce").unwrap();
        assert_eq!(pool.get("A").unwrap().state, PoolState::Candidate);
    }

    #[test]
    fn apply_priorities_only_affects_candidates() {
        let mut pool = CandidatePool::new();
        pool.admit(&[doc("A", 0.9), doc("B", 0.8)], "original", 0);
        pool.transition(&["A".to_string()], PoolState::InFlight).unwrap();
        pool.update_scores(&HashMap::from([("A".to_string(), 0.5)]), "ce")
            .unwrap();

        pool.apply_priorities(&HashMap::from([
            ("A".to_string(), 0.99),
            ("B".to_string(), 0.1),
        ]));

        assert_eq!(pool.get("A").unwrap().priority_value, 0.0); // A is RERANKED, ignored
        assert_eq!(pool.get("B").unwrap().priority_value, 0.1);
    }

    #[test]
    fn apply_priorities_is_idempotent() {
        let mut pool = CandidatePool::new();
        pool.admit(&[doc("A", 0.9)], "original", 0);
        let priorities = HashMap::from([("A".to_string(), 0.3)]);
        pool.apply_priorities(&priorities);
        pool.apply_priorities(&priorities);
        assert_eq!(pool.get("A").unwrap().priority_value, 0.3);
    }

    #[test]
    fn final_score_precedence() {
        let mut pool = CandidatePool::new();
        pool.admit(&[doc("A", 0.5)], "original", 0);
        assert_eq!(pool.get("A").unwrap().final_score(), 0.5); // max(sources)
        pool.apply_priorities(&HashMap::from([("A".to_string(), 0.7)]));
        assert_eq!(pool.get("A").unwrap().final_score(), 0.7); // priority wins
        pool.transition(&["A".to_string()], PoolState::InFlight).unwrap();
        pool.update_scores(&HashMap::from([("A".to_string(), 0.2)]), "ce")
            .unwrap();
        assert_eq!(pool.get("A").unwrap().final_score(), 0.2); // reranker wins
    }

    #[test]
    fn get_active_items_sorts_by_final_score_then_initial_rank_then_doc_id() {
        let mut pool = CandidatePool::new();
        pool.admit(
            &[doc("A", 0.9), doc("B", 0.8), doc("C", 0.7), doc("D", 0.6), doc("E", 0.5)],
            "original",
            0,
        );
        pool.transition(&["A".to_string(), "B".to_string()], PoolState::InFlight)
            .unwrap();
        pool.update_scores(
            &HashMap::from([("A".to_string(), 0.1), ("B".to_string(), 0.95)]),
            "ce",
        )
        .unwrap();

        let active = pool.get_active_items();
        let ids: Vec<&str> = active.iter().map(|i| i.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C", "D", "E", "A"]);
    }

    #[test]
    fn get_eligible_returns_only_candidates() {
        let mut pool = CandidatePool::new();
        pool.admit(&[doc("A", 0.9), doc("B", 0.8)], "original", 0);
        pool.transition(&["A".to_string()], PoolState::InFlight).unwrap();
        let eligible = pool.get_eligible();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].doc_id, "B");
    }

    #[test]
    fn cap_policy_prunes_lowest_scoring_candidates() {
        let mut pool = CandidatePool::new().with_max_pool_size(2);
        pool.admit(&[doc("A", 0.9), doc("B", 0.8), doc("C", 0.1)], "original", 0);
        assert_eq!(pool.len(), 2);
        assert!(pool.get("C").is_none());
        assert!(pool.get("A").is_some());
        assert!(pool.get("B").is_some());
    }

    #[test]
    fn cap_policy_exempts_non_candidate_items() {
        let mut pool = CandidatePool::new().with_max_pool_size(2);
        pool.admit(&[doc("A", 0.9), doc("B", 0.1)], "original", 0);
        pool.transition(&["B".to_string()], PoolState::InFlight).unwrap();
        pool.update_scores(&HashMap::from([("B".to_string(), 0.01)]), "ce")
            .unwrap();
        // B is now RERANKED, not CANDIDATE — adding a better candidate must not evict it.
        pool.admit(&[doc("C", 0.95)], "rewrite_0", 0);
        assert!(pool.get("B").is_some());
    }
}
