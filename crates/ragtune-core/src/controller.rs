//! [`Controller`]: sole mutator of pool and tracker state; orchestrates the
//! full `run(query)` state machine.
//!
//! Provides one async implementation (`run_async`) and a synchronous
//! wrapper (`run`) that drives it to completion on the calling thread via
//! `futures::executor::block_on` — the sync entry point does not fork a
//! parallel, non-async implementation of the loop; both ride the same
//! component trait boundaries.

use crate::assembler::Assembler;
use crate::context::{CancellationToken, RagtuneContext};
use crate::doc::ScoredDocument;
use crate::error::{CoreError, CoreResult};
use crate::estimator::{Estimator, PoolSnapshot};
use crate::feedback::Feedback;
use crate::pool::{CandidatePool, PoolState};
use crate::reformulator::Reformulator;
use crate::reranker::Reranker;
use crate::retriever::Retriever;
use crate::scheduler::Scheduler;
use crate::tracker::{CostBudget, CostTracker};
use crate::trace::ControllerTrace;
use std::collections::HashMap;
use std::sync::Arc;

/// Retrieval fan-out sizing, the part of the declarative config's
/// `pipeline.retrieval.*` group the Controller itself needs (the rest is the
/// config loader's concern).
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub original_query_depth: usize,
    pub num_reformulations: usize,
    pub depth_per_reformulation: usize,
    /// Expected cost charged against the tracker before each supplemental
    /// (reformulated-query) retrieval round (§4.7 step 4). Empty by
    /// default: when no per-round cost is declared, fan-out is gated only
    /// by `tracker.is_exhausted()`, matching "budget-awareness ... when
    /// declared".
    pub retrieval_cost: HashMap<String, f64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            original_query_depth: 20,
            num_reformulations: 0,
            depth_per_reformulation: 10,
            retrieval_cost: HashMap::new(),
        }
    }
}

impl ControllerConfig {
    /// Declare an expected cost for each supplemental retrieval round;
    /// `try_consume_all` is checked against it before every variant's
    /// retrieval, and fan-out stops the moment it's denied.
    pub fn with_retrieval_cost(mut self, resource: impl Into<String>, amount: f64) -> Self {
        self.retrieval_cost.insert(resource.into(), amount);
        self
    }
}

/// Result of one `run`/`run_async` call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ControllerOutput {
    pub query: String,
    pub documents: Vec<ScoredDocument>,
    pub trace: ControllerTrace,
    pub final_budget_state: HashMap<String, f64>,
}

fn details(pairs: Vec<(&str, serde_json::Value)>) -> HashMap<String, serde_json::Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Orchestrates one request end to end. Holds `Arc<dyn Trait>` handles so the
/// same wiring can be shared across concurrent requests (multiple requests
/// may be multiplexed on a shared worker pool).
pub struct Controller {
    retriever: Arc<dyn Retriever>,
    reranker: Arc<dyn Reranker>,
    reformulator: Option<Arc<dyn Reformulator>>,
    estimator: Arc<dyn Estimator>,
    scheduler: Arc<dyn Scheduler>,
    assembler: Arc<dyn Assembler>,
    feedback: Option<Arc<dyn Feedback>>,
    budget: CostBudget,
    config: ControllerConfig,
}

impl Controller {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        reranker: Arc<dyn Reranker>,
        estimator: Arc<dyn Estimator>,
        scheduler: Arc<dyn Scheduler>,
        assembler: Arc<dyn Assembler>,
        budget: CostBudget,
        config: ControllerConfig,
    ) -> Self {
        Self {
            retriever,
            reranker,
            reformulator: None,
            estimator,
            scheduler,
            assembler,
            feedback: None,
            budget,
            config,
        }
    }

    pub fn with_reformulator(mut self, reformulator: Arc<dyn Reformulator>) -> Self {
        self.reformulator = Some(reformulator);
        self
    }

    pub fn with_feedback(mut self, feedback: Arc<dyn Feedback>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    /// Synchronous entry point: drives [`Self::run_async`] to completion on
    /// the calling thread. No separate sync implementation of the loop
    /// exists; this only lifts the async one.
    pub fn run(&self, query: &str) -> CoreResult<ControllerOutput> {
        futures::executor::block_on(self.run_async(query))
    }

    /// Cancellable variant of [`Self::run_async`]: the Controller checks
    /// `cancel` at its next suspension point (loop-head, between retrieval
    /// rounds) and, if cancelled, stops there, assembles whatever is
    /// currently `CANDIDATE`/`RERANKED`, and returns a partial result with a
    /// `cancelled` trace event. No orphan state is left behind.
    pub async fn run_cancellable(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> CoreResult<ControllerOutput> {
        self.run_inner(query, Some(cancel)).await
    }

    #[tracing::instrument(skip(self), fields(query_len = query.len()))]
    pub async fn run_async(&self, query: &str) -> CoreResult<ControllerOutput> {
        self.run_inner(query, None).await
    }

    async fn run_inner(
        &self,
        query: &str,
        cancel: Option<&CancellationToken>,
    ) -> CoreResult<ControllerOutput> {
        let mut tracker = CostTracker::new(self.budget.clone());
        let context = RagtuneContext::new(query);
        let mut pool = CandidatePool::new();
        let mut trace = ControllerTrace::new();
        let is_cancelled = |c: Option<&CancellationToken>| c.map(|t| t.is_cancelled()).unwrap_or(false);

        // 2. Original retrieval: exceptions here are fatal.
        let original_docs = self
            .retriever
            .retrieve(&context, self.config.original_query_depth)
            .await
            .map_err(|err| {
                error_stack::Report::new(CoreError::FatalRetrievalFailure(err.to_string()))
            })?;
        trace.record(
            "controller",
            "retrieve",
            details(vec![
                ("round_tag", serde_json::json!("original")),
                ("count", serde_json::json!(original_docs.len())),
            ]),
        );
        pool.admit(&original_docs, "original", 0);

        // 3. Reformulation (optional, budget-gated, recoverable on failure).
        let mut variants: Vec<String> = Vec::new();
        if self.config.num_reformulations > 0
            && let Some(reformulator) = &self.reformulator
            && tracker.try_consume("reformulations", 1.0)
        {
            match reformulator.generate(&context).await {
                Ok(generated) => {
                    variants = generated.into_iter().take(self.config.num_reformulations).collect();
                    trace.record(
                        "controller",
                        "reformulate",
                        details(vec![("count", serde_json::json!(variants.len()))]),
                    );
                }
                Err(err) => {
                    trace.record(
                        "controller",
                        "reformulate_failed",
                        details(vec![("error", serde_json::json!(err.to_string()))]),
                    );
                }
            }
        }

        // 4. Supplemental retrieval: one round per surviving variant.
        // Each round is gated by `is_exhausted()` and by `try_consume_all`
        // against the declared per-round retrieval cost; either one failing
        // stops the fan-out. A retrieval exception on a single rewrite is
        // recoverable (skip it, continue with the remaining variants) — only
        // the original query's retrieval is fatal.
        for (index, variant_query) in variants.iter().enumerate() {
            if tracker.is_exhausted() || is_cancelled(cancel) {
                break;
            }
            let round_tag = format!("rewrite_{index}");
            if !tracker.try_consume_all(&self.config.retrieval_cost) {
                trace.record(
                    "controller",
                    "budget_deny",
                    details(vec![
                        ("round_tag", serde_json::json!(round_tag)),
                        ("phase", serde_json::json!("supplemental_retrieval")),
                    ]),
                );
                break;
            }
            let variant_context = context.with_query(variant_query.clone());
            match self
                .retriever
                .retrieve(&variant_context, self.config.depth_per_reformulation)
                .await
            {
                Ok(docs) => {
                    trace.record(
                        "controller",
                        "retrieve",
                        details(vec![
                            ("round_tag", serde_json::json!(round_tag.clone())),
                            ("count", serde_json::json!(docs.len())),
                        ]),
                    );
                    pool.admit(&docs, &round_tag, 0);
                }
                Err(err) => {
                    trace.record(
                        "controller",
                        "retrieve_error",
                        details(vec![
                            ("round_tag", serde_json::json!(round_tag)),
                            ("error", serde_json::json!(err.to_string())),
                        ]),
                    );
                }
            }
        }

        // 5. Iterative loop.
        let exit_reason = loop {
            if is_cancelled(cancel) {
                trace.record("controller", "cancelled", HashMap::new());
                break "cancelled".to_string();
            }

            let snapshot = PoolSnapshot::from_pool(&pool);
            let priorities = self.estimator.value(&snapshot, &context);
            let priorities_count = priorities.len();
            pool.apply_priorities(&priorities);
            trace.record(
                "controller",
                "estimate",
                details(vec![("count", serde_json::json!(priorities_count))]),
            );

            let snapshot = PoolSnapshot::from_pool(&pool);
            let remaining = tracker.remaining_view();

            if let Some(feedback) = &self.feedback {
                let (stop, reason) = feedback.should_stop(&snapshot, &remaining, &priorities);
                if stop {
                    let reason = reason.unwrap_or_else(|| "feedback_stop".to_string());
                    trace.record(
                        "controller",
                        "feedback_stop",
                        details(vec![("reason", serde_json::json!(reason.clone()))]),
                    );
                    break reason;
                }
            }

            let Some(proposal) = self.scheduler.select_batch(&snapshot, &remaining) else {
                trace.record("controller", "no_proposal", HashMap::new());
                break "no_proposal".to_string();
            };
            let doc_ids = proposal.doc_ids.clone();
            let strategy = proposal.strategy.clone();
            trace.record(
                "controller",
                "propose_batch",
                details(vec![
                    ("doc_ids", serde_json::json!(doc_ids)),
                    ("strategy", serde_json::json!(strategy)),
                ]),
            );

            pool.transition(&doc_ids, PoolState::InFlight)?;
            let items = pool.items_for(&doc_ids);

            match self.reranker.rerank(&items, &strategy, &context).await {
                Ok(scores) => {
                    pool.update_scores(&scores, &strategy)?;
                    trace.record(
                        "controller",
                        "rerank_batch",
                        details(vec![
                            ("strategy", serde_json::json!(strategy)),
                            ("scored_count", serde_json::json!(scores.len())),
                        ]),
                    );
                    // Budget is consumed only after a successful rerank; a
                    // single over-the-limit charge is tolerated here, then
                    // caught by the exhaustion check below.
                    if tracker.try_consume_all(&proposal.expected_cost) {
                        trace.record(
                            "controller",
                            "budget_consume",
                            details(vec![("expected_cost", serde_json::json!(proposal.expected_cost.clone()))]),
                        );
                    } else {
                        trace.record(
                            "controller",
                            "budget_deny",
                            details(vec![("expected_cost", serde_json::json!(proposal.expected_cost.clone()))]),
                        );
                    }
                }
                Err(err) => {
                    pool.transition(&doc_ids, PoolState::Dropped)?;
                    trace.record(
                        "controller",
                        "rerank_error",
                        details(vec![("error", serde_json::json!(err.to_string()))]),
                    );
                }
            }

            if tracker.is_exhausted() {
                break "budget_exhausted".to_string();
            }
        };
        trace.record(
            "controller",
            "loop_exit",
            details(vec![("reason", serde_json::json!(exit_reason))]),
        );

        // 6. Assembly.
        let remaining_tokens = tracker.remaining_view().get("tokens");
        let active = pool.get_active_items();
        let documents = self.assembler.assemble(active, &context, remaining_tokens).await;
        trace.record(
            "controller",
            "assembly",
            details(vec![("count", serde_json::json!(documents.len()))]),
        );

        Ok(ControllerOutput {
            query: query.to_string(),
            documents,
            trace,
            final_budget_state: tracker.snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{GreedyTokenAssembler, TokenBudget};
    use crate::estimator::BaselineEstimator;
    use crate::scheduler::DefaultScheduler;

    struct FixedRetriever {
        docs: Vec<ScoredDocument>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Retriever for FixedRetriever {
        async fn retrieve(
            &self,
            _context: &RagtuneContext,
            top_k: usize,
        ) -> Result<Vec<ScoredDocument>, CoreError> {
            if self.fail {
                return Err(CoreError::Internal("retrieval backend down".into()));
            }
            Ok(self.docs.iter().take(top_k).cloned().collect())
        }
    }

    struct FixedReranker {
        scores: HashMap<String, f64>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Reranker for FixedReranker {
        async fn rerank(
            &self,
            items: &[crate::pool::PoolItem],
            _strategy: &str,
            _context: &RagtuneContext,
        ) -> Result<HashMap<String, f64>, CoreError> {
            if self.fail {
                return Err(CoreError::ComponentFailure {
                    component: "reranker".into(),
                    message: "simulated failure".into(),
                });
            }
            Ok(items
                .iter()
                .filter_map(|item| self.scores.get(&item.doc_id).map(|s| (item.doc_id.clone(), *s)))
                .collect())
        }
    }

    fn docs(entries: &[(&str, f64)]) -> Vec<ScoredDocument> {
        entries
            .iter()
            .map(|(id, score)| ScoredDocument::new(*id, format!("content {id}"), *score))
            .collect()
    }

    fn controller(
        retriever_docs: Vec<ScoredDocument>,
        reranker_scores: HashMap<String, f64>,
        budget: CostBudget,
        batch_size: usize,
    ) -> Controller {
        let retriever = Arc::new(FixedRetriever {
            docs: retriever_docs,
            fail: false,
        });
        let reranker = Arc::new(FixedReranker {
            scores: reranker_scores,
            fail: false,
        });
        Controller::new(
            retriever,
            reranker,
            Arc::new(BaselineEstimator),
            Arc::new(DefaultScheduler::new(batch_size, "ce", "llm")),
            Arc::new(GreedyTokenAssembler::new(TokenBudget::default())),
            budget,
            ControllerConfig::default(),
        )
    }

    // Happy path: full batch reranks successfully and documents come back
    // sorted by final score.
    #[tokio::test]
    async fn happy_path_batch_and_final_order() {
        let budget = CostBudget::new()
            .with_limit("rerank_docs", 2.0)
            .with_limit("rerank_calls", 1.0);
        let scores = HashMap::from([("A".to_string(), 0.1), ("B".to_string(), 0.95)]);
        let controller = controller(
            docs(&[("A", 0.9), ("B", 0.8), ("C", 0.7), ("D", 0.6), ("E", 0.5)]),
            scores,
            budget,
            2,
        );
        let output = controller.run_async("q").await.unwrap();
        let ids: Vec<&str> = output.documents.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C", "D", "E", "A"]);
    }

    // Rerank failure drops the batch; failure path does not consume
    // rerank_docs.
    #[tokio::test]
    async fn rerank_failure_drops_batch_and_does_not_charge_budget() {
        let retriever = Arc::new(FixedRetriever {
            docs: docs(&[("A", 0.9), ("B", 0.8), ("C", 0.7), ("D", 0.6), ("E", 0.5)]),
            fail: false,
        });
        let reranker = Arc::new(FixedReranker {
            scores: HashMap::new(),
            fail: true,
        });
        let budget = CostBudget::new().with_limit("rerank_docs", 2.0);
        let controller = Controller::new(
            retriever,
            reranker,
            Arc::new(BaselineEstimator),
            Arc::new(DefaultScheduler::new(2, "ce", "llm")),
            Arc::new(GreedyTokenAssembler::new(TokenBudget::default())),
            budget,
            ControllerConfig::default(),
        );
        let output = controller.run_async("q").await.unwrap();
        let ids: Vec<&str> = output.documents.iter().map(|d| d.doc_id.as_str()).collect();
        assert!(!ids.contains(&"A"));
        assert!(!ids.contains(&"B"));
        assert_eq!(output.final_budget_state.get("rerank_docs").copied().unwrap_or(0.0), 0.0);
    }

    // Budget exhaustion mid-loop.
    #[tokio::test]
    async fn budget_exhaustion_stops_the_loop() {
        let scores = HashMap::from([
            ("A".to_string(), 0.9),
            ("B".to_string(), 0.8),
            ("C".to_string(), 0.7),
        ]);
        let budget = CostBudget::new().with_limit("rerank_docs", 3.0);
        let controller = controller(docs(&[("A", 0.9), ("B", 0.8), ("C", 0.7)]), scores, budget, 2);
        let output = controller.run_async("q").await.unwrap();
        let exit_events: Vec<&str> = output
            .trace
            .events()
            .iter()
            .filter(|e| e.action == "loop_exit")
            .map(|e| e.details["reason"].as_str().unwrap())
            .collect();
        assert_eq!(exit_events, vec!["budget_exhausted"]);
    }

    // An empty pool yields no proposal; the loop exits immediately with an
    // empty result rather than looping forever.
    #[tokio::test]
    async fn no_proposal_when_pool_is_empty() {
        let budget = CostBudget::new();
        let controller = controller(Vec::new(), HashMap::new(), budget, 2);
        let output = controller.run_async("q").await.unwrap();
        assert!(output.documents.is_empty());
        let exit_events: Vec<&str> = output
            .trace
            .events()
            .iter()
            .filter(|e| e.action == "loop_exit")
            .map(|e| e.details["reason"].as_str().unwrap())
            .collect();
        assert_eq!(exit_events, vec!["no_proposal"]);
    }

    #[test]
    fn sync_entry_point_matches_async_result() {
        let scores = HashMap::from([("A".to_string(), 0.1), ("B".to_string(), 0.95)]);
        let budget = CostBudget::new()
            .with_limit("rerank_docs", 2.0)
            .with_limit("rerank_calls", 1.0);
        let controller = controller(
            docs(&[("A", 0.9), ("B", 0.8), ("C", 0.7), ("D", 0.6), ("E", 0.5)]),
            scores,
            budget,
            2,
        );
        let output = controller.run("q").unwrap();
        let ids: Vec<&str> = output.documents.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C", "D", "E", "A"]);
    }

    // Original-query retrieval failure is fatal.
    #[tokio::test]
    async fn original_retrieval_failure_is_fatal() {
        let retriever = Arc::new(FixedRetriever {
            docs: Vec::new(),
            fail: true,
        });
        let reranker = Arc::new(FixedReranker {
            scores: HashMap::new(),
            fail: false,
        });
        let controller = Controller::new(
            retriever,
            reranker,
            Arc::new(BaselineEstimator),
            Arc::new(DefaultScheduler::new(2, "ce", "llm")),
            Arc::new(GreedyTokenAssembler::new(TokenBudget::default())),
            CostBudget::new(),
            ControllerConfig::default(),
        );
        let err = controller.run_async("q").await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            CoreError::FatalRetrievalFailure(_)
        ));
    }

    #[tokio::test]
    async fn feedback_stop_ends_the_loop_before_budget_exhaustion() {
        let scores = HashMap::from([
            ("A".to_string(), 0.9),
            ("B".to_string(), 0.8),
            ("C".to_string(), 0.7),
        ]);
        let budget = CostBudget::new().with_limit("rerank_docs", 10.0);
        let base = controller(docs(&[("A", 0.9), ("B", 0.8), ("C", 0.7)]), scores, budget, 2);
        let controller = base.with_feedback(Arc::new(crate::feedback::MinEligibleFeedback {
            min_eligible: 1,
        }));
        let output = controller.run_async("q").await.unwrap();
        let exit_events: Vec<&str> = output
            .trace
            .events()
            .iter()
            .filter(|e| e.action == "loop_exit")
            .map(|e| e.details["reason"].as_str().unwrap())
            .collect();
        assert_eq!(exit_events, vec!["min_eligible_reached"]);
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop_and_returns_partial_results() {
        let scores = HashMap::from([("A".to_string(), 0.9), ("B".to_string(), 0.8)]);
        let budget = CostBudget::new().with_limit("rerank_docs", 10.0);
        let controller = controller(docs(&[("A", 0.9), ("B", 0.8)]), scores, budget, 2);
        let token = CancellationToken::new();
        token.cancel();
        let output = controller.run_cancellable("q", &token).await.unwrap();
        let exit_events: Vec<&str> = output
            .trace
            .events()
            .iter()
            .filter(|e| e.action == "loop_exit")
            .map(|e| e.details["reason"].as_str().unwrap())
            .collect();
        assert_eq!(exit_events, vec!["cancelled"]);
        assert!(output.documents.is_empty());
    }

    struct FixedReformulator {
        variants: Vec<String>,
    }

    #[async_trait::async_trait]
    impl Reformulator for FixedReformulator {
        async fn generate(&self, _context: &RagtuneContext) -> Result<Vec<String>, CoreError> {
            Ok(self.variants.clone())
        }
    }

    // Spec step 4: supplemental retrieval is gated by try_consume on the
    // declared retrieval cost, not merely by is_exhausted(); fan-out must
    // stop the moment that charge is denied.
    #[tokio::test]
    async fn supplemental_retrieval_stops_fan_out_once_declared_cost_is_denied() {
        let retriever = Arc::new(FixedRetriever {
            docs: docs(&[("A", 0.9), ("B", 0.8)]),
            fail: false,
        });
        let reranker = Arc::new(FixedReranker {
            scores: HashMap::new(),
            fail: false,
        });
        let budget = CostBudget::new().with_limit("reformulations", 1.0).with_limit("retrieval_calls", 0.0);
        let config = ControllerConfig {
            num_reformulations: 1,
            ..ControllerConfig::default()
        }
        .with_retrieval_cost("retrieval_calls", 1.0);
        let controller = Controller::new(
            retriever,
            reranker,
            Arc::new(BaselineEstimator),
            Arc::new(DefaultScheduler::new(2, "ce", "llm")),
            Arc::new(GreedyTokenAssembler::new(TokenBudget::default())),
            budget,
            config,
        )
        .with_reformulator(Arc::new(FixedReformulator {
            variants: vec!["rewritten query".to_string()],
        }));

        let output = controller.run_async("q").await.unwrap();

        let deny_events: Vec<_> = output
            .trace
            .events()
            .iter()
            .filter(|e| e.action == "budget_deny" && e.details.get("phase").map(|p| p == "supplemental_retrieval").unwrap_or(false))
            .collect();
        assert_eq!(deny_events.len(), 1);
        // No rewrite_0-tagged retrieval ever ran.
        let retrieve_tags: Vec<&str> = output
            .trace
            .events()
            .iter()
            .filter(|e| e.action == "retrieve")
            .map(|e| e.details["round_tag"].as_str().unwrap())
            .collect();
        assert_eq!(retrieve_tags, vec!["original"]);
    }

    // With no retrieval cost declared (the default), supplemental retrieval
    // proceeds unconditionally, matching the pre-existing behavior.
    #[tokio::test]
    async fn supplemental_retrieval_proceeds_when_no_cost_is_declared() {
        let retriever = Arc::new(FixedRetriever {
            docs: docs(&[("A", 0.9), ("B", 0.8)]),
            fail: false,
        });
        let reranker = Arc::new(FixedReranker {
            scores: HashMap::new(),
            fail: false,
        });
        let budget = CostBudget::new().with_limit("reformulations", 1.0);
        let config = ControllerConfig {
            num_reformulations: 1,
            ..ControllerConfig::default()
        };
        let controller = Controller::new(
            retriever,
            reranker,
            Arc::new(BaselineEstimator),
            Arc::new(DefaultScheduler::new(2, "ce", "llm")),
            Arc::new(GreedyTokenAssembler::new(TokenBudget::default())),
            budget,
            config,
        )
        .with_reformulator(Arc::new(FixedReformulator {
            variants: vec!["rewritten query".to_string()],
        }));

        let output = controller.run_async("q").await.unwrap();
        let retrieve_tags: Vec<&str> = output
            .trace
            .events()
            .iter()
            .filter(|e| e.action == "retrieve")
            .map(|e| e.details["round_tag"].as_str().unwrap())
            .collect();
        assert_eq!(retrieve_tags, vec!["original", "rewrite_0"]);
    }
}
