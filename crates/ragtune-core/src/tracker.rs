//! [`CostTracker`]: the request-scoped, multi-resource budget ledger.
//!
//! A plain owned struct rather than an `Arc<RwLock<..>>` shared-across-tasks
//! design: the Controller is the *sole* writer of tracker state within one
//! request, so no interior mutability or locking is required.

use std::collections::HashMap;
use std::time::Instant;

/// Resource names the core hard-stops on when any of them is exhausted.
pub const HARD_STOP_RESOURCES: [&str; 4] = ["tokens", "rerank_docs", "rerank_calls", "latency_ms"];

/// A request's declared resource limits. Absent keys are unbounded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostBudget {
    limits: HashMap<String, f64>,
}

impl CostBudget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, resource: impl Into<String>, limit: f64) -> Self {
        self.limits.insert(resource.into(), limit);
        self
    }

    pub fn limit(&self, resource: &str) -> Option<f64> {
        self.limits.get(resource).copied()
    }
}

/// Immutable snapshot of remaining budget, handed to pure components
/// (Estimator, Scheduler). Missing resources report infinite remaining.
#[derive(Debug, Clone, PartialEq)]
pub struct RemainingView {
    remaining: HashMap<String, f64>,
}

impl RemainingView {
    /// Remaining amount for `resource`; unbounded resources report `f64::INFINITY`.
    pub fn get(&self, resource: &str) -> f64 {
        self.remaining
            .get(resource)
            .copied()
            .unwrap_or(f64::INFINITY)
    }

    pub fn is_zero(&self, resource: &str) -> bool {
        self.get(resource) <= 0.0
    }
}

/// Request-scoped ledger of multiple resources. Never raises on exhaustion;
/// exhaustion is observed through [`CostTracker::is_exhausted`] or a `false`
/// return from [`CostTracker::try_consume`].
#[derive(Debug)]
pub struct CostTracker {
    limits: HashMap<String, f64>,
    used: HashMap<String, f64>,
    start: Instant,
}

impl CostTracker {
    pub fn new(budget: CostBudget) -> Self {
        Self {
            limits: budget.limits,
            used: HashMap::new(),
            start: Instant::now(),
        }
    }

    /// Recompute `used["latency_ms"]` from wall-clock elapsed time. Called on
    /// every public query so latency behaves as a live resource.
    fn charge_latency(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.used.insert("latency_ms".to_string(), elapsed_ms);
    }

    /// Attempt to consume `amount` of `resource`. Never raises: returns
    /// `false` and logs a deny event when the charge would exceed the limit.
    ///
    /// `latency_ms` is special: it is checked against live elapsed time
    /// rather than an accumulated `amount` — the tracker auto-charges
    /// elapsed time on every check.
    #[tracing::instrument(skip(self), fields(resource = %resource, amount = amount))]
    pub fn try_consume(&mut self, resource: &str, amount: f64) -> bool {
        if resource == "latency_ms" {
            self.charge_latency();
            let used = self.used.get("latency_ms").copied().unwrap_or(0.0);
            return match self.limits.get("latency_ms") {
                None => true,
                Some(limit) => used < *limit,
            };
        }

        self.charge_latency();
        let used = self.used.get(resource).copied().unwrap_or(0.0);
        let ok = match self.limits.get(resource) {
            None => true,
            Some(limit) => used + amount <= *limit,
        };

        if ok {
            *self.used.entry(resource.to_string()).or_insert(0.0) += amount;
            tracing::debug!(resource, amount, "budget_consume");
        } else {
            tracing::debug!(resource, amount, used, "budget_deny");
        }
        ok
    }

    /// Try to consume every resource in `costs`, attempting all of them even
    /// after an earlier denial (each resource is charged independently;
    /// there is no rollback). Returns `true` only if every resource's charge
    /// was accepted — callers that need all-or-nothing semantics should
    /// check [`Self::remaining_view`] first.
    pub fn try_consume_all(&mut self, costs: &HashMap<String, f64>) -> bool {
        let mut all_ok = true;
        for (resource, amount) in costs {
            if !self.try_consume(resource, *amount) {
                all_ok = false;
            }
        }
        all_ok
    }

    /// Immutable snapshot mapping each resource with a declared limit to
    /// `max(0, limit - used)`.
    pub fn remaining_view(&mut self) -> RemainingView {
        self.charge_latency();
        let mut remaining = HashMap::new();
        for (resource, limit) in &self.limits {
            let used = self.used.get(resource).copied().unwrap_or(0.0);
            remaining.insert(resource.clone(), (limit - used).max(0.0));
        }
        RemainingView { remaining }
    }

    /// True iff any hard-stop resource has zero remaining (or latency has
    /// elapsed).
    pub fn is_exhausted(&mut self) -> bool {
        self.charge_latency();
        for resource in HARD_STOP_RESOURCES {
            if let Some(limit) = self.limits.get(resource) {
                let used = self.used.get(resource).copied().unwrap_or(0.0);
                if used >= *limit {
                    return true;
                }
            }
        }
        false
    }

    /// Full final usage, for inclusion in [`crate::controller::ControllerOutput`].
    pub fn snapshot(&mut self) -> HashMap<String, f64> {
        self.charge_latency();
        self.used.clone()
    }
}
