//! [`Feedback`]: an optional stop-condition plugin polled at loop-head.
//!
//! `should_stop` receives the same read-only views the Estimator and
//! Scheduler see: a pool snapshot, the remaining-budget view, and the
//! priority values the Estimator just produced this iteration. A `true`
//! result breaks the Controller's loop with the returned reason recorded
//! as the `loop_exit` trace event's reason.

use crate::estimator::PoolSnapshot;
use crate::tracker::RemainingView;
use std::collections::HashMap;

/// Contract: pure, like Estimator/Scheduler — no state mutation, no budget
/// consumption. Polled once per loop iteration, before the Scheduler runs.
pub trait Feedback: Send + Sync {
    fn should_stop(
        &self,
        snapshot: &PoolSnapshot,
        remaining: &RemainingView,
        priorities: &HashMap<String, f64>,
    ) -> (bool, Option<String>);
}

/// Stops once fewer than `min_eligible` candidates remain.
#[derive(Debug, Clone, Copy)]
pub struct MinEligibleFeedback {
    pub min_eligible: usize,
}

impl Feedback for MinEligibleFeedback {
    fn should_stop(
        &self,
        snapshot: &PoolSnapshot,
        _remaining: &RemainingView,
        _priorities: &HashMap<String, f64>,
    ) -> (bool, Option<String>) {
        if snapshot.eligible.len() < self.min_eligible {
            (true, Some("min_eligible_reached".to_string()))
        } else {
            (false, None)
        }
    }
}

/// Runs a list of Feedback plugins and stops if *any* votes to stop
/// (pessimistic merge for gating decisions).
pub struct CompositeFeedback {
    pub plugins: Vec<Box<dyn Feedback>>,
}

impl CompositeFeedback {
    pub fn new(plugins: Vec<Box<dyn Feedback>>) -> Self {
        Self { plugins }
    }
}

impl Feedback for CompositeFeedback {
    fn should_stop(
        &self,
        snapshot: &PoolSnapshot,
        remaining: &RemainingView,
        priorities: &HashMap<String, f64>,
    ) -> (bool, Option<String>) {
        for plugin in &self.plugins {
            let (stop, reason) = plugin.should_stop(snapshot, remaining, priorities);
            if stop {
                return (true, reason);
            }
        }
        (false, None)
    }
}
