//! ragtune-core: budget-aware, iterative retrieval-reranking middleware core.
//!
//! The core is a single-request engine: [`controller::Controller`] ingests a
//! query and a budget, loops `Estimator -> Scheduler -> Reranker` over a
//! [`pool::CandidatePool`] until the [`tracker::CostTracker`] is exhausted or
//! the scheduler has nothing left to propose, then hands the survivors to an
//! [`assembler::Assembler`].

pub mod assembler;
pub mod config;
pub mod context;
pub mod controller;
pub mod doc;
pub mod error;
pub mod estimator;
pub mod feedback;
pub mod pool;
pub mod reformulator;
pub mod registry;
pub mod reranker;
pub mod retriever;
pub mod scheduler;
pub mod trace;
pub mod tracker;
pub mod util;

pub use context::RagtuneContext;
pub use controller::{Controller, ControllerConfig, ControllerOutput};
pub use doc::ScoredDocument;
pub use error::{CoreError, CoreResult};
pub use feedback::Feedback;
pub use pool::{CandidatePool, PoolItem, PoolState};
pub use trace::{ControllerTrace, TraceEvent};
pub use tracker::{CostBudget, CostTracker, RemainingView};
