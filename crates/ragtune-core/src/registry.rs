//! Component registry: a process-scoped map from a category and type string
//! to an already-constructed component.
//!
//! Tag-indexed lookup over a concrete entry map, construct-by-string-plus-
//! params. Registry *population* — which concrete adapters exist — is the
//! config loader's concern; this module only provides `register`/`construct`.

use crate::assembler::{Assembler, GreedyTokenAssembler, TokenBudget};
use crate::error::{CoreError, CoreResult};
use crate::estimator::{BaselineEstimator, Estimator, SimilarityEstimator};
use crate::feedback::{Feedback, MinEligibleFeedback};
use crate::reranker::{NoopReranker, Reranker};
use crate::retriever::{Retriever, StaticRetriever};
use crate::scheduler::{DefaultScheduler, Scheduler};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

type Constructor<T> = Arc<dyn Fn(serde_json::Value) -> CoreResult<Arc<T>> + Send + Sync>;

/// One category's type-string -> constructor map.
pub struct ComponentRegistry<T: ?Sized> {
    constructors: HashMap<String, Constructor<T>>,
}

impl<T: ?Sized> ComponentRegistry<T> {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        ctor: impl Fn(serde_json::Value) -> CoreResult<Arc<T>> + Send + Sync + 'static,
    ) {
        self.constructors.insert(type_name.into(), Arc::new(ctor));
    }

    pub fn construct(&self, type_name: &str, params: serde_json::Value) -> CoreResult<Arc<T>> {
        match self.constructors.get(type_name) {
            Some(ctor) => ctor(params),
            None => Err(error_stack::Report::new(CoreError::Internal(format!(
                "unregistered component type: {type_name}"
            )))),
        }
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<T: ?Sized> Default for ComponentRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One registry per component category
/// (`pipeline.components.{retriever|reranker|reformulator|estimator|scheduler|assembler|feedback}`).
#[derive(Default)]
pub struct Registry {
    pub retrievers: ComponentRegistry<dyn Retriever>,
    pub rerankers: ComponentRegistry<dyn Reranker>,
    pub reformulators: ComponentRegistry<dyn crate::reformulator::Reformulator>,
    pub estimators: ComponentRegistry<dyn Estimator>,
    pub schedulers: ComponentRegistry<dyn Scheduler>,
    pub assemblers: ComponentRegistry<dyn Assembler>,
    pub feedback: ComponentRegistry<dyn Feedback>,
}

#[derive(Deserialize)]
struct DefaultSchedulerParams {
    #[serde(default = "default_batch_size")]
    target_batch_size: usize,
    #[serde(default = "default_cheap_strategy")]
    cheap_strategy: String,
    #[serde(default = "default_expensive_strategy")]
    expensive_strategy: String,
}

fn default_batch_size() -> usize {
    5
}

fn default_cheap_strategy() -> String {
    "cross_encoder".to_string()
}

fn default_expensive_strategy() -> String {
    "llm".to_string()
}

#[derive(Deserialize)]
struct MinEligibleFeedbackParams {
    #[serde(default = "default_min_eligible")]
    min_eligible: usize,
}

fn default_min_eligible() -> usize {
    1
}

impl Registry {
    /// A registry pre-populated with the reference implementations shipped
    /// by this crate: `"static"` retriever, `"noop"` reranker,
    /// `"baseline"`/`"similarity"` estimators, `"default"` scheduler,
    /// `"greedy"` assembler, `"min_eligible"` feedback.
    pub fn builtin() -> Self {
        let mut registry = Self::default();

        registry
            .retrievers
            .register("static", |params| {
                let corpus: Vec<(String, String)> = serde_json::from_value(params)
                    .map_err(|e| error_stack::Report::new(CoreError::Serialization(e)))?;
                Ok(Arc::new(StaticRetriever::new(corpus)) as Arc<dyn Retriever>)
            });

        registry
            .rerankers
            .register("noop", |_params| Ok(Arc::new(NoopReranker) as Arc<dyn Reranker>));

        registry.estimators.register("baseline", |_params| {
            Ok(Arc::new(BaselineEstimator) as Arc<dyn Estimator>)
        });
        registry.estimators.register("similarity", |_params| {
            Ok(Arc::new(SimilarityEstimator) as Arc<dyn Estimator>)
        });

        registry.schedulers.register("default", |params| {
            let parsed: DefaultSchedulerParams = serde_json::from_value(params)
                .map_err(|e| error_stack::Report::new(CoreError::Serialization(e)))?;
            Ok(Arc::new(DefaultScheduler::new(
                parsed.target_batch_size,
                parsed.cheap_strategy,
                parsed.expensive_strategy,
            )) as Arc<dyn Scheduler>)
        });

        registry.assemblers.register("greedy", |_params| {
            Ok(Arc::new(GreedyTokenAssembler::new(TokenBudget::default())) as Arc<dyn Assembler>)
        });

        registry.feedback.register("min_eligible", |params| {
            let parsed: MinEligibleFeedbackParams = serde_json::from_value(params)
                .map_err(|e| error_stack::Report::new(CoreError::Serialization(e)))?;
            Ok(Arc::new(MinEligibleFeedback {
                min_eligible: parsed.min_eligible,
            }) as Arc<dyn Feedback>)
        });

        registry
    }
}
