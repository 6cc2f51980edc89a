//! Glue between a loaded [`PipelineConfig`] and a runnable [`Controller`].
//!
//! A config's `components.*` entries resolve against a [`Registry`]; a list
//! value wraps the resolved components in the matching `Composite*` type
//! using the pessimistic merge rule (§9) for every composite, since CLI
//! config documents have no way to name a different merge policy yet.
//! `retriever`, `reranker`, and `assembler` have no defined composite shape
//! (§9 only describes Estimator/Scheduler/Feedback composites) and are
//! rejected as a config error if given a list.

use crate::error::CliError;
use error_stack::Report;
use ragtune_core::assembler::Assembler;
use ragtune_core::config::{ComponentConfig, ComponentSpec, PipelineConfig};
use ragtune_core::estimator::{CompositeEstimator, Estimator, MergeRule};
use ragtune_core::feedback::{CompositeFeedback, Feedback};
use ragtune_core::reformulator::Reformulator;
use ragtune_core::registry::{ComponentRegistry, Registry};
use ragtune_core::reranker::Reranker;
use ragtune_core::retriever::Retriever;
use ragtune_core::scheduler::{CompositeScheduler, Scheduler};
use ragtune_core::{Controller, ControllerConfig};
use std::sync::Arc;

type BuildResult<T> = Result<T, Report<CliError>>;

fn construct<T: ?Sized>(
    registry: &ComponentRegistry<T>,
    c: &ComponentConfig,
) -> BuildResult<Arc<T>> {
    registry
        .construct(&c.type_name, c.params.clone())
        .map_err(|report| Report::new(CliError::Config(format!("{report:?}"))))
}

/// Resolve a slot with a defined composite shape: a single record constructs
/// directly, a list constructs every entry and merges them with `wrap`.
fn resolve_composite<T: ?Sized>(
    spec: &ComponentSpec,
    registry: &ComponentRegistry<T>,
    wrap: impl FnOnce(Vec<Arc<T>>) -> Arc<T>,
) -> BuildResult<Arc<T>> {
    match spec {
        ComponentSpec::Single(c) => construct(registry, c),
        ComponentSpec::Composite(list) => {
            let built = list
                .iter()
                .map(|c| construct(registry, c))
                .collect::<BuildResult<Vec<_>>>()?;
            Ok(wrap(built))
        }
    }
}

/// Resolve a slot with no composite shape: only a single record is accepted.
fn resolve_single<T: ?Sized>(
    spec: &ComponentSpec,
    registry: &ComponentRegistry<T>,
    slot_name: &str,
) -> BuildResult<Arc<T>> {
    match spec {
        ComponentSpec::Single(c) => construct(registry, c),
        ComponentSpec::Composite(_) => Err(Report::new(CliError::Config(format!(
            "components.{slot_name} does not support a composite list"
        )))),
    }
}

fn required<'a>(spec: &'a Option<ComponentSpec>, slot_name: &str) -> BuildResult<&'a ComponentSpec> {
    spec.as_ref().ok_or_else(|| {
        Report::new(CliError::Config(format!(
            "components.{slot_name} is required to run a pipeline"
        )))
    })
}

/// Construct a [`Controller`] by resolving every `components.*` slot in
/// `config` against `registry` and layering the request-independent pieces
/// (`budget`, `retrieval`) on top.
pub fn build_controller(config: &PipelineConfig, registry: &Registry) -> BuildResult<Controller> {
    let retriever: Arc<dyn Retriever> = resolve_single(
        required(&config.components.retriever, "retriever")?,
        &registry.retrievers,
        "retriever",
    )?;

    let reranker: Arc<dyn Reranker> = resolve_single(
        required(&config.components.reranker, "reranker")?,
        &registry.rerankers,
        "reranker",
    )?;

    let estimator: Arc<dyn Estimator> = resolve_composite(
        required(&config.components.estimator, "estimator")?,
        &registry.estimators,
        |built| Arc::new(CompositeEstimator::new(built, MergeRule::Pessimistic)) as Arc<dyn Estimator>,
    )?;

    let scheduler: Arc<dyn Scheduler> = resolve_composite(
        required(&config.components.scheduler, "scheduler")?,
        &registry.schedulers,
        |built| Arc::new(CompositeScheduler::new(built)) as Arc<dyn Scheduler>,
    )?;

    let assembler: Arc<dyn Assembler> = resolve_single(
        required(&config.components.assembler, "assembler")?,
        &registry.assemblers,
        "assembler",
    )?;

    let budget = config.budget.clone().into();
    let controller_config: ControllerConfig = config.retrieval.clone().into();

    let mut controller =
        Controller::new(retriever, reranker, estimator, scheduler, assembler, budget, controller_config);

    if let Some(spec) = &config.components.reformulator {
        let reformulator: Arc<dyn Reformulator> =
            resolve_single(spec, &registry.reformulators, "reformulator")?;
        controller = controller.with_reformulator(reformulator);
    }

    if let Some(feedback) = build_feedback(config.feedback.as_ref(), registry)? {
        controller = controller.with_feedback(feedback);
    }

    Ok(controller)
}

/// Resolve `pipeline.feedback` (a single optional slot, §6) into a
/// [`Feedback`] handle, wrapped in a one-plugin [`CompositeFeedback`] so the
/// pessimistic-merge entry point stays uniform even for a single plugin.
fn build_feedback(
    fb: Option<&ragtune_core::config::FeedbackConfig>,
    registry: &Registry,
) -> BuildResult<Option<Arc<dyn Feedback>>> {
    let Some(fb) = fb else { return Ok(None) };
    let plugin = construct(
        &registry.feedback,
        &ComponentConfig {
            type_name: fb.type_name.clone(),
            params: fb.params.clone(),
        },
    )?;
    Ok(Some(Arc::new(CompositeFeedback::new(vec![plugin_as_box(plugin)])) as Arc<dyn Feedback>))
}

fn plugin_as_box(plugin: Arc<dyn Feedback>) -> Box<dyn Feedback> {
    Box::new(OwnedFeedback(plugin))
}

/// Adapts an `Arc<dyn Feedback>` into a `Box<dyn Feedback>` for
/// [`CompositeFeedback`], which owns its plugins by `Box`.
struct OwnedFeedback(Arc<dyn Feedback>);

impl Feedback for OwnedFeedback {
    fn should_stop(
        &self,
        snapshot: &ragtune_core::estimator::PoolSnapshot,
        remaining: &ragtune_core::tracker::RemainingView,
        priorities: &std::collections::HashMap<String, f64>,
    ) -> (bool, Option<String>) {
        self.0.should_stop(snapshot, remaining, priorities)
    }
}
