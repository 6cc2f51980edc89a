//! `ragtune list`: print registered component type strings per category, or
//! (with `--config`) the concrete wiring a config document resolves to.

use crate::cli::ComponentCategory;
use crate::error::{CliError, CliResult};
use error_stack::Report;
use ragtune_core::config::PipelineConfig;
use ragtune_core::registry::Registry;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct CategoryListing {
    pub category: String,
    pub registered_types: Vec<String>,
    pub configured: Option<Vec<String>>,
}

fn category_types(registry: &Registry, category: ComponentCategory) -> Vec<String> {
    match category {
        ComponentCategory::Retriever => registry.retrievers.type_names(),
        ComponentCategory::Reranker => registry.rerankers.type_names(),
        ComponentCategory::Reformulator => registry.reformulators.type_names(),
        ComponentCategory::Estimator => registry.estimators.type_names(),
        ComponentCategory::Scheduler => registry.schedulers.type_names(),
        ComponentCategory::Assembler => registry.assemblers.type_names(),
        ComponentCategory::Feedback => registry.feedback.type_names(),
    }
}

fn configured_types(config: &PipelineConfig, category: ComponentCategory) -> Option<Vec<String>> {
    let spec = match category {
        ComponentCategory::Retriever => &config.components.retriever,
        ComponentCategory::Reranker => &config.components.reranker,
        ComponentCategory::Reformulator => &config.components.reformulator,
        ComponentCategory::Estimator => &config.components.estimator,
        ComponentCategory::Scheduler => &config.components.scheduler,
        ComponentCategory::Assembler => &config.components.assembler,
        ComponentCategory::Feedback => {
            return config
                .feedback
                .as_ref()
                .map(|f| vec![f.type_name.clone()]);
        }
    };
    spec.as_ref()
        .map(|s| s.type_names().into_iter().map(str::to_string).collect())
}

/// Human-readable rendering for `--output-format text` (the default): one
/// line per category, registered types first, configured wiring appended
/// when a `--config` was given.
pub fn render_text(listings: &[CategoryListing]) -> String {
    let mut lines = Vec::with_capacity(listings.len());
    for listing in listings {
        let registered = listing.registered_types.join(", ");
        match &listing.configured {
            Some(configured) => lines.push(format!(
                "{}: registered=[{registered}] configured=[{}]",
                listing.category,
                configured.join(", ")
            )),
            None => lines.push(format!("{}: registered=[{registered}]", listing.category)),
        }
    }
    lines.join("\n")
}

const ALL_CATEGORIES: [ComponentCategory; 7] = [
    ComponentCategory::Retriever,
    ComponentCategory::Reranker,
    ComponentCategory::Reformulator,
    ComponentCategory::Estimator,
    ComponentCategory::Scheduler,
    ComponentCategory::Assembler,
    ComponentCategory::Feedback,
];

pub fn execute(
    category: Option<ComponentCategory>,
    config_path: Option<&Path>,
) -> CliResult<Vec<CategoryListing>> {
    let registry = Registry::builtin();
    let config: Option<PipelineConfig> = match config_path {
        Some(path) => {
            let path_str = path.to_string_lossy().to_string();
            Some(
                ragtune_core::config::load_config(&path_str)
                    .map_err(|e| Report::new(CliError::Config(e.to_string())))?,
            )
        }
        None => None,
    };

    let categories: Vec<ComponentCategory> = match category {
        Some(c) => vec![c],
        None => ALL_CATEGORIES.to_vec(),
    };

    Ok(categories
        .into_iter()
        .map(|c| CategoryListing {
            category: c.to_string(),
            registered_types: category_types(&registry, c),
            configured: config.as_ref().and_then(|cfg| configured_types(cfg, c)),
        })
        .collect())
}
