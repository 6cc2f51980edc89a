//! Declarative pipeline configuration (§6, §9, §10.3).
//!
//! Multi-format loading (YAML/JSON/TOML, auto-detected by extension, with
//! `${VAR}`/`$VAR` environment-variable substitution) is kept close to the
//! teacher's original multi-format config loader; the typed
//! `PipelineConfig` schema and `ConfigValidator` are new, realizing the
//! `pipeline.*` document shape spec.md §6 describes.

use crate::controller::ControllerConfig;
use crate::registry::Registry;
use crate::tracker::CostBudget;
use config::{Config as Cfg, Environment, File, FileFormat};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Configuration loading/parsing error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parsing error: {0}")]
    Parse(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("deserialization error: {0}")]
    Serialization(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Detect configuration format from a file extension. Supports the three
/// formats `pipeline.*` documents are specified in (§10.3): YAML, TOML, JSON.
pub fn detect_format(path: &str) -> ConfigResult<FileFormat> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("no file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Substitute `${VAR}` and `$VAR` environment-variable references in raw
/// config text before it's handed to the format parser.
pub fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    let re_braced = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    result = re_braced
        .replace_all(&result, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string();

    let re_simple = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").unwrap();
    result = re_simple
        .replace_all(&result, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string();

    result
}

/// Load and deserialize a config file, format detected from its extension.
pub fn load_config<T: DeserializeOwned>(path: &str) -> ConfigResult<T> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    from_str(&content, format)
}

/// Deserialize config text of an explicit format, after env substitution.
pub fn from_str<T: DeserializeOwned>(content: &str, format: FileFormat) -> ConfigResult<T> {
    let substituted = substitute_env_vars(content);
    let config = Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;
    config
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// Merge multiple config sources, later sources overriding earlier ones.
pub fn merge_configs<T: DeserializeOwned>(sources: &[(&str, FileFormat)]) -> ConfigResult<T> {
    let mut builder = Cfg::builder();
    for (content, format) in sources {
        let substituted = substitute_env_vars(content);
        builder = builder.add_source(File::from_str(&substituted, *format));
    }
    builder
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// Load and merge multiple config files, later files overriding earlier ones.
pub fn load_merged<T: DeserializeOwned>(paths: &[&str]) -> ConfigResult<T> {
    let mut builder = Cfg::builder();
    for path in paths {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&content);
        builder = builder.add_source(File::from_str(&substituted, format));
    }
    builder
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// Load a config file layered with environment variable overrides
/// (`{PREFIX}__{PATH}`, double underscore as the nesting separator).
pub fn load_with_env<T: DeserializeOwned>(path: &str, env_prefix: &str) -> ConfigResult<T> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let substituted = substitute_env_vars(&content);
    Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .add_source(Environment::with_prefix(env_prefix).separator("__"))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// `pipeline.budget.limits`: an open string-keyed map of resource name to
/// nonnegative limit (§6). Deliberately not `deny_unknown_fields` — its
/// whole point is to carry arbitrary user-defined resource keys (§9
/// "arbitrary cost resources").
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BudgetLimitsConfig {
    #[serde(flatten)]
    pub limits: HashMap<String, f64>,
}

impl From<BudgetLimitsConfig> for CostBudget {
    fn from(config: BudgetLimitsConfig) -> Self {
        let mut budget = CostBudget::new();
        for (resource, limit) in config.limits {
            budget = budget.with_limit(resource, limit);
        }
        budget
    }
}

/// One `{type, params}` component record (§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ComponentConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A component slot is either a single record or an ordered list (⇒
/// composite, §9).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ComponentSpec {
    Single(ComponentConfig),
    Composite(Vec<ComponentConfig>),
}

impl ComponentSpec {
    pub fn type_names(&self) -> Vec<&str> {
        match self {
            ComponentSpec::Single(c) => vec![c.type_name.as_str()],
            ComponentSpec::Composite(list) => list.iter().map(|c| c.type_name.as_str()).collect(),
        }
    }
}

/// `pipeline.components.*` (§6).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ComponentsConfig {
    #[serde(default)]
    pub retriever: Option<ComponentSpec>,
    #[serde(default)]
    pub reranker: Option<ComponentSpec>,
    #[serde(default)]
    pub reformulator: Option<ComponentSpec>,
    #[serde(default)]
    pub estimator: Option<ComponentSpec>,
    #[serde(default)]
    pub scheduler: Option<ComponentSpec>,
    #[serde(default)]
    pub assembler: Option<ComponentSpec>,
    #[serde(default)]
    pub feedback: Option<ComponentSpec>,
}

fn default_original_query_depth() -> usize {
    20
}

fn default_depth_per_reformulation() -> usize {
    10
}

/// `pipeline.retrieval.*` (§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    #[serde(default = "default_original_query_depth")]
    pub original_query_depth: usize,
    #[serde(default)]
    pub num_reformulations: usize,
    #[serde(default = "default_depth_per_reformulation")]
    pub depth_per_reformulation: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            original_query_depth: default_original_query_depth(),
            num_reformulations: 0,
            depth_per_reformulation: default_depth_per_reformulation(),
        }
    }
}

impl From<RetrievalConfig> for ControllerConfig {
    fn from(config: RetrievalConfig) -> Self {
        ControllerConfig {
            original_query_depth: config.original_query_depth,
            num_reformulations: config.num_reformulations,
            depth_per_reformulation: config.depth_per_reformulation,
            retrieval_cost: HashMap::new(),
        }
    }
}

/// `pipeline.feedback`: an optional stop-condition plugin record (§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeedbackConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The top-level `pipeline.*` document (§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub budget: BudgetLimitsConfig,
    #[serde(default)]
    pub components: ComponentsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub feedback: Option<FeedbackConfig>,
}

/// A single validation failure: the config is rejected (§10.3).
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

/// A single validation concern that doesn't reject the config.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

/// Result of running [`ConfigValidator::validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ConfigValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Semantic checks deserialization alone can't express (§10.3): unregistered
/// component type strings, and retrieval/component-presence mismatches.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &PipelineConfig, registry: &Registry) -> ConfigValidationResult {
        let mut result = ConfigValidationResult::default();

        Self::check_spec(
            &config.components.retriever,
            "components.retriever",
            &registry.retrievers.type_names(),
            &mut result,
        );
        Self::check_spec(
            &config.components.reranker,
            "components.reranker",
            &registry.rerankers.type_names(),
            &mut result,
        );
        Self::check_spec(
            &config.components.estimator,
            "components.estimator",
            &registry.estimators.type_names(),
            &mut result,
        );
        Self::check_spec(
            &config.components.scheduler,
            "components.scheduler",
            &registry.schedulers.type_names(),
            &mut result,
        );
        Self::check_spec(
            &config.components.assembler,
            "components.assembler",
            &registry.assemblers.type_names(),
            &mut result,
        );
        Self::check_spec(
            &config.components.reformulator,
            "components.reformulator",
            &registry.reformulators.type_names(),
            &mut result,
        );

        if config.retrieval.num_reformulations > 0 && config.components.reformulator.is_none() {
            result.errors.push(ValidationError {
                path: "retrieval.num_reformulations".to_string(),
                message: "num_reformulations > 0 requires a components.reformulator entry".to_string(),
            });
        }

        if config.components.retriever.is_none() {
            result.errors.push(ValidationError {
                path: "components.retriever".to_string(),
                message: "a retriever component is required".to_string(),
            });
        }

        if config.components.reranker.is_none() {
            result.warnings.push(ValidationWarning {
                path: "components.reranker".to_string(),
                message: "no reranker configured; the loop will never schedule a batch".to_string(),
            });
        }

        result
    }

    fn check_spec(
        spec: &Option<ComponentSpec>,
        path: &str,
        known: &[String],
        result: &mut ConfigValidationResult,
    ) {
        let Some(spec) = spec else {
            return;
        };
        for type_name in spec.type_names() {
            if !known.iter().any(|k| k == type_name) {
                result.errors.push(ValidationError {
                    path: path.to_string(),
                    message: format!("unregistered component type: {type_name}"),
                });
            }
        }
    }
}
