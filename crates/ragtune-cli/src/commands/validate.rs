//! `ragtune validate`: load a pipeline config and run `ConfigValidator`
//! without constructing a `Controller` (§11.3 — "without executing").

use crate::error::{CliError, CliResult};
use colored::Colorize;
use error_stack::Report;
use ragtune_core::config::{ConfigValidator, PipelineConfig};
use ragtune_core::registry::Registry;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct ValidateReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidateReport {
    /// Human-readable rendering for `--output-format text` (the default).
    pub fn render_text(&self) -> String {
        let mut lines = Vec::new();
        if self.valid {
            lines.push(format!("{} configuration is valid", "✓".green()));
        } else {
            lines.push(format!("{} configuration is invalid", "✗".red()));
        }
        for error in &self.errors {
            lines.push(format!("  {} {error}", "error:".red().bold()));
        }
        for warning in &self.warnings {
            lines.push(format!("  {} {warning}", "warning:".yellow().bold()));
        }
        lines.join("\n")
    }
}

pub fn execute(config_path: &Path) -> CliResult<ValidateReport> {
    let path_str = config_path.to_string_lossy().to_string();
    let config: PipelineConfig = ragtune_core::config::load_config(&path_str)
        .map_err(|e| Report::new(CliError::Config(e.to_string())))?;

    let registry = Registry::builtin();
    let result = ConfigValidator::validate(&config, &registry);

    Ok(ValidateReport {
        valid: result.is_valid(),
        errors: result.errors.into_iter().map(|e| format!("{}: {}", e.path, e.message)).collect(),
        warnings: result.warnings.into_iter().map(|w| format!("{}: {}", w.path, w.message)).collect(),
    })
}
