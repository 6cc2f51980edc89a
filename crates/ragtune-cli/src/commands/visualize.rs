//! `ragtune visualize`: run a query and render its decision trace as an
//! indented event tree instead of the assembled documents (§11.3).

use crate::error::CliResult;
use ragtune_core::ControllerOutput;
use std::path::Path;

pub async fn execute(config_path: &Path, query: &str) -> CliResult<ControllerOutput> {
    super::run::execute(config_path, query, &[]).await
}

/// Render a completed output's trace as an indented tree, one line per
/// event, `timestamp_ms` right-aligned as a gutter.
pub fn render_trace(output: &ControllerOutput) -> String {
    let mut lines = Vec::with_capacity(output.trace.events().len() + 1);
    lines.push(format!("query: {}", output.query));
    for event in output.trace.events() {
        let details = if event.details.is_empty() {
            String::new()
        } else {
            let mut parts: Vec<String> = event
                .details
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            parts.sort();
            format!(" [{}]", parts.join(", "))
        };
        lines.push(format!(
            "  {:>6}ms {}.{}{}",
            event.timestamp_ms, event.component, event.action, details
        ));
    }
    lines.join("\n")
}
