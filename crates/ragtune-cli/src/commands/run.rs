//! `ragtune run`: the only command that constructs a `Controller` and drives
//! a request through it (§6/§11.3).

use crate::builder::build_controller;
use crate::error::{CliError, CliResult};
use error_stack::Report;
use ragtune_core::config::PipelineConfig;
use ragtune_core::registry::Registry;
use ragtune_core::ControllerOutput;
use std::path::Path;

/// Load `config_path`, layer `budget_overrides` over `pipeline.budget.limits`,
/// build a `Controller`, and run `query` against it.
pub async fn execute(
    config_path: &Path,
    query: &str,
    budget_overrides: &[(String, f64)],
) -> CliResult<ControllerOutput> {
    let path_str = config_path.to_string_lossy().to_string();
    let mut config: PipelineConfig = ragtune_core::config::load_config(&path_str)
        .map_err(|e| Report::new(CliError::Config(e.to_string())))?;

    for (resource, limit) in budget_overrides {
        config.budget.limits.insert(resource.clone(), *limit);
    }

    let registry = Registry::builtin();
    let controller = build_controller(&config, &registry)?;

    controller
        .run_async(query)
        .await
        .map_err(|report| Report::new(CliError::Engine(format!("{report:?}"))))
}

/// Human-readable rendering for `--output-format text` (the default): the
/// assembled documents as a numbered, scored list, most relevant first.
pub fn render_text(output: &ControllerOutput) -> String {
    if output.documents.is_empty() {
        return format!("query: {}\n(no documents assembled)", output.query);
    }
    let mut lines = Vec::with_capacity(output.documents.len() + 1);
    lines.push(format!("query: {}", output.query));
    for (i, doc) in output.documents.iter().enumerate() {
        lines.push(format!(
            "  {}. [{:.3}] {} - {}",
            i + 1,
            doc.score,
            doc.doc_id,
            truncate(&doc.content, 80)
        ));
    }
    lines.join("\n")
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("ragtune.yaml");
        std::fs::write(
            &path,
            r#"
name: demo
budget:
  tokens: 4096
  rerank_docs: 5
  rerank_calls: 2
components:
  retriever:
    type: static
    params:
      - ["A", "apple banana cherry"]
      - ["B", "banana cherry date"]
  reranker:
    type: noop
  estimator:
    type: baseline
  scheduler:
    type: default
    params:
      target_batch_size: 2
  assembler:
    type: greedy
"#,
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn runs_a_query_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir);
        let output = execute(&path, "banana cherry", &[]).await.unwrap();
        assert_eq!(output.query, "banana cherry");
        assert!(!output.documents.is_empty());
    }

    #[tokio::test]
    async fn budget_override_layers_over_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir);
        let output = execute(&path, "banana cherry", &[("rerank_docs".to_string(), 0.0)])
            .await
            .unwrap();
        assert_eq!(
            output.final_budget_state.get("rerank_docs").copied().unwrap_or(0.0),
            0.0
        );
    }

    #[tokio::test]
    async fn unwritable_config_path_is_a_cli_error() {
        let result = execute(Path::new("/nonexistent/ragtune.yaml"), "q", &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn render_text_lists_documents_by_rank() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir);
        let output = execute(&path, "banana cherry", &[]).await.unwrap();
        let rendered = render_text(&output);
        assert!(rendered.contains("query: banana cherry"));
        assert!(rendered.contains("1. ["));
    }
}
