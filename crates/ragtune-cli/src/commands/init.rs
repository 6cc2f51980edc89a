//! `ragtune init`: scaffold a starter `pipeline.*` document.

use crate::error::{CliError, CliResult};
use error_stack::{Report, ResultExt};
use std::path::{Path, PathBuf};

const TEMPLATE: &str = r#"name: my-pipeline

budget:
  tokens: 4096
  rerank_docs: 20
  rerank_calls: 4
  latency_ms: 5000

components:
  retriever:
    type: static
    params: []
  reranker:
    type: noop
  estimator:
    type: baseline
  scheduler:
    type: default
    params:
      target_batch_size: 5
      cheap_strategy: cross_encoder
      expensive_strategy: llm
  assembler:
    type: greedy

retrieval:
  original_query_depth: 20
  num_reformulations: 0
  depth_per_reformulation: 10
"#;

pub fn execute(path: &Path, output: &PathBuf) -> CliResult<String> {
    std::fs::create_dir_all(path)
        .map_err(CliError::Io)
        .map_err(Report::new)
        .attach_printable_lazy(|| format!("creating project directory {}", path.display()))?;

    let target = path.join(output);
    if target.exists() {
        return Err(Report::new(CliError::Config(format!(
            "{} already exists; refusing to overwrite",
            target.display()
        ))));
    }

    std::fs::write(&target, TEMPLATE)
        .map_err(CliError::Io)
        .map_err(Report::new)
        .attach_printable_lazy(|| format!("writing {}", target.display()))?;

    Ok(format!("wrote {}", target.display()))
}
