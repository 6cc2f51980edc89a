//! `ragtune index`: build a `static` retriever corpus file from a directory
//! of text files. One document per `.txt`/`.md` file; `doc_id` is its path
//! relative to `corpus_dir`. Output is the JSON array-of-pairs shape the
//! registry's `"static"` retriever expects as `params` (§11.2).

use crate::error::{CliError, CliResult};
use error_stack::{Report, ResultExt};
use std::path::{Path, PathBuf};

fn is_corpus_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("txt") | Some("md")
    )
}

pub fn execute(corpus_dir: &Path, output: &PathBuf) -> CliResult<String> {
    let mut pairs: Vec<(String, String)> = Vec::new();

    let entries = walk(corpus_dir)?;
    for path in entries {
        let content = std::fs::read_to_string(&path)
            .map_err(CliError::Io)
            .map_err(Report::new)
            .attach_printable_lazy(|| format!("reading {}", path.display()))?;
        let doc_id = path
            .strip_prefix(corpus_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .to_string();
        pairs.push((doc_id, content));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let json = serde_json::to_string_pretty(&pairs)
        .map_err(CliError::Json)
        .map_err(Report::new)?;
    std::fs::write(output, json)
        .map_err(CliError::Io)
        .map_err(Report::new)
        .attach_printable_lazy(|| format!("writing {}", output.display()))?;

    Ok(format!("indexed {} documents into {}", pairs.len(), output.display()))
}

fn walk(dir: &Path) -> CliResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    let read_dir = std::fs::read_dir(dir)
        .map_err(CliError::Io)
        .map_err(Report::new)
        .attach_printable_lazy(|| format!("reading directory {}", dir.display()))?;
    for entry in read_dir {
        let entry = entry.map_err(CliError::Io).map_err(Report::new)?;
        let path = entry.path();
        if path.is_dir() {
            found.extend(walk(&path)?);
        } else if is_corpus_file(&path) {
            found.push(path);
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_txt_and_md_files_sorted_by_doc_id() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "second").unwrap();
        std::fs::write(dir.path().join("a.md"), "first").unwrap();
        std::fs::write(dir.path().join("ignore.bin"), "nope").unwrap();

        let output = dir.path().join("index.json");
        let summary = execute(dir.path(), &output).unwrap();
        assert!(summary.contains("2 documents"));

        let contents = std::fs::read_to_string(&output).unwrap();
        let pairs: Vec<(String, String)> = serde_json::from_str(&contents).unwrap();
        assert_eq!(pairs, vec![
            ("a.md".to_string(), "first".to_string()),
            ("b.txt".to_string(), "second".to_string()),
        ]);
    }

    #[test]
    fn indexed_output_constructs_a_static_retriever() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.txt"), "hello world").unwrap();
        let output = dir.path().join("index.json");
        execute(dir.path(), &output).unwrap();

        let contents = std::fs::read_to_string(&output).unwrap();
        let params: serde_json::Value = serde_json::from_str(&contents).unwrap();
        let registry = ragtune_core::registry::Registry::builtin();
        assert!(registry.retrievers.construct("static", params).is_ok());
    }
}
