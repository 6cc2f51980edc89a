//! CLI command definitions using clap.
//!
//! Only `run` (and `visualize`, which drives the same engine for inspection)
//! touch `ragtune_core::Controller`; `init`, `index`, `validate`, and `list`
//! are plumbing around the core (§6: "the core is insulated from argument
//! parsing").

use crate::output::OutputFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ragtune - a budget-aware, iterative retrieval-reranking pipeline runner.
#[derive(Parser)]
#[command(name = "ragtune")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format for commands that produce structured results.
    #[arg(long = "output-format", global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold a new pipeline config in an existing project.
    Init {
        /// Project directory.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Config filename to create.
        #[arg(short, long, default_value = "ragtune.yaml")]
        output: PathBuf,
    },

    /// Build a static retrieval corpus index from a directory of text files.
    Index {
        /// Directory of `.txt`/`.md` files to index; each file becomes one
        /// document with its relative path as `doc_id`.
        corpus_dir: PathBuf,

        /// Output index file (JSON array of `[doc_id, content]` pairs).
        #[arg(short, long, default_value = "index.json")]
        output: PathBuf,
    },

    /// Validate a pipeline config document against the component registry.
    Validate {
        /// Pipeline config file (YAML, TOML, or JSON; detected by extension).
        #[arg(default_value = "ragtune.yaml")]
        config: PathBuf,
    },

    /// Run a query through the pipeline and print the ranked, token-bounded
    /// result.
    Run {
        /// Pipeline config file.
        #[arg(short, long, default_value = "ragtune.yaml")]
        config: PathBuf,

        /// The query to run.
        query: String,

        /// Budget overrides as `resource=limit` (repeatable); layered over
        /// the config file's `pipeline.budget.limits`.
        #[arg(long = "budget", value_parser = parse_budget_override)]
        budget_overrides: Vec<(String, f64)>,
    },

    /// List the component types known to the built-in registry, or the
    /// wiring declared in a config file.
    List {
        /// Restrict the listing to one component category.
        #[arg(value_enum)]
        category: Option<ComponentCategory>,

        /// Also resolve and show what a config file wires up.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run a query and render the decision trace instead of the documents.
    Visualize {
        /// Pipeline config file.
        #[arg(short, long, default_value = "ragtune.yaml")]
        config: PathBuf,

        /// The query to run.
        query: String,
    },
}

/// Component categories a `pipeline.components.*` entry can name.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ComponentCategory {
    Retriever,
    Reranker,
    Reformulator,
    Estimator,
    Scheduler,
    Assembler,
    Feedback,
}

impl std::fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Retriever => "retriever",
            Self::Reranker => "reranker",
            Self::Reformulator => "reformulator",
            Self::Estimator => "estimator",
            Self::Scheduler => "scheduler",
            Self::Assembler => "assembler",
            Self::Feedback => "feedback",
        };
        write!(f, "{name}")
    }
}

fn parse_budget_override(s: &str) -> Result<(String, f64), String> {
    let (resource, limit) = s
        .split_once('=')
        .ok_or_else(|| format!("expected resource=limit, got `{s}`"))?;
    let limit: f64 = limit
        .parse()
        .map_err(|_| format!("`{limit}` is not a number"))?;
    Ok((resource.to_string(), limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn run_parses_repeated_budget_overrides() {
        let parsed = Cli::try_parse_from([
            "ragtune",
            "run",
            "--config",
            "p.yaml",
            "--budget",
            "tokens=1000",
            "--budget",
            "rerank_docs=5",
            "hello world",
        ])
        .unwrap();
        let Commands::Run { budget_overrides, query, .. } = parsed.command else {
            panic!("expected Run");
        };
        assert_eq!(query, "hello world");
        assert_eq!(
            budget_overrides,
            vec![("tokens".to_string(), 1000.0), ("rerank_docs".to_string(), 5.0)]
        );
    }

    #[test]
    fn malformed_budget_override_is_rejected() {
        let parsed = Cli::try_parse_from(["ragtune", "run", "--budget", "not-a-pair", "q"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn list_accepts_an_optional_category() {
        let parsed = Cli::try_parse_from(["ragtune", "list", "estimator"]).unwrap();
        assert!(matches!(
            parsed.command,
            Commands::List { category: Some(ComponentCategory::Estimator), .. }
        ));
    }

    #[test]
    fn list_without_category_parses() {
        let parsed = Cli::try_parse_from(["ragtune", "list"]).unwrap();
        assert!(matches!(parsed.command, Commands::List { category: None, .. }));
    }
}
