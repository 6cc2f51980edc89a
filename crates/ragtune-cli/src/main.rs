//! `ragtune`: run, validate, and inspect budget-aware retrieval-reranking
//! pipelines (§6/§11.3).

mod builder;
mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use error::CliError;
use output::{format_structured, OutputFormat};
use std::process::ExitCode;

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    error::install_hook();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(dispatch(cli.command, cli.output_format)) {
        Ok(rendered) => {
            println!("{rendered}");
            ExitCode::SUCCESS
        }
        Err(report) => {
            eprintln!("{report:?}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Commands, format: OutputFormat) -> error::CliResult<String> {
    match command {
        Commands::Init { path, output } => commands::init::execute(&path, &output),

        Commands::Index { corpus_dir, output } => commands::index::execute(&corpus_dir, &output),

        Commands::Validate { config } => {
            let report = commands::validate::execute(&config)?;
            let rendered = match format {
                OutputFormat::Text => report.render_text(),
                _ => format_structured(&report, format),
            };
            if !report.valid {
                return Err(error_stack::Report::new(CliError::Config(rendered)));
            }
            Ok(rendered)
        }

        Commands::Run { config, query, budget_overrides } => {
            let result = commands::run::execute(&config, &query, &budget_overrides).await?;
            match format {
                OutputFormat::Text => Ok(commands::run::render_text(&result)),
                _ => Ok(format_structured(&result, format)),
            }
        }

        Commands::List { category, config } => {
            let listings = commands::list::execute(category, config.as_deref())?;
            match format {
                OutputFormat::Text => Ok(commands::list::render_text(&listings)),
                _ => Ok(format_structured(&listings, format)),
            }
        }

        Commands::Visualize { config, query } => {
            let result = commands::visualize::execute(&config, &query).await?;
            Ok(commands::visualize::render_trace(&result))
        }
    }
}
