//! Output formatting module.
//!
//! Provides the `--output-format` surface shared by every command: plain
//! text, JSON for automation, or a table for listings.

mod json;
mod table;

pub use json::JsonOutput;
pub use table::Table;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for automation.
    Json,
    /// Table-formatted output.
    Table,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Table => write!(f, "table"),
        }
    }
}

/// Render `result` as JSON or a best-effort table; `Text` is left to each
/// command's own human-readable printer since it isn't derivable generically.
pub fn format_structured<T: JsonOutput>(result: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text | OutputFormat::Json => result.to_json().to_string(),
        OutputFormat::Table => format_table(result),
    }
}

fn format_table<T: JsonOutput>(result: &T) -> String {
    let json = result.to_json();
    if let Some(arr) = json.as_array()
        && !arr.is_empty()
    {
        return Table::from_json_array(arr).to_string();
    }
    json.to_string()
}
