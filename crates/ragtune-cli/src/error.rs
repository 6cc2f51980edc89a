//! Error types and `error-stack` integration for the ragtune CLI.
//!
//! [`CliError`] is the single canonical error context. All commands return
//! [`CliResult<T>`], an alias for `error_stack::Result<T, CliError>`.

use error_stack::Report;

/// Unified error context for every ragtune CLI command.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CliError {
    /// A problem loading, parsing, or validating a pipeline config document.
    #[error("configuration error: {0}")]
    Config(String),

    /// A problem reported by the ragtune-core engine while running a request.
    #[error("engine error: {0}")]
    Engine(String),

    /// An operating-system I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON serialization/deserialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML serialization/deserialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A catch-all for errors that don't fit another variant.
    #[error("{0}")]
    Other(String),
}

/// The canonical result type for every ragtune CLI command.
pub type CliResult<T> = ::std::result::Result<T, error_stack::Report<CliError>>;

/// Extension trait to convert a `Result<T, CliError>` into a [`CliResult<T>`].
pub trait IntoCliReport<T> {
    fn into_report(self) -> CliResult<T>;
}

impl<T> IntoCliReport<T> for std::result::Result<T, CliError> {
    #[inline]
    fn into_report(self) -> CliResult<T> {
        self.map_err(Report::new)
    }
}

/// Install the global `error_stack` debug hook. Call once at the start of
/// `main()`; subsequent calls are a no-op.
pub fn install_hook() {
    Report::install_debug_hook::<std::panic::Location>(|location, ctx| {
        if std::env::var("RUST_BACKTRACE").is_ok() || cfg!(debug_assertions) {
            ctx.push_body(format!(
                "at {}:{}:{}",
                location.file(),
                location.line(),
                location.column(),
            ));
        }
    });
}

impl From<&str> for CliError {
    fn from(s: &str) -> Self {
        CliError::Other(s.to_string())
    }
}

impl From<String> for CliError {
    fn from(s: String) -> Self {
        CliError::Other(s)
    }
}
