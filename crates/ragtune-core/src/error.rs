//! Crate-level error types for `ragtune-core`.
//!
//! Provides a unified [`CoreError`] realizing the error taxonomy (kinds, not
//! exception types) together with [`error_stack::Report`] for rich,
//! context-carrying error propagation.
//!
//! Only [`CoreError::IllegalTransition`] and [`CoreError::FatalRetrievalFailure`]
//! are ever raised out of the crate unhandled. [`CoreError::BudgetDenied`],
//! [`CoreError::UnknownId`], and [`CoreError::ComponentFailure`] exist as named
//! variants for callers who want to construct a synthetic failure (e.g. in
//! tests); in the hot path those conditions are recorded as trace events and
//! handled by control flow, never raised.
//!
//! ```rust,ignore
//! use ragtune_core::error::{CoreError, CoreResult};
//! use error_stack::ResultExt;
//!
//! fn transition(id: &str) -> CoreResult<()> {
//!     Err(error_stack::Report::new(CoreError::IllegalTransition {
//!         doc_id: id.to_string(),
//!         from: "RERANKED".into(),
//!         to: "IN_FLIGHT".into(),
//!     }))
//!     .attach("while scheduling a batch")
//! }
//! ```

use thiserror::Error;

/// Crate-level error type for `ragtune-core`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A requested pool transition violates the state machine. Always a
    /// programming error; never recovered inside the core.
    #[error("illegal transition for {doc_id}: {from} -> {to}")]
    IllegalTransition {
        doc_id: String,
        from: String,
        to: String,
    },

    /// An id presented to a pool operation was never admitted.
    #[error("unknown doc_id: {0}")]
    UnknownId(String),

    /// A `try_consume` call was denied; not an exception in normal flow, but
    /// available as a concrete error for callers that need one.
    #[error("budget denied for resource {resource}: requested {requested}, remaining {remaining}")]
    BudgetDenied {
        resource: String,
        requested: u64,
        remaining: u64,
    },

    /// An exception escaped a Retriever (on rewrites), Reformulator, or
    /// Reranker call; recovered by the Controller.
    #[error("component failure in {component}: {message}")]
    ComponentFailure { component: String, message: String },

    /// An exception escaped the original-query retrieval; surfaced to the
    /// caller as the request's error.
    #[error("fatal retrieval failure: {0}")]
    FatalRetrievalFailure(String),

    /// Cooperative cancellation; a partial output is returned alongside this.
    #[error("request cancelled")]
    Cancelled,

    /// A configuration-related error (requires the `config` feature).
    #[cfg(feature = "config")]
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A low-level I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal / untyped error described by a message string.
    #[error("{0}")]
    Internal(String),
}

/// Convenience result alias using [`error_stack::Report`].
///
/// Equivalent to `Result<T, error_stack::Report<CoreError>>`.
pub type CoreResult<T> = Result<T, error_stack::Report<CoreError>>;

#[cfg(test)]
mod tests {
    use super::*;
    use error_stack::{Report, ResultExt};

    #[test]
    fn illegal_transition_display() {
        let err = CoreError::IllegalTransition {
            doc_id: "A".into(),
            from: "RERANKED".into(),
            to: "IN_FLIGHT".into(),
        };
        assert!(err.to_string().contains("RERANKED -> IN_FLIGHT"));
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
        assert!(core_err.to_string().contains("file missing"));
    }

    #[test]
    fn serde_error_converts_via_from() {
        let bad_json = serde_json::from_str::<serde_json::Value>("not json");
        let serde_err = bad_json.unwrap_err();
        let core_err: CoreError = serde_err.into();
        assert!(matches!(core_err, CoreError::Serialization(_)));
    }

    #[test]
    fn internal_error_display() {
        let err = CoreError::Internal("something broke".into());
        assert_eq!(err.to_string(), "something broke");
    }

    #[test]
    fn report_carries_context() {
        let result: CoreResult<()> = Err(Report::new(CoreError::Internal("root cause".into())))
            .attach("while loading the candidate pool");

        let report = result.unwrap_err();
        let display = format!("{report:?}");

        assert!(display.contains("root cause"));
        assert!(display.contains("while loading the candidate pool"));
    }

    #[cfg(feature = "config")]
    #[test]
    fn config_error_converts_via_from() {
        let cfg_err = crate::config::ConfigError::UnsupportedFormat("xml".to_string());
        let core_err: CoreError = cfg_err.into();
        assert!(matches!(core_err, CoreError::Config(_)));
        assert!(core_err.to_string().contains("xml"));
    }
}
