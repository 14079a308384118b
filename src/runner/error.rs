//! Error types for pipeline runs

use super::pipeline::RunnerState;
use crate::asn::LookupError;
use crate::config::ConfigError;
use thiserror::Error;

/// Errors that can end a pipeline run
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Invalid configuration provided
    ///
    /// Raised before any lookup happens, e.g. when every input bucket is empty.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Explicit inputs were supplied but none of them produced a query
    #[error("no queries could be built from the supplied inputs")]
    NoQueries,

    /// The lookup service could not be reached or answered with an error
    ///
    /// Ends the run; remaining queries are abandoned.
    #[error("lookup for {query} failed: {source}")]
    Transport {
        /// Query that failed
        query: String,
        /// Underlying lookup error
        #[source]
        source: LookupError,
    },

    /// The runner was closed
    #[error("runner is closed")]
    Closed,

    /// An operation was called out of order
    #[error("cannot {operation} while runner is {state:?}")]
    InvalidState {
        /// Operation that was attempted
        operation: &'static str,
        /// State the runner was in
        state: RunnerState,
    },
}

impl RunnerError {
    /// Whether the error comes from configuration rather than the run itself
    pub fn is_configuration(&self) -> bool {
        matches!(self, RunnerError::Configuration(_) | RunnerError::NoQueries)
    }
}

impl From<ConfigError> for RunnerError {
    fn from(e: ConfigError) -> Self {
        RunnerError::Configuration(e.to_string())
    }
}
