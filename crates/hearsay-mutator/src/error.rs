//! Errors raised while building a mutation backend.
//!
//! Failures during a call are reported as
//! [`MutationServiceError`](hearsay_rumor::MutationServiceError) so the
//! propagation engine can retry and fall back.

/// Errors that can occur while setting up a mutation backend.
#[derive(Debug, thiserror::Error)]
pub enum MutatorError {
    /// Configuration is invalid or incomplete for the selected backend.
    #[error("mutator config error: {0}")]
    Config(String),

    /// A prompt template could not be read or compiled.
    #[error("template error: {0}")]
    Template(String),

    /// The HTTP client could not be constructed.
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}
