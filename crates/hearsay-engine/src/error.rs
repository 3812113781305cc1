//! Error types for the engine binary.

/// Top-level error for the engine binary.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: hearsay_core::ConfigError,
    },

    /// The rumor snapshot could not be loaded or saved.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: hearsay_store::StoreError,
    },

    /// The content mutation backend could not be built.
    #[error("mutator error: {source}")]
    Mutator {
        /// The underlying mutator error.
        #[from]
        source: hearsay_mutator::MutatorError,
    },

    /// NATS connection failed.
    #[error("NATS error: {message}")]
    Nats {
        /// Description of the NATS failure.
        message: String,
    },

    /// The API server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: hearsay_api::ServerError,
    },
}
