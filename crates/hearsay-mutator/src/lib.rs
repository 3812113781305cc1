//! Content mutation backends for the Hearsay rumor engine.
//!
//! [`MutationBackend`] implements
//! [`ContentMutationService`](hearsay_rumor::ContentMutationService) either
//! with the deterministic local garbler or by asking an LLM to retell the
//! rumor. Call timeouts, retries and the fallback to local garbling are
//! handled by the propagation engine, not here.

pub mod backend;
pub mod error;
pub mod llm;
pub mod prompt;

pub use backend::{LlmMutator, MutationBackend};
pub use error::MutatorError;
pub use llm::LlmBackend;
pub use prompt::{PromptEngine, RenderedPrompt};
