//! The configured content mutation service.

use hearsay_core::{MutatorBackendKind, MutatorConfig};
use hearsay_rumor::{ContentMutationService, LocalGarbler, MutationServiceError};
use tracing::{debug, info};

use crate::error::MutatorError;
use crate::llm::LlmBackend;
use crate::prompt::PromptEngine;

/// Rewrites rumors through an LLM.
pub struct LlmMutator {
    backend: LlmBackend,
    prompts: PromptEngine,
}

impl LlmMutator {
    /// Pair a backend with its prompt templates.
    pub const fn new(backend: LlmBackend, prompts: PromptEngine) -> Self {
        Self { backend, prompts }
    }
}

impl ContentMutationService for LlmMutator {
    async fn generate_variant(
        &self,
        original_content: &str,
        mutation_strength: f64,
    ) -> Result<String, MutationServiceError> {
        let prompt = self.prompts.render(original_content, mutation_strength)?;
        let variant = self.backend.complete(&prompt).await?;
        debug!(
            backend = self.backend.name(),
            mutation_strength,
            chars = variant.len(),
            "mutation variant generated"
        );
        Ok(variant)
    }
}

/// The mutation service selected by `mutator.backend`.
pub enum MutationBackend {
    /// Deterministic local garbling.
    Local(LocalGarbler),
    /// Generative rewrite through an LLM.
    Llm(LlmMutator),
}

impl MutationBackend {
    /// Build the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError::Config`] for missing LLM settings, or
    /// [`MutatorError::Template`] if a template override is unusable.
    pub fn from_config(config: &MutatorConfig) -> Result<Self, MutatorError> {
        if config.backend == MutatorBackendKind::Local {
            info!("content mutation uses local garbling");
            return Ok(Self::Local(LocalGarbler));
        }
        let prompts = match &config.templates_dir {
            Some(dir) => PromptEngine::from_dir(dir)?,
            None => PromptEngine::builtin()?,
        };
        let backend = LlmBackend::from_config(config)?;
        info!(
            backend = backend.name(),
            model = %config.model,
            "content mutation uses an LLM"
        );
        Ok(Self::Llm(LlmMutator::new(backend, prompts)))
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Local(_) => "local",
            Self::Llm(mutator) => mutator.backend.name(),
        }
    }
}

impl ContentMutationService for MutationBackend {
    async fn generate_variant(
        &self,
        original_content: &str,
        mutation_strength: f64,
    ) -> Result<String, MutationServiceError> {
        match self {
            Self::Local(garbler) => {
                garbler
                    .generate_variant(original_content, mutation_strength)
                    .await
            }
            Self::Llm(mutator) => {
                mutator
                    .generate_variant(original_content, mutation_strength)
                    .await
            }
        }
    }
}
