//! Mutation prompt loading and rendering via `minijinja`.
//!
//! The built-in templates ship inside the binary. An operator can point
//! `mutator.templates_dir` at a directory holding `system.j2` and/or
//! `mutation.j2` to retune the rewrite without recompiling; missing files
//! fall back to the built-in text.

use std::path::Path;

use hearsay_rumor::MutationServiceError;
use minijinja::{Environment, context};

use crate::error::MutatorError;

const SYSTEM_TEMPLATE: &str = include_str!("../templates/system.j2");
const MUTATION_TEMPLATE: &str = include_str!("../templates/mutation.j2");

/// The rendered prompt ready to send to an LLM backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// System message describing the retelling task.
    pub system: String,
    /// User message carrying the rumor and how hard to distort it.
    pub user: String,
}

/// Holds the compiled mutation templates.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Engine using only the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError::Template`] if a template fails to compile.
    pub fn builtin() -> Result<Self, MutatorError> {
        Self::from_sources(SYSTEM_TEMPLATE.to_owned(), MUTATION_TEMPLATE.to_owned())
    }

    /// Engine loading overrides from `dir`. Files that do not exist keep the
    /// built-in text.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError::Template`] if a file exists but cannot be read,
    /// or if a template fails to compile.
    pub fn from_dir(dir: &Path) -> Result<Self, MutatorError> {
        let system = load_template(dir, "system.j2")?.unwrap_or_else(|| SYSTEM_TEMPLATE.to_owned());
        let mutation =
            load_template(dir, "mutation.j2")?.unwrap_or_else(|| MUTATION_TEMPLATE.to_owned());
        Self::from_sources(system, mutation)
    }

    fn from_sources(system: String, mutation: String) -> Result<Self, MutatorError> {
        let mut env = Environment::new();
        env.add_template_owned("system", system)
            .map_err(|e| MutatorError::Template(format!("failed to add system template: {e}")))?;
        env.add_template_owned("mutation", mutation)
            .map_err(|e| MutatorError::Template(format!("failed to add mutation template: {e}")))?;
        Ok(Self { env })
    }

    /// Render the prompt asking for a rewrite of `original_content`.
    ///
    /// # Errors
    ///
    /// Returns [`MutationServiceError::Prompt`] if rendering fails.
    pub fn render(
        &self,
        original_content: &str,
        mutation_strength: f64,
    ) -> Result<RenderedPrompt, MutationServiceError> {
        let ctx = context! {
            original_content => original_content,
            mutation_strength => mutation_strength,
            intensity => intensity(mutation_strength),
        };
        let system = self
            .env
            .get_template("system")
            .and_then(|t| t.render(&ctx))
            .map_err(|e| MutationServiceError::Prompt(format!("system render failed: {e}")))?;
        let user = self
            .env
            .get_template("mutation")
            .and_then(|t| t.render(&ctx))
            .map_err(|e| MutationServiceError::Prompt(format!("mutation render failed: {e}")))?;
        Ok(RenderedPrompt {
            system: system.trim().to_owned(),
            user: user.trim().to_owned(),
        })
    }
}

/// Adverb describing how hard to distort.
fn intensity(mutation_strength: f64) -> &'static str {
    if mutation_strength >= 0.75 {
        "heavily"
    } else if mutation_strength >= 0.4 {
        "noticeably"
    } else {
        "slightly"
    }
}

/// Read a template override, `None` if the file is absent.
fn load_template(dir: &Path, filename: &str) -> Result<Option<String>, MutatorError> {
    let path = dir.join(filename);
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(MutatorError::Template(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}
