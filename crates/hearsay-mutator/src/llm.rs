//! LLM backends for generative content mutation.
//!
//! Enum dispatch over an OpenAI-compatible chat completions API and the
//! Anthropic Messages API, both over `reqwest`. The backend sends a
//! rendered [`RenderedPrompt`] and returns the first text block.

use hearsay_core::{MutatorBackendKind, MutatorConfig};
use hearsay_rumor::MutationServiceError;

use crate::error::MutatorError;
use crate::prompt::RenderedPrompt;

/// Upper bound on generated tokens; a retold rumor is a sentence or two.
const MAX_TOKENS: u32 = 256;

/// An LLM backend that turns a prompt into a rewritten rumor.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Build the backend selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError::Config`] if `config` selects the local
    /// backend or leaves `api_url`, `model` or `api_key` empty.
    pub fn from_config(config: &MutatorConfig) -> Result<Self, MutatorError> {
        match config.backend {
            MutatorBackendKind::OpenAi => Ok(Self::OpenAi(OpenAiBackend(
                Connection::from_config(config)?,
            ))),
            MutatorBackendKind::Anthropic => Ok(Self::Anthropic(AnthropicBackend(
                Connection::from_config(config)?,
            ))),
            MutatorBackendKind::Local => Err(MutatorError::Config(String::from(
                "the local backend does not use an LLM",
            ))),
        }
    }

    /// Send a prompt and return the response text.
    ///
    /// # Errors
    ///
    /// Returns [`MutationServiceError::Request`] if the call fails, or
    /// [`MutationServiceError::InvalidResponse`] if no text can be extracted.
    pub async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, MutationServiceError> {
        match self {
            Self::OpenAi(backend) => backend.complete(prompt).await,
            Self::Anthropic(backend) => backend.complete(prompt).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

/// Shared HTTP settings for both backends.
struct Connection {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f64,
}

impl Connection {
    fn from_config(config: &MutatorConfig) -> Result<Self, MutatorError> {
        for (field, value) in [
            ("mutator.api_url", &config.api_url),
            ("mutator.model", &config.model),
            ("mutator.api_key", &config.api_key),
        ] {
            if value.trim().is_empty() {
                return Err(MutatorError::Config(format!(
                    "{field} must be set for the {:?} backend",
                    config.backend
                )));
            }
        }
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// POST `body` to `url` with `headers` and parse the JSON reply.
    async fn post_json(
        &self,
        provider: &str,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, MutationServiceError> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| MutationServiceError::Request(format!("{provider} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(MutationServiceError::Request(format!(
                "{provider} returned {status}: {error_body}"
            )));
        }

        response.json().await.map_err(|e| {
            MutationServiceError::InvalidResponse(format!("{provider} response parse failed: {e}"))
        })
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Sends requests to `{api_url}/chat/completions`.
pub struct OpenAiBackend(Connection);

impl OpenAiBackend {
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, MutationServiceError> {
        let conn = &self.0;
        let url = format!("{}/chat/completions", conn.api_url);
        let body = serde_json::json!({
            "model": conn.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": conn.temperature,
            "max_tokens": MAX_TOKENS,
        });
        let bearer = format!("Bearer {}", conn.api_key);
        let json = conn
            .post_json("OpenAI", &url, &[("Authorization", bearer.as_str())], &body)
            .await?;
        extract_openai_content(&json).map(clean_variant)
    }
}

/// Extract the text content from an `OpenAI` chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String, MutationServiceError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            MutationServiceError::InvalidResponse(
                "OpenAI response missing choices[0].message.content".to_owned(),
            )
        })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// The system prompt is a top-level field, authentication uses `x-api-key`
/// and the reply text lives in `content[0].text`.
pub struct AnthropicBackend(Connection);

impl AnthropicBackend {
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, MutationServiceError> {
        let conn = &self.0;
        let url = format!("{}/messages", conn.api_url);
        let body = serde_json::json!({
            "model": conn.model,
            "max_tokens": MAX_TOKENS,
            "temperature": conn.temperature.clamp(0.0, 1.0),
            "system": prompt.system,
            "messages": [
                {"role": "user", "content": prompt.user}
            ]
        });
        let json = conn
            .post_json(
                "Anthropic",
                &url,
                &[
                    ("x-api-key", conn.api_key.as_str()),
                    ("anthropic-version", "2023-06-01"),
                ],
                &body,
            )
            .await?;
        extract_anthropic_content(&json).map(clean_variant)
    }
}

/// Extract the text content from an Anthropic Messages API response.
fn extract_anthropic_content(json: &serde_json::Value) -> Result<String, MutationServiceError> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            MutationServiceError::InvalidResponse(
                "Anthropic response missing content[0].text".to_owned(),
            )
        })
}

/// Trim whitespace and one pair of wrapping quotes.
fn clean_variant(text: String) -> String {
    let trimmed = text.trim();
    let unquoted = ['"', '\'', '\u{201c}']
        .iter()
        .find_map(|open| {
            let close = if *open == '\u{201c}' { '\u{201d}' } else { *open };
            trimmed
                .strip_prefix(*open)
                .and_then(|rest| rest.strip_suffix(close))
        })
        .unwrap_or(trimmed);
    unquoted.trim().to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn llm_config(backend: MutatorBackendKind) -> MutatorConfig {
        MutatorConfig {
            backend,
            api_url: String::from("http://localhost:9/v1/"),
            model: String::from("test-model"),
            api_key: String::from("sk-test"),
            ..MutatorConfig::default()
        }
    }

    #[test]
    fn extract_openai_content_valid() {
        let json = serde_json::json!({
            "choices": [{ "message": { "content": "They say the mayor fled." } }]
        });
        assert_eq!(extract_openai_content(&json).unwrap(), "They say the mayor fled.");
    }

    #[test]
    fn extract_openai_content_missing() {
        let json = serde_json::json!({ "choices": [] });
        assert!(matches!(
            extract_openai_content(&json),
            Err(MutationServiceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn extract_anthropic_content_valid() {
        let json = serde_json::json!({
            "content": [{ "type": "text", "text": "The mayor fled, or so I heard." }]
        });
        assert_eq!(
            extract_anthropic_content(&json).unwrap(),
            "The mayor fled, or so I heard."
        );
    }

    #[test]
    fn extract_anthropic_content_missing() {
        let json = serde_json::json!({ "id": "msg_1" });
        assert!(extract_anthropic_content(&json).is_err());
    }

    #[test]
    fn clean_variant_strips_quotes() {
        assert_eq!(clean_variant(String::from("  \"Wolves!\"\n")), "Wolves!");
        assert_eq!(clean_variant(String::from("\u{201c}Wolves!\u{201d}")), "Wolves!");
        assert_eq!(clean_variant(String::from("'Tis true")), "'Tis true");
    }

    #[test]
    fn from_config_selects_backend() {
        let openai = LlmBackend::from_config(&llm_config(MutatorBackendKind::OpenAi)).unwrap();
        assert_eq!(openai.name(), "openai-compatible");
        let anthropic = LlmBackend::from_config(&llm_config(MutatorBackendKind::Anthropic)).unwrap();
        assert_eq!(anthropic.name(), "anthropic");
        if let LlmBackend::OpenAi(OpenAiBackend(conn)) = openai {
            assert_eq!(conn.api_url, "http://localhost:9/v1");
        }
    }

    #[test]
    fn from_config_requires_credentials() {
        let mut config = llm_config(MutatorBackendKind::OpenAi);
        config.api_key.clear();
        assert!(matches!(
            LlmBackend::from_config(&config),
            Err(MutatorError::Config(_))
        ));
        assert!(matches!(
            LlmBackend::from_config(&llm_config(MutatorBackendKind::Local)),
            Err(MutatorError::Config(_))
        ));
    }
}
