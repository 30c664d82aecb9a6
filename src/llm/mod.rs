//! Generative completion abstraction.
//!
//! The memory manager talks to a completion service only through
//! [`LlmProvider`]. [`OpenRouterClient`] implements it over the
//! OpenAI-compatible chat completions API.

mod openrouter;
pub mod system_prompt;

pub use openrouter::{OpenRouterClient, SseFragments};
pub use system_prompt::{REFLECTION_SYSTEM_PROMPT, build_reflection_prompt};

use crate::GenerationError;
use crate::config::LlmConfig;
use secrecy::SecretString;
use std::time::Duration;

/// Placeholder key shipped in sample `.env` files.
pub const PLACEHOLDER_API_KEY: &str = "sk-or-v1-your-key-here";

/// A lazily pulled sequence of response fragments.
///
/// The sequence ends after the first `Err`.
pub type TokenStream = Box<dyn Iterator<Item = Result<String, GenerationError>> + Send>;

/// One completion request: a system prompt, the user's text and retrieved context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    /// System prompt.
    pub system: String,
    /// The user's message.
    pub user: String,
    /// Retrieved context, possibly empty.
    pub context: String,
}

impl GenerationRequest {
    /// Creates a request with empty context.
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            context: String::new(),
        }
    }

    /// Sets the retrieved context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// The user-role message sent to the model.
    #[must_use]
    pub fn user_message(&self) -> String {
        format!("Context:\n{}\n\nUser: {}", self.context, self.user)
    }
}

/// Trait for completion providers.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// The model currently in use.
    fn model(&self) -> &str;

    /// Switches the model for subsequent requests.
    fn set_model(&mut self, model: String);

    /// Replaces the credential for subsequent requests.
    fn set_api_key(&mut self, api_key: Option<SecretString>);

    /// Returns true if a usable credential is configured.
    fn has_credential(&self) -> bool;

    /// Generates a complete response.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::MissingCredential`] before any I/O when no
    /// usable key is configured, or another variant if the call fails.
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Generates a response as a stream of fragments.
    ///
    /// The default implementation yields the whole response as one fragment.
    ///
    /// # Errors
    ///
    /// Same as [`LlmProvider::generate`] for failures before the first fragment.
    fn generate_stream(&self, request: &GenerationRequest) -> Result<TokenStream, GenerationError> {
        let text = self.generate(request)?;
        Ok(Box::new(std::iter::once(Ok(text))))
    }
}

/// Returns true if `key` looks like a real credential.
///
/// Empty keys, `"dummy"` and the sample placeholder are rejected.
#[must_use]
pub fn is_usable_api_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key != "dummy" && key != PLACEHOLDER_API_KEY
}

/// HTTP client configuration for completion providers.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

impl LlmHttpConfig {
    /// Takes the timeouts from the completion settings.
    #[must_use]
    pub const fn from_config(config: &LlmConfig) -> Self {
        Self {
            timeout_ms: config.timeout_ms,
            connect_timeout_ms: config.connect_timeout_ms,
        }
    }
}

/// Builds a blocking HTTP client for completion requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Extracts a JSON value from model output, handling markdown code fences.
#[must_use]
pub fn extract_json_from_response(response: &str) -> &str {
    let trimmed = response.trim();

    // ```json ... ```
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // ``` ... ``` with an optional language tag
    if let Some(start) = trimmed.find("```") {
        let content_start = start + 3;
        let after_marker = &trimmed[content_start..];
        let json_start = after_marker
            .find('{')
            .map_or(content_start, |pos| content_start + pos);
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Raw object surrounded by prose
    if let Some(start) = trimmed.find('{')
        && let Some(end) = trimmed.rfind('}')
        && end > start
    {
        return &trimmed[start..=end];
    }

    trimmed
}
