//! `OpenRouter` client (OpenAI-compatible chat completions).

use super::{
    GenerationRequest, LlmHttpConfig, LlmProvider, TokenStream, build_http_client,
    is_usable_api_key,
};
use crate::GenerationError;
use crate::config::{DEFAULT_BASE_URL, DEFAULT_MODEL, LlmConfig};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::time::Instant;
use tracing::instrument;

/// `OpenRouter` completion client.
pub struct OpenRouterClient {
    /// API key.
    api_key: Option<SecretString>,
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl OpenRouterClient {
    /// Creates a client with default endpoint and model and no credential.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: build_http_client(LlmHttpConfig::default()),
        }
    }

    /// Creates a client from completion settings.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            endpoint: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client: build_http_client(LlmHttpConfig::from_config(config)),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the key, or `MissingCredential` if none is usable.
    fn credential(&self) -> Result<&str, GenerationError> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .filter(|key| is_usable_api_key(key))
            .ok_or(GenerationError::MissingCredential)
    }

    fn body<'a>(&'a self, request: &'a GenerationRequest, stream: bool) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                OutgoingMessage {
                    role: "system",
                    content: request.system.clone(),
                },
                OutgoingMessage {
                    role: "user",
                    content: request.user_message(),
                },
            ],
            stream,
        }
    }

    /// Posts a chat completion request and checks the status.
    fn send(
        &self,
        request: &GenerationRequest,
        stream: bool,
    ) -> Result<reqwest::blocking::Response, GenerationError> {
        let api_key = self.credential()?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&self.body(request, stream))
            .send()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }
        Ok(response)
    }
}

impl Default for OpenRouterClient {
    fn default() -> Self {
        Self::new()
    }
}

fn record_request(start: Instant, status: &'static str) {
    metrics::counter!("llm_requests_total", "status" => status).increment(1);
    metrics::histogram!("llm_request_duration_ms", "status" => status)
        .record(start.elapsed().as_secs_f64() * 1000.0);
}

impl LlmProvider for OpenRouterClient {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: String) {
        tracing::info!(model = %model, "Switching completion model");
        self.model = model;
    }

    fn set_api_key(&mut self, api_key: Option<SecretString>) {
        self.api_key = api_key;
    }

    fn has_credential(&self) -> bool {
        self.credential().is_ok()
    }

    #[instrument(name = "anima.llm.generate", skip(self, request), fields(component = "llm", operation = "generate", model = %self.model))]
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let start = Instant::now();
        let result = self.send(request, false).and_then(|response| {
            let parsed: ChatCompletionResponse = response
                .json()
                .map_err(|e| GenerationError::Response(e.to_string()))?;
            parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content.unwrap_or_default())
                .ok_or_else(|| GenerationError::Response("No choices in response".to_string()))
        });

        match &result {
            Ok(_) => record_request(start, "success"),
            Err(e) => {
                tracing::warn!(error = %e, "Completion request failed");
                record_request(start, "error");
            },
        }
        result
    }

    #[instrument(name = "anima.llm.generate_stream", skip(self, request), fields(component = "llm", operation = "generate_stream", model = %self.model))]
    fn generate_stream(&self, request: &GenerationRequest) -> Result<TokenStream, GenerationError> {
        let start = Instant::now();
        match self.send(request, true) {
            Ok(response) => {
                record_request(start, "success");
                Ok(Box::new(SseFragments::new(std::io::BufReader::new(response))))
            },
            Err(e) => {
                tracing::warn!(error = %e, "Streaming completion request failed");
                record_request(start, "error");
                Err(e)
            },
        }
    }
}

/// Decodes a server-sent-events body into content fragments.
///
/// Comment lines and events without content are skipped. Iteration ends at
/// `data: [DONE]` or after the first error. A body that ends before
/// `[DONE]` yields a final transport error.
pub struct SseFragments<R> {
    reader: R,
    line: String,
    finished: bool,
}

impl<R: BufRead> SseFragments<R> {
    /// Wraps a buffered reader over an SSE body.
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            finished: false,
        }
    }

    fn fail(&mut self, error: GenerationError) -> Option<Result<String, GenerationError>> {
        self.finished = true;
        Some(Err(error))
    }
}

impl<R: BufRead> Iterator for SseFragments<R> {
    type Item = Result<String, GenerationError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => {
                    return self.fail(GenerationError::Transport(
                        "stream ended before [DONE]".to_string(),
                    ));
                },
                Ok(_) => {},
                Err(e) => return self.fail(GenerationError::Transport(e.to_string())),
            }

            let Some(data) = self.line.trim().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                self.finished = true;
                return None;
            }
            if data.is_empty() {
                continue;
            }

            let chunk: StreamChunk = match serde_json::from_str(data) {
                Ok(chunk) => chunk,
                Err(e) => return self.fail(GenerationError::Response(e.to_string())),
            };
            if let Some(error) = chunk.error {
                return self.fail(GenerationError::Transport(error.message));
            }
            let content = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .filter(|content| !content.is_empty());
            if let Some(content) = content {
                return Some(Ok(content));
            }
        }
        None
    }
}

/// Request to the Chat Completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<OutgoingMessage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage {
    role: &'static str,
    content: String,
}

/// Response from the Chat Completions API.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// One SSE event payload.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}
