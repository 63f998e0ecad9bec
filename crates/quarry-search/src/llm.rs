use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use quarry_core::{LlmConfig, QuarryError};

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use quarry_search::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "Find functions that parse config files".into(),
/// };
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Convenience constructor for a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Convenience constructor for a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use quarry_search::llm::Role;
///
/// assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// Which backend the client talks to.
///
/// Both speak the same `/chat/completions` contract; the gateway-style
/// OpenRouter backend additionally supports a one-step model fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Direct OpenAI-compatible endpoint.
    OpenAi,
    /// OpenRouter gateway (many models behind one endpoint).
    OpenRouter,
}

impl ProviderKind {
    /// Map a configured provider name to a backend kind. Unknown names are
    /// treated as OpenAI-compatible.
    pub fn from_name(name: &str) -> Self {
        match name {
            "openrouter" => ProviderKind::OpenRouter,
            _ => ProviderKind::OpenAi,
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }
}

/// Per-request completion options.
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether to constrain the response to a JSON object.
    pub json_response: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            json_response: true,
        }
    }
}

/// Chat completions client over an OpenAI-compatible endpoint.
///
/// One client is constructed per call path or fan-out worker from
/// configuration and environment; clients and credentials are never shared
/// across workers.
///
/// # Examples
///
/// ```
/// use quarry_core::LlmConfig;
/// use quarry_search::llm::LlmClient;
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let client = LlmClient::from_config(&config).unwrap();
/// assert!(client.is_some());
/// ```
pub struct LlmClient {
    http: reqwest::Client,
    kind: ProviderKind,
    api_key: String,
    base_url: String,
    model: String,
    fallback_model: Option<String>,
}

impl LlmClient {
    /// Build a client from configuration.
    ///
    /// Returns `Ok(None)` when no API key can be resolved from the config or
    /// the provider's environment variables; the semantic tier is then
    /// disabled without error.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Provider`] if the HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>, QuarryError> {
        let Some(api_key) = config.resolve_api_key() else {
            return Ok(None);
        };

        let kind = ProviderKind::from_name(&config.provider);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| QuarryError::Provider(format!("failed to create HTTP client: {e}")))?;

        Ok(Some(Self {
            http,
            kind,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| kind.default_base_url().to_string()),
            model: config.model.clone(),
            fallback_model: config.fallback_model.clone(),
        }))
    }

    /// The primary model this client requests.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Which backend this client talks to.
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Send a chat completion request and return the assistant message text.
    ///
    /// On the OpenRouter backend, if the primary model's request errors and a
    /// fallback model is configured, the request is retried exactly once
    /// against the fallback before the failure is surfaced.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Provider`] on transport errors or non-success
    /// status, or [`QuarryError::ResponseParse`] when the response body does
    /// not have the expected `choices[0].message.content` shape.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String, QuarryError> {
        match self.request(&self.model, messages, options).await {
            Ok(content) => Ok(content),
            Err(err) => {
                let fallback = match (self.kind, &self.fallback_model) {
                    (ProviderKind::OpenRouter, Some(model)) => model,
                    _ => return Err(err),
                };
                warn!(
                    model = %self.model,
                    fallback = %fallback,
                    error = %err,
                    "primary model failed, retrying once with fallback"
                );
                self.request(fallback, messages, options).await
            }
        }
    }

    async fn request(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String, QuarryError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": options.temperature,
        });
        if options.json_response {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| QuarryError::Provider(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(QuarryError::Provider(format!(
                "API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QuarryError::ResponseParse(format!("non-JSON response body: {e}")))?;

        let content = response_body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                QuarryError::ResponseParse(format!(
                    "unexpected response structure: {response_body}"
                ))
            })?;

        Ok(content.to_string())
    }
}
