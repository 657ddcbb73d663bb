//! HTTP client for the Gemini `generateContent` API.
//!
//! The API key travels in the `x-goog-api-key` header, never in the URL, so
//! request logs and error messages do not leak it.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::OracleError;
use crate::types::{GenerateContentRequest, GenerateContentResponse};
use crate::Oracle;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Longest error body kept in [`OracleError::UnexpectedStatus`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Client for a Gemini model.
///
/// Use [`GeminiClient::new`] for production or [`GeminiClient::with_base_url`]
/// to point at a mock server in tests.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    endpoint: Url,
}

impl GeminiClient {
    /// Creates a client pointed at the production Gemini API.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: &str,
        model: &str,
        temperature: f32,
        timeout_secs: u64,
    ) -> Result<Self, OracleError> {
        Self::with_base_url(api_key, model, temperature, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`OracleError::InvalidConfig`] if the key, model or URL is unusable.
    pub fn with_base_url(
        api_key: &str,
        model: &str,
        temperature: f32,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, OracleError> {
        if api_key.trim().is_empty() {
            return Err(OracleError::InvalidConfig("API key is empty".to_owned()));
        }
        if model.trim().is_empty() || model.contains('/') {
            return Err(OracleError::InvalidConfig(format!(
                "invalid model name '{model}'"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("kwintel/0.1 (keyword-journey)")
            .build()?;

        let endpoint = build_endpoint(base_url, model)?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            temperature,
            endpoint,
        })
    }

    /// Full `generateContent` URL for the configured model.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn request_text(&self, prompt: &str) -> Result<String, OracleError> {
        let body = GenerateContentRequest::json_prompt(prompt, self.temperature);

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(OracleError::UnexpectedStatus {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let envelope: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| OracleError::schema("generateContent envelope", e.to_string()))?;

        if let Some(reason) = envelope
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            tracing::debug!(
                model = %self.model,
                finish_reason = reason,
                "oracle candidate finished"
            );
        }

        envelope.first_text().ok_or(OracleError::EmptyResponse)
    }
}

impl Oracle for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, OracleError>> + Send {
        self.request_text(prompt)
    }
}

fn build_endpoint(base_url: &str, model: &str) -> Result<Url, OracleError> {
    let raw = format!(
        "{}/v1beta/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model.trim()
    );
    Url::parse(&raw)
        .map_err(|e| OracleError::InvalidConfig(format!("invalid base URL '{base_url}': {e}")))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
