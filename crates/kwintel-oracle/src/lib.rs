//! Text-generation oracle boundary for keyword classification.
//!
//! Provides the [`Oracle`] trait, a Gemini `generateContent` client, the
//! retry policy shared by every oracle caller, and best-effort recovery of
//! JSON payloads from free-form model output.

pub mod client;
pub mod error;
pub mod json_extract;
pub mod retry;
pub mod types;

use std::future::Future;

pub use client::GeminiClient;
pub use error::OracleError;
pub use json_extract::extract_json;
pub use retry::{RetryDecision, RetryPolicy};

/// A text-in, text-out model endpoint.
///
/// Implementations return the raw response text; callers own parsing.
pub trait Oracle {
    /// Model identifier, recorded in report metadata.
    fn model(&self) -> &str;

    /// Send one prompt and return the model's text answer.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, OracleError>> + Send;
}
