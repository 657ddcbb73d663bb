use thiserror::Error;

/// Errors returned while talking to a text-generation oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Network, TLS or timeout failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The oracle answered with a non-2xx status.
    #[error("unexpected HTTP status {status} from oracle: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The oracle answered but produced no candidate text.
    #[error("oracle returned no candidate text")]
    EmptyResponse,

    /// No JSON array or object could be recovered from the answer.
    #[error("no JSON payload recoverable from {context} response: {excerpt}")]
    Format { context: String, excerpt: String },

    /// JSON was recovered but does not have the expected shape.
    #[error("unexpected {context} response shape: {reason}")]
    Schema { context: String, reason: String },

    /// Client construction failed; retrying cannot help.
    #[error("invalid oracle configuration: {0}")]
    InvalidConfig(String),
}

impl OracleError {
    /// Build a [`OracleError::Format`] keeping a short excerpt of the raw text.
    #[must_use]
    pub fn format(context: &str, raw: &str) -> Self {
        const EXCERPT_CHARS: usize = 120;
        let mut excerpt: String = raw.chars().take(EXCERPT_CHARS).collect();
        if raw.chars().count() > EXCERPT_CHARS {
            excerpt.push('…');
        }
        OracleError::Format {
            context: context.to_owned(),
            excerpt,
        }
    }

    #[must_use]
    pub fn schema(context: &str, reason: impl Into<String>) -> Self {
        OracleError::Schema {
            context: context.to_owned(),
            reason: reason.into(),
        }
    }
}
