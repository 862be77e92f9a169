use std::time::Duration;

use thiserror::Error;

/// Failure of a single completion call, classified so callers can decide
/// whether another provider is worth trying.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AiError {
    /// Short machine-friendly label, used in logs and audit rows.
    pub fn kind(&self) -> &'static str {
        match self {
            AiError::Config(_) => "config",
            AiError::Timeout => "timeout",
            AiError::RateLimited { .. } => "rate_limit",
            AiError::Api { .. } => "api",
            AiError::Network(_) => "network",
            AiError::InvalidResponse(_) => "invalid_response",
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AiError::Timeout
        } else if e.is_decode() {
            AiError::InvalidResponse(e.to_string())
        } else {
            AiError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AiError {
    fn from(e: serde_json::Error) -> Self {
        AiError::InvalidResponse(e.to_string())
    }
}
