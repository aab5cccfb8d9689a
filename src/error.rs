//! Error types for email triage.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Provider {provider} quota exhausted: {reason}")]
    QuotaExceeded { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Sentiment model errors.
#[derive(Debug, thiserror::Error)]
pub enum SentimentError {
    #[error("Sentiment model {model} request failed: {reason}")]
    RequestFailed { model: String, reason: String },

    #[error("Sentiment model {model} rate limited")]
    RateLimited { model: String },

    #[error("Sentiment model {model} is still loading")]
    ModelLoading { model: String },

    #[error("Sentiment model {model} timed out after {timeout:?}")]
    Timeout { model: String, timeout: Duration },

    #[error("Invalid response from sentiment model {model}: {reason}")]
    InvalidResponse { model: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Upload text extraction errors.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Unsupported file format: {extension}. Use .txt, .pdf or .eml")]
    UnsupportedFormat { extension: String },

    #[error("Failed to read PDF: {0}")]
    Pdf(String),

    #[error("Failed to parse email message")]
    Email,

    #[error("File {file_name} contains no readable text")]
    Empty { file_name: String },
}
