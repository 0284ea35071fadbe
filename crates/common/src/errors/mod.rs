//! Error types for Open Synthesis services
//!
//! Provides a single error enum shared by retrieval, orchestration and the
//! HTTP surface with:
//! - Distinct variants for each failure mode of the synthesis core
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Maximum number of characters of an upstream body kept in an error
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    ContextTooLarge,

    // Resource errors (4xxx)
    DomainNotFound,

    // Admission (6xxx)
    Busy,

    // External service errors (8xxx)
    BackendError,
    UpstreamError,
    VectorStoreError,
    SourceError,

    // Model output errors (85xx)
    OutlineParseError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::ContextTooLarge => 1004,

            ErrorCode::DomainNotFound => 4001,

            ErrorCode::Busy => 6001,

            ErrorCode::BackendError => 8001,
            ErrorCode::UpstreamError => 8002,
            ErrorCode::VectorStoreError => 8003,
            ErrorCode::SourceError => 8004,

            ErrorCode::OutlineParseError => 8501,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Retrieval target collection is absent
    #[error("Domain '{domain}' not found or empty")]
    DomainNotFound { domain: String },

    /// The prompt leaves less than the minimum output budget
    #[error(
        "Prompt too large: ~{estimated_tokens} input tokens leaves {remaining} of {context_limit} \
         context tokens (minimum {minimum})"
    )]
    ContextTooLarge {
        estimated_tokens: usize,
        context_limit: usize,
        remaining: usize,
        minimum: usize,
    },

    /// The single generation slot is already held
    #[error("Server busy: another generation request is in progress")]
    Busy,

    /// Inference endpoint returned a non-success status
    #[error("Inference backend error {status}: {body}")]
    Backend { status: u16, body: String },

    /// Outline output had no parseable `SECTION:` lines
    #[error("Failed to parse outline from model output. Raw output:\n{raw}")]
    OutlineParse { raw: String },

    #[error("Vector store error: {message}")]
    VectorStore { message: String },

    #[error("Data source '{source_name}' failed: {message}")]
    Source { source_name: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Build a backend error, truncating the upstream body
    pub fn backend(status: u16, body: impl AsRef<str>) -> Self {
        AppError::Backend {
            status,
            body: truncate_chars(body.as_ref(), MAX_ERROR_BODY_CHARS),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::DomainNotFound { .. } => ErrorCode::DomainNotFound,
            AppError::ContextTooLarge { .. } => ErrorCode::ContextTooLarge,
            AppError::Busy => ErrorCode::Busy,
            AppError::Backend { .. } => ErrorCode::BackendError,
            AppError::OutlineParse { .. } => ErrorCode::OutlineParseError,
            AppError::VectorStore { .. } => ErrorCode::VectorStoreError,
            AppError::Source { .. } => ErrorCode::SourceError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::DomainNotFound { .. } => StatusCode::NOT_FOUND,

            // 413 Payload Too Large
            AppError::ContextTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 429 Too Many Requests
            AppError::Busy => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::OutlineParse { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Backend { .. }
            | AppError::VectorStore { .. }
            | AppError::Source { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
