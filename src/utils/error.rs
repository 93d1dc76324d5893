//! Error types for the statusmail watcher
//!
//! This module defines custom error types used throughout the application.

use thiserror::Error;

/// Errors that can occur while querying the Notion API
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the API
    #[error("Notion API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Response body did not match the expected shape
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid request URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// HTTP status code, if the API answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if retrying the request could succeed
    ///
    /// Retry on:
    /// - 429 (rate limited)
    /// - 5xx
    /// - timeouts and transport failures
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Http(e) => !e.is_decode() && !e.is_builder(),
            Self::Timeout => true,
            Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

/// Configuration validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is unset or empty
    #[error("Missing required setting: {0}")]
    Missing(String),

    /// A setting has an unusable value
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    /// Create an invalid-value error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
