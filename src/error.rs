//! Unified error handling for the statusmail crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`StatusmailErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors

use thiserror::Error;

pub use crate::notifications::channels::ChannelError;
pub use crate::utils::error::{ConfigError, FetchError};

/// Common trait for all statusmail error types
pub trait StatusmailErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, rate limit)
    Network,
    /// Response decoding errors
    Parsing,
    /// Notification delivery errors
    Delivery,
    /// Configuration and validation errors
    Config,
}

impl ErrorCategory {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Delivery => "delivery",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for the statusmail crate
#[derive(Error, Debug)]
pub enum Error {
    /// Snapshot fetch errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Notification channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl StatusmailErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Channel(e) => e.is_recoverable(),
            Self::Config(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(FetchError::Decode(_)) => ErrorCategory::Parsing,
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Channel(_) => ErrorCategory::Delivery,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
