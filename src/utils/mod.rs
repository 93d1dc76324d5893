//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

/// Check that a string looks like a single email address
///
/// This is a shape check only (`local@domain.tld`), not RFC 5322 validation.
pub fn is_plausible_email(address: &str) -> bool {
    let address = address.trim();
    if address.chars().any(char::is_whitespace) {
        return false;
    }

    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Mask a secret for logging, keeping only the last four characters
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }

    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{tail}", "*".repeat(count - 4))
}
