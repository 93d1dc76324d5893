//! Configuration management for statusmail
//!
//! This module handles loading and validating configuration from environment
//! variables (optionally seeded from a `.env` file) and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::error::ConfigError;
use crate::utils::is_plausible_email;
use crate::utils::retry::RetryConfig;

/// Default Notion API base URL
pub const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com";

/// Notion API version sent with every request
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

/// Default SendGrid API base URL
pub const DEFAULT_SENDGRID_API_URL: &str = "https://api.sendgrid.com";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Notion database settings
    pub notion: NotionConfig,

    /// Email delivery settings
    pub email: EmailConfig,

    /// Polling loop settings
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Notion API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    /// Integration token
    pub api_key: String,

    /// Database to watch
    pub database_id: String,

    /// API base URL
    #[serde(default = "default_notion_api_url")]
    pub api_url: String,

    /// `Notion-Version` header value
    #[serde(default = "default_notion_version")]
    pub version: String,

    /// Name of the title property
    #[serde(default = "default_title_property")]
    pub title_property: String,

    /// Name of the select property holding the status
    #[serde(default = "default_status_property")]
    pub status_property: String,

    /// Maximum query requests per second
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
}

/// Email delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SendGrid API key
    pub api_key: String,

    /// Notification recipient
    pub to: String,

    /// Notification sender
    pub from: String,

    /// API base URL
    #[serde(default = "default_sendgrid_api_url")]
    pub api_url: String,
}

/// Polling loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Delay between the end of one cycle and the start of the next
    pub poll_interval_ms: u64,

    /// Timeout applied to every HTTP request
    pub request_timeout_secs: u64,

    /// Retry policy for snapshot fetches
    pub fetch_retry: RetryConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

fn default_notion_api_url() -> String {
    DEFAULT_NOTION_API_URL.to_string()
}

fn default_notion_version() -> String {
    DEFAULT_NOTION_VERSION.to_string()
}

fn default_title_property() -> String {
    String::from("Name")
}

fn default_status_property() -> String {
    String::from("Status")
}

fn default_rate_limit() -> u32 {
    3
}

fn default_sendgrid_api_url() -> String {
    DEFAULT_SENDGRID_API_URL.to_string()
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            request_timeout_secs: 30,
            fetch_retry: RetryConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl NotionConfig {
    /// Create a configuration with default endpoint and property names
    pub fn new(api_key: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            database_id: database_id.into(),
            api_url: default_notion_api_url(),
            version: default_notion_version(),
            title_property: default_title_property(),
            status_property: default_status_property(),
            rate_limit: default_rate_limit(),
        }
    }
}

impl EmailConfig {
    /// Create a configuration with the default endpoint
    pub fn new(
        api_key: impl Into<String>,
        to: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            to: to.into(),
            from: from.into(),
            api_url: default_sendgrid_api_url(),
        }
    }
}

fn required(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name.to_string()).into()),
    }
}

fn parsed_or<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    let Ok(value) = std::env::var(name) else {
        return default;
    };

    match value.trim().parse::<T>() {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::warn!(
                variable = name,
                value = %value,
                default = %default,
                "Ignoring unparseable setting, using default"
            );
            default
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// A `.env` file in the working directory is loaded first when present;
    /// variables already set in the process environment take precedence.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenv::dotenv() {
            if !e.not_found() {
                return Err(e).context("Failed to load .env file");
            }
        }

        Self::from_process_env()
    }

    /// Load configuration from the process environment only
    pub fn from_process_env() -> Result<Self> {
        let notion = NotionConfig {
            api_key: required("NOTION_KEY")?,
            database_id: required("NOTION_DATABASE_ID")?,
            api_url: std::env::var("NOTION_API_URL").unwrap_or_else(|_| default_notion_api_url()),
            version: std::env::var("NOTION_VERSION").unwrap_or_else(|_| default_notion_version()),
            title_property: std::env::var("NOTION_TITLE_PROPERTY")
                .unwrap_or_else(|_| default_title_property()),
            status_property: std::env::var("NOTION_STATUS_PROPERTY")
                .unwrap_or_else(|_| default_status_property()),
            rate_limit: parsed_or("NOTION_RATE_LIMIT", default_rate_limit()),
        };

        let email = EmailConfig {
            api_key: required("SENDGRID_KEY")?,
            to: required("EMAIL_TO_FIELD")?,
            from: required("EMAIL_FROM_FIELD")?,
            api_url: std::env::var("SENDGRID_API_URL")
                .unwrap_or_else(|_| default_sendgrid_api_url()),
        };

        let defaults = WatcherConfig::default();
        let watcher = WatcherConfig {
            poll_interval_ms: parsed_or("STATUSMAIL_POLL_INTERVAL_MS", defaults.poll_interval_ms),
            request_timeout_secs: parsed_or(
                "STATUSMAIL_REQUEST_TIMEOUT",
                defaults.request_timeout_secs,
            ),
            fetch_retry: RetryConfig {
                max_retries: parsed_or(
                    "STATUSMAIL_FETCH_MAX_RETRIES",
                    defaults.fetch_retry.max_retries,
                ),
                ..defaults.fetch_retry
            },
        };

        let logging = LoggingConfig {
            level: std::env::var("STATUSMAIL_LOG_LEVEL").unwrap_or_else(|_| String::from("info")),
            format: std::env::var("STATUSMAIL_LOG_FORMAT")
                .unwrap_or_else(|_| String::from("text")),
        };

        Ok(Self {
            notion,
            email,
            watcher,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_empty = [
            ("notion.api_key", &self.notion.api_key),
            ("notion.database_id", &self.notion.database_id),
            ("notion.title_property", &self.notion.title_property),
            ("notion.status_property", &self.notion.status_property),
            ("email.api_key", &self.email.api_key),
        ];
        for (field, value) in non_empty {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(field.to_string()));
            }
        }

        for (field, url) in [
            ("notion.api_url", &self.notion.api_url),
            ("email.api_url", &self.email.api_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::invalid(
                    field,
                    "must start with http:// or https://",
                ));
            }
        }

        for (field, address) in [("email.to", &self.email.to), ("email.from", &self.email.from)] {
            if !is_plausible_email(address) {
                return Err(ConfigError::invalid(
                    field,
                    format!("'{address}' is not an email address"),
                ));
            }
        }

        if self.notion.rate_limit == 0 {
            return Err(ConfigError::invalid(
                "notion.rate_limit",
                "must be greater than 0",
            ));
        }

        if self.watcher.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "watcher.poll_interval_ms",
                "must be greater than 0",
            ));
        }

        if self.watcher.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "watcher.request_timeout_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Get the poll interval as Duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.watcher.poll_interval_ms)
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.watcher.request_timeout_secs)
    }
}
