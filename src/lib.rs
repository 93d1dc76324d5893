//! statusmail - Notion task status change notifier
//!
//! Polls a Notion database on a fixed interval, detects status changes on its
//! records since the previous poll, and emails one notification per change.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration loading (environment, `.env`, TOML) and validation
//! - [`notion`] - Paginated database queries producing a [`Snapshot`]
//! - [`watcher`] - Snapshot diffing and the polling loop
//! - [`notifications`] - Email construction and detached delivery
//! - [`models`] - Core data structures and types
//! - [`error`] - Unified error type
//! - [`utils`] - Retry helper and small utilities
//!
//! # Example
//!
//! ```no_run
//! use statusmail::config::Config;
//! use statusmail::watcher::Watcher;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let mut watcher = Watcher::from_config(&config)?;
//!     let mut held = watcher.baseline().await?;
//!     watcher.run(&mut held).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod notifications;
pub mod notion;
pub mod utils;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, StatusmailErrorTrait};
    pub use crate::models::{CycleReport, Snapshot, SnapshotEntry, StatusChange, NO_STATUS};
    pub use crate::notifications::{Channel, Notification, NotificationDispatcher};
    pub use crate::notion::{NotionClient, SnapshotSource};
    pub use crate::watcher::{diff_snapshot, Watcher};
}

// Direct re-exports for convenience
pub use models::{CycleReport, Snapshot, SnapshotEntry, StatusChange};
