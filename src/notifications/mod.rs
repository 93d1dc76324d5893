//! Status change notifications
//!
//! Each detected [`StatusChange`] becomes one [`Notification`], an email
//! addressed with the configured recipient and sender. Notifications are
//! handed to a [`NotificationDispatcher`], which sends each one on its own
//! task through a [`Channel`] so a slow or failing delivery never holds up the
//! polling loop.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  StatusChange  ┌────────────────────────┐
//! │ Watcher  │ ─────────────▶ │ NotificationDispatcher │
//! └──────────┘                │  - one task per email  │
//!                             │  - outcome counters    │
//!                             └───────────┬────────────┘
//!                                         ▼
//!                                  ┌─────────────┐
//!                                  │  SendGrid   │
//!                                  │  Channel    │
//!                                  └─────────────┘
//! ```

pub mod channels;
mod dispatcher;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EmailConfig;
use crate::models::{StatusChange, NO_STATUS};

// Re-exports
pub use channels::sendgrid::SendGridChannel;
pub use channels::{Channel, ChannelError, ChannelResult, DeliveryStatus};
pub use dispatcher::{DispatchStats, NotificationDispatcher};

/// Subject line of every status change email
pub const STATUS_CHANGED_SUBJECT: &str = "Notion Task Status Updated";

/// Placeholder used in the body when a record has no plain-text title
pub const UNTITLED: &str = "Untitled";

/// A single outbound email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique notification identifier, used to correlate log lines
    pub id: String,
    /// Page the notification is about
    pub record_id: String,
    /// Recipient address
    pub to: String,
    /// Sender address
    pub from: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
    /// When the notification was created
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Build the email announcing a status change
    ///
    /// A change without a plain-text title is rendered with [`UNTITLED`].
    pub fn status_changed(email: &EmailConfig, change: &StatusChange) -> Self {
        let title = change.title.as_deref().unwrap_or(UNTITLED);
        let status = change.current.as_deref().unwrap_or(NO_STATUS);

        Self {
            id: Uuid::new_v4().to_string(),
            record_id: change.id.clone(),
            to: email.to.clone(),
            from: email.from.clone(),
            subject: STATUS_CHANGED_SUBJECT.to_string(),
            body: format!("A Notion task's: {title} status has been updated to {status}."),
            created_at: Utc::now(),
        }
    }
}
