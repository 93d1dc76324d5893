//! Snapshot fetching from a Notion database
//!
//! [`NotionClient`] pages through `POST /v1/databases/{id}/query` and folds
//! every record into a [`Snapshot`]. The watcher only depends on the
//! [`SnapshotSource`] trait so it can be driven by other sources in tests.

pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::models::Snapshot;
use crate::utils::error::FetchError;

pub use client::NotionClient;
pub use types::{page_entry, Page, PropertyNames, PropertyValue, QueryRequest, QueryResponse};

/// A source of complete database snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch every record currently in the source
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError>;
}

#[async_trait]
impl<T: SnapshotSource + ?Sized> SnapshotSource for std::sync::Arc<T> {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        (**self).fetch_snapshot().await
    }
}
