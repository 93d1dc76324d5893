//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use statusmail::config::EmailConfig;
use statusmail::models::{Snapshot, SnapshotEntry};
use statusmail::notifications::{Channel, ChannelError, ChannelResult, DeliveryStatus, Notification};
use statusmail::notion::SnapshotSource;
use statusmail::utils::error::FetchError;

/// Email settings used across tests
pub fn email_config() -> EmailConfig {
    EmailConfig::new("SG.test-key", "team@example.com", "bot@example.com")
}

/// A Notion page object with a plain-text title and a select status
pub fn page_json(id: &str, title: &str, status: Option<&str>) -> Value {
    let select = status.map(|name| json!({ "id": format!("opt-{name}"), "name": name, "color": "blue" }));
    json!({
        "object": "page",
        "id": id,
        "properties": {
            "Name": {
                "id": "title",
                "type": "title",
                "title": [{
                    "type": "text",
                    "text": { "content": title, "link": null },
                    "plain_text": title,
                    "href": null
                }]
            },
            "Status": {
                "id": "%3AStatus",
                "type": "select",
                "select": select
            }
        }
    })
}

/// A query response page
pub fn query_response(pages: Vec<Value>, next_cursor: Option<&str>) -> Value {
    json!({
        "object": "list",
        "results": pages,
        "has_more": next_cursor.is_some(),
        "next_cursor": next_cursor,
        "type": "page_or_database"
    })
}

/// Build a snapshot from `(id, status, title)` triples
pub fn snapshot(entries: &[(&str, &str, &str)]) -> Snapshot {
    entries
        .iter()
        .map(|(id, status, title)| (*id, SnapshotEntry::new(*status, Some(title.to_string()))))
        .collect()
}

/// Snapshot source that replays a fixed script of fetch results
///
/// Once the script is exhausted the last successful snapshot is repeated.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Snapshot, FetchError>>>,
    last: Mutex<Snapshot>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Snapshot, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(Snapshot::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(snapshot)) => {
                *self.last.lock().unwrap() = snapshot.clone();
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

/// Channel that records every notification it is asked to send
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: bool,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn bodies(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.body.clone())
            .collect()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> ChannelResult<DeliveryStatus> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail {
            return Err(ChannelError::Rejected {
                status: 401,
                body: "unauthorized".to_string(),
            });
        }
        Ok(DeliveryStatus::success(self.name()))
    }
}
