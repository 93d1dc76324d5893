//! Wire types for the Notion database query endpoint
//!
//! Only the parts of the response the watcher reads are modelled. Property
//! kinds other than `title` and `select` (and rich text segments other than
//! plain `text`) deserialize to an `Other` variant instead of failing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::NotionConfig;
use crate::models::{SnapshotEntry, NO_STATUS};

/// Body of `POST /v1/databases/{id}/query`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Continuation cursor from the previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
}

/// One page of query results
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    /// Records on this page
    pub results: Vec<Page>,

    /// Whether another page follows
    #[serde(default)]
    pub has_more: bool,

    /// Cursor for the next page
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A database record
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    /// Stable page id
    pub id: String,

    /// Property values keyed by property name
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

/// A single property value
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    /// Title property
    Title { title: Vec<RichText> },

    /// Single-choice select property
    Select { select: Option<SelectOption> },

    /// Any other property kind
    #[serde(other)]
    Other,
}

/// Selected option of a select property
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectOption {
    pub name: String,
}

/// A rich text segment
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichText {
    /// Plain text segment
    Text { text: TextContent },

    /// Mentions, equations and other segment kinds
    #[serde(other)]
    Other,
}

/// Content of a plain text segment
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextContent {
    pub content: String,
}

/// Error body returned with non-success responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Names of the properties read from each page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNames {
    pub title: String,
    pub status: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            title: String::from("Name"),
            status: String::from("Status"),
        }
    }
}

impl From<&NotionConfig> for PropertyNames {
    fn from(config: &NotionConfig) -> Self {
        Self {
            title: config.title_property.clone(),
            status: config.status_property.clone(),
        }
    }
}

impl Page {
    /// Title text: the first segment of a title property, if it is plain text
    pub fn title(&self, property: &str) -> Option<String> {
        match self.properties.get(property)? {
            PropertyValue::Title { title } => match title.first()? {
                RichText::Text { text } => Some(text.content.clone()),
                RichText::Other => None,
            },
            _ => None,
        }
    }

    /// Status label, falling back to [`NO_STATUS`] when the property is
    /// missing, empty, or not a select
    pub fn status(&self, property: &str) -> String {
        match self.properties.get(property) {
            Some(PropertyValue::Select {
                select: Some(option),
            }) => option.name.clone(),
            _ => NO_STATUS.to_string(),
        }
    }
}

/// Extract the snapshot entry for a page
///
/// Every page yields an entry. A page whose title property is missing or of
/// another kind is still tracked by status, with no title, rather than being
/// skipped.
pub fn page_entry(page: &Page, names: &PropertyNames) -> SnapshotEntry {
    SnapshotEntry {
        status: Some(page.status(&names.status)),
        title: page.title(&names.title),
    }
}
