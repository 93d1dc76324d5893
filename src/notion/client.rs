//! HTTP client for the Notion database query endpoint
//!
//! Features:
//! - Bearer authentication and `Notion-Version` header
//! - Rate limiting with governor (Notion allows roughly 3 requests per second)
//! - Cursor pagination folded into a single [`Snapshot`]
//! - Structured API errors decoded from the response body

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Response,
};
use std::num::NonZeroU32;
use std::time::Duration;

use super::types::{page_entry, ApiErrorBody, PropertyNames, QueryRequest, QueryResponse};
use super::SnapshotSource;
use crate::config::NotionConfig;
use crate::models::Snapshot;
use crate::utils::error::FetchError;

/// Client for querying a single Notion database
pub struct NotionClient {
    /// HTTP client with configured timeout and default headers
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Fully built query endpoint
    query_url: String,

    /// Properties read from each page
    properties: PropertyNames,
}

impl NotionClient {
    /// Create a new client
    ///
    /// # Arguments
    ///
    /// * `config` - Notion connection settings
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` for an unusable API key or base URL,
    /// and `FetchError::Http` if the HTTP client cannot be created
    pub fn new(config: &NotionConfig, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .default_headers(Self::build_headers(config)?)
            .build()?;

        let rate = NonZeroU32::new(config.rate_limit).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        let base = config.api_url.trim_end_matches('/');
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(FetchError::InvalidUrl(config.api_url.clone()));
        }

        Ok(Self {
            client,
            rate_limiter,
            query_url: format!("{base}/v1/databases/{}/query", config.database_id),
            properties: PropertyNames::from(config),
        })
    }

    /// The endpoint this client queries
    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    /// Build headers sent with every request
    fn build_headers(config: &NotionConfig) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| FetchError::InvalidUrl("API key is not a valid header value".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let version = HeaderValue::from_str(&config.version).map_err(|_| {
            FetchError::InvalidUrl(format!("invalid Notion-Version '{}'", config.version))
        })?;
        headers.insert("Notion-Version", version);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    /// Query one page of the database
    ///
    /// # Arguments
    ///
    /// * `cursor` - Continuation cursor from the previous page, `None` for the first
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Api` for non-success responses, `FetchError::Timeout`
    /// or `FetchError::Http` for transport failures, and `FetchError::Decode`
    /// when the body is not a query result
    pub async fn query_database(&self, cursor: Option<&str>) -> Result<QueryResponse, FetchError> {
        self.rate_limiter.until_ready().await;

        let body = QueryRequest {
            start_cursor: cursor.map(str::to_owned),
        };

        tracing::debug!(url = %self.query_url, cursor = ?cursor, "Querying database");

        let response = self
            .client
            .post(&self.query_url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Convert a non-success response into `FetchError::Api`
    async fn api_error(response: Response) -> FetchError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();

        match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => FetchError::Api {
                status,
                code: body.code,
                message: body.message,
            },
            Err(_) => FetchError::Api {
                status,
                code: String::from("unknown"),
                message: text,
            },
        }
    }

    /// Fetch every record in the database, following pagination cursors
    ///
    /// Records from all pages are merged into one snapshot keyed by page id.
    ///
    /// # Errors
    ///
    /// Any failed page aborts the whole fetch; partial results are discarded
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        let mut snapshot = Snapshot::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let response = self.query_database(cursor.as_deref()).await?;
            pages += 1;

            snapshot.extend(
                response
                    .results
                    .iter()
                    .map(|page| (page.id.clone(), page_entry(page, &self.properties))),
            );

            match (response.has_more, response.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                (true, None) => {
                    tracing::warn!(
                        pages = pages,
                        "Response reported more pages without a cursor, stopping"
                    );
                    break;
                }
                (false, _) => break,
            }
        }

        tracing::debug!(pages = pages, records = snapshot.len(), "Fetched snapshot");
        Ok(snapshot)
    }
}

#[async_trait]
impl SnapshotSource for NotionClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        NotionClient::fetch_snapshot(self).await
    }
}

/// Map a reqwest failure, separating timeouts out
fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Http(e)
    }
}
