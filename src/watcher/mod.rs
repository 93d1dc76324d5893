//! Change detection and the polling loop
//!
//! The [`Watcher`] does not own the held snapshot. Callers take a baseline
//! with [`Watcher::baseline`] and pass `&mut Snapshot` into every cycle, so the
//! lifetime of the comparison state is explicit:
//!
//! ```text
//! baseline ──▶ cycle ──▶ sleep(interval) ──▶ cycle ──▶ sleep ──▶ ...
//!               │
//!               ├─ fetch full snapshot (retried on transient errors)
//!               ├─ diff against held snapshot, mutating it
//!               └─ dispatch one email per status change (not awaited)
//! ```
//!
//! The next cycle is armed only after the current one has finished, so cycles
//! never overlap. Email sends do overlap: they run on their own tasks and may
//! complete after the next cycle has started.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::config::{Config, EmailConfig};
use crate::error::{Result, StatusmailErrorTrait};
use crate::models::{CycleReport, Snapshot, SnapshotEntry, StatusChange};
use crate::notifications::{
    Channel, DispatchStats, Notification, NotificationDispatcher, SendGridChannel,
};
use crate::notion::{NotionClient, SnapshotSource};
use crate::utils::error::FetchError;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Result of diffing a fresh snapshot into the held one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOutcome {
    /// Ids seen for the first time
    pub added: usize,
    /// Status changes, sorted by record id
    pub changes: Vec<StatusChange>,
}

/// Diff `fresh` into `held`
///
/// - An unknown id is inserted with its status only and produces no change.
/// - A known id whose status differs is updated and produces one change
///   carrying the fresh title.
/// - Ids missing from `fresh` are left untouched in `held`.
pub fn diff_snapshot(held: &mut Snapshot, fresh: &Snapshot) -> DiffOutcome {
    let mut outcome = DiffOutcome::default();

    for (id, entry) in fresh {
        match held.get_mut(id) {
            None => {
                held.insert(id.clone(), SnapshotEntry::status_only(entry.status.clone()));
                outcome.added += 1;
            }
            Some(prev) if prev.status != entry.status => {
                let previous = prev.status.take();
                *prev = SnapshotEntry::status_only(entry.status.clone());
                outcome.changes.push(StatusChange {
                    id: id.clone(),
                    title: entry.title.clone(),
                    previous,
                    current: entry.status.clone(),
                });
            }
            Some(_) => {}
        }
    }

    outcome.changes.sort_by(|a, b| a.id.cmp(&b.id));
    outcome
}

/// Polls a [`SnapshotSource`] and emails status changes
pub struct Watcher<S> {
    /// Where snapshots come from
    source: S,

    /// Detached email delivery
    dispatcher: NotificationDispatcher,

    /// Recipient and sender for every notification
    email: EmailConfig,

    /// Delay between cycles
    interval: Duration,

    /// Retry policy for fetches
    fetch_retry: RetryConfig,

    /// Completed cycles
    cycles: u64,
}

impl Watcher<NotionClient> {
    /// Build a watcher over the Notion database and SendGrid channel from config
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let source = NotionClient::new(&config.notion, config.request_timeout())?;
        let channel: Arc<dyn Channel> =
            Arc::new(SendGridChannel::new(&config.email, config.request_timeout())?);

        Ok(Self::new(
            source,
            NotificationDispatcher::new(channel),
            config.email.clone(),
            config.poll_interval(),
        )
        .with_fetch_retry(config.watcher.fetch_retry.clone()))
    }
}

impl<S: SnapshotSource> Watcher<S> {
    /// Create a watcher with the default fetch retry policy
    pub fn new(
        source: S,
        dispatcher: NotificationDispatcher,
        email: EmailConfig,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            dispatcher,
            email,
            interval,
            fetch_retry: RetryConfig::default(),
            cycles: 0,
        }
    }

    /// Set the fetch retry policy
    pub fn with_fetch_retry(mut self, retry: RetryConfig) -> Self {
        self.fetch_retry = retry;
        self
    }

    /// Delay between cycles
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of completed cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Notification totals so far
    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Wait for every notification dispatched so far
    pub async fn flush(&mut self) {
        self.dispatcher.drain().await;
    }

    /// Fetch a snapshot, retrying transient failures
    async fn fetch(&self) -> std::result::Result<Snapshot, FetchError> {
        with_retry_if(
            &self.fetch_retry,
            || self.source.fetch_snapshot(),
            FetchError::is_recoverable,
        )
        .await
    }

    /// Take the initial snapshot
    ///
    /// Every record present at startup becomes part of the baseline; none of
    /// them produce a notification.
    pub async fn baseline(&self) -> Result<Snapshot> {
        let snapshot = self.fetch().await?;
        tracing::info!(records = snapshot.len(), "Baseline snapshot taken");
        Ok(snapshot)
    }

    /// Run one detection cycle against the held snapshot
    ///
    /// Notifications are dispatched but not awaited.
    ///
    /// # Errors
    ///
    /// Returns the fetch error once retries are exhausted. The held snapshot
    /// is not modified in that case.
    pub async fn run_cycle(&mut self, held: &mut Snapshot) -> Result<CycleReport> {
        let started_at = Utc::now();
        self.dispatcher.reap();

        tracing::debug!("Looking for changes in Notion database");
        let fresh = self.fetch().await?;
        let DiffOutcome { added, changes } = diff_snapshot(held, &fresh);

        for change in &changes {
            tracing::info!(
                record_id = %change.id,
                title = ?change.title,
                previous = ?change.previous,
                current = ?change.current,
                "Status changed"
            );
            self.dispatcher
                .dispatch(Notification::status_changed(&self.email, change));
        }

        self.cycles += 1;
        let report = CycleReport {
            fetched: fresh.len(),
            added,
            changes,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::debug!(
            cycle = self.cycles,
            fetched = report.fetched,
            added = report.added,
            changed = report.changes.len(),
            held = held.len(),
            in_flight = self.dispatcher.in_flight(),
            "Cycle complete"
        );

        Ok(report)
    }

    /// Poll until Ctrl-C
    pub async fn run(&mut self, held: &mut Snapshot) -> Result<()> {
        self.run_until(held, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Poll until `shutdown` resolves or a fetch fails for good
    ///
    /// In-flight notifications are drained before returning, whether the loop
    /// ended by shutdown or by error.
    pub async fn run_until<F>(&mut self, held: &mut Snapshot, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let result = self.poll_loop(held, &mut shutdown).await;

        let pending = self.dispatcher.in_flight();
        if pending > 0 {
            tracing::info!(pending = pending, "Waiting for in-flight notifications");
        }
        self.dispatcher.drain().await;

        let stats = self.dispatcher.stats();
        tracing::info!(
            cycles = self.cycles,
            delivered = stats.delivered,
            failed = stats.failed,
            "Watcher stopped"
        );

        result
    }

    async fn poll_loop<F>(
        &mut self,
        held: &mut Snapshot,
        shutdown: &mut std::pin::Pin<&mut F>,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.as_mut() => return Ok(()),
                report = self.run_cycle(held) => {
                    if let Err(e) = report {
                        tracing::error!(
                            error = %e,
                            category = %e.category(),
                            recoverable = e.is_recoverable(),
                            "Fetch failed after retries, stopping"
                        );
                        return Err(e);
                    }
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.as_mut() => return Ok(()),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
