//! Detached notification delivery

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinSet;

use super::channels::{Channel, DeliveryStatus};
use super::Notification;

/// Counters for notifications handed to the dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Notifications spawned
    pub dispatched: u64,
    /// Deliveries confirmed by the channel
    pub delivered: u64,
    /// Deliveries that failed or whose task panicked
    pub failed: u64,
}

/// Sends each notification on its own task
///
/// [`dispatch`](Self::dispatch) returns immediately. Outcomes are only
/// observed when [`reap`](Self::reap) or [`drain`](Self::drain) is called, so
/// several sends from one cycle can be in flight at once and finish in any
/// order. A failed send is logged and counted; it is never retried.
pub struct NotificationDispatcher {
    /// Delivery channel shared by every task
    channel: Arc<dyn Channel>,

    /// Sends that have not been collected yet
    in_flight: JoinSet<DeliveryStatus>,

    /// Running totals
    stats: DispatchStats,
}

impl NotificationDispatcher {
    /// Create a dispatcher over a channel
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            channel,
            in_flight: JoinSet::new(),
            stats: DispatchStats::default(),
        }
    }

    /// Spawn a task delivering one notification
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&mut self, notification: Notification) {
        let channel = Arc::clone(&self.channel);
        self.stats.dispatched += 1;

        self.in_flight.spawn(async move {
            match channel.send(&notification).await {
                Ok(status) => {
                    tracing::info!(
                        notification_id = %notification.id,
                        record_id = %notification.record_id,
                        channel = channel.name(),
                        "Email sent"
                    );
                    status
                }
                Err(e) => {
                    tracing::error!(
                        notification_id = %notification.id,
                        record_id = %notification.record_id,
                        channel = channel.name(),
                        error = %e,
                        recoverable = e.is_recoverable(),
                        "Failed to send email"
                    );
                    DeliveryStatus::failure(channel.name(), e.to_string())
                }
            }
        });
    }

    /// Collect every send that has already finished, without waiting
    ///
    /// Returns the number of outcomes collected.
    pub fn reap(&mut self) -> usize {
        let mut collected = 0;
        while let Some(result) = self.in_flight.try_join_next() {
            self.record(result);
            collected += 1;
        }
        collected
    }

    /// Wait for every in-flight send to finish
    pub async fn drain(&mut self) {
        while let Some(result) = self.in_flight.join_next().await {
            self.record(result);
        }
    }

    /// Number of sends not yet collected
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Totals so far
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    fn record(&mut self, result: Result<DeliveryStatus, tokio::task::JoinError>) {
        match result {
            Ok(status) if status.success => self.stats.delivered += 1,
            Ok(_) => self.stats.failed += 1,
            Err(e) => {
                tracing::error!(error = %e, "Notification task panicked");
                self.stats.failed += 1;
            }
        }
    }
}
