//! Detection cycle scenarios
//!
//! Drives `Watcher::run_cycle` with a scripted snapshot source and a recording
//! channel to check diffing, held-snapshot mutation and notification output.

use std::sync::Arc;
use std::time::Duration;

use statusmail::models::{Snapshot, SnapshotEntry, NO_STATUS};
use statusmail::notifications::NotificationDispatcher;
use statusmail::utils::retry::RetryConfig;
use statusmail::watcher::Watcher;

use crate::common::{email_config, snapshot, RecordingChannel, ScriptedSource};

fn watcher(
    script: Vec<Snapshot>,
) -> (Watcher<Arc<ScriptedSource>>, Arc<ScriptedSource>, Arc<RecordingChannel>) {
    let source = Arc::new(ScriptedSource::new(script.into_iter().map(Ok).collect()));
    let channel = Arc::new(RecordingChannel::default());

    let watcher = Watcher::new(
        Arc::clone(&source),
        NotificationDispatcher::new(channel.clone()),
        email_config(),
        Duration::from_millis(10),
    )
    .with_fetch_retry(RetryConfig::with_delays(2, 1, 5));

    (watcher, source, channel)
}

#[tokio::test]
async fn test_new_record_produces_no_notification() {
    let (mut watcher, _source, channel) =
        watcher(vec![snapshot(&[("id1", "Todo", "Write report")])]);
    let mut held = Snapshot::new();

    let report = watcher.run_cycle(&mut held).await.unwrap();
    watcher.flush().await;

    assert_eq!(report.fetched, 1);
    assert_eq!(report.added, 1);
    assert!(report.is_quiet());
    assert_eq!(
        held.get("id1"),
        Some(&SnapshotEntry::status_only(Some("Todo".to_string())))
    );
    assert!(channel.bodies().is_empty());
}

#[tokio::test]
async fn test_status_change_sends_one_email() {
    let (mut watcher, _source, channel) =
        watcher(vec![snapshot(&[("id1", "Done", "Write report")])]);
    let mut held: Snapshot = vec![("id1", SnapshotEntry::status_only(Some("Todo".into())))]
        .into_iter()
        .collect();

    let report = watcher.run_cycle(&mut held).await.unwrap();
    watcher.flush().await;

    assert_eq!(report.changes.len(), 1);
    assert_eq!(
        held.get("id1"),
        Some(&SnapshotEntry::status_only(Some("Done".to_string())))
    );

    let sent = channel.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].record_id, "id1");
    assert_eq!(sent[0].to, "team@example.com");
    assert_eq!(sent[0].from, "bot@example.com");
    assert!(sent[0].body.contains("Write report"));
    assert!(sent[0].body.contains("Done"));
    drop(sent);

    assert_eq!(watcher.dispatch_stats().delivered, 1);
}

#[tokio::test]
async fn test_unchanged_dataset_is_idempotent() {
    let data = snapshot(&[("id1", "Todo", "A"), ("id2", "Done", "B")]);
    let changed = snapshot(&[("id1", "Doing", "A"), ("id2", "Done", "B")]);
    let (mut watcher, source, channel) = watcher(vec![data, changed.clone(), changed]);
    let mut held = Snapshot::new();

    watcher.run_cycle(&mut held).await.unwrap();
    let first = watcher.run_cycle(&mut held).await.unwrap();
    let second = watcher.run_cycle(&mut held).await.unwrap();
    watcher.flush().await;

    assert_eq!(first.changes.len(), 1);
    assert!(second.is_quiet());
    assert_eq!(channel.bodies().len(), 1);
    assert_eq!(source.calls(), 3);
    assert_eq!(watcher.cycles(), 3);
}

#[tokio::test]
async fn test_held_keys_never_shrink() {
    let (mut watcher, _source, _channel) = watcher(vec![
        snapshot(&[("id1", "Todo", "A"), ("id2", "Todo", "B")]),
        snapshot(&[("id1", "Todo", "A")]),
        Snapshot::new(),
    ]);
    let mut held = Snapshot::new();

    for _ in 0..3 {
        watcher.run_cycle(&mut held).await.unwrap();
        assert_eq!(held.len(), 2);
    }
    assert!(held.contains("id2"));
}

#[tokio::test]
async fn test_gaining_a_status_notifies_once() {
    let (mut watcher, _source, channel) = watcher(vec![
        snapshot(&[("id1", NO_STATUS, "Triage me")]),
        snapshot(&[("id1", "Todo", "Triage me")]),
        snapshot(&[("id1", "Todo", "Triage me")]),
    ]);
    let mut held = Snapshot::new();

    for _ in 0..3 {
        watcher.run_cycle(&mut held).await.unwrap();
    }
    watcher.flush().await;

    assert_eq!(
        channel.bodies(),
        vec!["A Notion task's: Triage me status has been updated to Todo.".to_string()]
    );
}

#[tokio::test]
async fn test_baseline_then_cycle_is_quiet() {
    let data = snapshot(&[("id1", "Todo", "A"), ("id2", "Done", "B")]);
    let (mut watcher, _source, channel) = watcher(vec![data.clone(), data]);

    let mut held = watcher.baseline().await.unwrap();
    assert_eq!(held.len(), 2);

    let report = watcher.run_cycle(&mut held).await.unwrap();
    watcher.flush().await;

    assert!(report.is_quiet());
    assert_eq!(report.added, 0);
    assert!(channel.bodies().is_empty());
}

#[tokio::test]
async fn test_failed_delivery_does_not_stop_cycle() {
    let source = Arc::new(ScriptedSource::new(vec![Ok(snapshot(&[
        ("id1", "Done", "A"),
        ("id2", "Done", "B"),
    ]))]));
    let channel = Arc::new(RecordingChannel::failing());
    let mut watcher = Watcher::new(
        Arc::clone(&source),
        NotificationDispatcher::new(channel.clone()),
        email_config(),
        Duration::from_millis(10),
    );

    let mut held: Snapshot = ["id1", "id2"]
        .into_iter()
        .map(|id| (id, SnapshotEntry::status_only(Some("Todo".into()))))
        .collect();

    let report = watcher.run_cycle(&mut held).await.unwrap();
    watcher.flush().await;

    assert_eq!(report.changes.len(), 2);
    assert_eq!(channel.bodies().len(), 2);

    let stats = watcher.dispatch_stats();
    assert_eq!(stats.dispatched, 2);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.delivered, 0);
}
