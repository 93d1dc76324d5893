//! End-to-end polling tests
//!
//! Runs the full watcher built from configuration against mock Notion and
//! SendGrid servers: baseline → cycles → email on status change → shutdown.

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use statusmail::config::{Config, EmailConfig, LoggingConfig, NotionConfig, WatcherConfig};
use statusmail::utils::retry::RetryConfig;
use statusmail::watcher::Watcher;

use crate::common::{page_json, query_response};

const QUERY_PATH: &str = "/v1/databases/db-123/query";

pub(super) fn config(notion: &MockServer, sendgrid: &MockServer) -> Config {
    let mut notion_config = NotionConfig::new("secret_token", "db-123");
    notion_config.api_url = notion.uri();
    notion_config.rate_limit = 100;

    let mut email = EmailConfig::new("SG.test-key", "team@example.com", "bot@example.com");
    email.api_url = sendgrid.uri();

    Config {
        notion: notion_config,
        email,
        watcher: WatcherConfig {
            poll_interval_ms: 20,
            request_timeout_secs: 5,
            fetch_retry: RetryConfig::with_delays(1, 1, 5),
        },
        logging: LoggingConfig::default(),
    }
}

/// Resolves once the server has received at least `count` requests
async fn received_at_least(server: &MockServer, count: usize) {
    loop {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_status_change_emails_once() {
    let notion = MockServer::start().await;
    let sendgrid = MockServer::start().await;

    // Baseline sees "Todo"; every later poll sees "Done"
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_response(
            vec![page_json("id1", "Write report", Some("Todo"))],
            None,
        )))
        .up_to_n_times(1)
        .mount(&notion)
        .await;

    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_response(
            vec![page_json("id1", "Write report", Some("Done"))],
            None,
        )))
        .mount(&notion)
        .await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&sendgrid)
        .await;

    let config = config(&notion, &sendgrid);
    let mut watcher = Watcher::from_config(&config).unwrap();
    let mut held = watcher.baseline().await.unwrap();
    assert_eq!(
        held.get("id1").and_then(|e| e.status.as_deref()),
        Some("Todo")
    );

    // Let a few quiet cycles run after the email goes out
    let shutdown = async {
        received_at_least(&sendgrid, 1).await;
        received_at_least(&notion, 4).await;
    };

    tokio::time::timeout(Duration::from_secs(10), watcher.run_until(&mut held, shutdown))
        .await
        .expect("watcher should stop on shutdown")
        .unwrap();

    assert!(watcher.cycles() >= 2);
    assert_eq!(watcher.dispatch_stats().delivered, 1);
    assert_eq!(
        held.get("id1").and_then(|e| e.status.as_deref()),
        Some("Done")
    );

    let emails = sendgrid.received_requests().await.unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&emails[0].body).unwrap();
    assert_eq!(
        payload["content"][0]["value"],
        json!("A Notion task's: Write report status has been updated to Done.")
    );
}

#[tokio::test]
async fn test_rejected_email_keeps_polling() {
    let notion = MockServer::start().await;
    let sendgrid = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_response(
            vec![page_json("id1", "Write report", None)],
            None,
        )))
        .up_to_n_times(1)
        .mount(&notion)
        .await;

    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_response(
            vec![page_json("id1", "Write report", Some("Todo"))],
            None,
        )))
        .mount(&notion)
        .await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&sendgrid)
        .await;

    let config = config(&notion, &sendgrid);
    let mut watcher = Watcher::from_config(&config).unwrap();
    let mut held = watcher.baseline().await.unwrap();

    let shutdown = async {
        received_at_least(&sendgrid, 1).await;
        received_at_least(&notion, 4).await;
    };

    tokio::time::timeout(Duration::from_secs(10), watcher.run_until(&mut held, shutdown))
        .await
        .expect("watcher should stop on shutdown")
        .unwrap();

    let stats = watcher.dispatch_stats();
    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(
        held.get("id1").and_then(|e| e.status.as_deref()),
        Some("Todo")
    );
}
