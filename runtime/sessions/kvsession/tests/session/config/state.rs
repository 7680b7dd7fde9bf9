//! Verify that the TTL settings behave as expected.
use std::time::Duration;

use kvsession::{SessionConfig, SessionManager};

use crate::client;
use crate::fixtures::inspectable_store;
use crate::helpers::RecordingSink;

#[test]
fn default_ttls() {
    let config = SessionConfig::default();
    assert_eq!(config.state.ttl, Duration::from_secs(24 * 60 * 60));
    assert_eq!(config.state.permanent_ttl, Duration::from_secs(31 * 24 * 60 * 60));
    assert_eq!(config.state.info_ttl, None);
}

#[test]
fn ttls_are_human_readable() {
    let config: SessionConfig = serde_json::from_str(
        r#"{ "state": { "ttl": "2h", "permanent_ttl": "7days", "info_ttl": "30days" } }"#,
    )
    .unwrap();
    assert_eq!(config.state.ttl, Duration::from_secs(2 * 60 * 60));
    assert_eq!(config.state.permanent_ttl, Duration::from_secs(7 * 24 * 60 * 60));
    assert_eq!(
        config.state.info_ttl,
        Some(Duration::from_secs(30 * 24 * 60 * 60))
    );
}

#[tokio::test(start_paused = true)]
async fn the_configured_ttl_is_applied_to_the_record() {
    let ((store, backend), mut config) = (inspectable_store(), SessionConfig::default());
    config.state.ttl = Duration::from_secs(15 * 60);
    let manager = SessionManager::new(store, config);

    let mut session = manager.open(None).await.unwrap();
    let id = session.id().clone();
    session.insert("k", "v").unwrap();
    manager
        .save(session, &client(), &mut RecordingSink::default())
        .await
        .unwrap();

    assert_eq!(
        backend.ttl(&format!("session:{id}")).await,
        Some(Duration::from_secs(15 * 60))
    );
}

#[tokio::test(start_paused = true)]
async fn the_key_prefix_is_applied_to_every_key() {
    let ((store, backend), mut config) = (inspectable_store(), SessionConfig::default());
    config.prefix = "app:".into();
    let manager = SessionManager::new(store, config);

    let mut session = manager.open(Some("abc")).await.unwrap();
    session.insert("user_id", "42").unwrap();
    manager
        .save(session, &client(), &mut RecordingSink::default())
        .await
        .unwrap();

    assert!(backend.contains_key("app:abc").await);
    assert!(backend.contains_key("app:abc:info").await);
    assert!(backend.contains_key("app:user:42").await);
    assert!(!backend.contains_key("session:abc").await);
}
