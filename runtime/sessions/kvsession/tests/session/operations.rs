//! Tests looking at how changes to the session state are reflected in the store.
use googletest::{
    assert_that,
    prelude::{eq, none, some},
};
use kvsession::{SessionConfig, SessionManager, UserTransition};

use crate::assertions::is_removal_cookie;
use crate::client;
use crate::fixtures::{SessionFixture, store};
use crate::helpers::RecordingSink;

#[tokio::test]
async fn clearing_a_logged_in_session_logs_the_user_out() {
    let store = store();
    let manager = SessionManager::new(store.clone(), SessionConfig::default());
    let id = SessionFixture::logged_in("42").setup(&store).await;

    let mut session = manager.open(Some(id.as_str())).await.unwrap();
    session.clear();
    assert_eq!(
        session.transition(),
        &UserTransition::Logout {
            user_id: "42".into()
        }
    );
    let mut sink = RecordingSink::default();
    manager.save(session, &client(), &mut sink).await.unwrap();

    assert!(manager.get_user_sessions("42").await.unwrap().is_empty());
    assert!(manager.open(Some(id.as_str())).await.unwrap().is_new());
    assert_that!(sink.removal_cookie(), some(is_removal_cookie()));
}

#[tokio::test]
async fn removing_a_missing_key_with_a_default_does_not_touch_the_cookie() {
    let store = store();
    let manager = SessionManager::new(store.clone(), SessionConfig::default());
    let fixture = SessionFixture {
        state: serde_json::json!({}),
        ..Default::default()
    };
    let id = fixture.setup(&store).await;

    let mut session = manager.open(Some(id.as_str())).await.unwrap();
    let value = session.remove_or("user_id", serde_json::Value::Null);
    assert_eq!(value, serde_json::Value::Null);
    assert!(!session.is_modified());

    let mut sink = RecordingSink::default();
    manager.save(session, &client(), &mut sink).await.unwrap();
    // Empty but not modified: the record is dropped, the cookie is left alone.
    assert!(sink.is_untouched());
}

#[tokio::test]
async fn switching_user_moves_the_session_between_indexes() {
    let store = store();
    let manager = SessionManager::new(store.clone(), SessionConfig::default());
    let id = SessionFixture::logged_in("alice").setup(&store).await;

    let mut session = manager.open(Some(id.as_str())).await.unwrap();
    session.remove("user_id").unwrap();
    session.insert("user_id", "bob").unwrap();
    // The latest transition wins.
    assert_that!(session.user_id(), some(eq("bob")));
    manager
        .save(session, &client(), &mut RecordingSink::default())
        .await
        .unwrap();

    assert!(manager
        .get_user_sessions("bob")
        .await
        .unwrap()
        .contains(&id));
    // The session is still listed under its previous owner: only the latest
    // transition is applied to the index.
    assert!(manager
        .get_user_sessions("alice")
        .await
        .unwrap()
        .contains(&id));
}

#[tokio::test]
async fn numeric_user_ids_are_indexed_by_their_json_rendering() {
    let manager = SessionManager::new(store(), SessionConfig::default());

    let mut session = manager.open(None).await.unwrap();
    let id = session.id().clone();
    session.insert("user_id", 42).unwrap();
    manager
        .save(session, &client(), &mut RecordingSink::default())
        .await
        .unwrap();

    assert!(manager.get_user_sessions("42").await.unwrap().contains(&id));
    let session = manager.open(Some(id.as_str())).await.unwrap();
    assert_that!(session.get::<u64>("user_id").unwrap(), some(eq(42)));
}

#[tokio::test]
async fn permanence_can_be_revoked() {
    let manager = SessionManager::new(store(), SessionConfig::default());

    let mut session = manager.open(None).await.unwrap();
    let id = session.id().clone();
    session.insert("k", "v").unwrap();
    session.set_permanent(true);
    manager
        .save(session, &client(), &mut RecordingSink::default())
        .await
        .unwrap();

    let mut session = manager.open(Some(id.as_str())).await.unwrap();
    assert!(session.is_permanent());
    session.set_permanent(false);
    assert!(session.is_modified());
    let mut sink = RecordingSink::default();
    manager.save(session, &client(), &mut sink).await.unwrap();

    assert_that!(sink.set_cookie().unwrap().max_age(), none());
    let session = manager.open(Some(id.as_str())).await.unwrap();
    assert!(!session.is_permanent());
}

#[tokio::test]
async fn typed_values_round_trip_through_the_store() {
    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Cart {
        items: Vec<String>,
        total_cents: u64,
    }

    let manager = SessionManager::new(store(), SessionConfig::default());
    let cart = Cart {
        items: vec!["book".into(), "pen".into()],
        total_cents: 1250,
    };

    let mut session = manager.open(None).await.unwrap();
    let id = session.id().clone();
    session.insert("cart", &cart).unwrap();
    manager
        .save(session, &client(), &mut RecordingSink::default())
        .await
        .unwrap();

    let session = manager.open(Some(id.as_str())).await.unwrap();
    assert_eq!(session.get::<Cart>("cart").unwrap(), Some(cart));
    // The wrong type is reported, not silently ignored.
    let error = session.get::<u64>("cart").unwrap_err();
    assert_that!(
        error.to_string(),
        eq("Failed to deserialize the value associated with `cart`")
    );
}
