use std::sync::Arc;

use rust_hosted_chat::error::GatewayError;
use rust_hosted_chat::gateway::memory::GatewayOp;
use rust_hosted_chat::gateway::{AuthApi, Gateway, InMemoryGateway};
use rust_hosted_chat::session::{SessionState, SessionStore, SignUpOutcome};
use rust_hosted_chat::storage::SessionCache;

fn store(gateway: &Arc<InMemoryGateway>) -> SessionStore {
    let auth: Arc<dyn AuthApi> = gateway.clone();
    let shared: Arc<dyn Gateway> = gateway.clone();
    SessionStore::new(auth, shared)
}

#[tokio::test]
async fn sign_in_notifies_subscribers() {
    let gateway = Arc::new(InMemoryGateway::new());
    let alice = gateway.register_account("alice@example.com", "password", "Alice");
    let session = store(&gateway);
    let mut changes = session.subscribe();
    assert_eq!(session.state(), SessionState::Loading);

    let user = session.sign_in("alice@example.com", "password").await.unwrap();

    assert_eq!(user.id, alice.id);
    assert!(changes.has_changed().unwrap());
    assert_eq!(
        changes.borrow_and_update().user().map(|u| u.id.clone()),
        Some(alice.id)
    );
}

#[tokio::test]
async fn wrong_password_leaves_state_untouched() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.register_account("alice@example.com", "password", "Alice");
    let session = store(&gateway);
    session.restore().await;

    let err = session
        .sign_in("alice@example.com", "nope")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Invalid login credentials");
    assert_eq!(session.state(), SessionState::SignedOut);
}

#[tokio::test]
async fn sign_up_writes_the_profile_row() {
    let gateway = Arc::new(InMemoryGateway::new());
    let session = store(&gateway);

    let outcome = session
        .sign_up("Dave", "dave@example.com", "secret1")
        .await
        .unwrap();

    let SignUpOutcome::SignedIn(user) = outcome else {
        panic!("expected an immediate session");
    };
    let profile = gateway.user(&user.id).unwrap();
    assert_eq!(profile.name, "Dave");
    assert_eq!(profile.email.as_deref(), Some("dave@example.com"));
    assert_eq!(session.current_user(), Some(user));
}

#[tokio::test]
async fn duplicate_sign_up_is_rejected() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.register_account("alice@example.com", "password", "Alice");
    let session = store(&gateway);

    let err = session
        .sign_up("Alice", "alice@example.com", "password")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Auth(ref message) if message == "User already registered"));
    assert!(session.current_user().is_none());
}

#[tokio::test]
async fn profile_write_failure_does_not_block_sign_up() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.fail(GatewayOp::InsertUser);
    let session = store(&gateway);

    let outcome = session
        .sign_up("Dave", "dave@example.com", "secret1")
        .await
        .unwrap();
    assert!(matches!(outcome, SignUpOutcome::SignedIn(_)));
}

#[tokio::test]
async fn sign_out_always_ends_signed_out() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.register_account("alice@example.com", "password", "Alice");
    let session = store(&gateway);
    session.sign_in("alice@example.com", "password").await.unwrap();

    session.sign_out().await;
    assert_eq!(session.state(), SessionState::SignedOut);
    assert!(session.current_user().is_none());
}

#[tokio::test]
async fn restore_without_cache_is_signed_out() {
    let gateway = Arc::new(InMemoryGateway::new());
    let session = store(&gateway);
    assert!(session.restore().await.is_none());
    assert_eq!(session.state(), SessionState::SignedOut);
}

#[tokio::test]
async fn cached_session_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(InMemoryGateway::new());
    let alice = gateway.register_account("alice@example.com", "password", "Alice");

    {
        let session = store(&gateway).with_cache(SessionCache::in_dir(dir.path()).unwrap());
        session.sign_in("alice@example.com", "password").await.unwrap();
    }

    let session = store(&gateway).with_cache(SessionCache::in_dir(dir.path()).unwrap());
    let restored = session.restore().await.unwrap();
    assert_eq!(restored.id, alice.id);
    assert_eq!(session.state(), SessionState::SignedIn(restored));
}

#[tokio::test]
async fn sign_out_forgets_the_cached_session() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.register_account("alice@example.com", "password", "Alice");

    {
        let session = store(&gateway).with_cache(SessionCache::in_dir(dir.path()).unwrap());
        session.sign_in("alice@example.com", "password").await.unwrap();
        session.sign_out().await;
    }

    let cache = SessionCache::in_dir(dir.path()).unwrap();
    assert!(cache.load().unwrap().is_none());
}

#[tokio::test]
async fn failed_refresh_clears_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.register_account("alice@example.com", "password", "Alice");

    {
        let session = store(&gateway).with_cache(SessionCache::in_dir(dir.path()).unwrap());
        session.sign_in("alice@example.com", "password").await.unwrap();
    }

    gateway.fail(GatewayOp::RefreshSession);
    let session = store(&gateway).with_cache(SessionCache::in_dir(dir.path()).unwrap());
    assert!(session.restore().await.is_none());
    assert_eq!(session.state(), SessionState::SignedOut);

    let cache = SessionCache::in_dir(dir.path()).unwrap();
    assert!(cache.load().unwrap().is_none());
}

#[tokio::test]
async fn refresh_rotates_tokens_and_persists_them() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.register_account("alice@example.com", "password", "Alice");
    let session = store(&gateway).with_cache(SessionCache::in_dir(dir.path()).unwrap());
    session.sign_in("alice@example.com", "password").await.unwrap();

    let cache = SessionCache::in_dir(dir.path()).unwrap();
    let before = cache.load().unwrap().unwrap();

    session.refresh().await.unwrap();

    let after = cache.load().unwrap().unwrap();
    assert_ne!(after.refresh_token, before.refresh_token);
    assert_ne!(after.access_token, before.access_token);
    assert_eq!(gateway.refresh_calls(), 1);
    assert!(matches!(session.state(), SessionState::SignedIn(_)));
}

#[tokio::test]
async fn rejected_refresh_ends_the_session() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.register_account("alice@example.com", "password", "Alice");
    let session = store(&gateway);
    session.sign_in("alice@example.com", "password").await.unwrap();
    gateway.fail(GatewayOp::RefreshSession);

    assert!(session.refresh().await.is_err());
    assert_eq!(session.state(), SessionState::SignedOut);
    assert!(session.refresh_delay().is_none());
}
