//! Session container integration tests.
//!
//! These tests drive the container through stub credential exchanges and
//! check the resulting state and persisted storage.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;

use storefront_auth::{
    CredentialExchange, Credentials, ExchangeError, FileStorage, Grant, LoginOutcome,
    MemoryStorage, Session, SessionContainer, SessionStatus, SessionStorage, User,
};

/// Exchange that returns a fixed result, optionally after a gate opens.
struct StubExchange {
    result: Result<Grant, ExchangeError>,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl StubExchange {
    fn ok(user: User, token: &str) -> Self {
        Self {
            result: Ok(Grant::new(user, token)),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn err(error: ExchangeError) -> Self {
        Self {
            result: Err(error),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl CredentialExchange for StubExchange {
    async fn exchange(&self, _credentials: &Credentials) -> Result<Grant, ExchangeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref gate) = self.gate {
            gate.notified().await;
        }
        self.result.clone()
    }
}

fn ann() -> User {
    User::new("Ann", "a@b.com", "admin")
}

fn container_with(
    exchange: StubExchange,
) -> (SessionContainer, Arc<StubExchange>, Arc<MemoryStorage>) {
    let exchange = Arc::new(exchange);
    let storage = Arc::new(MemoryStorage::new());
    let container = SessionContainer::new(exchange.clone(), storage.clone());
    (container, exchange, storage)
}

fn record_statuses(container: &SessionContainer) -> Arc<Mutex<Vec<SessionStatus>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    container.observe(move |s| sink.lock().unwrap().push(s.status));
    seen
}

fn stored(storage: &MemoryStorage) -> Option<serde_json::Value> {
    storage
        .get("auth")
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

// ============================================================================
// Construction & Restore
// ============================================================================

#[test]
fn test_initial_state_without_storage() {
    let (container, _, _) = container_with(StubExchange::ok(ann(), "t"));

    let session = container.snapshot();
    assert!(session.user.is_none());
    assert!(session.token.is_none());
    assert_eq!(session.status, SessionStatus::Idle);
    assert!(session.error.is_none());
}

#[test]
fn test_restore_round_trip() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set(
            "auth",
            r#"{"user":{"name":"Ann","email":"a@b.com","role":"admin"},"token":"T"}"#,
        )
        .unwrap();

    let container = SessionContainer::new(Arc::new(StubExchange::ok(ann(), "x")), storage);

    assert_eq!(container.user(), Some(ann()));
    assert_eq!(container.token().as_deref(), Some("T"));
    assert!(container.is_authenticated());
}

#[test]
fn test_restore_malformed_blob_yields_default() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set("auth", "definitely not json").unwrap();

    let container = SessionContainer::new(Arc::new(StubExchange::ok(ann(), "x")), storage);
    assert_eq!(container.snapshot(), Session::default());
}

#[test]
fn test_restore_picks_up_other_tab() {
    let storage = Arc::new(MemoryStorage::new());
    let tab_a = SessionContainer::new(Arc::new(StubExchange::ok(ann(), "x")), storage.clone());
    let tab_b = SessionContainer::new(Arc::new(StubExchange::ok(ann(), "x")), storage.clone());

    tab_a.set_session_from_external(ann(), "from-a");
    assert!(!tab_b.is_authenticated());

    let restored = tab_b.restore_from_persistence();
    assert_eq!(restored.token.as_deref(), Some("from-a"));
    assert_eq!(tab_b.token().as_deref(), Some("from-a"));

    // Last writer wins
    tab_b.logout();
    assert!(tab_a.is_authenticated());
    assert_eq!(tab_a.restore_from_persistence(), Session::default());
}

#[test]
fn test_file_storage_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let container = SessionContainer::new(
            Arc::new(StubExchange::ok(ann(), "x")),
            Arc::new(FileStorage::new(dir.path())),
        );
        container.set_session_from_external(ann(), "persisted");
    }

    let container = SessionContainer::new(
        Arc::new(StubExchange::ok(ann(), "x")),
        Arc::new(FileStorage::new(dir.path())),
    );
    assert_eq!(container.status(), SessionStatus::Succeeded);
    assert_eq!(container.token().as_deref(), Some("persisted"));
}

#[test]
fn test_custom_storage_key() {
    let storage = Arc::new(MemoryStorage::new());
    let container =
        SessionContainer::with_key(Arc::new(StubExchange::ok(ann(), "x")), storage.clone(), "shop");

    container.set_session_from_external(ann(), "t");
    assert!(storage.get("shop").unwrap().is_some());
    assert!(storage.get("auth").unwrap().is_none());
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_success_transition() {
    let (container, exchange, storage) = container_with(StubExchange::ok(ann(), "T"));
    let seen = record_statuses(&container);

    let outcome = container.login("a@b.com", "x").await;

    assert!(outcome.is_success());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![SessionStatus::Loading, SessionStatus::Succeeded]
    );

    let session = container.snapshot();
    assert_eq!(session.user, Some(ann()));
    assert_eq!(session.token.as_deref(), Some("T"));
    assert!(session.error.is_none());
    assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);

    let blob = stored(&storage).unwrap();
    assert_eq!(blob["token"], "T");
    assert_eq!(blob["user"]["email"], "a@b.com");
}

#[tokio::test]
async fn test_login_failure_transition() {
    let (container, _, storage) =
        container_with(StubExchange::err(ExchangeError::Rejected("bad creds".into())));
    let seen = record_statuses(&container);

    let outcome = container.login("a@b.com", "x").await;

    assert_eq!(
        outcome,
        LoginOutcome::Failed(ExchangeError::Rejected("bad creds".into()))
    );
    assert_eq!(
        *seen.lock().unwrap(),
        vec![SessionStatus::Loading, SessionStatus::Failed]
    );
    assert_eq!(container.snapshot().error.as_deref(), Some("bad creds"));
    assert!(stored(&storage).is_none());
}

#[tokio::test]
async fn test_failed_relogin_keeps_prior_session() {
    let storage = Arc::new(MemoryStorage::new());
    let good = SessionContainer::new(Arc::new(StubExchange::ok(ann(), "T")), storage.clone());
    assert!(good.login("a@b.com", "x").await.is_success());
    let before = storage.get("auth").unwrap();

    // Same storage, failing exchange
    let container = SessionContainer::new(
        Arc::new(StubExchange::err(ExchangeError::Rejected("bad creds".into()))),
        storage.clone(),
    );
    assert_eq!(container.status(), SessionStatus::Succeeded);

    let outcome = container.login("a@b.com", "wrong").await;
    assert!(!outcome.is_success());

    let session = container.snapshot();
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.error.as_deref(), Some("bad creds"));
    assert_eq!(session.user, Some(ann()));
    assert_eq!(session.token.as_deref(), Some("T"));
    assert_eq!(storage.get("auth").unwrap(), before);
}

#[tokio::test]
async fn test_malformed_response_fails() {
    let (container, _, storage) = container_with(StubExchange::err(
        ExchangeError::MalformedResponse("missing field `token`".into()),
    ));

    let outcome = container.login("a@b.com", "x").await;

    assert!(matches!(
        outcome,
        LoginOutcome::Failed(ExchangeError::MalformedResponse(_))
    ));
    let session = container.snapshot();
    assert_eq!(session.status, SessionStatus::Failed);
    assert!(session.user.is_none());
    assert!(session.error.unwrap().contains("missing field"));
    assert!(stored(&storage).is_none());
}

#[tokio::test]
async fn test_retry_clears_error() {
    let gate = Arc::new(Notify::new());
    let (container, _, _) = container_with(
        StubExchange::err(ExchangeError::Transport("connection refused".into()))
            .gated(gate.clone()),
    );

    gate.notify_one();
    container.login("a@b.com", "x").await;
    assert_eq!(
        container.snapshot().error.as_deref(),
        Some("connection refused")
    );

    let pending = container.dispatch_login("a@b.com", "x");
    let session = container.snapshot();
    assert_eq!(session.status, SessionStatus::Loading);
    assert!(session.error.is_none());

    gate.notify_one();
    pending.outcome().await;
}

#[tokio::test]
async fn test_overlapping_login_rejected() {
    let gate = Arc::new(Notify::new());
    let (container, exchange, _) = container_with(StubExchange::ok(ann(), "T").gated(gate.clone()));

    let first = container.dispatch_login("a@b.com", "x");
    assert!(!first.is_finished());
    assert_eq!(container.status(), SessionStatus::Loading);

    let second = container.login("a@b.com", "x").await;
    assert_eq!(second, LoginOutcome::InFlight);
    assert_eq!(container.status(), SessionStatus::Loading);

    gate.notify_one();
    assert!(first.outcome().await.is_success());
    assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
    assert_eq!(container.status(), SessionStatus::Succeeded);
}

#[tokio::test]
async fn test_logout_during_login_discards_result() {
    let gate = Arc::new(Notify::new());
    let (container, _, storage) = container_with(StubExchange::ok(ann(), "T").gated(gate.clone()));

    let pending = container.dispatch_login("a@b.com", "x");
    container.logout();
    gate.notify_one();

    assert_eq!(pending.outcome().await, LoginOutcome::Superseded);
    assert_eq!(container.snapshot(), Session::default());
    assert!(stored(&storage).is_none());
}

#[tokio::test]
async fn test_dropped_caller_still_applies_result() {
    let gate = Arc::new(Notify::new());
    let (container, _, storage) = container_with(StubExchange::ok(ann(), "T").gated(gate.clone()));
    let mut rx = container.subscribe();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), container.login("a@b.com", "x")).await;
    assert!(abandoned.is_err());
    assert_eq!(container.status(), SessionStatus::Loading);

    gate.notify_one();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.status == SessionStatus::Succeeded),
    )
    .await
    .expect("login should settle")
    .unwrap();

    assert_eq!(stored(&storage).unwrap()["token"], "T");
}

// ============================================================================
// Logout & External Set
// ============================================================================

#[tokio::test]
async fn test_logout_clears_everything() {
    let (container, _, storage) = container_with(StubExchange::ok(ann(), "T"));
    container.login("a@b.com", "x").await;
    assert!(stored(&storage).is_some());

    container.logout();

    assert_eq!(container.snapshot(), Session::default());
    assert!(storage.get("auth").unwrap().is_none());
}

#[tokio::test]
async fn test_logout_idempotent() {
    let (container, _, storage) = container_with(StubExchange::ok(ann(), "T"));
    container.login("a@b.com", "x").await;

    container.logout();
    let once = container.snapshot();
    container.logout();

    assert_eq!(container.snapshot(), once);
    assert!(storage.is_empty());
}

#[test]
fn test_set_session_from_external() {
    let (container, exchange, storage) = container_with(StubExchange::ok(ann(), "T"));
    let seen = record_statuses(&container);

    let user = User::new("Bo", "bo@example.com", "user");
    container.set_session_from_external(user.clone(), "whoami-token");

    let session = container.snapshot();
    assert_eq!(session.status, SessionStatus::Succeeded);
    assert_eq!(session.user, Some(user));
    assert!(session.error.is_none());
    assert_eq!(stored(&storage).unwrap()["token"], "whoami-token");
    assert_eq!(*seen.lock().unwrap(), vec![SessionStatus::Succeeded]);
    assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_watch_receiver_tracks_latest() {
    let (container, _, _) = container_with(StubExchange::ok(ann(), "T"));
    let mut rx = container.subscribe();

    container.login("a@b.com", "x").await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().status, SessionStatus::Succeeded);
}
