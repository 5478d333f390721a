//! The session state container.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockWriteGuard};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::persist::{self, DEFAULT_STORAGE_KEY};
use super::{Session, SessionStatus, User};
use crate::exchange::{CredentialExchange, Credentials, ExchangeError, Grant};
use crate::storage::SessionStorage;

/// Handle returned by [`SessionContainer::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Arc<dyn Fn(&Session) + Send + Sync>;

/// How a login attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The exchange succeeded; carries the new session.
    Succeeded(Session),
    /// The exchange failed; the session is now `failed`.
    Failed(ExchangeError),
    /// Another attempt was already in flight; nothing changed.
    InFlight,
    /// The session was replaced (logout, external set, restore) while the
    /// exchange was running; its result was discarded.
    Superseded,
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Succeeded(_))
    }
}

/// Session plus the generation it belongs to.
///
/// Anything that replaces the session bumps the generation, so a login
/// resolving against an older generation is stale.
struct Tracked {
    session: Session,
    generation: u64,
}

/// Sessions waiting to be handed to callbacks, in transition order.
///
/// One thread at a time drains the queue; a transition made while another
/// thread (or a callback on this one) is draining is queued behind it.
#[derive(Default)]
struct Dispatch {
    queue: VecDeque<Session>,
    draining: bool,
}

struct Inner {
    state: RwLock<Tracked>,
    notifier: watch::Sender<Session>,
    dispatch: Mutex<Dispatch>,
    observers: RwLock<Vec<(ObserverId, Observer)>>,
    next_observer: AtomicU64,
    exchange: Arc<dyn CredentialExchange>,
    storage: Arc<dyn SessionStorage>,
    key: String,
}

/// Owns the client session and mediates every change to it.
///
/// Cloning is cheap and every clone refers to the same session. Failures
/// are never returned to callers of the mutating operations: they show up in
/// the session's `status` and `error`.
#[derive(Clone)]
pub struct SessionContainer {
    inner: Arc<Inner>,
}

impl SessionContainer {
    /// Create a container using the default storage key, restoring any
    /// persisted session.
    pub fn new(exchange: Arc<dyn CredentialExchange>, storage: Arc<dyn SessionStorage>) -> Self {
        Self::with_key(exchange, storage, DEFAULT_STORAGE_KEY)
    }

    /// Create a container persisting under `key`.
    pub fn with_key(
        exchange: Arc<dyn CredentialExchange>,
        storage: Arc<dyn SessionStorage>,
        key: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let session = persist::load(storage.as_ref(), &key);
        debug!(key = %key, status = %session.status, "session restored");

        let (notifier, _) = watch::channel(session.clone());

        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(Tracked {
                    session,
                    generation: 0,
                }),
                notifier,
                dispatch: Mutex::new(Dispatch::default()),
                observers: RwLock::new(Vec::new()),
                next_observer: AtomicU64::new(1),
                exchange,
                storage,
                key,
            }),
        }
    }

    /// Storage key the session is persisted under.
    pub fn storage_key(&self) -> &str {
        &self.inner.key
    }

    /// Current session.
    pub fn snapshot(&self) -> Session {
        self.read_session(Session::clone)
    }

    pub fn status(&self) -> SessionStatus {
        self.read_session(|s| s.status)
    }

    pub fn user(&self) -> Option<User> {
        self.read_session(|s| s.user.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.read_session(|s| s.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_session(Session::is_authenticated)
    }

    /// Sign in with email and password.
    ///
    /// Moves to `loading`, runs one credential exchange and settles on
    /// `succeeded` (persisting `{user, token}`) or `failed` (keeping any
    /// previous user and token). A call made while another attempt is in
    /// flight returns [`LoginOutcome::InFlight`] and changes nothing.
    ///
    /// The exchange runs on its own task: dropping this future does not
    /// cancel it, and its result is still applied.
    pub async fn login(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> LoginOutcome {
        self.dispatch_login(email, password).outcome().await
    }

    /// Start a login attempt without waiting for it.
    ///
    /// The state moves to `loading` before this returns. Outside a Tokio
    /// runtime the attempt settles at once as `failed`.
    pub fn dispatch_login(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> PendingLogin {
        let credentials = Credentials::new(email, password);

        let Some(generation) = self.begin_attempt(&credentials) else {
            return PendingLogin {
                state: PendingState::Ready(LoginOutcome::InFlight),
            };
        };

        // Owned by the task from the start, so a task dropped before its
        // first poll still settles the attempt.
        let guard = AttemptGuard {
            container: self.clone(),
            generation,
            settled: false,
        };

        let Ok(runtime) = Handle::try_current() else {
            warn!("login dispatched outside a Tokio runtime");
            let outcome = guard.settle(Err(ExchangeError::Transport(NO_RUNTIME.into())));
            return PendingLogin {
                state: PendingState::Ready(outcome),
            };
        };

        let exchange = Arc::clone(&self.inner.exchange);
        let handle = runtime.spawn(async move {
            let result = exchange.exchange(&credentials).await;
            guard.settle(result)
        });

        PendingLogin {
            state: PendingState::Running(handle),
        }
    }

    /// Sign out: reset to the default session and remove the persisted
    /// blob. Always succeeds; calling it again changes nothing.
    pub fn logout(&self) {
        let mut state = self.write_state();
        state.session = Session::default();
        state.generation += 1;

        if let Err(e) = persist::clear(self.inner.storage.as_ref(), &self.inner.key) {
            warn!(key = %self.inner.key, error = %e, "failed to clear persisted session");
        }

        debug!("logged out");
        self.publish(state);
    }

    /// Replace the session with one supplied by another collaborator (for
    /// example a "who am I" lookup) and persist it immediately.
    pub fn set_session_from_external(&self, user: User, token: impl Into<String>) {
        let mut state = self.write_state();
        state.session = Session::authenticated(user, token);
        state.generation += 1;

        if let Err(e) = persist::save(self.inner.storage.as_ref(), &self.inner.key, &state.session)
        {
            warn!(key = %self.inner.key, error = %e, "failed to persist external session");
        }

        debug!("session set externally");
        self.publish(state);
    }

    /// Re-read the persisted session and make it current.
    ///
    /// Runs at construction; call it again to pick up a blob written by
    /// another process. Absent or malformed blobs yield the default session.
    pub fn restore_from_persistence(&self) -> Session {
        let restored = persist::load(self.inner.storage.as_ref(), &self.inner.key);

        let mut state = self.write_state();
        state.session = restored.clone();
        state.generation += 1;

        debug!(status = %restored.status, "session restored");
        self.publish(state);
        restored
    }

    /// Register a callback run after every transition with the new session.
    ///
    /// Callbacks run after the state lock is released, so they may read or
    /// change the container. Every callback sees transitions in the order
    /// they were applied. They normally run on the thread that made the
    /// change; if another thread is already delivering, the change is
    /// queued and that thread delivers it next.
    pub fn observe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        let id = ObserverId(self.inner.next_observer.fetch_add(1, Ordering::Relaxed));
        let observer: Observer = Arc::new(callback);
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut observers = self
            .inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(observer, _)| *observer != id);
        observers.len() != before
    }

    /// Receiver that always holds the latest session.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.notifier.subscribe()
    }

    fn begin_attempt(&self, credentials: &Credentials) -> Option<u64> {
        let mut state = self.write_state();

        // Loading -> Loading is not a valid transition.
        if state.session.status.transition_to(SessionStatus::Loading).is_err() {
            debug!(email = %credentials.email, "login already in flight");
            return None;
        }
        state.session.error = None;
        state.generation += 1;
        let generation = state.generation;

        debug!(email = %credentials.email, generation, "login started");
        self.publish(state);
        Some(generation)
    }

    fn finish_attempt(
        &self,
        generation: u64,
        result: Result<Grant, ExchangeError>,
    ) -> LoginOutcome {
        let mut state = self.write_state();

        let target = if result.is_ok() {
            SessionStatus::Succeeded
        } else {
            SessionStatus::Failed
        };
        if state.generation != generation || state.session.status.transition_to(target).is_err() {
            debug!(generation, "discarding superseded login result");
            return LoginOutcome::Superseded;
        }

        let outcome = match result {
            Ok(grant) => {
                state.session.user = Some(grant.user);
                state.session.token = Some(grant.token);
                state.session.error = None;

                if let Err(e) =
                    persist::save(self.inner.storage.as_ref(), &self.inner.key, &state.session)
                {
                    warn!(key = %self.inner.key, error = %e, "failed to persist session");
                }

                debug!(generation, "login succeeded");
                LoginOutcome::Succeeded(state.session.clone())
            }
            Err(err) => {
                state.session.error = Some(err.to_string());
                debug!(generation, kind = err.kind(), "login failed");
                LoginOutcome::Failed(err)
            }
        };

        self.publish(state);
        outcome
    }

    /// Push the new session to watchers and queue it for callbacks while
    /// the lock is held, then release the lock and deliver.
    fn publish(&self, state: RwLockWriteGuard<'_, Tracked>) {
        let snapshot = state.session.clone();
        self.inner.notifier.send_replace(snapshot.clone());

        let deliver = {
            let mut dispatch = self.lock_dispatch();
            dispatch.queue.push_back(snapshot);
            !std::mem::replace(&mut dispatch.draining, true)
        };
        drop(state);

        if deliver {
            self.drain();
        }
    }

    /// Hand queued sessions to callbacks until the queue is empty.
    fn drain(&self) {
        let mut draining = Draining {
            container: self,
            armed: true,
        };

        loop {
            let next = {
                let mut dispatch = self.lock_dispatch();
                match dispatch.queue.pop_front() {
                    Some(session) => session,
                    None => {
                        dispatch.draining = false;
                        draining.armed = false;
                        return;
                    }
                }
            };

            let observers: Vec<Observer> = self
                .inner
                .observers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|(_, observer)| Arc::clone(observer))
                .collect();

            for observer in observers {
                observer(&next);
            }
        }
    }

    fn lock_dispatch(&self) -> MutexGuard<'_, Dispatch> {
        self.inner
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read_session<T>(&self, f: impl FnOnce(&Session) -> T) -> T {
        let state = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&state.session)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Tracked> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SessionContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContainer")
            .field("key", &self.inner.key)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

const ABORTED: &str = "login attempt aborted";
const NO_RUNTIME: &str = "no async runtime to run the login";

/// Releases the delivery role if a callback panics, so later transitions
/// are still delivered.
struct Draining<'a> {
    container: &'a SessionContainer,
    armed: bool,
}

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.container.lock_dispatch().draining = false;
        }
    }
}

/// Settles an attempt whose task ends without a result (panic, runtime
/// shutdown, task dropped before it ran), so the session does not stay
/// `loading`.
struct AttemptGuard {
    container: SessionContainer,
    generation: u64,
    settled: bool,
}

impl AttemptGuard {
    fn settle(mut self, result: Result<Grant, ExchangeError>) -> LoginOutcome {
        self.settled = true;
        self.container.finish_attempt(self.generation, result)
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.container.finish_attempt(
                self.generation,
                Err(ExchangeError::Transport(ABORTED.into())),
            );
        }
    }
}

enum PendingState {
    Ready(LoginOutcome),
    Running(JoinHandle<LoginOutcome>),
}

/// A login attempt that may still be in flight.
///
/// Dropping it does not cancel the attempt.
pub struct PendingLogin {
    state: PendingState,
}

impl PendingLogin {
    /// Check if the attempt has resolved.
    pub fn is_finished(&self) -> bool {
        match &self.state {
            PendingState::Ready(_) => true,
            PendingState::Running(handle) => handle.is_finished(),
        }
    }

    /// Wait for the attempt to resolve.
    pub async fn outcome(self) -> LoginOutcome {
        match self.state {
            PendingState::Ready(outcome) => outcome,
            PendingState::Running(handle) => match handle.await {
                Ok(outcome) => outcome,
                // The attempt guard already moved the session to `failed`.
                Err(e) => LoginOutcome::Failed(ExchangeError::Transport(e.to_string())),
            },
        }
    }
}

impl fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLogin")
            .field("finished", &self.is_finished())
            .finish()
    }
}
