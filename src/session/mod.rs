//! Server-side sessions.
//!
//! A [`SessionManager`] turns the token a client presents into a per-request
//! [`Session`] handle and, once the handler is done, writes whatever changed
//! back to the [`SessionStore`] in one operation. Handlers only ever see the
//! handle, and only for the duration of one request.

mod memory;
mod store;

use std::sync::Arc;
use std::time::Duration;

use cookie::{Cookie, SameSite};
use parking_lot::Mutex;
use time::OffsetDateTime;
use tracing::debug;

pub use memory::MemoryStore;
pub use store::{SessionError, SessionRecord, SessionStore, SessionToken};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Request-scoped access to one session's state.
///
/// Cloning the handle is cheap and every clone sees the same state. Each
/// accessor takes the lock for a single read-modify-write, so
/// [`pop_flash`](Session::pop_flash) cannot hand the same message out twice.
#[derive(Clone)]
pub struct Session(Arc<Mutex<State>>);

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

struct State {
    token: SessionToken,
    record: SessionRecord,
    changed: bool,
    /// Token this session was loaded under, when it has since been renewed.
    replaced: Option<SessionToken>,
}

impl Session {
    fn new(token: SessionToken, record: SessionRecord) -> Self {
        Self(Arc::new(Mutex::new(State { token, record, changed: false, replaced: None })))
    }

    pub fn token(&self) -> SessionToken {
        self.0.lock().token.clone()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.0.lock().record.user_id
    }

    pub fn set_user_id(&self, user_id: i64) {
        let mut state = self.0.lock();
        state.record.user_id = Some(user_id);
        state.changed = true;
    }

    pub fn remove_user_id(&self) {
        let mut state = self.0.lock();
        if state.record.user_id.take().is_some() {
            state.changed = true;
        }
    }

    pub fn put_flash(&self, message: impl Into<String>) {
        let mut state = self.0.lock();
        state.record.flash = Some(message.into());
        state.changed = true;
    }

    /// Read the flash message and clear it in the same step.
    pub fn pop_flash(&self) -> Option<String> {
        let mut state = self.0.lock();
        let flash = state.record.flash.take();
        if flash.is_some() {
            state.changed = true;
        }
        flash
    }

    /// Put back a flash message that was popped but never shown. A message
    /// queued in the meantime takes precedence.
    pub fn restore_flash(&self, message: String) {
        let mut state = self.0.lock();
        if state.record.flash.is_none() {
            state.record.flash = Some(message);
            state.changed = true;
        }
    }

    /// Move the session's state to a fresh token.
    ///
    /// Called on every privilege change (login, logout) so a token observed
    /// before the change is worthless after it. The old record is deleted
    /// when the session is committed.
    pub fn renew_token(&self) {
        let mut state = self.0.lock();
        let old = std::mem::replace(&mut state.token, SessionToken::random());
        state.replaced.get_or_insert(old);
        state.changed = true;
    }
}

/// Loads sessions at the start of a request and commits them at the end.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    lifetime: Duration,
    secure: bool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, lifetime: Duration) -> Self {
        Self { store, lifetime, secure: true }
    }

    /// Whether the session cookie carries the `Secure` attribute. On by
    /// default; turn it off only for plain-HTTP local development.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// The session for `raw_token`, or a fresh anonymous one when the token
    /// is missing, malformed, unknown or expired.
    pub async fn load(&self, raw_token: Option<&str>) -> Result<Session, SessionError> {
        if let Some(token) = raw_token.and_then(SessionToken::parse) {
            if let Some(record) = self.store.load(&token).await? {
                return Ok(Session::new(token, record));
            }
            debug!("unknown or expired session token, starting a new session");
        }
        Ok(Session::new(SessionToken::random(), SessionRecord::new(self.deadline())))
    }

    /// Persist the session if anything changed, with a refreshed expiry.
    ///
    /// Returns the `set-cookie` value the client needs, if any. An unchanged
    /// session costs nothing: no store round-trip, no cookie.
    pub async fn commit(&self, session: &Session) -> Result<Option<String>, SessionError> {
        let (token, mut record, replaced) = {
            let state = session.0.lock();
            if !state.changed {
                return Ok(None);
            }
            (state.token.clone(), state.record.clone(), state.replaced.clone())
        };

        record.expires_at = self.deadline();
        self.store.save(&token, record).await?;
        if let Some(old) = replaced {
            self.store.destroy(&old).await?;
        }

        let mut state = session.0.lock();
        state.changed = false;
        state.replaced = None;
        drop(state);
        Ok(Some(self.cookie(&token)))
    }

    fn deadline(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc() + self.lifetime
    }

    fn cookie(&self, token: &SessionToken) -> String {
        let max_age = i64::try_from(self.lifetime.as_secs()).unwrap_or(i64::MAX);
        Cookie::build((SESSION_COOKIE, token.to_string()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(max_age))
            .build()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (SessionManager, MemoryStore) {
        let store = MemoryStore::new();
        let manager = SessionManager::new(Arc::new(store.clone()), Duration::from_secs(60));
        (manager, store)
    }

    #[tokio::test]
    async fn untouched_sessions_are_not_persisted() {
        let (manager, store) = manager();
        let session = manager.load(None).await.unwrap();

        assert_eq!(manager.commit(&session).await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn flash_is_seen_exactly_once_across_requests() {
        let (manager, _store) = manager();

        let first = manager.load(None).await.unwrap();
        first.put_flash("Snippet successfully created!");
        manager.commit(&first).await.unwrap();
        let token = first.token();

        let second = manager.load(Some(token.as_str())).await.unwrap();
        assert_eq!(second.pop_flash().as_deref(), Some("Snippet successfully created!"));
        assert_eq!(second.pop_flash(), None);
        manager.commit(&second).await.unwrap();

        let third = manager.load(Some(token.as_str())).await.unwrap();
        assert_eq!(third.pop_flash(), None);
    }

    #[tokio::test]
    async fn renewing_moves_state_and_drops_the_old_token() {
        let (manager, store) = manager();
        let session = manager.load(None).await.unwrap();
        session.set_user_id(7);
        manager.commit(&session).await.unwrap();
        let old = session.token();

        let session = manager.load(Some(old.as_str())).await.unwrap();
        session.renew_token();
        session.remove_user_id();
        session.put_flash("You've been logged out successfully!");
        let cookie = manager.commit(&session).await.unwrap().unwrap();
        let new = session.token();

        assert_ne!(old, new);
        assert!(cookie.starts_with(&format!("{SESSION_COOKIE}={new}")));
        assert_eq!(store.load(&old).await.unwrap(), None);
        let record = store.load(&new).await.unwrap().unwrap();
        assert_eq!(record.user_id, None);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn garbage_tokens_start_a_new_session() {
        let (manager, _store) = manager();
        let session = manager.load(Some("not-a-token")).await.unwrap();

        assert_ne!(session.token().as_str(), "not-a-token");
        assert_eq!(session.user_id(), None);
    }

    #[tokio::test]
    async fn session_cookies_are_locked_down() {
        let (manager, _store) = manager();
        let session = manager.load(None).await.unwrap();
        session.put_flash("hi");
        let cookie = manager.commit(&session).await.unwrap().unwrap();

        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=60"));
    }
}
