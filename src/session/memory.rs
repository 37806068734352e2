//! An in-memory session store, for local development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::store::{SessionError, SessionRecord, SessionStore, SessionToken};

/// An in-memory session store.
///
/// # Limitations
///
/// This store won't persist data between server restarts, nor share it
/// between server instances. Expired records linger until they are loaded
/// or [`SessionStore::delete_expired`] sweeps them.
#[derive(Clone, Default)]
pub struct MemoryStore(Arc<Mutex<HashMap<SessionToken, SessionRecord>>>);

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, stale ones included.
    pub async fn len(&self) -> usize {
        self.0.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    #[tracing::instrument(name = "Load session record", level = tracing::Level::TRACE, skip_all)]
    async fn load(&self, token: &SessionToken) -> Result<Option<SessionRecord>, SessionError> {
        let mut guard = self.0.lock().await;
        let Some(record) = guard.get(token) else {
            return Ok(None);
        };
        if !record.is_expired() {
            return Ok(Some(record.clone()));
        }
        guard.remove(token);
        Ok(None)
    }

    #[tracing::instrument(name = "Save session record", level = tracing::Level::TRACE, skip_all)]
    async fn save(&self, token: &SessionToken, record: SessionRecord) -> Result<(), SessionError> {
        self.0.lock().await.insert(token.clone(), record);
        Ok(())
    }

    #[tracing::instrument(name = "Destroy session record", level = tracing::Level::TRACE, skip_all)]
    async fn destroy(&self, token: &SessionToken) -> Result<(), SessionError> {
        self.0.lock().await.remove(token);
        Ok(())
    }

    #[tracing::instrument(name = "Delete expired session records", level = tracing::Level::TRACE, skip_all)]
    async fn delete_expired(&self) -> Result<usize, SessionError> {
        let mut guard = self.0.lock().await;
        let before = guard.len();
        guard.retain(|_, record| !record.is_expired());
        Ok(before - guard.len())
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};

    use super::*;

    fn record(offset: Duration) -> SessionRecord {
        SessionRecord::new(OffsetDateTime::now_utc() + offset)
    }

    #[tokio::test]
    async fn expired_records_are_never_returned() {
        let store = MemoryStore::new();
        let token = SessionToken::random();
        store.save(&token, record(Duration::seconds(-1))).await.unwrap();

        assert_eq!(store.load(&token).await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn sweep_only_removes_stale_records() {
        let store = MemoryStore::new();
        store.save(&SessionToken::random(), record(Duration::seconds(-5))).await.unwrap();
        store.save(&SessionToken::random(), record(Duration::seconds(-5))).await.unwrap();
        let live = SessionToken::random();
        store.save(&live, record(Duration::hours(1))).await.unwrap();

        assert_eq!(store.delete_expired().await.unwrap(), 2);
        assert!(store.load(&live).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn last_save_wins() {
        let store = MemoryStore::new();
        let token = SessionToken::random();
        let mut first = record(Duration::hours(1));
        first.flash = Some("first".into());
        let mut second = first.clone();
        second.flash = Some("second".into());

        store.save(&token, first).await.unwrap();
        store.save(&token, second).await.unwrap();

        let loaded = store.load(&token).await.unwrap().unwrap();
        assert_eq!(loaded.flash.as_deref(), Some("second"));
    }
}
