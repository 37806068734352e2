use async_trait::async_trait;

use super::{Middleware, Next};
use crate::error::server_error;
use crate::request::Request;
use crate::response::Response;
use crate::session::{SESSION_COOKIE, SessionManager};

/// Loads the client's session before the rest of the chain runs and commits
/// it once the response is ready.
///
/// Because it wraps everything downstream, a change made anywhere (including
/// deep inside the handler) is persisted exactly once per request. The commit
/// runs on its own task: if the request is abandoned halfway (client gone,
/// timeout), the store write still finishes or never starts.
#[derive(Clone)]
pub struct LoadAndSave {
    sessions: SessionManager,
}

impl LoadAndSave {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Middleware for LoadAndSave {
    async fn handle(&self, mut req: Request, next: Next) -> Response {
        let token = req.cookie(SESSION_COOKIE);
        let session = match self.sessions.load(token.as_deref()).await {
            Ok(session) => session,
            Err(e) => return server_error(&e),
        };
        req.session = Some(session.clone());

        let mut res = next.run(req).await;

        let sessions = self.sessions.clone();
        let commit = tokio::spawn(async move { sessions.commit(&session).await });
        match commit.await {
            Ok(Ok(Some(cookie))) => res.append_header("set-cookie", cookie),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => return server_error(&e),
            Err(e) => return server_error(&e),
        }
        res.append_header("vary", "Cookie");
        res
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::method::Method;
    use crate::middleware::Chain;
    use crate::session::{MemoryStore, SessionError, SessionRecord, SessionStore, SessionToken};

    /// A store whose writes take a while to land.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait]
    impl SessionStore for SlowStore {
        async fn load(&self, token: &SessionToken) -> Result<Option<SessionRecord>, SessionError> {
            self.inner.load(token).await
        }

        async fn save(&self, token: &SessionToken, record: SessionRecord) -> Result<(), SessionError> {
            tokio::time::sleep(self.delay).await;
            self.inner.save(token, record).await
        }

        async fn destroy(&self, token: &SessionToken) -> Result<(), SessionError> {
            self.inner.destroy(token).await
        }

        async fn delete_expired(&self) -> Result<usize, SessionError> {
            self.inner.delete_expired().await
        }
    }

    async fn flash(req: Request) -> Response {
        if let Some(session) = req.session() {
            session.put_flash("saved");
        }
        Response::text("ok")
    }

    async fn quiet(req: Request) -> Response {
        assert!(req.session().is_some());
        Response::text("ok")
    }

    fn sessions(store: &MemoryStore) -> SessionManager {
        SessionManager::new(Arc::new(store.clone()), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn changes_are_saved_and_the_cookie_issued() {
        let store = MemoryStore::new();
        let res = Chain::new()
            .with(LoadAndSave::new(sessions(&store)))
            .then(flash)
            .handle(Request::builder(Method::Get, "/").build())
            .await;

        let cookie = res.header("set-cookie").unwrap();
        assert!(cookie.starts_with("session="));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn untouched_sessions_cost_nothing() {
        let store = MemoryStore::new();
        let res = Chain::new()
            .with(LoadAndSave::new(sessions(&store)))
            .then(quiet)
            .handle(Request::builder(Method::Get, "/").build())
            .await;

        assert_eq!(res.header("set-cookie"), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn an_abandoned_request_still_finishes_its_commit() {
        let store = MemoryStore::new();
        let slow = SlowStore { inner: store.clone(), delay: Duration::from_millis(200) };
        let pipeline = Chain::new()
            .with(LoadAndSave::new(SessionManager::new(Arc::new(slow), Duration::from_secs(3600))))
            .then(flash);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            pipeline.handle(Request::builder(Method::Get, "/").build()),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(store.is_empty().await);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.len().await, 1);
    }
}
