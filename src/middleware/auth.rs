use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Middleware, Next};
use crate::context::AuthState;
use crate::error::server_error;
use crate::models::UserStore;
use crate::request::Request;
use crate::response::Response;

/// Resolves the session's user into [`AuthState`] on the request context.
///
/// The user id is re-checked against the user store on every request, so an
/// account deleted mid-session is logged out on its next request. Must run
/// inside [`LoadAndSave`](super::LoadAndSave); without a session every
/// request is anonymous.
#[derive(Clone)]
pub struct Authenticate {
    users: Arc<dyn UserStore>,
}

impl Authenticate {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Middleware for Authenticate {
    async fn handle(&self, mut req: Request, next: Next) -> Response {
        let Some(session) = req.session().cloned() else {
            return next.run(req).await;
        };
        let Some(user_id) = session.user_id() else {
            return next.run(req).await;
        };

        match self.users.exists(user_id).await {
            Ok(true) => req.context.auth = AuthState::Authenticated { user_id },
            Ok(false) => {
                debug!(user_id, "session refers to a missing user, dropping it");
                session.remove_user_id();
            }
            Err(e) => return server_error(&e),
        }
        next.run(req).await
    }
}

/// Turns anonymous requests away with a redirect to the login page.
///
/// Authenticated responses are marked `Cache-Control: no-store` so pages
/// behind the login never end up in a shared cache.
#[derive(Clone, Debug)]
pub struct RequireAuthentication {
    login_path: String,
}

impl RequireAuthentication {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self { login_path: login_path.into() }
    }
}

impl Default for RequireAuthentication {
    fn default() -> Self {
        Self::new("/user/login")
    }
}

#[async_trait]
impl Middleware for RequireAuthentication {
    async fn handle(&self, req: Request, next: Next) -> Response {
        if !req.context().is_authenticated() {
            return Response::redirect(&self.login_path);
        }
        let mut res = next.run(req).await;
        res.set_header("cache-control", "no-store");
        res
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::method::Method;
    use crate::middleware::{Chain, LoadAndSave};
    use crate::models::MemoryUsers;
    use crate::session::{MemoryStore, SESSION_COOKIE, SessionManager};

    async fn whoami(req: Request) -> Response {
        match req.context().user_id() {
            Some(id) => Response::text(id.to_string()),
            None => Response::text("anonymous"),
        }
    }

    async fn signed_in(sessions: &SessionManager, user_id: i64) -> String {
        let session = sessions.load(None).await.unwrap();
        session.set_user_id(user_id);
        sessions.commit(&session).await.unwrap();
        format!("{SESSION_COOKIE}={}", session.token())
    }

    fn chain(sessions: &SessionManager, users: Arc<MemoryUsers>) -> Chain {
        Chain::new()
            .with(LoadAndSave::new(sessions.clone()))
            .with(Authenticate::new(users))
    }

    fn manager(store: &MemoryStore) -> SessionManager {
        SessionManager::new(Arc::new(store.clone()), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn known_users_are_authenticated() {
        let store = MemoryStore::new();
        let sessions = manager(&store);
        let users = Arc::new(MemoryUsers::new());
        users.insert("Ann", "ann@example.com", "password1").await.unwrap();
        let id = users.authenticate("ann@example.com", "password1").await.unwrap();
        let cookie = signed_in(&sessions, id).await;

        let req = Request::builder(Method::Get, "/").header("cookie", &cookie).build();
        let res = chain(&sessions, users).then(whoami).handle(req).await;

        assert_eq!(res.body(), id.to_string().as_bytes());
    }

    #[tokio::test]
    async fn vanished_users_are_logged_out() {
        let store = MemoryStore::new();
        let sessions = manager(&store);
        let cookie = signed_in(&sessions, 42).await;
        let token = cookie.trim_start_matches("session=").to_owned();

        let req = Request::builder(Method::Get, "/").header("cookie", &cookie).build();
        let res = chain(&sessions, Arc::new(MemoryUsers::new())).then(whoami).handle(req).await;

        assert_eq!(res.body(), b"anonymous");
        let reloaded = sessions.load(Some(token.as_str())).await.unwrap();
        assert_eq!(reloaded.user_id(), None);
    }

    #[tokio::test]
    async fn anonymous_requests_are_redirected_to_login() {
        let store = MemoryStore::new();
        let sessions = manager(&store);
        let res = chain(&sessions, Arc::new(MemoryUsers::new()))
            .with(RequireAuthentication::default())
            .then(whoami)
            .handle(Request::builder(Method::Get, "/snippet/create").build())
            .await;

        assert_eq!(res.status_code(), 302);
        assert_eq!(res.header("location"), Some("/user/login"));
        assert_eq!(res.header("set-cookie"), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn protected_responses_are_not_cached() {
        let store = MemoryStore::new();
        let sessions = manager(&store);
        let users = Arc::new(MemoryUsers::new());
        users.insert("Ann", "ann@example.com", "password1").await.unwrap();
        let cookie = signed_in(&sessions, 1).await;

        let req = Request::builder(Method::Get, "/snippet/create").header("cookie", &cookie).build();
        let res = chain(&sessions, users)
            .with(RequireAuthentication::default())
            .then(whoami)
            .handle(req)
            .await;

        assert_eq!(res.status_code(), 200);
        assert_eq!(res.header("cache-control"), Some("no-store"));
    }
}
