use std::future::Future;
use std::sync::Arc;

use super::{App, assets, handlers, with_app};
use crate::health;
use crate::method::Method;
use crate::middleware::{
    Authenticate, Chain, LoadAndSave, LogRequest, Pipeline, RecoverPanic, RequireAuthentication,
    SecureHeaders, VerifyCsrf,
};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::status::Status;

/// The complete application: every route, wrapped in its chain, behind the
/// standard chain.
///
/// ```text
/// standard  = recover → log → secure headers
/// dynamic   = session → csrf → authenticate
/// protected = dynamic + require authentication
/// ```
pub fn routes(app: Arc<App>) -> Pipeline {
    let dynamic = Chain::new()
        .with(LoadAndSave::new(app.sessions.clone()))
        .with(VerifyCsrf::new(app.sessions.is_secure()))
        .with(Authenticate::new(Arc::clone(&app.users)));
    let protected = dynamic.append(RequireAuthentication::default());

    let router = Router::new()
        .on(Method::Get, "/static/{*path}", with_app(Arc::clone(&app), assets::serve))
        .on(Method::Get, "/ping", health::ping)
        .on(Method::Get, "/", mount(&dynamic, &app, handlers::home))
        .on(Method::Get, "/snippet/view/{id}", mount(&dynamic, &app, handlers::snippet_view))
        .on(Method::Get, "/user/signup", mount(&dynamic, &app, handlers::user_signup))
        .on(Method::Post, "/user/signup", mount(&dynamic, &app, handlers::user_signup_post))
        .on(Method::Get, "/user/login", mount(&dynamic, &app, handlers::user_login))
        .on(Method::Post, "/user/login", mount(&dynamic, &app, handlers::user_login_post))
        .on(Method::Get, "/snippet/create", mount(&protected, &app, handlers::snippet_create))
        .on(Method::Post, "/snippet/create", mount(&protected, &app, handlers::snippet_create_post))
        .on(Method::Post, "/user/logout", mount(&protected, &app, handlers::user_logout_post))
        .not_found(not_found);

    Chain::new()
        .with(RecoverPanic)
        .with(LogRequest)
        .with(SecureHeaders::default())
        .then(router)
}

fn mount<F, Fut>(chain: &Chain, app: &Arc<App>, handler: F) -> Pipeline
where
    F: Fn(Arc<App>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    chain.then(with_app(Arc::clone(app), handler))
}

async fn not_found(_req: Request) -> Response {
    Response::status(Status::NotFound)
}
