//! Radix-tree request dispatcher.
//!
//! One tree per HTTP method. O(path-length) lookup. A request either matches
//! a registered `(method, pattern)` pair exactly or goes to the not-found
//! handler; there is no implicit method fallback, so a GET-only route does
//! not answer POST.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, private};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// The application dispatcher.
///
/// Build it once at startup, then hand it to the standard middleware chain
/// so that every request, matched or not, passes through the same outer
/// layers. Each [`Router::on`] call returns `self` so registrations chain
/// naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    not_found: BoxedHandler,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            not_found: not_found.into_boxed_handler(),
        }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax, a trailing catch-all `{*name}`;
    /// `req.param("name")` retrieves either:
    ///
    /// ```rust,no_run
    /// # use snippetbox::{Method, Request, Response, Router};
    /// # async fn view(_: Request) -> Response { Response::text("") }
    /// # async fn asset(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::Get, "/snippet/view/{id}", view)
    ///     .on(Method::Get, "/static/{*path}",    asset);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern or conflicts with a route
    /// already registered for `method`. The route table is static, so this
    /// surfaces at startup, never while serving.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{method} {path}`: {e}"));
        self
    }

    /// Replace the handler answering requests that match no route.
    pub fn not_found(mut self, handler: impl Handler) -> Self {
        self.not_found = handler.into_boxed_handler();
        self
    }

    pub(crate) fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl ErasedHandler for Router {
    fn call(&self, mut req: Request) -> BoxFuture {
        match self.lookup(req.method, &req.path) {
            Some((handler, params)) => {
                req.context.params = params;
                handler.call(req)
            }
            None => self.not_found.call(req),
        }
    }
}

impl private::Sealed for Router {}

impl Handler for Router {
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(self)
    }
}

async fn not_found(_req: Request) -> Response {
    Response::status(Status::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn echo_id(req: Request) -> Response {
        Response::text(req.param("id").unwrap_or("none").to_owned())
    }

    async fn created(_req: Request) -> Response {
        Response::text("created")
    }

    async fn run(router: &Router, method: Method, path: &str) -> Response {
        router.call(Request::builder(method, path).build()).await
    }

    #[tokio::test]
    async fn named_parameters_are_extracted() {
        let router = Router::new().on(Method::Get, "/snippet/view/{id}", echo_id);
        let res = run(&router, Method::Get, "/snippet/view/42").await;

        assert_eq!(res.status_code(), 200);
        assert_eq!(res.body(), b"42");
    }

    #[tokio::test]
    async fn methods_must_match_exactly() {
        let router = Router::new()
            .on(Method::Get, "/snippet/view/{id}", echo_id)
            .on(Method::Post, "/snippet/create", created);

        assert_eq!(run(&router, Method::Post, "/snippet/view/1").await.status_code(), 404);
        assert_eq!(run(&router, Method::Get, "/snippet/create").await.status_code(), 404);
        assert_eq!(run(&router, Method::Post, "/snippet/create").await.status_code(), 200);
    }

    #[tokio::test]
    async fn unmatched_requests_reach_the_custom_fallback() {
        async fn teapot(_req: Request) -> Response {
            Response::text("custom")
        }

        let router = Router::new()
            .on(Method::Get, "/", created)
            .not_found(teapot);
        let res = run(&router, Method::Get, "/nope").await;

        assert_eq!(res.body(), b"custom");
    }

    #[tokio::test]
    async fn catch_all_captures_the_remaining_path() {
        async fn asset(req: Request) -> Response {
            Response::text(req.param("path").unwrap_or_default().to_owned())
        }

        let router = Router::new().on(Method::Get, "/static/{*path}", asset);
        let res = run(&router, Method::Get, "/static/css/main.css").await;

        assert_eq!(res.body(), b"css/main.css");
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic_at_registration() {
        let _ = Router::new()
            .on(Method::Get, "/snippet/view/{id}", echo_id)
            .on(Method::Get, "/snippet/view/{key}", echo_id);
    }
}
