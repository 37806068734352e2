//! Route handlers and their type-erased form.
//!
//! The dispatcher keeps one radix tree per method, and every tree stores a
//! single value type. Handlers come in many types (plain `async fn`s,
//! closures over `Arc<App>`, whole middleware pipelines, the router itself),
//! so each is erased into a [`BoxedHandler`] when it is registered.
//!
//! ```text
//! |req| handlers::home(app, req)          closure over Arc<App>
//!        ↓ dynamic.then(...)
//! Pipeline { layers, endpoint }           implements Handler
//!        ↓ router.on(Method::Get, "/", pipeline)
//! Arc<dyn ErasedHandler>                  stored in the tree
//!        ↓ per request
//! handler.call(req) -> BoxFuture
//! ```
//!
//! Per request that costs one `Arc` clone and one virtual call per layer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// The future every erased handler returns. Boxed and pinned so it can be
/// stored behind a trait object; `Send + 'static` so tokio may move it
/// between worker threads.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Object-safe face of a handler.
///
/// Public only because it appears in [`Handler::into_boxed_handler`].
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A shared, erased handler. Cloning it is a reference-count bump.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Anything that can answer a route.
///
/// Implemented for every `Fn(Request) -> impl Future<Output = impl IntoResponse>`
/// that is `Send + Sync + 'static`, and for the crate's composite handlers
/// ([`Pipeline`](crate::middleware::Pipeline) and [`Router`](crate::Router)).
/// Sealed: no impls outside this crate.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

pub(crate) mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(Erased(self))
    }
}

/// Bridges a concrete function type to [`ErasedHandler`].
struct Erased<F>(F);

impl<F, Fut, R> ErasedHandler for Erased<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let pending = (self.0)(req);
        Box::pin(async move { pending.await.into_response() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::status::Status;

    async fn plain(_req: Request) -> &'static str {
        "plain"
    }

    async fn status(_req: Request) -> Status {
        Status::NotFound
    }

    #[tokio::test]
    async fn return_values_are_converted_into_responses() {
        let req = || Request::builder(Method::Get, "/").build();

        let res = plain.into_boxed_handler().call(req()).await;
        assert_eq!(res.body(), b"plain");

        let res = status.into_boxed_handler().call(req()).await;
        assert_eq!(res.status_code(), 404);
    }
}
