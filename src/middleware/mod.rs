//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: panic recovery, access logging, security headers,
//! sessions, CSRF verification and authentication.
//!
//! A [`Chain`] is an ordered list of [`Middleware`] objects. Composing
//! `[m1, m2, m3]` with a handler `h` gives `m1(m2(m3(h)))`: `m1` sees the
//! request first and the response last.
//!
//! ```text
//!   request ──▶ m1 ──▶ m2 ──▶ m3 ──▶ h
//!  response ◀── m1 ◀── m2 ◀── m3 ◀──┘
//! ```
//!
//! Chains are plain values. [`Chain::append`] derives a longer chain without
//! touching the original, which is how the protected chain extends the
//! dynamic one.

mod auth;
mod csrf;
mod log;
mod recover;
mod secure_headers;
mod session;

use std::sync::Arc;

use async_trait::async_trait;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, private};
use crate::request::Request;
use crate::response::Response;

pub use auth::{Authenticate, RequireAuthentication};
pub use csrf::{CSRF_COOKIE, CSRF_FIELD, CSRF_HEADER, VerifyCsrf};
pub use log::LogRequest;
pub use recover::RecoverPanic;
pub use secure_headers::SecureHeaders;
pub use session::LoadAndSave;

/// One layer of the pipeline.
///
/// Call `next.run(req)` to hand the request to the rest of the chain, or
/// return a response without calling it to short-circuit.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, req: Request, next: Next) -> Response;
}

/// The remainder of the chain after the current middleware.
#[derive(Clone)]
pub struct Next {
    layers: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub async fn run(mut self, req: Request) -> Response {
        match self.layers.get(self.index).cloned() {
            Some(layer) => {
                self.index += 1;
                layer.handle(req, self).await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

/// An ordered list of middleware, not yet bound to a handler.
#[derive(Clone, Default)]
pub struct Chain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `middleware` as the innermost layer so far.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// A new chain with `middleware` added after this chain's layers.
    pub fn append(&self, middleware: impl Middleware) -> Self {
        self.clone().with(middleware)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Wrap `endpoint` in this chain.
    pub fn then(&self, endpoint: impl Handler) -> Pipeline {
        Pipeline {
            layers: self.layers.iter().cloned().collect(),
            endpoint: endpoint.into_boxed_handler(),
        }
    }
}

/// A chain bound to its endpoint. This is itself a [`Handler`], so it can be
/// registered on a route or wrapped in yet another chain.
#[derive(Clone)]
pub struct Pipeline {
    layers: Arc<[Arc<dyn Middleware>]>,
    endpoint: BoxedHandler,
}

impl Pipeline {
    /// Run one request through every layer and the endpoint.
    pub async fn handle(&self, req: Request) -> Response {
        self.start().run(req).await
    }

    fn start(&self) -> Next {
        Next {
            layers: Arc::clone(&self.layers),
            index: 0,
            endpoint: Arc::clone(&self.endpoint),
        }
    }
}

impl ErasedHandler for Pipeline {
    fn call(&self, req: Request) -> BoxFuture {
        Box::pin(self.start().run(req))
    }
}

impl private::Sealed for Pipeline {}

impl Handler for Pipeline {
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(self)
    }
}
