use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::error;

use super::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// Turns a panic anywhere downstream into a `500`.
///
/// The response also carries `Connection: close`: after a panic the
/// connection's state is unknown, so it is not offered for reuse.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecoverPanic;

#[async_trait]
impl Middleware for RecoverPanic {
    async fn handle(&self, req: Request, next: Next) -> Response {
        match AssertUnwindSafe(next.run(req)).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => {
                error!(panic = %panic_message(panic.as_ref()), "request handler panicked");
                let mut res = Response::status(Status::InternalServerError);
                res.set_header("connection", "close");
                res
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}
