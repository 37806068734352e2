use std::time::Instant;

use async_trait::async_trait;
use tracing::{Instrument, debug, info, info_span};

use super::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Structured access log.
///
/// Everything downstream runs inside a `request` span carrying the peer,
/// method and URI; one event is emitted when the request starts and one with
/// the status and latency when the response comes back.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRequest;

#[async_trait]
impl Middleware for LogRequest {
    async fn handle(&self, req: Request, next: Next) -> Response {
        let uri = match req.query() {
            Some(query) => format!("{}?{query}", req.path()),
            None => req.path().to_owned(),
        };
        let peer = req.remote_addr().map(|addr| addr.to_string()).unwrap_or_default();
        let span = info_span!("request", %peer, method = %req.method(), %uri);

        async move {
            let started = Instant::now();
            debug!("started");
            let res = next.run(req).await;
            info!(
                status = res.status_code(),
                latency_us = started.elapsed().as_micros() as u64,
                "finished",
            );
            res
        }
        .instrument(span)
        .await
    }
}
