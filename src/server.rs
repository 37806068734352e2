//! HTTP server and graceful shutdown.
//!
//! One task per connection; hyper drives HTTP/1.1 or HTTP/2 on it, whichever
//! the client negotiates. Every request body is collected in full, up to a
//! size cap, before the application sees it, and every request runs under a
//! timeout. Responses the server answers itself (unknown method, oversized
//! body, timeout) carry the same hardening headers as the application's.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or Ctrl-C the server:
//! 1. Stops accepting connections.
//! 2. Asks every open connection to finish its in-flight request and close.
//! 3. Waits up to the grace period for that, then drops whatever is left.
//! 4. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::SecureHeaders;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// The HTTP server.
#[derive(Debug)]
pub struct Server {
    addr: SocketAddr,
    request_timeout: Duration,
    shutdown_grace: Duration,
    max_body_bytes: usize,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust,no_run
    /// use snippetbox::Server;
    /// let server = Server::bind("0.0.0.0:4000")?;
    /// # Ok::<(), snippetbox::Error>(())
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr: SocketAddr = addr.parse().map_err(|_| Error::Address(addr.to_owned()))?;
        Ok(Self {
            addr,
            request_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(30),
            max_body_bytes: 10 * 1024 * 1024,
        })
    }

    /// Upper bound on the time one request may spend in the application.
    /// Past it the work is dropped and the client gets a `500`.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Largest request body accepted. Anything bigger gets a `400`.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// How long shutdown waits for open connections before dropping them.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Serve `app` until SIGTERM or Ctrl-C, then shut down gracefully.
    pub async fn serve(self, app: impl Handler) -> Result<(), Error> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops when `signal` resolves.
    pub async fn serve_with_shutdown(
        self,
        app: impl Handler,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let app = app.into_boxed_handler();
        let timeout = self.request_timeout;
        let max_body = self.max_body_bytes;

        info!(addr = %listener.local_addr()?, "snippetbox listening");

        let mut tasks = tokio::task::JoinSet::new();
        // Flipped once; every connection task watches it.
        let (stop_tx, stop_rx) = watch::channel(false);

        tokio::pin!(signal);

        loop {
            tokio::select! {
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let mut stop = stop_rx.clone();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            dispatch(Arc::clone(&app), timeout, max_body, req, remote_addr)
                        });

                        let builder = ConnBuilder::new(TokioExecutor::new());
                        let conn = builder.serve_connection(io, svc);
                        tokio::pin!(conn);

                        let result = tokio::select! {
                            res = conn.as_mut() => res,
                            _ = stop.changed() => {
                                conn.as_mut().graceful_shutdown();
                                conn.await
                            }
                        };
                        if let Err(e) = result {
                            debug!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Closed connections leave the set here.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);
        let _ = stop_tx.send(true);

        let drain = async { while tasks.join_next().await.is_some() {} };
        if tokio::time::timeout(self.shutdown_grace, drain).await.is_err() {
            warn!(remaining = tasks.len(), "grace period elapsed, dropping open connections");
            tasks.abort_all();
        }

        info!("snippetbox stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Turns one hyper request into one response. Every failure is answered
/// in-band, so hyper never sees an error.
async fn dispatch<B>(
    app: BoxedHandler,
    timeout: Duration,
    max_body: usize,
    req: hyper::Request<B>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let response = match into_request(req, remote_addr, max_body).await {
        Ok(req) => respond(&app, timeout, req, remote_addr).await,
        Err(res) => res,
    };

    Ok(response.into_inner())
}

/// Run `req` through the application, giving up after `timeout`.
async fn respond(
    app: &BoxedHandler,
    timeout: Duration,
    req: Request,
    remote_addr: SocketAddr,
) -> Response {
    let (method, path) = (req.method(), req.path().to_owned());
    match tokio::time::timeout(timeout, app.call(req)).await {
        Ok(res) => res,
        Err(_) => {
            warn!(
                peer = %remote_addr,
                %method,
                %path,
                status = 500,
                timeout_ms = timeout.as_millis() as u64,
                "request timed out",
            );
            let mut res = rejected(Status::InternalServerError);
            res.set_header("connection", "close");
            res
        }
    }
}

async fn into_request<B>(
    req: hyper::Request<B>,
    remote_addr: SocketAddr,
    max_body: usize,
) -> Result<Request, Response>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let (parts, body) = req.into_parts();

    let Ok(method) = parts.method.as_str().parse::<Method>() else {
        info!(peer = %remote_addr, method = %parts.method, uri = %parts.uri, status = 400, "unsupported method");
        return Err(rejected(Status::BadRequest));
    };

    let body = match Limited::new(body, max_body).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            info!(peer = %remote_addr, %method, uri = %parts.uri, status = 400, "unreadable request body: {e}");
            return Err(rejected(Status::BadRequest));
        }
    };

    let uri = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let mut req = Request::builder(method, uri)
        .body(body)
        .remote_addr(remote_addr)
        .build();
    req.headers = parts.headers.iter()
        .map(|(name, value)| {
            (name.as_str().to_owned(), String::from_utf8_lossy(value.as_bytes()).into_owned())
        })
        .collect();
    Ok(req)
}

/// A response built by the server itself, outside the application's chain.
fn rejected(status: Status) -> Response {
    let mut res = Response::status(status);
    SecureHeaders::default().apply(&mut res);
    res
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C) the process receives.
/// On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
