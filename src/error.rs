//! Unified startup error type, and the one place server errors are reported.
//!
//! Failures are handled by kind:
//!
//! | Kind | Client sees | Operators see |
//! |---|---|---|
//! | Client (bad form, unknown snippet) | page or status text, 4xx | debug log at most |
//! | Auth (not logged in) | redirect | nothing |
//! | Dependency (store, session backend) | generic 500 | error chain + backtrace |
//! | Programmer (unknown template, unwired session) | generic 500 | error chain + backtrace |

use std::backtrace::Backtrace;
use std::error::Error as StdError;

use tracing::error;

use crate::response::Response;
use crate::status::Status;
use crate::templates::BuildError;

/// The error type returned by snippetbox's fallible startup operations.
///
/// Request-level failures (404, 422, 500, etc.) are expressed as HTTP
/// [`Response`] values, not as `Error`s. This type surfaces the failures that
/// keep the server from accepting traffic at all: bad configuration, a
/// template set that does not compile, binding to a port.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid listen address `{0}`")]
    Address(String),
    #[error("configuration: {0}")]
    Config(#[from] Box<figment::Error>),
    #[error("templates: {0}")]
    Templates(#[from] BuildError),
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}

/// Log `err` with its full source chain and a backtrace, then answer with a
/// bare `500`. Nothing about the error reaches the client.
pub fn server_error(err: &(dyn StdError + 'static)) -> Response {
    error!(
        error = %error_chain(err),
        backtrace = %Backtrace::force_capture(),
        "internal server error",
    );
    Response::status(Status::InternalServerError)
}

/// `outer: cause: root cause`
pub(crate) fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
