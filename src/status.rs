//! HTTP status codes as a typed enum.
//!
//! Only the codes the application actually answers with are listed. Use
//! [`Status`] anywhere a status code is accepted: `Response::status()`,
//! `Response::builder().status()`, or `Templates::render`.
//!
//! ```rust
//! use snippetbox::{Response, Status};
//!
//! Response::status(Status::NotFound);
//!
//! Response::builder()
//!     .status(Status::UnprocessableContent)
//!     .text("title: this field cannot be blank");
//! ```

/// The status codes produced by the application.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok,                  // 200

    // ── 3xx Redirection ───────────────────────────────────────────────────────
    Found,               // 302

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,          // 400
    NotFound,            // 404
    UnprocessableContent, // 422

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError, // 500
}

impl Status {
    /// The canonical reason phrase, used as the body of bare status responses.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Ok                   => "OK",
            Self::Found                => "Found",
            Self::BadRequest           => "Bad Request",
            Self::NotFound             => "Not Found",
            Self::UnprocessableContent => "Unprocessable Content",
            Self::InternalServerError  => "Internal Server Error",
        }
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        match s {
            Status::Ok                   => 200,
            Status::Found                => 302,
            Status::BadRequest           => 400,
            Status::NotFound             => 404,
            Status::UnprocessableContent => 422,
            Status::InternalServerError  => 500,
        }
    }
}
