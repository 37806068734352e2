use async_trait::async_trait;
use cookie::{Cookie, SameSite};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::debug;
use uuid::Uuid;

use super::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// Cookie holding the client's CSRF token.
pub const CSRF_COOKIE: &str = "csrf_token";
/// Form field a submission echoes the token in.
pub const CSRF_FIELD: &str = "csrf_token";
/// Header alternative to [`CSRF_FIELD`] for script-driven requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

const TOKEN_LEN: usize = 64;

/// Double-submit CSRF protection.
///
/// Every client gets a random token in an `HttpOnly` cookie; pages embed the
/// same token in their forms via [`RequestContext::csrf_token`]. A request
/// with an unsafe method must echo the cookie's token in the form field or
/// the header, or it is answered with `400` before anything downstream runs.
///
/// [`RequestContext::csrf_token`]: crate::context::RequestContext::csrf_token
#[derive(Clone, Debug)]
pub struct VerifyCsrf {
    secure: bool,
}

impl VerifyCsrf {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    fn cookie(&self, token: &str) -> String {
        Cookie::build((CSRF_COOKIE, token.to_owned()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::days(365))
            .build()
            .to_string()
    }
}

#[derive(Deserialize)]
struct CsrfForm {
    csrf_token: Option<String>,
}

#[async_trait]
impl Middleware for VerifyCsrf {
    async fn handle(&self, mut req: Request, next: Next) -> Response {
        let existing = req.cookie(CSRF_COOKIE).filter(|token| well_formed(token));

        if !req.method().is_safe() {
            let verified = match (&existing, submitted(&req)) {
                (Some(expected), Some(actual)) => tokens_match(expected, &actual),
                _ => false,
            };
            if !verified {
                debug!(method = %req.method(), path = %req.path(), "CSRF token missing or mismatched");
                return Response::status(Status::BadRequest);
            }
        }

        let (token, fresh) = match existing {
            Some(token) => (token, false),
            None => (new_token(), true),
        };
        req.context.csrf_token = Some(token.clone());

        let mut res = next.run(req).await;
        if fresh {
            res.append_header("set-cookie", self.cookie(&token));
        }
        res.append_header("vary", "Cookie");
        res
    }
}

fn new_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}

fn submitted(req: &Request) -> Option<String> {
    if let Some(token) = req.header(CSRF_HEADER) {
        return Some(token.to_owned());
    }
    req.form::<CsrfForm>().ok()?.csrf_token
}

fn tokens_match(expected: &str, actual: &str) -> bool {
    expected.as_bytes().ct_eq(actual.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::method::Method;
    use crate::middleware::Chain;

    fn counting(hits: Arc<AtomicUsize>) -> impl crate::handler::Handler {
        move |req: Request| {
            hits.fetch_add(1, Ordering::SeqCst);
            let token = req.context().csrf_token().to_owned();
            async move { Response::text(token) }
        }
    }

    async fn run(req: Request, hits: &Arc<AtomicUsize>) -> Response {
        Chain::new()
            .with(VerifyCsrf::new(true))
            .then(counting(Arc::clone(hits)))
            .handle(req)
            .await
    }

    #[tokio::test]
    async fn safe_requests_receive_a_token() {
        let hits = Arc::new(AtomicUsize::new(0));
        let res = run(Request::builder(Method::Get, "/").build(), &hits).await;

        let token = std::str::from_utf8(res.body()).unwrap().to_owned();
        assert!(well_formed(&token));
        let cookie = res.header("set-cookie").unwrap();
        assert!(cookie.starts_with(&format!("{CSRF_COOKIE}={token}")));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn existing_tokens_are_reused() {
        let hits = Arc::new(AtomicUsize::new(0));
        let token = new_token();
        let req = Request::builder(Method::Get, "/")
            .header("cookie", &format!("{CSRF_COOKIE}={token}"))
            .build();
        let res = run(req, &hits).await;

        assert_eq!(res.body(), token.as_bytes());
        assert_eq!(res.header("set-cookie"), None);
    }

    #[tokio::test]
    async fn posts_without_a_token_never_reach_the_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let token = new_token();
        let req = Request::builder(Method::Post, "/snippet/create")
            .header("cookie", &format!("{CSRF_COOKIE}={token}"))
            .form(&[("title", "x")])
            .build();
        let res = run(req, &hits).await;

        assert_eq!(res.status_code(), 400);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn posts_with_the_wrong_token_are_rejected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let req = Request::builder(Method::Post, "/user/logout")
            .header("cookie", &format!("{CSRF_COOKIE}={}", new_token()))
            .form(&[(CSRF_FIELD, new_token().as_str())])
            .build();

        assert_eq!(run(req, &hits).await.status_code(), 400);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn matching_form_field_or_header_passes() {
        let hits = Arc::new(AtomicUsize::new(0));
        let token = new_token();
        let cookie = format!("{CSRF_COOKIE}={token}");

        let by_form = Request::builder(Method::Post, "/user/logout")
            .header("cookie", &cookie)
            .form(&[(CSRF_FIELD, token.as_str())])
            .build();
        let by_header = Request::builder(Method::Post, "/user/logout")
            .header("cookie", &cookie)
            .header(CSRF_HEADER, &token)
            .build();

        assert_eq!(run(by_form, &hits).await.status_code(), 200);
        assert_eq!(run(by_header, &hits).await.status_code(), 200);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
