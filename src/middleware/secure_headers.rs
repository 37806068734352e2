use async_trait::async_trait;

use super::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Adds browser-hardening headers to every response.
///
/// A handler that sets one of these headers itself keeps its own value.
#[derive(Clone, Debug)]
pub struct SecureHeaders {
    headers: Vec<(&'static str, String)>,
}

impl SecureHeaders {
    /// Override the `Content-Security-Policy` value.
    pub fn content_security_policy(mut self, policy: impl Into<String>) -> Self {
        self.headers.retain(|(name, _)| *name != "content-security-policy");
        self.headers.push(("content-security-policy", policy.into()));
        self
    }

    /// Fill in every hardening header `res` does not already set.
    pub fn apply(&self, res: &mut Response) {
        for (name, value) in &self.headers {
            if res.header(name).is_none() {
                res.set_header(name, value.clone());
            }
        }
    }
}

impl Default for SecureHeaders {
    fn default() -> Self {
        let headers = [
            (
                "content-security-policy",
                "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com",
            ),
            ("referrer-policy", "origin-when-cross-origin"),
            ("x-content-type-options", "nosniff"),
            ("x-frame-options", "deny"),
            // Disables legacy XSS auditors.
            ("x-xss-protection", "0"),
        ];
        Self {
            headers: headers.into_iter().map(|(k, v)| (k, v.to_owned())).collect(),
        }
    }
}

#[async_trait]
impl Middleware for SecureHeaders {
    async fn handle(&self, req: Request, next: Next) -> Response {
        let mut res = next.run(req).await;
        self.apply(&mut res);
        res
    }
}
