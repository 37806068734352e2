//! Incoming HTTP request type.

use std::net::SocketAddr;

use bytes::Bytes;
use cookie::Cookie;
use serde::de::DeserializeOwned;

use crate::context::RequestContext;
use crate::method::Method;
use crate::session::Session;

/// An incoming HTTP request with its body fully buffered.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) context: RequestContext,
    pub(crate) session: Option<Session>,
}

impl Request {
    /// Start building a request by hand. The server builds them from hyper
    /// requests; tests build them with this.
    pub fn builder(method: Method, uri: &str) -> RequestBuilder {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (uri.to_owned(), None),
        };
        RequestBuilder {
            req: Request {
                method,
                path,
                query,
                headers: Vec::new(),
                body: Bytes::new(),
                remote_addr: None,
                context: RequestContext::default(),
                session: None,
            },
        }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }
    pub fn context(&self) -> &RequestContext { &self.context }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/snippet/view/{id}`, `req.param("id")` on
    /// `/snippet/view/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.context.param(key)
    }

    /// Value of the cookie named `name`, looking through every `cookie`
    /// header. Malformed pairs are skipped.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers.iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("cookie"))
            .flat_map(|(_, v)| Cookie::split_parse(v.as_str()))
            .filter_map(Result::ok)
            .find(|c| c.name() == name)
            .map(|c| c.value().to_owned())
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn form<T: DeserializeOwned>(&self) -> Result<T, serde_html_form::de::Error> {
        serde_html_form::from_bytes(&self.body)
    }

    /// The session loaded for this request, if it runs inside the dynamic
    /// chain.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}

/// Builder returned by [`Request::builder`].
pub struct RequestBuilder {
    req: Request,
}

impl RequestBuilder {
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.req.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.req.body = body.into();
        self
    }

    /// Url-encode `pairs` as the body and set the matching content type.
    pub fn form(self, pairs: &[(&str, &str)]) -> Self {
        let body = serde_html_form::to_string(pairs).unwrap_or_default();
        self.header("content-type", "application/x-www-form-urlencoded")
            .body(body)
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.req.remote_addr = Some(addr);
        self
    }

    pub fn build(self) -> Request {
        self.req
    }
}
