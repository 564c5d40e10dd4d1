//! Upstream HTTP collaborator.
//!
//! The proxy only needs one operation from the network: given a URL, method,
//! headers, cookies and auth, return the body, the response headers and some
//! transfer status. `Fetcher` is that seam; `CurlFetcher` implements it with
//! libcurl. Failures never panic or propagate: they come back as
//! `FetchResponse::error` next to whatever body was received.

mod libcurl;
mod headers;

pub use libcurl::CurlFetcher;
pub use headers::ResponseHeaders;

use std::path::Path;
use std::time::Duration;

use crate::error::ProxyError;
use crate::proxy_config::{BasicAuth, HttpMethod, ProxyConfig};

/// One upstream request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: HttpMethod,
    /// Extra request headers (e.g. `Host` in IP-source mode).
    pub headers: Vec<(String, String)>,
    /// `Cookie` header value.
    pub cookie: Option<String>,
    pub auth: Option<BasicAuth>,
    /// Form body forwarded on POST.
    pub body: Option<Vec<u8>>,
    pub user_agent: String,
    pub timeout: Duration,
    pub max_redirects: u32,
}

impl FetchRequest {
    /// Request for `url` carrying the method, auth and limits of `config`.
    pub fn new(url: impl Into<String>, config: &ProxyConfig) -> Self {
        Self {
            url: url.into(),
            method: config.method,
            headers: Vec::new(),
            cookie: None,
            auth: config.auth.is_complete().then(|| config.auth.clone()),
            body: None,
            user_agent: config.user_agent.clone(),
            timeout: config.timeout,
            max_redirects: config.max_redirects,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.cookie = cookie;
        self
    }

    pub fn with_body(mut self, body: Option<Vec<u8>>) -> Self {
        self.body = body;
        self
    }
}

/// Transfer details reported by the collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStatus {
    /// Final HTTP status code (0 when no response arrived).
    pub http_code: u32,
    pub redirect_count: u32,
    /// URL of the last hop after redirects.
    pub effective_url: Option<String>,
    pub content_type: Option<String>,
    pub total_time: Duration,
}

#[derive(Debug, Default)]
pub struct FetchResponse {
    pub body: Vec<u8>,
    pub headers: ResponseHeaders,
    pub status: FetchStatus,
    pub error: Option<ProxyError>,
}

impl FetchResponse {
    /// A response that never reached the wire.
    pub fn failed(error: ProxyError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub trait Fetcher {
    /// Performs the request and buffers the body in memory.
    fn fetch(&self, request: &FetchRequest) -> FetchResponse;

    /// Performs the request and streams the body into `path` (created or
    /// truncated). The returned `body` is empty.
    fn fetch_to_file(&self, request: &FetchRequest, path: &Path) -> FetchResponse;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn fetch(&self, request: &FetchRequest) -> FetchResponse {
        (**self).fetch(request)
    }

    fn fetch_to_file(&self, request: &FetchRequest, path: &Path) -> FetchResponse {
        (**self).fetch_to_file(request, path)
    }
}
