//! Inbound request context.

use crate::proxy_config::{HttpMethod, QueryParams};

/// Everything the orchestrator needs to know about one inbound request.
/// Built by the front end; components never look at ambient request state.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Query string as received (without the leading `?`).
    pub raw_query: String,
    pub params: QueryParams,
    pub method: HttpMethod,
    /// Browser session; scopes the cookie jar.
    pub session_id: String,
    /// Form body of an inbound POST.
    pub body: Option<Vec<u8>>,
    /// Externally reachable base of the proxy (`http://host:port`), used for
    /// cache redirects.
    pub base_url: String,
}

impl RequestContext {
    pub fn new(raw_query: &str, method: HttpMethod, session_id: impl Into<String>) -> Self {
        let raw_query = raw_query.strip_prefix('?').unwrap_or(raw_query).to_string();
        let mut params = QueryParams::parse(&raw_query);
        // A bare URL query (`?https://...`) names a target, not parameters.
        if !params.contains("u") && bare_target(&raw_query).is_some() {
            params = QueryParams::default();
        }
        Self {
            params,
            raw_query,
            method,
            session_id: session_id.into(),
            body: None,
            base_url: String::new(),
        }
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = (!body.is_empty()).then_some(body);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Target named by the request: `u`, or a bare URL query (`?https://...`).
    pub fn target(&self) -> Option<String> {
        if let Some(u) = self.params.get_non_empty("u") {
            return Some(u.to_string());
        }
        bare_target(&self.raw_query)
    }
}

fn bare_target(raw_query: &str) -> Option<String> {
    if raw_query.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(raw_query).ok()?;
    let decoded = decoded.trim();
    decoded.starts_with("http").then(|| decoded.to_string())
}
