//! HTTP front end routes.
//!
//! `/` runs one proxy cycle per request; `/<cache prefix>/{bucket}/{file}`
//! serves assets stored by cache mode. Proxy cycles are blocking (libcurl,
//! file I/O) and run on tokio's blocking pool.

use axum::body::Bytes;
use axum::extract::{Path as UrlPath, RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use hop_core::asset_cache::AssetCache;
use hop_core::fetch::Fetcher;
use hop_core::proxy::{Proxy, ProxyResponse, RequestContext};
use hop_core::proxy_config::HttpMethod;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::cli::session::{self, SessionIds, SESSION_COOKIE};

/// Shared state behind every route.
pub struct Frontend<F> {
    proxy: Arc<Proxy<F>>,
    cache: AssetCache,
    sessions: SessionIds,
    /// Fallback authority for `base_url` when a request has no `Host`.
    listen: String,
}

impl<F: Fetcher> Frontend<F> {
    pub fn new(proxy: Proxy<F>, listen: impl Into<String>) -> Self {
        let cache = AssetCache::open(proxy.cache_dir());
        for err in cache.errors() {
            tracing::warn!("cache: {}", err);
        }
        Self {
            proxy: Arc::new(proxy),
            cache,
            sessions: SessionIds::new(),
            listen: listen.into(),
        }
    }
}

pub fn router<F>(frontend: Arc<Frontend<F>>) -> Router
where
    F: Fetcher + Send + Sync + 'static,
{
    let cached = format!("/{}/{{bucket}}/{{file}}", frontend.cache.url_prefix());
    Router::new()
        .route("/", get(proxy_page::<F>).post(proxy_page::<F>))
        .route(&cached, get(cached_asset::<F>))
        .layer(TraceLayer::new_for_http())
        .with_state(frontend)
}

async fn proxy_page<F>(
    State(frontend): State<Arc<Frontend<F>>>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    F: Fetcher + Send + Sync + 'static,
{
    let (session_id, issued) = match session_cookie(&headers) {
        Some(id) => (id, false),
        None => (frontend.sessions.issue(), true),
    };
    let method = if method == Method::POST {
        HttpMethod::Post
    } else {
        HttpMethod::Get
    };
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(&frontend.listen);
    let mut context = RequestContext::new(query.as_deref().unwrap_or_default(), method, session_id.clone())
        .with_base_url(format!("http://{}", host));
    if method == HttpMethod::Post {
        context = context.with_body(body.to_vec());
    }

    let proxy = Arc::clone(&frontend.proxy);
    let outcome = tokio::task::spawn_blocking(move || proxy.handle(&context)).await;
    let mut response = match outcome {
        Ok(ProxyResponse::Page(page)) => Html(page.html).into_response(),
        Ok(ProxyResponse::Redirect { location, .. }) => redirect(&location),
        Err(e) => {
            tracing::error!("proxy task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };
    if issued {
        tracing::debug!(session = %session_id, "issued session");
        if let Ok(value) = HeaderValue::from_str(&session::set_cookie_value(&session_id)) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

async fn cached_asset<F>(
    State(frontend): State<Arc<Frontend<F>>>,
    UrlPath((bucket, file)): UrlPath<(String, String)>,
) -> Response
where
    F: Send + Sync + 'static,
{
    let Some(path) = frontend.cache.local_path(&format!("{}/{}", bucket, file)) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(body) => ([(header::CONTENT_TYPE, content_type_for(&path))], body).into_response(),
        Err(e) => {
            tracing::debug!(path = %path.display(), "cached asset: {}", e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::warn!(location = %location, "redirect target is not a valid header value");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

/// Session id from the `Cookie` headers, if one is present and well formed.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|id| session::is_valid(id))
        .map(str::to_string)
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}
