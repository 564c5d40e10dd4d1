//! Per-request orchestration.
//!
//! resolve config -> origin -> cookie identity -> load jar -> fetch -> save
//! cookies -> rewrite -> merge errors. Raw asset requests stop after the
//! fetch decision and answer with a redirect instead of HTML.
//!
//! Components are created per request and share no in-process state; the
//! cookie jar and asset cache live on disk.

mod request;

pub use request::RequestContext;

use anyhow::Result;
use std::path::PathBuf;

use crate::asset_cache::AssetCache;
use crate::config::HopConfig;
use crate::cookie_jar::{CookieJar, CookieSet};
use crate::error::ProxyError;
use crate::fetch::{FetchRequest, FetchStatus, Fetcher, ResponseHeaders};
use crate::origin::Origin;
use crate::proxy_config::{AssetMode, HttpMethod, ProxyConfig, SourceMode};
use crate::rewrite::{PageContext, RewriteEngine, RewriteStats};

/// A rendered page and everything learned while producing it.
#[derive(Debug)]
pub struct Page {
    /// Rewritten HTML (the raw body when rewriting is off).
    pub html: String,
    /// Target URL as seen by the browser.
    pub url: String,
    pub origin: Origin,
    pub config: ProxyConfig,
    pub status: FetchStatus,
    pub headers: ResponseHeaders,
    /// Cookies received in this cycle.
    pub site_cookies: CookieSet,
    /// Cookies known for this identity after the cycle.
    pub local_cookies: CookieSet,
    pub stats: RewriteStats,
    pub errors: Vec<ProxyError>,
}

#[derive(Debug)]
pub enum ProxyResponse {
    Page(Box<Page>),
    /// Raw asset request answered with a redirect.
    Redirect {
        location: String,
        errors: Vec<ProxyError>,
    },
}

impl ProxyResponse {
    pub fn errors(&self) -> &[ProxyError] {
        match self {
            ProxyResponse::Page(page) => &page.errors,
            ProxyResponse::Redirect { errors, .. } => errors,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }
}

pub struct Proxy<F> {
    base: ProxyConfig,
    start_url: String,
    cookies_dir: PathBuf,
    cache_dir: PathBuf,
    fetcher: F,
}

impl<F: Fetcher> Proxy<F> {
    /// Proxy using the settings' defaults and storage directories.
    pub fn new(settings: &HopConfig, fetcher: F) -> Result<Self> {
        Ok(Self {
            base: settings.base_config(),
            start_url: settings.start_url.clone(),
            cookies_dir: settings.cookies_dir()?,
            cache_dir: settings.cache_dir()?,
            fetcher,
        })
    }

    /// Proxy with explicit storage directories.
    pub fn with_dirs(
        base: ProxyConfig,
        start_url: impl Into<String>,
        cookies_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        fetcher: F,
    ) -> Self {
        Self {
            base,
            start_url: start_url.into(),
            cookies_dir: cookies_dir.into(),
            cache_dir: cache_dir.into(),
            fetcher,
        }
    }

    pub fn cookies_dir(&self) -> &std::path::Path {
        &self.cookies_dir
    }

    pub fn cache_dir(&self) -> &std::path::Path {
        &self.cache_dir
    }

    /// Runs one proxy cycle. Never fails: every problem ends up in the
    /// response's error list next to whatever could still be produced.
    pub fn handle(&self, request: &RequestContext) -> ProxyResponse {
        let config = ProxyConfig::resolve(&self.base, &request.params, request.method);
        let target = request.target().unwrap_or_else(|| self.start_url.clone());
        let ip = request.params.get_non_empty("ip").map(str::to_string);
        let host = request.params.get_non_empty("host");
        let origin = Origin::derive(config.source, &target, host);
        tracing::info!(
            url = %target,
            host = %origin.host,
            source = config.source.token(),
            raw = config.raw,
            "proxy request"
        );

        let mut jar = CookieJar::open(&self.cookies_dir);
        jar.set_identity(&request.session_id, &origin.host);
        jar.load();

        let fetch = self.outbound(&config, request, &target, ip.as_deref(), host, &jar);

        if config.raw {
            return self.deliver_asset(&config, request, &fetch, jar);
        }

        let response = self.fetcher.fetch(&fetch);
        let mut errors = jar.take_errors();
        if let Some(err) = response.error {
            errors.push(err);
        }
        jar.save(response.headers.set_cookies());
        errors.extend(jar.take_errors());

        let body = String::from_utf8_lossy(&response.body).into_owned();
        let page_ctx = PageContext::new(target, origin, ip);
        let mut engine = RewriteEngine::new(&config, &page_ctx);
        let html = engine.rewrite(&body);
        let stats = engine.stats().clone();
        errors.extend(engine.take_errors());

        if !errors.is_empty() {
            tracing::warn!(count = errors.len(), url = %page_ctx.url, "request finished with errors");
        }

        ProxyResponse::Page(Box::new(Page {
            html,
            url: page_ctx.url,
            origin: page_ctx.origin,
            config,
            status: response.status,
            headers: response.headers,
            site_cookies: jar.site_cookies().clone(),
            local_cookies: jar.local_cookies().clone(),
            stats,
            errors,
        }))
    }

    /// Upstream request for this cycle. In IP-source mode the IP URL is the
    /// transport and the real host travels in a `Host` header.
    fn outbound(
        &self,
        config: &ProxyConfig,
        request: &RequestContext,
        target: &str,
        ip: Option<&str>,
        host: Option<&str>,
        jar: &CookieJar,
    ) -> FetchRequest {
        let url = match (config.source, ip) {
            (SourceMode::Ip, Some(ip)) => ip,
            _ => target,
        };
        let mut fetch = FetchRequest::new(url, config).with_cookie(jar.cookie_header());
        if config.source == SourceMode::Ip {
            if let Some(host) = host {
                fetch = fetch.with_header("Host", host);
            }
        }
        if config.method == HttpMethod::Post {
            fetch = fetch.with_body(request.body.clone());
        }
        fetch
    }

    fn deliver_asset(
        &self,
        config: &ProxyConfig,
        request: &RequestContext,
        fetch: &FetchRequest,
        mut jar: CookieJar,
    ) -> ProxyResponse {
        let mut errors = jar.take_errors();
        let location = match config.assets {
            AssetMode::Redirect => fetch.url.clone(),
            AssetMode::Cache => {
                let mut cache = AssetCache::open(&self.cache_dir);
                let stored = cache.store(&self.fetcher, fetch);
                errors.extend(cache.take_errors());
                match stored {
                    Some(_) => cache.public_url(&fetch.url, &request.base_url),
                    None => {
                        tracing::warn!(url = %fetch.url, "cache store failed, redirecting upstream");
                        fetch.url.clone()
                    }
                }
            }
        };
        tracing::debug!(location = %location, "asset redirect");
        ProxyResponse::Redirect { location, errors }
    }
}

#[cfg(test)]
mod tests;
