//! libcurl-backed `Fetcher`.

use curl::easy::{Auth, Easy, List};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str;

use super::{FetchRequest, FetchResponse, FetchStatus, Fetcher, ResponseHeaders};
use crate::error::ProxyError;
use crate::proxy_config::HttpMethod;

/// Blocking fetcher using one curl Easy handle per request (no reuse).
/// Runs in the current thread; call from `spawn_blocking` if used from async code.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurlFetcher;

impl CurlFetcher {
    pub fn new() -> Self {
        Self
    }

    fn run<W>(&self, request: &FetchRequest, sink: W) -> FetchResponse
    where
        W: FnMut(&[u8]) -> bool,
    {
        let mut easy = Easy::new();
        if let Err(e) = configure(&mut easy, request) {
            tracing::warn!(url = %request.url, "curl setup: {}", e);
            return FetchResponse::failed(transport_error(&e));
        }

        let mut lines: Vec<String> = Vec::new();
        let result = perform(&mut easy, &mut lines, sink);

        let status = FetchStatus {
            http_code: easy.response_code().unwrap_or(0),
            redirect_count: easy.redirect_count().unwrap_or(0),
            effective_url: easy.effective_url().ok().flatten().map(str::to_string),
            content_type: easy.content_type().ok().flatten().map(str::to_string),
            total_time: easy.total_time().unwrap_or_default(),
        };

        let error = match result {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(url = %request.url, "upstream request failed: {}", e);
                Some(transport_error(&e))
            }
        };
        tracing::debug!(
            url = %request.url,
            code = status.http_code,
            redirects = status.redirect_count,
            "upstream response"
        );

        FetchResponse {
            body: Vec::new(),
            headers: ResponseHeaders::from_lines(&lines),
            status,
            error,
        }
    }
}

impl Fetcher for CurlFetcher {
    fn fetch(&self, request: &FetchRequest) -> FetchResponse {
        let mut body = Vec::new();
        let mut response = self.run(request, |data| {
            body.extend_from_slice(data);
            true
        });
        response.body = body;
        response
    }

    fn fetch_to_file(&self, request: &FetchRequest, path: &Path) -> FetchResponse {
        let mut file = match File::create(path) {
            Ok(f) => f,
            Err(source) => {
                return FetchResponse::failed(ProxyError::CacheWrite {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut write_error: Option<std::io::Error> = None;
        let mut response = self.run(request, |data| match file.write_all(data) {
            Ok(()) => true,
            Err(e) => {
                write_error = Some(e);
                false // abort transfer
            }
        });
        if let Some(source) = write_error {
            response.error = Some(ProxyError::CacheWrite {
                path: path.to_path_buf(),
                source,
            });
        }
        response
    }
}

fn configure(easy: &mut Easy, request: &FetchRequest) -> Result<(), curl::Error> {
    easy.url(&request.url)?;
    easy.referer(&request.url)?;
    easy.follow_location(true)?;
    easy.max_redirections(request.max_redirects)?;
    // Empty string: accept every encoding libcurl can decode.
    easy.accept_encoding("")?;
    easy.connect_timeout(request.timeout)?;
    easy.timeout(request.timeout)?;
    easy.custom_request(request.method.token())?;
    easy.useragent(&request.user_agent)?;
    easy.ssl_verify_peer(false)?;
    easy.ssl_verify_host(false)?;

    if !request.headers.is_empty() {
        let mut list = List::new();
        for (k, v) in &request.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;
    }

    if let Some(auth) = request.auth.as_ref().filter(|a| a.is_complete()) {
        easy.username(&auth.user)?;
        easy.password(&auth.pass)?;
        let mut basic = Auth::new();
        basic.basic(true);
        easy.http_auth(&basic)?;
    }

    if request.method == HttpMethod::Post {
        easy.post(true)?;
        easy.post_fields_copy(request.body.as_deref().unwrap_or_default())?;
    }

    if let Some(cookie) = request.cookie.as_deref().filter(|c| !c.is_empty()) {
        easy.cookie(cookie)?;
    }
    Ok(())
}

fn perform<W>(easy: &mut Easy, lines: &mut Vec<String>, mut sink: W) -> Result<(), curl::Error>
where
    W: FnMut(&[u8]) -> bool,
{
    let mut transfer = easy.transfer();
    transfer.header_function(|data| {
        if let Ok(s) = str::from_utf8(data) {
            lines.push(s.trim_end().to_string());
        }
        true
    })?;
    transfer.write_function(move |data| Ok(if sink(data) { data.len() } else { 0 }))?;
    transfer.perform()
}

fn transport_error(e: &curl::Error) -> ProxyError {
    ProxyError::Transport {
        code: e.code() as u32,
        message: e.to_string(),
    }
}
