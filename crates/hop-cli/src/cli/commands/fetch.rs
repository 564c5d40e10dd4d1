//! `hop fetch` – one proxy cycle from the command line.

use anyhow::Result;
use hop_core::config::HopConfig;
use hop_core::fetch::CurlFetcher;
use hop_core::proxy::{Proxy, ProxyResponse, RequestContext};
use hop_core::proxy_config::HttpMethod;
use hop_core::rewrite::urlencode;

pub async fn run_fetch(
    cfg: &HopConfig,
    url: &str,
    query: &str,
    session: &str,
    post: Option<String>,
) -> Result<()> {
    let proxy = Proxy::new(cfg, CurlFetcher::new())?;
    let method = if post.is_some() {
        HttpMethod::Post
    } else {
        HttpMethod::Get
    };
    let mut request = RequestContext::new(&request_query(url, query), method, session);
    if let Some(body) = post {
        request = request.with_body(body.into_bytes());
    }

    let response = tokio::task::spawn_blocking(move || proxy.handle(&request)).await?;
    match &response {
        ProxyResponse::Page(page) => {
            println!("{}", page.html);
            eprintln!(
                "status {} from {} ({} references rewritten)",
                page.status.http_code,
                page.url,
                page.stats.total()
            );
            for (name, n) in page.stats.counters() {
                eprintln!("  {:<18} {}", name, n);
            }
        }
        ProxyResponse::Redirect { location, .. } => println!("redirect: {}", location),
    }
    for err in response.errors() {
        eprintln!("error: {}", err);
    }
    Ok(())
}

/// Inbound query for `url`. Without explicit parameters the bare-URL form is
/// used so that every rewrite toggle keeps its default.
pub(crate) fn request_query(url: &str, query: &str) -> String {
    let query = query.trim().trim_start_matches('?');
    if query.is_empty() {
        url.to_string()
    } else {
        format!("{}&u={}", query, urlencode(url))
    }
}
