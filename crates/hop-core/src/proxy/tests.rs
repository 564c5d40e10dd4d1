use super::*;
use crate::fetch::FetchResponse;
use crate::rewrite::urlencode;
use std::cell::RefCell;
use std::path::Path;

/// Serves canned responses and records every request it sees.
#[derive(Default)]
struct ScriptedFetcher {
    body: String,
    set_cookies: Vec<String>,
    fail: bool,
    seen: RefCell<Vec<FetchRequest>>,
}

impl ScriptedFetcher {
    fn page(body: &str) -> Self {
        Self {
            body: body.to_string(),
            ..Self::default()
        }
    }

    fn response(&self) -> FetchResponse {
        if self.fail {
            return FetchResponse::failed(ProxyError::Transport {
                code: 7,
                message: "Couldn't connect to server".to_string(),
            });
        }
        let mut headers = ResponseHeaders::default();
        headers.push_line("Content-Type: text/html");
        for c in &self.set_cookies {
            headers.push_line(&format!("Set-Cookie: {}", c));
        }
        FetchResponse {
            body: self.body.clone().into_bytes(),
            headers,
            status: FetchStatus {
                http_code: 200,
                ..FetchStatus::default()
            },
            error: None,
        }
    }

    fn requests(&self) -> Vec<FetchRequest> {
        self.seen.borrow().clone()
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, request: &FetchRequest) -> FetchResponse {
        self.seen.borrow_mut().push(request.clone());
        self.response()
    }

    fn fetch_to_file(&self, request: &FetchRequest, path: &Path) -> FetchResponse {
        self.seen.borrow_mut().push(request.clone());
        let response = self.response();
        if response.error.is_none() {
            std::fs::write(path, &response.body).unwrap();
        }
        FetchResponse {
            body: Vec::new(),
            ..response
        }
    }
}

fn proxy(dir: &Path, fetcher: ScriptedFetcher) -> Proxy<ScriptedFetcher> {
    Proxy::with_dirs(
        ProxyConfig::default(),
        "https://start.example/",
        dir.join("cookies"),
        dir.join("cache"),
        fetcher,
    )
}

fn get(query: &str) -> RequestContext {
    RequestContext::new(query, HttpMethod::Get, "session-1").with_base_url("http://127.0.0.1:8080")
}

fn page(response: ProxyResponse) -> Page {
    match response {
        ProxyResponse::Page(page) => *page,
        other => panic!("expected a page, got {:?}", other),
    }
}

#[test]
fn page_cycle_rewrites_and_replays_cookies() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher {
        set_cookies: vec!["sid=abc; path=/".to_string()],
        ..ScriptedFetcher::page(r#"<a href="/docs">Docs</a>"#)
    };
    let proxy = proxy(dir.path(), fetcher);

    let first = page(proxy.handle(&get("https://example.com/start")));
    assert!(first.errors.is_empty(), "{:?}", first.errors);
    assert_eq!(first.origin.host, "example.com");
    assert!(first.html.contains("u=https%3A%2F%2Fexample.com%2Fdocs"));
    assert_eq!(first.stats.get(crate::category::RewriteCategory::Url), 1);
    assert!(first.site_cookies.contains_key("sid"));

    let second = page(proxy.handle(&get(&format!("m=GET&r_url=1&u={}", urlencode("https://example.com/docs")))));
    assert!(second.config.toggles.url);
    assert!(!second.config.toggles.img);

    let seen = proxy.fetcher.requests();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].cookie, None);
    assert_eq!(seen[1].url, "https://example.com/docs");
    assert_eq!(seen[1].cookie.as_deref(), Some("sid=abc"));
}

#[test]
fn cookies_are_scoped_per_origin() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher {
        set_cookies: vec!["a=1".to_string()],
        ..ScriptedFetcher::default()
    };
    let proxy = proxy(dir.path(), fetcher);
    proxy.handle(&get("https://one.example/"));
    proxy.handle(&get("https://two.example/"));
    let seen = proxy.fetcher.requests();
    assert_eq!(seen[1].cookie, None);
}

#[test]
fn start_url_when_no_target() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = proxy(dir.path(), ScriptedFetcher::page("<p>home</p>"));
    let page = page(proxy.handle(&get("")));
    assert_eq!(page.url, "https://start.example/");
    assert_eq!(page.html, "<p>home</p>");
}

#[test]
fn ip_source_fetches_ip_with_host_header() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = proxy(dir.path(), ScriptedFetcher::page(r#"<img src="/logo.png">"#));
    let query = format!(
        "s=ip&host=example.com&r_img=1&r_ip=1&ip={}&u={}",
        urlencode("http://10.0.0.5/"),
        urlencode("http://example.com/")
    );
    let page = page(proxy.handle(&get(&query)));
    assert_eq!(page.origin.host, "example.com");
    assert!(page.html.contains("&ip=http%3A%2F%2F10.0.0.5%2Flogo.png&u=http%3A%2F%2Fexample.com%2Flogo.png"));

    let seen = proxy.fetcher.requests();
    assert_eq!(seen[0].url, "http://10.0.0.5/");
    assert_eq!(seen[0].headers, vec![("Host".to_string(), "example.com".to_string())]);
}

#[test]
fn raw_redirect_mode_skips_the_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = proxy(dir.path(), ScriptedFetcher::default());
    let query = format!("x=1&a=REDIRECT&u={}", urlencode("https://cdn.example.com/a.js"));
    match proxy.handle(&get(&query)) {
        ProxyResponse::Redirect { location, errors } => {
            assert_eq!(location, "https://cdn.example.com/a.js");
            assert!(errors.is_empty());
        }
        other => panic!("expected redirect, got {:?}", other),
    }
    assert!(proxy.fetcher.requests().is_empty());
}

#[test]
fn raw_cache_mode_stores_once() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = proxy(dir.path(), ScriptedFetcher::page("body{}"));
    let asset = "https://cdn.example.com/site.css";
    let query = format!("x=1&a=CURL&u={}", urlencode(asset));

    for _ in 0..2 {
        match proxy.handle(&get(&query)) {
            ProxyResponse::Redirect { location, errors } => {
                assert!(errors.is_empty(), "{:?}", errors);
                assert_eq!(
                    location,
                    format!("http://127.0.0.1:8080/cache/{}", AssetCache::relative_path(asset))
                );
            }
            other => panic!("expected redirect, got {:?}", other),
        }
    }
    assert_eq!(proxy.fetcher.requests().len(), 1);
    let cache = AssetCache::open(dir.path().join("cache"));
    assert_eq!(std::fs::read_to_string(cache.path_for(asset)).unwrap(), "body{}");
}

#[test]
fn failed_cache_store_redirects_upstream() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher {
        fail: true,
        ..ScriptedFetcher::default()
    };
    let proxy = proxy(dir.path(), fetcher);
    let asset = "https://cdn.example.com/a.png";
    let response = proxy.handle(&get(&format!("x=1&a=CURL&u={}", urlencode(asset))));
    assert!(response.has_errors());
    match response {
        ProxyResponse::Redirect { location, errors } => {
            assert_eq!(location, asset);
            assert!(matches!(errors[0], ProxyError::Transport { code: 7, .. }));
        }
        other => panic!("expected redirect, got {:?}", other),
    }
}

#[test]
fn transport_failure_still_renders() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher {
        fail: true,
        ..ScriptedFetcher::default()
    };
    let proxy = proxy(dir.path(), fetcher);
    let response = proxy.handle(&get("https://down.example/"));
    assert!(response.has_errors());
    let page = page(response);
    assert_eq!(page.html, "");
    assert_eq!(page.status.http_code, 0);
}

#[test]
fn post_body_is_forwarded() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = proxy(dir.path(), ScriptedFetcher::page("ok"));
    let query = format!("m=GET&u={}", urlencode("https://example.com/login"));
    let request = RequestContext::new(&query, HttpMethod::Post, "s").with_body(b"user=a&pass=b".to_vec());
    proxy.handle(&request);
    let seen = proxy.fetcher.requests();
    assert_eq!(seen[0].method, HttpMethod::Post);
    assert_eq!(seen[0].body.as_deref(), Some(&b"user=a&pass=b"[..]));
}

#[test]
fn errors_from_every_component_are_merged() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, b"x").unwrap();
    let proxy = Proxy::with_dirs(
        ProxyConfig::default(),
        "https://start.example/",
        blocker.join("cookies"),
        dir.path().join("cache"),
        ScriptedFetcher {
            set_cookies: vec!["a=1".to_string()],
            ..ScriptedFetcher::page("<div><p>unclosed")
        },
    );
    let response = proxy.handle(&get(&format!("r=DOM&u={}", urlencode("https://example.com/"))));
    let page = page(response);
    assert_eq!(page.html, "<div><p>unclosed");
    assert!(page.errors.iter().any(|e| matches!(e, ProxyError::CreateDir { .. })));
    assert!(page.errors.iter().any(|e| matches!(e, ProxyError::SaveCookies { .. })));
    assert!(page.errors.iter().any(|e| matches!(e, ProxyError::Markup { .. })));
}
