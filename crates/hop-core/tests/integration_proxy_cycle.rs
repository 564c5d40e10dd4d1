//! Integration tests: libcurl fetcher and full proxy cycles against a local
//! HTTP server.

mod common;

use common::page_server::{self, Route};
use hop_core::asset_cache::AssetCache;
use hop_core::fetch::{CurlFetcher, FetchRequest, Fetcher};
use hop_core::proxy::{Proxy, ProxyResponse, RequestContext};
use hop_core::proxy_config::{BasicAuth, HttpMethod, ProxyConfig};
use hop_core::rewrite::urlencode;
use hop_core::ProxyError;
use std::time::Duration;
use tempfile::tempdir;

fn quick_config() -> ProxyConfig {
    ProxyConfig {
        timeout: Duration::from_secs(5),
        ..ProxyConfig::default()
    }
}

#[test]
fn curl_fetch_collects_body_headers_and_status() {
    let server = page_server::start(vec![(
        "/page",
        Route::html("<p>hello</p>")
            .with_header("Set-Cookie: a=1; path=/")
            .with_header("Set-Cookie: b=2"),
    )]);
    let response = CurlFetcher::new().fetch(&FetchRequest::new(server.url("/page"), &quick_config()));
    assert!(response.error.is_none(), "{:?}", response.error);
    assert_eq!(response.body_text(), "<p>hello</p>");
    assert_eq!(response.status.http_code, 200);
    assert_eq!(response.headers.set_cookies(), ["a=1; path=/", "b=2"]);
    assert_eq!(response.headers.get("content-type"), Some("text/html"));
    assert_eq!(response.status.content_type.as_deref(), Some("text/html"));
}

#[test]
fn curl_sends_cookie_auth_and_extra_headers() {
    let server = page_server::start(vec![("/", Route::html("ok"))]);
    let mut cfg = quick_config();
    cfg.auth = BasicAuth {
        user: "u".to_string(),
        pass: "p".to_string(),
    };
    let request = FetchRequest::new(server.url("/"), &cfg)
        .with_cookie(Some("a=1;b=2".to_string()))
        .with_header("X-Extra", "yes");
    let response = CurlFetcher::new().fetch(&request);
    assert!(response.error.is_none());

    let seen = server.recorded();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].header("cookie"), Some("a=1;b=2"));
    assert_eq!(seen[0].header("authorization"), Some("Basic dTpw"));
    assert_eq!(seen[0].header("x-extra"), Some("yes"));
    assert_eq!(seen[0].header("user-agent"), Some("Mozilla/4.0 (compatible;)"));
}

#[test]
fn curl_posts_body() {
    let server = page_server::start(vec![("/login", Route::html("welcome"))]);
    let mut cfg = quick_config();
    cfg.method = HttpMethod::Post;
    let request = FetchRequest::new(server.url("/login"), &cfg).with_body(Some(b"user=a&pass=b".to_vec()));
    let response = CurlFetcher::new().fetch(&request);
    assert_eq!(response.body_text(), "welcome");
    let seen = server.recorded();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].body, b"user=a&pass=b");
}

#[test]
fn curl_follows_redirects() {
    let server = page_server::start(vec![
        ("/old", Route::status("302 Found").with_header("Location: /new")),
        ("/new", Route::html("moved")),
    ]);
    let response = CurlFetcher::new().fetch(&FetchRequest::new(server.url("/old"), &quick_config()));
    assert_eq!(response.body_text(), "moved");
    assert_eq!(response.status.redirect_count, 1);
    assert_eq!(response.status.effective_url.as_deref(), Some(server.url("/new").as_str()));
}

#[test]
fn curl_reports_connection_failure() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = format!("http://127.0.0.1:{}/", port);
    let response = CurlFetcher::new().fetch(&FetchRequest::new(url, &quick_config()));
    assert!(matches!(response.error, Some(ProxyError::Transport { code: 7, .. })));
    assert!(response.body.is_empty());
}

#[test]
fn curl_fetch_to_file_streams_body() {
    let body: Vec<u8> = (0u8..=255).cycle().take(64 * 1024).collect();
    let server = page_server::start(vec![(
        "/blob.bin",
        Route {
            status: "200 OK",
            headers: Vec::new(),
            body: body.clone(),
        },
    )]);
    let dir = tempdir().unwrap();
    let path = dir.path().join("blob.bin");
    let response = CurlFetcher::new().fetch_to_file(
        &FetchRequest::new(server.url("/blob.bin"), &quick_config()),
        &path,
    );
    assert!(response.error.is_none());
    assert!(response.body.is_empty());
    assert_eq!(std::fs::read(&path).unwrap(), body);
}

#[test]
fn proxy_cycle_rewrites_page_and_replays_cookies() {
    let server = page_server::start(vec![
        (
            "/start",
            Route::html(r#"<html><body><a href="/next">next</a><img src="logo.png"></body></html>"#)
                .with_header("Set-Cookie: session=xyz; HttpOnly"),
        ),
        ("/next", Route::html("<p>second</p>")),
    ]);
    let dir = tempdir().unwrap();
    let proxy = Proxy::with_dirs(
        quick_config(),
        server.url("/start"),
        dir.path().join("cookies"),
        dir.path().join("cache"),
        CurlFetcher::new(),
    );

    let first = proxy.handle(&RequestContext::new("", HttpMethod::Get, "browser-1"));
    assert!(!first.has_errors(), "{:?}", first.errors());
    let ProxyResponse::Page(page) = first else {
        panic!("expected page");
    };
    let next = urlencode(&server.url("/next"));
    let logo = urlencode(&server.url("/logo.png"));
    assert!(page.html.contains(&format!("&u={}", next)));
    assert!(page.html.contains("&x=1&a=REDIRECT"));
    assert!(page.html.contains(&format!("&u={}", logo)));
    assert_eq!(page.status.http_code, 200);
    assert_eq!(page.local_cookies.len(), 1);

    let query = format!("m=GET&a=REDIRECT&r=REGEX2&s=domain&r_url=1&r_img=1&u={}", next);
    let second = proxy.handle(&RequestContext::new(&query, HttpMethod::Get, "browser-1"));
    assert!(!second.has_errors());

    let seen = server.recorded();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].header("cookie"), None);
    assert_eq!(seen[1].path, "/next");
    assert_eq!(seen[1].header("cookie"), Some("session=xyz"));
}

#[test]
fn proxy_cache_mode_serves_asset_from_disk() {
    let server = page_server::start(vec![(
        "/img/logo.png",
        Route {
            status: "200 OK",
            headers: vec!["Content-Type: image/png".to_string()],
            body: b"\x89PNG\r\n".to_vec(),
        },
    )]);
    let dir = tempdir().unwrap();
    let cache_root = dir.path().join("cache");
    let proxy = Proxy::with_dirs(
        quick_config(),
        server.url("/"),
        dir.path().join("cookies"),
        &cache_root,
        CurlFetcher::new(),
    );
    let asset = server.url("/img/logo.png");
    let query = format!("x=1&a=CURL&u={}", urlencode(&asset));
    let request = RequestContext::new(&query, HttpMethod::Get, "s").with_base_url("http://proxy.local");

    let ProxyResponse::Redirect { location, errors } = proxy.handle(&request) else {
        panic!("expected redirect");
    };
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(
        location,
        format!("http://proxy.local/cache/{}", AssetCache::relative_path(&asset))
    );
    let cache = AssetCache::open(&cache_root);
    assert_eq!(std::fs::read(cache.path_for(&asset)).unwrap(), b"\x89PNG\r\n");

    proxy.handle(&request);
    assert_eq!(server.recorded().len(), 1);
}

#[test]
fn proxy_cache_mode_does_not_keep_error_pages() {
    let server = page_server::start(Vec::new());
    let dir = tempdir().unwrap();
    let proxy = Proxy::with_dirs(
        quick_config(),
        server.url("/"),
        dir.path().join("cookies"),
        dir.path().join("cache"),
        CurlFetcher::new(),
    );
    let asset = server.url("/missing.js");
    let query = format!("x=1&a=CURL&u={}", urlencode(&asset));
    let ProxyResponse::Redirect { location, .. } =
        proxy.handle(&RequestContext::new(&query, HttpMethod::Get, "s"))
    else {
        panic!("expected redirect");
    };
    assert_eq!(location, asset);
    assert!(!AssetCache::open(dir.path().join("cache")).exists(&asset));
}

#[test]
fn proxy_ip_source_sends_host_header() {
    let server = page_server::start(vec![("/", Route::html(r#"<a href="http://site.test/about">a</a>"#))]);
    let dir = tempdir().unwrap();
    let proxy = Proxy::with_dirs(
        quick_config(),
        "https://unused.example/",
        dir.path().join("cookies"),
        dir.path().join("cache"),
        CurlFetcher::new(),
    );
    let query = format!(
        "s=ip&host=site.test&r=&r_ip=1&ip={}&u={}",
        urlencode(&server.url("/")),
        urlencode("http://site.test/")
    );
    let ProxyResponse::Page(page) = proxy.handle(&RequestContext::new(&query, HttpMethod::Get, "s")) else {
        panic!("expected page");
    };
    assert_eq!(page.html, r#"<a href="http://127.0.0.1/about">a</a>"#);

    let seen = server.recorded();
    assert_eq!(seen[0].header("host"), Some("site.test"));
}
