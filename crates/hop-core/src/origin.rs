//! The proxied origin: scheme and host of the page being rendered.

use crate::proxy_config::SourceMode;

/// Scheme + host identifying the proxied target.
///
/// In IP-source mode the host comes from the `host` parameter rather than the
/// URL actually fetched. The host may be empty when nothing is known yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Origin {
    pub scheme: String,
    pub host: String,
}

impl Origin {
    /// Origin of a page URL. Scheme falls back to `https`.
    pub fn from_url(url: &str) -> Self {
        match url::Url::parse(url) {
            Ok(parsed) => Self {
                scheme: parsed.scheme().to_string(),
                host: parsed.host_str().unwrap_or_default().to_string(),
            },
            Err(_) => Self {
                scheme: "https".to_string(),
                host: String::new(),
            },
        }
    }

    /// Origin for IP-source mode: host part of the `Host` value, scheme of the page.
    pub fn from_host_header(page_url: &str, host: &str) -> Self {
        let scheme = scheme_of(page_url);
        Self {
            scheme,
            host: host_part(host),
        }
    }

    /// Derives the origin for the active source mode.
    pub fn derive(source: SourceMode, page_url: &str, host: Option<&str>) -> Self {
        match source {
            SourceMode::Domain => Self::from_url(page_url),
            SourceMode::Ip => Self::from_host_header(page_url, host.unwrap_or_default()),
        }
    }

    pub fn is_known(&self) -> bool {
        !self.host.is_empty()
    }

    /// `scheme://host`, no trailing slash.
    pub fn base(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

fn scheme_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.scheme().to_string())
        .unwrap_or_else(|| "https".to_string())
}

/// Host portion of a `Host`-style value (`example.com:8080/x` -> `example.com`).
pub fn host_part(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    url::Url::parse(&format!("http://{}", value))
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Host of an absolute URL, if any.
pub fn url_host(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}
