//! Per-reference decisions and the proxy link wire format.

use url::{form_urlencoded, Url};

use super::ip::DomainSwap;
use super::PageContext;
use crate::category::RewriteCategory;
use crate::origin::url_host;
use crate::proxy_config::{ProxyConfig, QueryParams, SourceMode};

/// What to do with one attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Leave the value as received.
    Keep,
    /// Category off: made absolute against the origin, not proxy-routed.
    Passive(String),
    /// Category on: replaced by a generated proxy link.
    Routed(String),
}

impl Decision {
    /// Replacement text, if any.
    pub(crate) fn replacement(&self) -> Option<&str> {
        match self {
            Decision::Keep => None,
            Decision::Passive(v) | Decision::Routed(v) => Some(v),
        }
    }
}

/// Builds links for one page render.
pub(crate) struct Linker<'a> {
    config: &'a ProxyConfig,
    page: &'a PageContext,
    /// Present in IP-source mode with `r_ip` on, a known domain and an IP host.
    ip_swap: Option<DomainSwap>,
}

impl<'a> Linker<'a> {
    pub(crate) fn new(config: &'a ProxyConfig, page: &'a PageContext) -> Self {
        let ip_swap = if config.source == SourceMode::Ip
            && config.toggles.domain_to_ip
            && page.origin.is_known()
        {
            page.ip
                .as_deref()
                .and_then(url_host)
                .and_then(|ip_host| DomainSwap::new(&page.origin.host, &ip_host))
        } else {
            None
        };
        Self {
            config,
            page,
            ip_swap,
        }
    }

    /// Compiled domain-to-IP substitution for this render, if it applies.
    pub(crate) fn ip_swap(&self) -> Option<&DomainSwap> {
        self.ip_swap.as_ref()
    }

    /// Decides how `value` found in a `category` attribute is rewritten.
    pub(crate) fn decide(&self, value: &str, category: RewriteCategory) -> Decision {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || has_foreign_scheme(trimmed) {
            return Decision::Keep;
        }
        // Links already pointing through the proxy are re-decided on their target.
        let unwrapped = unwrap_proxy_link(trimmed);
        let target = unwrapped.as_deref().unwrap_or(trimmed);

        if self.config.toggles.get(category) {
            Decision::Routed(self.generate_url(target, category.is_raw()))
        } else {
            let passive = self.passive(target);
            if passive == value {
                Decision::Keep
            } else {
                Decision::Passive(passive)
            }
        }
    }

    /// Proxy link for `url`: a query string carrying the full configuration,
    /// the origin identity and the target, in a fixed field order.
    pub(crate) fn generate_url(&self, url: &str, raw: bool) -> String {
        let cfg = self.config;
        let domain = self.page.origin.host.as_str();
        let target = self.absolute(url);

        let mut fields: Vec<(&str, String)> = vec![("m", cfg.method.token().to_string())];
        if raw {
            fields.push(("x", "1".to_string()));
        }
        fields.push(("a", cfg.assets.token().to_string()));
        fields.push(("r", cfg.rewrite.token().to_string()));
        fields.push(("s", cfg.source.token().to_string()));
        fields.push(("host", domain.to_string()));
        fields.push(("is_cfg", flag(cfg.open_config_panel)));
        fields.push(("is_dbg", flag(cfg.open_debug_panel)));
        fields.push(("ht_u", urlencode(&cfg.auth.user)));
        fields.push(("ht_p", urlencode(&cfg.auth.pass)));
        for category in RewriteCategory::ALL {
            if cfg.toggles.get(category) {
                fields.push((category.toggle_key(), "1".to_string()));
            }
        }

        let ip_value = if cfg.source == SourceMode::Ip && url_host(&target).as_deref() == Some(domain)
        {
            self.swap_to_ip(&target)
        } else {
            self.page.ip.clone().unwrap_or_default()
        };
        fields.push(("ip", urlencode(&ip_value)));
        fields.push(("u", urlencode(&target)));

        let query = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        format!("?{}", query)
    }

    /// Absolute form of `value`: kept if it has a host, otherwise resolved
    /// against the page path on the proxied origin.
    pub(crate) fn absolute(&self, value: &str) -> String {
        let value = value.trim();
        if url_host(value).is_some() {
            return value.to_string();
        }
        if let Some(rest) = value.strip_prefix("//") {
            return format!("{}://{}", self.page.origin.scheme, rest);
        }
        match self.base().and_then(|base| base.join(value).ok()) {
            Some(joined) => joined.to_string(),
            None => self.add_prefix(value),
        }
    }

    /// Passive normalization for disabled categories.
    pub(crate) fn passive(&self, value: &str) -> String {
        if is_absolute(value) {
            value.trim().to_string()
        } else {
            self.add_prefix(value.trim())
        }
    }

    fn add_prefix(&self, path: &str) -> String {
        format!("{}/{}", self.page.origin.base(), clean_path(path))
    }

    /// Page URL moved onto the origin host (they differ in IP-source mode).
    fn base(&self) -> Option<Url> {
        let origin = &self.page.origin;
        let mut url = match Url::parse(&self.page.url) {
            Ok(url) => url,
            Err(_) if origin.is_known() => return Url::parse(&format!("{}/", origin.base())).ok(),
            Err(_) => return None,
        };
        if origin.is_known() && url.host_str() != Some(origin.host.as_str()) {
            url.set_host(Some(&origin.host)).ok()?;
            url.set_port(None).ok()?;
        }
        Some(url)
    }

    fn swap_to_ip(&self, target: &str) -> String {
        match &self.ip_swap {
            Some(swap) => swap.apply(target).0,
            None => target.to_string(),
        }
    }
}

/// Form encoding (space as `+`) with `*` escaped too.
pub fn urlencode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
}

/// Already resolvable without the page context (`http...` or `//...`).
pub fn is_absolute(value: &str) -> bool {
    let v = value.trim();
    v.starts_with("http") || v.starts_with("//")
}

/// Target of a link generated by this proxy (`?m=...&u=<target>`).
pub fn unwrap_proxy_link(value: &str) -> Option<String> {
    let query = value.strip_prefix("/?").or_else(|| value.strip_prefix('?'))?;
    if !query.starts_with("m=") {
        return None;
    }
    QueryParams::parse(query)
        .get_non_empty("u")
        .map(str::to_string)
}

fn flag(on: bool) -> String {
    (if on { "1" } else { "" }).to_string()
}

fn clean_path(path: &str) -> &str {
    let p = path.strip_prefix("./").unwrap_or(path);
    let p = p.strip_prefix("//").unwrap_or(p);
    p.strip_prefix('/').unwrap_or(p)
}

/// `javascript:`, `mailto:`, `data:` and friends.
fn has_foreign_scheme(value: &str) -> bool {
    let Some((scheme, _)) = value.split_once(':') else {
        return false;
    };
    let bytes = scheme.as_bytes();
    !bytes.is_empty()
        && bytes[0].is_ascii_alphabetic()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
        && !scheme.eq_ignore_ascii_case("http")
        && !scheme.eq_ignore_ascii_case("https")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::Origin;
    use crate::proxy_config::{HttpMethod, RewriteToggles};

    fn page(url: &str) -> PageContext {
        PageContext::new(url, Origin::from_url(url), None)
    }

    #[test]
    fn urlencode_uses_form_rules() {
        assert_eq!(urlencode("https://example.com/a b*c~"), "https%3A%2F%2Fexample.com%2Fa+b%2Ac%7E");
        assert_eq!(urlencode("A-z_0.9"), "A-z_0.9");
    }

    #[test]
    fn generated_fields_are_in_wire_order() {
        let cfg = ProxyConfig::default();
        let page = page("https://example.com/start");
        let link = Linker::new(&cfg, &page).generate_url("/docs", false);
        assert_eq!(
            link,
            "?m=GET&a=REDIRECT&r=REGEX2&s=domain&host=example.com&is_cfg=&is_dbg=&ht_u=&ht_p=\
             &r_url=1&r_img=1&r_js=1&r_form=1&r_css=1&r_video=1&r_ip=1\
             &ip=&u=https%3A%2F%2Fexample.com%2Fdocs"
        );
    }

    #[test]
    fn raw_flag_follows_method() {
        let mut cfg = ProxyConfig::default();
        cfg.method = HttpMethod::Post;
        cfg.open_debug_panel = true;
        let page = page("https://example.com/");
        let link = Linker::new(&cfg, &page).generate_url("https://cdn.example.com/a.js", true);
        assert!(link.starts_with("?m=POST&x=1&a=REDIRECT"));
        assert!(link.contains("&is_cfg=&is_dbg=1&"));
        assert!(link.ends_with("&u=https%3A%2F%2Fcdn.example.com%2Fa.js"));
    }

    #[test]
    fn credentials_are_form_encoded() {
        let mut cfg = ProxyConfig::default();
        cfg.auth.user = "bob".to_string();
        cfg.auth.pass = "p&ss+w=rd".to_string();
        let page = page("https://example.com/");
        let link = Linker::new(&cfg, &page).generate_url("/", false);
        assert!(link.contains("&ht_u=bob&ht_p=p%26ss%2Bw%3Drd&r_url=1"), "{}", link);
        let params = QueryParams::parse(&link);
        assert_eq!(params.get("ht_p"), Some("p&ss+w=rd"));
    }

    #[test]
    fn disabled_toggles_are_omitted() {
        let mut cfg = ProxyConfig::default();
        cfg.toggles = RewriteToggles::all_off();
        cfg.toggles.url = true;
        let page = page("https://example.com/start");
        let link = Linker::new(&cfg, &page).generate_url("/docs", false);
        assert!(link.contains("&r_url=1&ip="));
        assert!(!link.contains("r_img"));
    }

    #[test]
    fn relative_values_resolve_against_page_directory() {
        let cfg = ProxyConfig::default();
        let page = page("https://example.com/dir/page.html?q=1");
        let linker = Linker::new(&cfg, &page);
        assert_eq!(linker.absolute("./img/a.png"), "https://example.com/dir/img/a.png");
        assert_eq!(linker.absolute("b.css"), "https://example.com/dir/b.css");
        assert_eq!(linker.absolute("/root.js"), "https://example.com/root.js");
        assert_eq!(linker.absolute("//cdn.example.com/x"), "https://cdn.example.com/x");
        assert_eq!(linker.absolute("http://other.example/y"), "http://other.example/y");
    }

    #[test]
    fn resolution_keeps_the_page_port() {
        let cfg = ProxyConfig::default();
        let page = page("http://127.0.0.1:8081/a/b");
        assert_eq!(Linker::new(&cfg, &page).absolute("c"), "http://127.0.0.1:8081/a/c");
    }

    #[test]
    fn passive_prefixes_only_relative_values() {
        let cfg = ProxyConfig::default();
        let page = page("http://example.com/dir/page");
        let linker = Linker::new(&cfg, &page);
        assert_eq!(linker.passive("/a/b.png"), "http://example.com/a/b.png");
        assert_eq!(linker.passive("./c.png"), "http://example.com/c.png");
        assert_eq!(linker.passive("https://cdn.example.com/x"), "https://cdn.example.com/x");
        assert_eq!(linker.passive("//cdn.example.com/x"), "//cdn.example.com/x");
    }

    #[test]
    fn decide_skips_non_http_and_fragments() {
        let cfg = ProxyConfig::default();
        let page = page("https://example.com/");
        let linker = Linker::new(&cfg, &page);
        for value in ["javascript:void(0)", "mailto:a@example.com", "#top", "", "  ", "data:image/png;base64,AA"] {
            assert_eq!(linker.decide(value, RewriteCategory::Url), Decision::Keep, "{value}");
        }
    }

    #[test]
    fn decide_unwraps_existing_proxy_links() {
        let cfg = ProxyConfig::default();
        let page = page("https://example.com/start");
        let linker = Linker::new(&cfg, &page);
        let once = linker.generate_url("/docs", false);
        assert_eq!(linker.decide(&once, RewriteCategory::Url), Decision::Routed(once.clone()));

        let mut off = cfg.clone();
        off.toggles.url = false;
        let linker = Linker::new(&off, &page);
        assert_eq!(
            linker.decide(&once, RewriteCategory::Url),
            Decision::Passive("https://example.com/docs".to_string())
        );
    }

    #[test]
    fn ip_field_in_ip_source_mode() {
        let mut cfg = ProxyConfig::default();
        cfg.source = SourceMode::Ip;
        let page = PageContext::new(
            "http://example.com/start",
            Origin::derive(SourceMode::Ip, "http://example.com/start", Some("example.com")),
            Some("http://10.0.0.5/".to_string()),
        );
        let linker = Linker::new(&cfg, &page);
        let same_host = linker.generate_url("/docs", false);
        assert!(same_host.contains("&ip=http%3A%2F%2F10.0.0.5%2Fdocs&u=http%3A%2F%2Fexample.com%2Fdocs"));

        let other_host = linker.generate_url("https://cdn.example.net/x.js", true);
        assert!(other_host.contains("&ip=http%3A%2F%2F10.0.0.5%2F&u="));
    }
}
