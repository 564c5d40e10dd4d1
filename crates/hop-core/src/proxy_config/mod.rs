//! Per-request proxy configuration.
//!
//! A `ProxyConfig` is built once per request from defaults (the settings
//! file) overlaid by recognized query parameters, and is read-only after that.
//! Unknown keys and values outside each allow-list are ignored; resolution
//! never fails.

mod params;

pub use params::QueryParams;

use crate::category::RewriteCategory;
use params::leading_int;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default user agent sent upstream.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/4.0 (compatible;)";

/// Which rewrite passes run over fetched HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RewriteMode {
    /// No rewriting (only the IP pass in IP-source mode).
    #[serde(rename = "")]
    Off,
    /// Attribute-pattern pass.
    #[serde(rename = "REGEX")]
    Pattern,
    /// Protocol-relative prefix pass, then the attribute-pattern pass.
    #[default]
    #[serde(rename = "REGEX2")]
    PatternPrefix,
    /// As `PatternPrefix`, plus the unconditional quoted-URL pass.
    #[serde(rename = "REGEX3")]
    PatternPrefixForce,
    /// Lenient tree parse and attribute walk.
    #[serde(rename = "DOM")]
    Tree,
}

impl RewriteMode {
    pub fn token(self) -> &'static str {
        match self {
            RewriteMode::Off => "",
            RewriteMode::Pattern => "REGEX",
            RewriteMode::PatternPrefix => "REGEX2",
            RewriteMode::PatternPrefixForce => "REGEX3",
            RewriteMode::Tree => "DOM",
        }
    }

    /// `""` and `"0"` both read as "off".
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "" | "0" => Some(RewriteMode::Off),
            "REGEX" => Some(RewriteMode::Pattern),
            "REGEX2" => Some(RewriteMode::PatternPrefix),
            "REGEX3" => Some(RewriteMode::PatternPrefixForce),
            "DOM" => Some(RewriteMode::Tree),
            _ => None,
        }
    }
}

/// How raw asset requests (`x=1`) are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssetMode {
    /// Redirect the browser to the upstream asset.
    #[default]
    #[serde(rename = "REDIRECT")]
    Redirect,
    /// Fetch into the on-disk asset cache and redirect to the cached copy.
    #[serde(rename = "CURL")]
    Cache,
}

impl AssetMode {
    pub fn token(self) -> &'static str {
        match self {
            AssetMode::Redirect => "REDIRECT",
            AssetMode::Cache => "CURL",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "REDIRECT" => Some(AssetMode::Redirect),
            "CURL" => Some(AssetMode::Cache),
            _ => None,
        }
    }
}

/// How the upstream is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Resolve the target's domain directly.
    #[default]
    Domain,
    /// Connect to an explicit IP URL and send the real host in a `Host` header.
    Ip,
}

impl SourceMode {
    pub fn token(self) -> &'static str {
        match self {
            SourceMode::Domain => "domain",
            SourceMode::Ip => "ip",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "domain" => Some(SourceMode::Domain),
            "ip" => Some(SourceMode::Ip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn token(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            _ => None,
        }
    }
}

/// Per-category rewrite switches. All on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteToggles {
    pub url: bool,
    pub img: bool,
    pub js: bool,
    pub form: bool,
    pub css: bool,
    pub video: bool,
    pub domain_to_ip: bool,
}

impl Default for RewriteToggles {
    fn default() -> Self {
        Self {
            url: true,
            img: true,
            js: true,
            form: true,
            css: true,
            video: true,
            domain_to_ip: true,
        }
    }
}

impl RewriteToggles {
    pub fn all_off() -> Self {
        Self {
            url: false,
            img: false,
            js: false,
            form: false,
            css: false,
            video: false,
            domain_to_ip: false,
        }
    }

    pub fn get(&self, category: RewriteCategory) -> bool {
        match category {
            RewriteCategory::Url => self.url,
            RewriteCategory::Img => self.img,
            RewriteCategory::Js => self.js,
            RewriteCategory::Form => self.form,
            RewriteCategory::Css => self.css,
            RewriteCategory::Video => self.video,
            RewriteCategory::DomainToIp => self.domain_to_ip,
        }
    }

    pub fn set(&mut self, category: RewriteCategory, on: bool) {
        let slot = match category {
            RewriteCategory::Url => &mut self.url,
            RewriteCategory::Img => &mut self.img,
            RewriteCategory::Js => &mut self.js,
            RewriteCategory::Form => &mut self.form,
            RewriteCategory::Css => &mut self.css,
            RewriteCategory::Video => &mut self.video,
            RewriteCategory::DomainToIp => &mut self.domain_to_ip,
        };
        *slot = on;
    }
}

/// Basic-auth credentials forwarded upstream (`ht_u` / `ht_p`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicAuth {
    pub user: String,
    pub pass: String,
}

impl BasicAuth {
    /// Credentials are only sent when both halves are present.
    pub fn is_complete(&self) -> bool {
        !self.user.is_empty() && !self.pass.is_empty()
    }
}

/// Immutable per-request snapshot of proxy behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub method: HttpMethod,
    /// Raw asset request (`x=1`): deliver the asset instead of rendering HTML.
    pub raw: bool,
    pub rewrite: RewriteMode,
    pub assets: AssetMode,
    pub source: SourceMode,
    pub toggles: RewriteToggles,
    pub user_agent: String,
    pub timeout: Duration,
    pub max_redirects: u32,
    pub auth: BasicAuth,
    /// UI flag: open the config panel (`is_cfg`).
    pub open_config_panel: bool,
    /// UI flag: open the debug panel (`is_dbg`).
    pub open_debug_panel: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            raw: false,
            rewrite: RewriteMode::default(),
            assets: AssetMode::default(),
            source: SourceMode::default(),
            toggles: RewriteToggles::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(120),
            max_redirects: 10,
            auth: BasicAuth::default(),
            open_config_panel: false,
            open_debug_panel: false,
        }
    }
}

impl ProxyConfig {
    /// Overlays recognized query parameters on `base`.
    ///
    /// The method defaults to the inbound request's method; `m=GET` on an
    /// inbound POST stays POST. Category toggles use a presence model as soon
    /// as any parameter is given: a toggle whose `r_<key>` is absent is off.
    /// With no parameters at all the toggles keep their defaults.
    pub fn resolve(base: &ProxyConfig, params: &QueryParams, inbound: HttpMethod) -> Self {
        let mut cfg = base.clone();
        cfg.method = inbound;

        if let Some(mode) = params.get("r").and_then(RewriteMode::from_token) {
            cfg.rewrite = mode;
        }
        if let Some(mode) = params.get("a").and_then(AssetMode::from_token) {
            cfg.assets = mode;
        }
        if let Some(method) = params.get("m").and_then(HttpMethod::from_token) {
            cfg.method = if method == HttpMethod::Get && inbound == HttpMethod::Post {
                HttpMethod::Post
            } else {
                method
            };
        }
        if let Some(mode) = params.get("s").and_then(SourceMode::from_token) {
            cfg.source = mode;
        }
        if let Some(flag) = params.get("x").and_then(binary_flag) {
            cfg.raw = flag;
        }
        if let Some(flag) = params.get("is_cfg").and_then(binary_flag) {
            cfg.open_config_panel = flag;
        }
        if let Some(flag) = params.get("is_dbg").and_then(binary_flag) {
            cfg.open_debug_panel = flag;
        }

        if !params.is_empty() {
            for category in RewriteCategory::ALL {
                if !params.contains(category.toggle_key()) {
                    cfg.toggles.set(category, false);
                }
            }
        }

        if let Some(user) = params.get("ht_u") {
            cfg.auth.user = user.to_string();
        }
        if let Some(pass) = params.get("ht_p") {
            cfg.auth.pass = pass.to_string();
        }

        tracing::debug!(
            rewrite = cfg.rewrite.token(),
            assets = cfg.assets.token(),
            source = cfg.source.token(),
            raw = cfg.raw,
            "resolved proxy config"
        );
        cfg
    }

    /// `resolve` against the built-in defaults for an inbound GET.
    pub fn from_params(params: &QueryParams) -> Self {
        Self::resolve(&ProxyConfig::default(), params, HttpMethod::Get)
    }
}

/// 0/1 integer flag; any other integer leaves the default alone.
fn binary_flag(value: &str) -> Option<bool> {
    match leading_int(value) {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}
