use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::proxy_config::{AssetMode, ProxyConfig, RewriteMode, SourceMode, DEFAULT_USER_AGENT};

/// Global configuration loaded from `~/.config/hop/config.toml`.
///
/// These are the proxy-wide defaults; each request overlays its own query
/// parameters on top (see `ProxyConfig::resolve`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopConfig {
    /// Listen address for `hop serve`.
    pub listen: String,
    /// Page loaded when a request names no target.
    pub start_url: String,
    /// User agent sent upstream.
    pub user_agent: String,
    /// Connect and total timeout for upstream requests, in seconds.
    pub timeout_secs: u64,
    /// Maximum redirects followed upstream.
    pub max_redirects: u32,
    /// Default rewrite mode token ("", "REGEX", "REGEX2", "REGEX3", "DOM").
    #[serde(default)]
    pub rewrite: RewriteMode,
    /// Default asset delivery ("REDIRECT" or "CURL").
    #[serde(default)]
    pub assets: AssetMode,
    /// Default source mode ("domain" or "ip").
    #[serde(default)]
    pub source: SourceMode,
    /// Cookie jar directory; defaults to `~/.local/state/hop/cookies`.
    #[serde(default)]
    pub cookies_dir: Option<PathBuf>,
    /// Asset cache directory; defaults to `~/.cache/hop/cache`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for HopConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            start_url: "https://example.com/".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 120,
            max_redirects: 10,
            rewrite: RewriteMode::default(),
            assets: AssetMode::default(),
            source: SourceMode::default(),
            cookies_dir: None,
            cache_dir: None,
        }
    }
}

impl HopConfig {
    /// Proxy defaults that query parameters are resolved against.
    pub fn base_config(&self) -> ProxyConfig {
        ProxyConfig {
            rewrite: self.rewrite,
            assets: self.assets,
            source: self.source,
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_redirects: self.max_redirects,
            ..ProxyConfig::default()
        }
    }

    pub fn cookies_dir(&self) -> Result<PathBuf> {
        match &self.cookies_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let xdg_dirs = xdg::BaseDirectories::with_prefix("hop")?;
                Ok(xdg_dirs.get_state_home().join("hop").join("cookies"))
            }
        }
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let xdg_dirs = xdg::BaseDirectories::with_prefix("hop")?;
                Ok(xdg_dirs.get_cache_home().join("hop").join("cache"))
            }
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hop")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HopConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HopConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: HopConfig = toml::from_str(&data)?;
    Ok(cfg)
}
