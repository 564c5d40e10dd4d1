//! `hop cache-path` – where an asset lives in the cache.

use anyhow::Result;
use hop_core::asset_cache::AssetCache;
use hop_core::config::HopConfig;

pub fn run_cache_path(cfg: &HopConfig, url: &str) -> Result<()> {
    let cache = AssetCache::open(cfg.cache_dir()?);
    for err in cache.errors() {
        eprintln!("warning: {}", err);
    }
    let path = cache.path_for(url);
    println!("{}", path.display());
    println!("{}", if cache.exists(url) { "cached" } else { "not cached" });
    Ok(())
}
