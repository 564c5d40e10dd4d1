//! Tracing setup for the proxy.
//!
//! Events go to `~/.local/state/hop/hop.log` (append, no ANSI). When the
//! state dir is unusable the CLI falls back to stderr so that serving keeps
//! working.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,hop=debug,hop_core=debug";

/// Path of the proxy log: `~/.local/state/hop/hop.log`.
pub fn log_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hop")?;
    Ok(xdg_dirs.get_state_home().join("hop").join("hop.log"))
}

/// Opens `path` for appending, creating its directory first.
fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))
}

/// Installs the global subscriber writing to the proxy log file.
/// Errors leave no subscriber installed; call `init_logging_stderr` then.
pub fn init_logging() -> Result<()> {
    let path = log_path()?;
    let file = open_log(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install subscriber: {}", e))?;

    tracing::info!(path = %path.display(), "hop logging initialized");
    Ok(())
}

/// Stderr-only subscriber. A second install attempt is ignored.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

/// `RUST_LOG` when set and valid, else the proxy default.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
