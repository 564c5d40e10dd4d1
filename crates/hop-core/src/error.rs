//! Per-request error taxonomy.
//!
//! Components never abort a proxy cycle: they record a `ProxyError` and keep
//! going. The orchestrator merges every component's list into the outcome.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// A cookie or cache directory could not be created.
    #[error("error creating \"{}\" directory (permissions denied issue?): {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The serialized cookie set could not be written back.
    #[error("error saving cookies file {}: {source}", path.display())]
    SaveCookies {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An asset body could not be written into the cache.
    #[error("error writing cache file {}: {source}", path.display())]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP collaborator failed (curl error code and message).
    #[error("transport error {code}: {message}")]
    Transport { code: u32, message: String },

    /// The lenient tree parse recovered from malformed markup.
    #[error("markup parse errors: {count}")]
    Markup { count: usize },
}

impl ProxyError {
    /// True for storage failures (directories, cookie file, cache file).
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            ProxyError::CreateDir { .. }
                | ProxyError::SaveCookies { .. }
                | ProxyError::CacheWrite { .. }
        )
    }
}
