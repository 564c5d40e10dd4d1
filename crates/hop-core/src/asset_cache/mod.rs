//! On-disk asset cache.
//!
//! Raw assets fetched in cache mode land under `root/<bucket>/<file>` where
//! the bucket is derived from the asset host and the file name from the full
//! URL (see `key`). A cached copy is never refreshed; presence is the only
//! freshness test. Bodies are streamed into `<file>.part` and renamed into
//! place once the transfer succeeded, so readers never see a partial file.

mod key;

use std::path::{Path, PathBuf};

use crate::error::ProxyError;
use crate::fetch::{FetchRequest, Fetcher};

/// Temporary file suffix used before the atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

pub struct AssetCache {
    root: PathBuf,
    errors: Vec<ProxyError>,
}

impl AssetCache {
    /// Opens the cache rooted at `root`, creating it if needed. A creation
    /// failure is recorded; later stores will fail and record their own errors.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut errors = Vec::new();
        if !root.is_dir() {
            if let Err(source) = std::fs::create_dir_all(&root) {
                tracing::warn!(dir = %root.display(), "cache dir: {}", source);
                errors.push(ProxyError::CreateDir {
                    path: root.clone(),
                    source,
                });
            }
        }
        Self { root, errors }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Last component of the cache root; the URL prefix cached files are served under.
    pub fn url_prefix(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `<bucket>/<file>` for an asset URL.
    pub fn relative_path(url: &str) -> String {
        format!("{}/{}", key::bucket_for(url), key::file_name_for(url))
    }

    /// Where `url` is (or would be) cached.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.root
            .join(key::bucket_for(url))
            .join(key::file_name_for(url))
    }

    pub fn exists(&self, url: &str) -> bool {
        self.path_for(url).is_file()
    }

    /// Public URL of the cached copy of `url`, relative to the proxy's `base_url`.
    pub fn public_url(&self, url: &str, base_url: &str) -> String {
        format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            self.url_prefix(),
            Self::relative_path(url)
        )
    }

    /// Maps `<bucket>/<file>` (as found in a request path) back to a file under
    /// the root. Anything that does not look like a cache key is rejected.
    pub fn local_path(&self, relative: &str) -> Option<PathBuf> {
        let (bucket, file) = relative.trim_start_matches('/').split_once('/')?;
        let bucket_ok = bucket.len() == 64 && bucket.bytes().all(|b| b.is_ascii_hexdigit());
        let file_ok = !file.is_empty()
            && !file.starts_with('.')
            && !file.ends_with(TEMP_SUFFIX)
            && file
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.');
        if !(bucket_ok && file_ok) {
            return None;
        }
        Some(self.root.join(bucket).join(file))
    }

    /// Ensures `request.url` is cached and returns the cached path. `None`
    /// when the bucket cannot be created, the transfer fails, the upstream
    /// answers with an error status or the temp file cannot be renamed.
    pub fn store<F: Fetcher>(&mut self, fetcher: &F, request: &FetchRequest) -> Option<PathBuf> {
        let final_path = self.path_for(&request.url);
        if final_path.is_file() {
            tracing::debug!(url = %request.url, "cache hit");
            return Some(final_path);
        }

        let bucket = final_path.parent()?.to_path_buf();
        if let Err(source) = std::fs::create_dir_all(&bucket) {
            tracing::warn!(dir = %bucket.display(), "cache bucket: {}", source);
            self.errors.push(ProxyError::CreateDir {
                path: bucket,
                source,
            });
            return None;
        }

        let tmp = temp_path(&final_path);
        let response = fetcher.fetch_to_file(request, &tmp);
        if let Some(err) = response.error {
            tracing::warn!(url = %request.url, "cache store failed: {}", err);
            let _ = std::fs::remove_file(&tmp);
            self.errors.push(err);
            return None;
        }
        if response.status.http_code >= 400 {
            tracing::warn!(
                url = %request.url,
                code = response.status.http_code,
                "not caching error response"
            );
            let _ = std::fs::remove_file(&tmp);
            return None;
        }

        if let Err(source) = std::fs::rename(&tmp, &final_path) {
            tracing::warn!(path = %final_path.display(), "cache finalize: {}", source);
            let _ = std::fs::remove_file(&tmp);
            self.errors.push(ProxyError::CacheWrite {
                path: final_path,
                source,
            });
            return None;
        }
        tracing::debug!(url = %request.url, path = %final_path.display(), "cached asset");
        Some(final_path)
    }

    pub fn errors(&self) -> &[ProxyError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<ProxyError> {
        std::mem::take(&mut self.errors)
    }
}
