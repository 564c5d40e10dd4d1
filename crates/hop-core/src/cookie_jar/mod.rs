//! Origin-scoped cookie jar.
//!
//! Cookies received from a proxied site are persisted per (session, origin)
//! identity and replayed on later requests to the same origin. The `local`
//! set only ever accumulates: a cookie is kept until a newer value with the
//! same name replaces it. Storage is one JSON file per identity; there is no
//! locking, so concurrent writers for one identity are last-write-wins.

mod parse;
mod persist;

pub use parse::CookieRecord;
pub use persist::CookieSet;

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::ProxyError;

pub struct CookieJar {
    dir: PathBuf,
    id: Option<String>,
    /// Identity whose file has been merged into `local`.
    loaded_for: Option<String>,
    local: CookieSet,
    site: CookieSet,
    errors: Vec<ProxyError>,
}

impl CookieJar {
    /// Opens a jar rooted at `dir`, creating the directory if needed. A
    /// creation failure is recorded, not returned.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let mut errors = Vec::new();
        if !dir.is_dir() {
            if let Err(source) = std::fs::create_dir_all(&dir) {
                tracing::warn!(dir = %dir.display(), "cookie dir: {}", source);
                errors.push(ProxyError::CreateDir {
                    path: dir.clone(),
                    source,
                });
            }
        }
        Self {
            dir,
            id: None,
            loaded_for: None,
            local: CookieSet::new(),
            site: CookieSet::new(),
            errors,
        }
    }

    /// Persistence key: hex SHA-256 of `session + "_" + host`.
    pub fn identity_key(session_id: &str, origin_host: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(session_id.as_bytes());
        hasher.update(b"_");
        hasher.update(origin_host.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Points the jar at a new identity. Must be called again whenever the
    /// origin changes; the in-memory sets are reset.
    pub fn set_identity(&mut self, session_id: &str, origin_host: &str) {
        let key = Self::identity_key(session_id, origin_host);
        if self.id.as_deref() != Some(key.as_str()) {
            self.local.clear();
            self.site.clear();
            self.loaded_for = None;
        }
        tracing::debug!(host = origin_host, id = %key, "cookie identity");
        self.id = Some(key);
    }

    pub fn identity(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing the current identity.
    pub fn path(&self) -> Option<PathBuf> {
        self.id.as_ref().map(|id| self.dir.join(id))
    }

    /// Reads the persisted set for the current identity. Absent or corrupt
    /// data reads as empty.
    pub fn load(&mut self) -> &CookieSet {
        match self.path() {
            Some(path) => {
                self.local = persist::read_set(&path);
                self.loaded_for = self.id.clone();
                tracing::debug!(count = self.local.len(), "loaded cookies");
            }
            None => {
                tracing::warn!("cookie load without identity");
                self.local.clear();
            }
        }
        &self.local
    }

    /// Parses raw `Set-Cookie` values, merges them into the local set by name,
    /// writes the whole local set back and returns only the new site cookies.
    /// A write failure is recorded and does not stop the request.
    pub fn save<I, S>(&mut self, set_cookie_headers: I) -> &CookieSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.site = set_cookie_headers
            .into_iter()
            .filter_map(|h| parse::parse_set_cookie(h.as_ref()))
            .map(|c| (c.name.clone(), c))
            .collect();

        let Some(path) = self.path() else {
            tracing::warn!("cookie save without identity; nothing persisted");
            return &self.site;
        };
        if self.loaded_for != self.id {
            self.local = persist::read_set(&path);
            self.loaded_for = self.id.clone();
        }

        for (name, cookie) in &self.site {
            self.local.insert(name.clone(), cookie.clone());
        }

        if let Err(source) = persist::write_set(&path, &self.local) {
            tracing::warn!(path = %path.display(), "save cookies: {}", source);
            self.errors.push(ProxyError::SaveCookies { path, source });
        } else {
            tracing::debug!(site = self.site.len(), local = self.local.len(), "saved cookies");
        }
        &self.site
    }

    /// Cookies this jar will send upstream.
    pub fn local_cookies(&self) -> &CookieSet {
        &self.local
    }

    /// Cookies received in the current cycle.
    pub fn site_cookies(&self) -> &CookieSet {
        &self.site
    }

    /// `Cookie` header value for the local set (`a=1;b=2`), if any.
    pub fn cookie_header(&self) -> Option<String> {
        cookie_header(&self.local)
    }

    pub fn errors(&self) -> &[ProxyError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<ProxyError> {
        std::mem::take(&mut self.errors)
    }
}

/// Joins a cookie set into a `Cookie` header value.
pub fn cookie_header(set: &CookieSet) -> Option<String> {
    if set.is_empty() {
        return None;
    }
    Some(
        set.values()
            .map(CookieRecord::pair)
            .collect::<Vec<_>>()
            .join(";"),
    )
}
