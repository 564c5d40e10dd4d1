//! On-disk encoding of a cookie set (JSON, one file per identity).

use std::collections::BTreeMap;
use std::path::Path;

use super::parse::CookieRecord;

/// Cookie set keyed by cookie name.
pub type CookieSet = BTreeMap<String, CookieRecord>;

/// Reads a persisted set. Missing, empty, unreadable or corrupt files all
/// read as "no cookies known".
pub(crate) fn read_set(path: &Path) -> CookieSet {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CookieSet::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), "read cookie jar: {}", e);
            return CookieSet::new();
        }
    };
    if bytes.is_empty() {
        return CookieSet::new();
    }
    match serde_json::from_slice(&bytes) {
        Ok(set) => set,
        Err(e) => {
            tracing::warn!(path = %path.display(), "corrupt cookie jar ignored: {}", e);
            CookieSet::new()
        }
    }
}

/// Writes the whole set, replacing the file through a temp file + rename.
pub(crate) fn write_set(path: &Path, set: &CookieSet) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(set).map_err(std::io::Error::other)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = std::path::PathBuf::from(tmp);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}
