//! Two-level cache key derivation from an asset URL.

use sha2::{Digest, Sha256};

/// Longest extension carried over onto cache file names.
const MAX_EXT_LEN: usize = 8;

pub(crate) fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Directory bucket: hex SHA-256 of the asset's host (empty host hashes too).
pub(crate) fn bucket_for(url: &str) -> String {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    sha256_hex(&host)
}

/// File name: `sha256(url) + "_" + sha256(basename)` plus `.ext` when the
/// basename carries a short alphanumeric extension.
pub(crate) fn file_name_for(url: &str) -> String {
    let base = basename(url);
    let mut name = format!("{}_{}", sha256_hex(url), sha256_hex(&base));
    if let Some(ext) = extension(&base) {
        name.push('.');
        name.push_str(&ext);
    }
    name
}

/// Last path segment of the URL (query and fragment excluded).
pub(crate) fn basename(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    path.rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn extension(basename: &str) -> Option<String> {
    let (stem, ext) = basename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_EXT_LEN {
        return None;
    }
    if !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
