//! Browser session identities for the front end (`HOPSESSID` cookie).

use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const SESSION_COOKIE: &str = "HOPSESSID";

/// Session ids: hex SHA-256 over time, pid and a per-process counter,
/// truncated to 32 chars.
#[derive(Debug, Default)]
pub struct SessionIds {
    counter: AtomicU64,
}

impl SessionIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(format!("{}-{}-{}", nanos, std::process::id(), n).as_bytes());
        let mut id = hex::encode(hasher.finalize());
        id.truncate(32);
        id
    }
}

/// Only ids shaped like issued ones (hex, 16..=64 chars) are accepted.
pub fn is_valid(id: &str) -> bool {
    (16..=64).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// `Set-Cookie` value for a freshly issued id.
pub fn set_cookie_value(id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, id)
}
