//! Parse raw `Set-Cookie` header values into cookie records.

use serde::{Deserialize, Serialize};

/// One learned cookie: its `name=value` pair plus any attribute pairs
/// (`path`, `expires`, ...) that came with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    /// Remaining `key=value` segments in header order. Flag attributes
    /// without `=` (`HttpOnly`, `Secure`) are dropped.
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

impl CookieRecord {
    /// `name=value` as sent back upstream.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Splits on `"; "`, then each segment on its first `=`; segments without `=`
/// are dropped. The first surviving pair names the cookie.
pub(crate) fn parse_set_cookie(header: &str) -> Option<CookieRecord> {
    let mut pairs = header
        .split("; ")
        .filter_map(|segment| segment.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()));
    let (name, value) = pairs.next()?;
    Some(CookieRecord {
        name,
        value,
        attributes: pairs.collect(),
    })
}
