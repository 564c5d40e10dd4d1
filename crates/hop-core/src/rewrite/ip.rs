//! Domain-to-IP pass for IP-source mode.

use regex::{Captures, Regex};

/// Domain-to-IP substitution, compiled once per render.
#[derive(Debug)]
pub(crate) struct DomainSwap {
    re: Regex,
    ip_host: String,
}

impl DomainSwap {
    /// Matches `domain` after `http://` or `https://`, up to a word boundary.
    /// `None` when either side is empty or the pattern cannot be built.
    pub(crate) fn new(domain: &str, ip_host: &str) -> Option<Self> {
        if domain.is_empty() || ip_host.is_empty() {
            return None;
        }
        let pattern = format!(r"(?i)(https?://){}\b", regex::escape(domain));
        match Regex::new(&pattern) {
            Ok(re) => Some(Self {
                re,
                ip_host: ip_host.to_string(),
            }),
            Err(e) => {
                tracing::warn!(domain, "ip pass pattern: {}", e);
                None
            }
        }
    }

    /// New text and the number of replacements.
    pub(crate) fn apply(&self, text: &str) -> (String, u64) {
        let mut count = 0u64;
        let out = self.re.replace_all(text, |caps: &Captures<'_>| {
            count += 1;
            format!("{}{}", &caps[1], self.ip_host)
        });
        (out.into_owned(), count)
    }
}
