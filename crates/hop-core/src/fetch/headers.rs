//! Collect raw response header lines into a lowercased multi-map.

use std::collections::BTreeMap;

/// Response headers keyed by lowercased name, values in arrival order.
/// Headers from every hop of a redirect chain are kept, so cookies set on
/// a redirect are not lost.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    map: BTreeMap<String, Vec<String>>,
}

impl ResponseHeaders {
    /// Adds one raw header line. Status lines and blank lines (no `:`) are ignored.
    pub fn push_line(&mut self, line: &str) {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.is_empty() {
                return;
            }
            self.map
                .entry(name.to_ascii_lowercase())
                .or_default()
                .push(value.trim().to_string());
        }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut headers = Self::default();
        for line in lines {
            headers.push_line(line.as_ref());
        }
        headers
    }

    /// All values for `name` (case-insensitive).
    pub fn get_all(&self, name: &str) -> &[String] {
        self.map
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Last value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).last().map(String::as_str)
    }

    pub fn set_cookies(&self) -> &[String] {
        self.get_all("set-cookie")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
