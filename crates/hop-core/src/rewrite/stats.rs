//! Rewrite counters.

use std::collections::BTreeMap;

use crate::category::RewriteCategory;

/// How many references each pass routed through the proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteStats {
    counts: BTreeMap<RewriteCategory, u64>,
    /// Protocol-relative values patched by the prefix pass.
    pub prefix: u64,
    /// Quoted URLs caught by the unconditional pass.
    pub force: u64,
}

impl RewriteStats {
    pub fn record(&mut self, category: RewriteCategory) {
        self.record_n(category, 1);
    }

    pub fn record_n(&mut self, category: RewriteCategory, n: u64) {
        if n > 0 {
            *self.counts.entry(category).or_insert(0) += n;
        }
    }

    pub fn get(&self, category: RewriteCategory) -> u64 {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum::<u64>() + self.prefix + self.force
    }

    /// Counter name/value pairs for display, zero counters omitted.
    pub fn counters(&self) -> Vec<(&'static str, u64)> {
        let mut out: Vec<(&'static str, u64)> = RewriteCategory::ALL
            .iter()
            .filter_map(|&c| {
                let n = self.get(c);
                (n > 0).then_some((c.counter_name(), n))
            })
            .collect();
        if self.prefix > 0 {
            out.push(("rewritten_prefix", self.prefix));
        }
        if self.force > 0 {
            out.push(("rewritten_force", self.force));
        }
        out
    }
}
