//! HTML rewrite engine.
//!
//! Rewrites the references in a fetched page so that navigation keeps flowing
//! through the proxy. Every generated link is a query string that carries the
//! whole `ProxyConfig`, the origin identity and the percent-encoded target, so
//! the next request can rebuild the same configuration from it.
//!
//! Passes by mode:
//!
//! - `Off`: nothing.
//! - `Pattern`: attribute pass.
//! - `PatternPrefix`: protocol-relative prefix pass, then attribute pass.
//! - `PatternPrefixForce`: as above, then the quoted-URL sweep.
//! - `Tree`: lenient parse and element walk.
//!
//! In IP-source mode the domain-to-IP pass runs last, whatever the mode.
//! A pass never fails the render; tree diagnostics become a `Markup` error.

mod ip;
mod link;
mod pattern;
mod stats;
mod tree;


pub use link::{is_absolute, unwrap_proxy_link, urlencode};
pub use stats::RewriteStats;
pub use tree::{Diagnostic, DiagnosticKind};

use crate::category::RewriteCategory;
use crate::error::ProxyError;
use crate::origin::Origin;
use crate::proxy_config::{ProxyConfig, RewriteMode, SourceMode};
use link::Linker;

/// Page state a render works against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    /// URL of the page as the browser sees it (the target, not the IP URL).
    pub url: String,
    pub origin: Origin,
    /// IP URL used as transport in IP-source mode.
    pub ip: Option<String>,
}

impl PageContext {
    pub fn new(url: impl Into<String>, origin: Origin, ip: Option<String>) -> Self {
        Self {
            url: url.into(),
            origin,
            ip,
        }
    }
}

pub struct RewriteEngine<'a> {
    config: &'a ProxyConfig,
    page: &'a PageContext,
    linker: Linker<'a>,
    stats: RewriteStats,
    diagnostics: Vec<Diagnostic>,
    errors: Vec<ProxyError>,
}

impl<'a> RewriteEngine<'a> {
    pub fn new(config: &'a ProxyConfig, page: &'a PageContext) -> Self {
        Self {
            config,
            page,
            linker: Linker::new(config, page),
            stats: RewriteStats::default(),
            diagnostics: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Runs the passes for the configured mode over `html`.
    pub fn rewrite(&mut self, html: &str) -> String {
        let linker = &self.linker;
        let out = match self.config.rewrite {
            RewriteMode::Off => html.to_string(),
            RewriteMode::Pattern => pattern::attribute_pass(html, linker, &mut self.stats).html,
            RewriteMode::PatternPrefix => {
                let prefixed = pattern::prefix_pass(html, linker, &mut self.stats);
                pattern::attribute_pass(&prefixed, linker, &mut self.stats).html
            }
            RewriteMode::PatternPrefixForce => {
                let prefixed = pattern::prefix_pass(html, linker, &mut self.stats);
                let pass = pattern::attribute_pass(&prefixed, linker, &mut self.stats);
                pattern::force_pass(&pass.html, &pass.settled, linker, &mut self.stats)
            }
            RewriteMode::Tree => {
                let output = tree::rewrite_tree(html, linker, &mut self.stats);
                if !output.diagnostics.is_empty() {
                    for d in output.diagnostics.iter().take(20) {
                        tracing::debug!(url = %self.page.url, "markup: {}", d);
                    }
                    self.errors.push(ProxyError::Markup {
                        count: output.diagnostics.len(),
                    });
                    self.diagnostics.extend(output.diagnostics);
                }
                output.html
            }
        };

        let out = if self.config.source == SourceMode::Ip {
            self.rewrite_ip(&out)
        } else {
            out
        };
        tracing::debug!(
            mode = self.config.rewrite.token(),
            rewritten = self.stats.total(),
            "rewrite done"
        );
        out
    }

    /// Swaps the origin host for the IP URL's host after `http(s)://`.
    /// No-op when the toggle is off, the domain is unknown or there is no IP.
    pub fn rewrite_ip(&mut self, html: &str) -> String {
        let Some(swap) = self.linker.ip_swap() else {
            return html.to_string();
        };
        let (out, n) = swap.apply(html);
        self.stats.record_n(RewriteCategory::DomainToIp, n);
        out
    }

    /// Proxy link for `url` under the current configuration.
    pub fn generate_url(&self, url: &str, raw: bool) -> String {
        self.linker.generate_url(url, raw)
    }

    pub fn stats(&self) -> &RewriteStats {
        &self.stats
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> &[ProxyError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<ProxyError> {
        std::mem::take(&mut self.errors)
    }
}
