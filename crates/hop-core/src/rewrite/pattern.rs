//! Pattern-based passes: protocol-relative prefixing, tag attributes and
//! the unconditional quoted-URL sweep.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

use super::link::{Decision, Linker};
use super::stats::RewriteStats;
use super::tree::decode_entities;
use crate::category::RewriteCategory;

static TAG: Lazy<Regex> = Lazy::new(|| {
    // Quoted values may contain `>`.
    Regex::new(r#"(?is)<(img|script|a|form|link|source)\b(?:[^>"']|"[^"]*"|'[^']*')*>"#)
        .expect("tag pattern")
});

static ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\s([a-z][a-z0-9_:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute pattern")
});

static PROTOCOL_RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"="//([^"]*)"|='//([^']*)'"#).expect("prefix pattern")
});

static QUOTED_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"(https?://[^"]+)|'(https?://[^']+)"#).expect("force pattern")
});

/// Output of the attribute pass.
pub(crate) struct AttributePass {
    pub html: String,
    /// Output byte ranges of every attribute value the pass decided on,
    /// ascending. Later passes must not touch them.
    pub settled: Vec<Range<usize>>,
}

/// Turns every `="//host/..."` value into a raw proxy link on the page scheme.
pub(crate) fn prefix_pass(html: &str, linker: &Linker<'_>, stats: &mut RewriteStats) -> String {
    PROTOCOL_RELATIVE
        .replace_all(html, |caps: &Captures<'_>| {
            let (quote, rest) = match (caps.get(1), caps.get(2)) {
                (Some(m), _) => ('"', m.as_str()),
                (None, Some(m)) => ('\'', m.as_str()),
                (None, None) => ('"', ""),
            };
            stats.prefix += 1;
            let target = linker.absolute(&format!("//{}", rest));
            format!("={q}{}{q}", linker.generate_url(&target, true), q = quote)
        })
        .into_owned()
}

struct Attr {
    name: String,
    value: String,
    /// Span of the value (quotes excluded) within the tag text.
    span: Range<usize>,
}

fn attributes(tag: &str) -> Vec<Attr> {
    ATTR.captures_iter(tag)
        .filter_map(|caps| {
            let value = caps.get(2).or_else(|| caps.get(3))?;
            Some(Attr {
                name: caps[1].to_ascii_lowercase(),
                value: value.as_str().to_string(),
                span: value.range(),
            })
        })
        .collect()
}

/// Which attribute of `tag` carries its reference, and its category.
fn classify(tag: &str, attrs: &[Attr]) -> Option<(&'static str, RewriteCategory)> {
    let find = |name: &str| attrs.iter().find(|a| a.name == name);
    match tag {
        "img" => Some(("src", RewriteCategory::Img)),
        "script" => Some(("src", RewriteCategory::Js)),
        "a" => Some(("href", RewriteCategory::Url)),
        "form" => Some(("action", RewriteCategory::Form)),
        "link" => find("href")
            .filter(|a| a.value.contains(".css"))
            .map(|_| ("href", RewriteCategory::Css)),
        "source" => find("type")
            .filter(|a| a.value.trim().to_ascii_lowercase().starts_with("video"))
            .map(|_| ("src", RewriteCategory::Video)),
        _ => None,
    }
}

/// Rewrites the reference attribute of anchors, images, scripts, forms,
/// stylesheet links and video sources. Only the value span is replaced.
pub(crate) fn attribute_pass(
    html: &str,
    linker: &Linker<'_>,
    stats: &mut RewriteStats,
) -> AttributePass {
    let mut out = String::with_capacity(html.len() + html.len() / 4);
    let mut settled = Vec::new();
    let mut last = 0usize;

    for caps in TAG.captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        let name = caps[1].to_ascii_lowercase();
        let attrs = attributes(whole.as_str());
        let Some((attr_name, category)) = classify(&name, &attrs) else {
            continue;
        };
        let Some(attr) = attrs.iter().find(|a| a.name == attr_name) else {
            continue;
        };

        let value_start = whole.start() + attr.span.start;
        let value_end = whole.start() + attr.span.end;
        out.push_str(&html[last..value_start]);
        let settled_start = out.len();

        let decision = linker.decide(&decode_entities(&attr.value), category);
        match decision.replacement() {
            Some(v) => out.push_str(v),
            None => out.push_str(&html[value_start..value_end]),
        }
        if matches!(decision, Decision::Routed(_)) {
            stats.record(category);
        }
        settled.push(settled_start..out.len());
        last = value_end;
    }
    out.push_str(&html[last..]);

    AttributePass { html: out, settled }
}

/// Routes every quoted `http(s)://` literal outside settled ranges as a raw link.
pub(crate) fn force_pass(
    html: &str,
    settled: &[Range<usize>],
    linker: &Linker<'_>,
    stats: &mut RewriteStats,
) -> String {
    let mut out = String::with_capacity(html.len() + html.len() / 4);
    let mut last = 0usize;

    for caps in QUOTED_URL.captures_iter(html) {
        let Some(url) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        if is_settled(settled, url.start()) {
            continue;
        }
        out.push_str(&html[last..url.start()]);
        out.push_str(&linker.generate_url(url.as_str(), true));
        stats.force += 1;
        last = url.end();
    }
    out.push_str(&html[last..]);
    out
}

fn is_settled(settled: &[Range<usize>], pos: usize) -> bool {
    let idx = settled.partition_point(|r| r.start <= pos);
    idx > 0 && settled[idx - 1].contains(&pos)
}
