//! Tree rewrite mode: lenient parse, one walk over the elements, serialize.
//!
//! Only start tags whose attributes changed are re-serialized; all other
//! markup is written back byte for byte. End tags that matched nothing are
//! dropped from the output.

mod builder;
mod tokenizer;

use std::fmt;

use super::link::{Decision, Linker};
use super::stats::RewriteStats;
use crate::category::RewriteCategory;
use builder::{Element, NodeKind, Tree, ROOT};

/// A recovered parse problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Byte offset in the input.
    pub offset: usize,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub(crate) fn new(offset: usize, kind: DiagnosticKind) -> Self {
        Self { offset, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    UnterminatedTag,
    UnterminatedComment,
    /// End tag with no open element of that name.
    StrayEndTag(String),
    /// Element closed implicitly (or never) although its end tag is required.
    UnclosedElement(String),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::UnterminatedTag => write!(f, "unterminated tag at byte {}", self.offset),
            DiagnosticKind::UnterminatedComment => {
                write!(f, "unterminated comment at byte {}", self.offset)
            }
            DiagnosticKind::StrayEndTag(name) => {
                write!(f, "unexpected </{}> at byte {}", name, self.offset)
            }
            DiagnosticKind::UnclosedElement(name) => {
                write!(f, "unclosed <{}> at byte {}", name, self.offset)
            }
        }
    }
}

/// Rewritten document plus parse diagnostics.
pub(crate) struct TreeOutput {
    pub html: String,
    pub diagnostics: Vec<Diagnostic>,
}

pub(crate) fn rewrite_tree(html: &str, linker: &Linker<'_>, stats: &mut RewriteStats) -> TreeOutput {
    if html.is_empty() {
        return TreeOutput {
            html: String::new(),
            diagnostics: Vec::new(),
        };
    }
    let (tokens, mut diagnostics) = tokenizer::tokenize(html);
    let mut tree = builder::build(tokens, &mut diagnostics);

    for node in tree.nodes.iter_mut() {
        let NodeKind::Element(element) = &mut node.kind else {
            continue;
        };
        let Some((attr, category)) = target(element) else {
            continue;
        };
        let Some(value) = element.attr(attr).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let decision = linker.decide(value, category);
        if matches!(decision, Decision::Routed(_)) {
            stats.record(category);
        }
        if let Some(replacement) = decision.replacement() {
            element.set_attr(attr, replacement.to_string());
        }
    }

    TreeOutput {
        html: serialize(&tree, html.len()),
        diagnostics,
    }
}

/// Reference attribute and category of an element, when it carries one.
fn target(element: &Element<'_>) -> Option<(&'static str, RewriteCategory)> {
    match element.name.as_str() {
        "a" => Some(("href", RewriteCategory::Url)),
        "img" => Some(("src", RewriteCategory::Img)),
        "script" => Some(("src", RewriteCategory::Js)),
        "form" => Some(("action", RewriteCategory::Form)),
        "link" => {
            let stylesheet = element.attr("rel").is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|r| r.eq_ignore_ascii_case("stylesheet"))
            }) || element
                .attr("type")
                .is_some_and(|t| t.trim().eq_ignore_ascii_case("text/css"));
            stylesheet.then_some(("href", RewriteCategory::Css))
        }
        "source" => element
            .attr("type")
            .filter(|t| t.trim().to_ascii_lowercase().starts_with("video"))
            .map(|_| ("src", RewriteCategory::Video)),
        _ => None,
    }
}

enum Step {
    Enter(usize),
    Leave(usize),
}

fn serialize(tree: &Tree<'_>, size_hint: usize) -> String {
    let mut out = String::with_capacity(size_hint + size_hint / 4);
    let mut steps: Vec<Step> = tree.nodes[ROOT]
        .children
        .iter()
        .rev()
        .map(|&id| Step::Enter(id))
        .collect();

    while let Some(step) = steps.pop() {
        match step {
            Step::Enter(id) => {
                let node = &tree.nodes[id];
                match &node.kind {
                    NodeKind::Verbatim(raw) => out.push_str(raw),
                    NodeKind::Element(e) => {
                        if e.dirty {
                            write_start_tag(&mut out, e);
                        } else {
                            out.push_str(e.raw_start);
                        }
                        steps.push(Step::Leave(id));
                        steps.extend(node.children.iter().rev().map(|&c| Step::Enter(c)));
                    }
                    NodeKind::Document => {}
                }
            }
            Step::Leave(id) => {
                if let NodeKind::Element(Element {
                    raw_end: Some(raw), ..
                }) = &tree.nodes[id].kind
                {
                    out.push_str(raw);
                }
            }
        }
    }
    out
}

fn write_start_tag(out: &mut String, element: &Element<'_>) {
    out.push('<');
    out.push_str(&element.name);
    for attr in &element.attrs {
        out.push(' ');
        out.push_str(&attr.raw_name);
        if let Some(value) = &attr.value {
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
    }
    if element.self_closing {
        out.push_str(" /");
    }
    out.push('>');
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Decodes the character references that show up in attribute values.
/// Unknown references are left as written.
pub(crate) fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            decode_reference(&tail[1..semi]).map(|c| (c, semi))
        }) {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}
