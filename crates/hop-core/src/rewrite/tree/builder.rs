//! Tree construction with an open-element stack.
//!
//! Recovery is deliberately simple: void elements never open, a handful of
//! elements implicitly close a same-kind sibling, an end tag closes the
//! nearest matching open element (everything above it is closed implicitly)
//! and an end tag with no match is dropped.

use super::tokenizer::{Attribute, StartTag, Token};
use super::{Diagnostic, DiagnosticKind};

pub(crate) const ROOT: usize = 0;

const VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose end tag may be omitted without a diagnostic.
const OPTIONAL_END: &[&str] = &[
    "html", "head", "body", "p", "li", "dt", "dd", "option", "optgroup", "tr", "td", "th",
    "thead", "tbody", "tfoot", "colgroup", "caption", "rb", "rt", "rp",
];

#[derive(Debug)]
pub(crate) struct Element<'a> {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub self_closing: bool,
    pub raw_start: &'a str,
    pub raw_end: Option<&'a str>,
    /// Attributes changed; the start tag must be re-serialized.
    pub dirty: bool,
}

impl Element<'_> {
    /// First attribute named `name` (lowercase).
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_deref())
    }

    pub fn set_attr(&mut self, name: &str, value: String) {
        if let Some(attr) = self.attrs.iter_mut().find(|a| a.name == name) {
            attr.value = Some(value);
            self.dirty = true;
        }
    }
}

#[derive(Debug)]
pub(crate) enum NodeKind<'a> {
    Document,
    Element(Element<'a>),
    /// Text, comments and declarations are all written back verbatim.
    Verbatim(&'a str),
}

#[derive(Debug)]
pub(crate) struct Node<'a> {
    pub kind: NodeKind<'a>,
    pub children: Vec<usize>,
}

/// Arena-backed document tree. Node indices follow document order.
#[derive(Debug)]
pub(crate) struct Tree<'a> {
    pub nodes: Vec<Node<'a>>,
}

impl<'a> Tree<'a> {
    fn element_name(&self, id: usize) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element(e) => Some(&e.name),
            _ => None,
        }
    }

    fn append(&mut self, parent: usize, kind: NodeKind<'a>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }
}

/// Which open element a new start tag implicitly closes, if on top.
fn closes_on_open(new: &str, open: &str) -> bool {
    match new {
        "li" => open == "li",
        "option" => open == "option",
        "dt" | "dd" => matches!(open, "dt" | "dd"),
        "tr" => matches!(open, "tr" | "td" | "th"),
        "td" | "th" => matches!(open, "td" | "th"),
        "p" | "div" | "ul" | "ol" | "table" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            open == "p"
        }
        _ => false,
    }
}

pub(crate) fn build<'a>(tokens: Vec<Token<'a>>, diagnostics: &mut Vec<Diagnostic>) -> Tree<'a> {
    let mut tree = Tree {
        nodes: vec![Node {
            kind: NodeKind::Document,
            children: Vec::new(),
        }],
    };
    let mut stack: Vec<usize> = vec![ROOT];
    let mut offset = 0usize;

    for token in tokens {
        let at = offset;
        match token {
            Token::Text(raw) | Token::Comment(raw) | Token::Declaration(raw) => {
                offset += raw.len();
                let parent = *stack.last().unwrap_or(&ROOT);
                tree.append(parent, NodeKind::Verbatim(raw));
            }
            Token::StartTag(StartTag {
                name,
                attrs,
                self_closing,
                raw,
            }) => {
                offset += raw.len();
                if let Some(&top) = stack.last() {
                    if tree
                        .element_name(top)
                        .is_some_and(|open| closes_on_open(&name, open))
                    {
                        stack.pop();
                    }
                }
                let opens = !self_closing && !VOID.contains(&name.as_str());
                let parent = *stack.last().unwrap_or(&ROOT);
                let id = tree.append(
                    parent,
                    NodeKind::Element(Element {
                        name,
                        attrs,
                        self_closing,
                        raw_start: raw,
                        raw_end: None,
                        dirty: false,
                    }),
                );
                if opens {
                    stack.push(id);
                }
            }
            Token::EndTag { name, raw } => {
                offset += raw.len();
                let matched = stack
                    .iter()
                    .rposition(|&id| tree.element_name(id) == Some(name.as_str()));
                let Some(pos) = matched else {
                    diagnostics.push(Diagnostic::new(at, DiagnosticKind::StrayEndTag(name)));
                    continue;
                };
                for &id in &stack[pos + 1..] {
                    if let Some(open) = tree.element_name(id) {
                        if !OPTIONAL_END.contains(&open) {
                            diagnostics.push(Diagnostic::new(
                                at,
                                DiagnosticKind::UnclosedElement(open.to_string()),
                            ));
                        }
                    }
                }
                if let NodeKind::Element(e) = &mut tree.nodes[stack[pos]].kind {
                    e.raw_end = Some(raw);
                }
                stack.truncate(pos);
            }
        }
    }

    for &id in stack.iter().skip(1) {
        if let Some(open) = tree.element_name(id) {
            if !OPTIONAL_END.contains(&open) {
                diagnostics.push(Diagnostic::new(
                    offset,
                    DiagnosticKind::UnclosedElement(open.to_string()),
                ));
            }
        }
    }

    tree
}
