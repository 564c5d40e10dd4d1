//! Lenient HTML tokenizer.
//!
//! Byte scanner over the source; every token keeps a slice of the input so
//! untouched markup can be written back exactly as received. Nothing here
//! fails: malformed input turns into text plus a diagnostic.

use super::{Diagnostic, DiagnosticKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attribute {
    /// Lowercased name.
    pub name: String,
    /// Name as written.
    pub raw_name: String,
    /// Entity-decoded value; `None` for bare attributes.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StartTag<'a> {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub self_closing: bool,
    pub raw: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Text(&'a str),
    StartTag(StartTag<'a>),
    EndTag { name: String, raw: &'a str },
    Comment(&'a str),
    /// `<!DOCTYPE ...>`, `<![CDATA[...]>` or `<?...>`.
    Declaration(&'a str),
}

/// Elements whose content is not markup.
const RAW_TEXT: &[&str] = &["script", "style", "textarea", "title"];

pub(crate) fn tokenize(input: &str) -> (Vec<Token<'_>>, Vec<Diagnostic>) {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();
    let mut idx = 0usize;

    while idx < bytes.len() {
        if bytes[idx] != b'<' {
            let next = find_byte(bytes, idx + 1, b'<').unwrap_or(bytes.len());
            tokens.push(Token::Text(&input[idx..next]));
            idx = next;
            continue;
        }

        if starts_with(bytes, idx, b"<!--") {
            match find_seq(bytes, idx + 4, b"-->") {
                Some(end) => {
                    tokens.push(Token::Comment(&input[idx..end + 3]));
                    idx = end + 3;
                }
                None => {
                    diagnostics.push(Diagnostic::new(idx, DiagnosticKind::UnterminatedComment));
                    tokens.push(Token::Comment(&input[idx..]));
                    idx = bytes.len();
                }
            }
            continue;
        }

        if starts_with(bytes, idx, b"<!") || starts_with(bytes, idx, b"<?") {
            match find_byte(bytes, idx + 2, b'>') {
                Some(end) => {
                    tokens.push(Token::Declaration(&input[idx..=end]));
                    idx = end + 1;
                }
                None => {
                    diagnostics.push(Diagnostic::new(idx, DiagnosticKind::UnterminatedTag));
                    tokens.push(Token::Text(&input[idx..]));
                    idx = bytes.len();
                }
            }
            continue;
        }

        let is_end = bytes.get(idx + 1).copied() == Some(b'/');
        let name_at = if is_end { idx + 2 } else { idx + 1 };
        if !bytes.get(name_at).is_some_and(|b| b.is_ascii_alphabetic()) {
            // A lone '<' is text.
            tokens.push(Token::Text(&input[idx..idx + 1]));
            idx += 1;
            continue;
        }

        let Some(end) = tag_end(bytes, idx) else {
            diagnostics.push(Diagnostic::new(idx, DiagnosticKind::UnterminatedTag));
            tokens.push(Token::Text(&input[idx..]));
            break;
        };
        let raw = &input[idx..end];
        let (name, rest) = split_name(&input[name_at..end - 1]);

        if is_end {
            tokens.push(Token::EndTag { name, raw });
            idx = end;
            continue;
        }

        let (attrs, self_closing) = parse_attributes(rest);
        let raw_text = !self_closing && RAW_TEXT.contains(&name.as_str());
        let tag_name = name.clone();
        tokens.push(Token::StartTag(StartTag {
            name,
            attrs,
            self_closing,
            raw,
        }));
        idx = end;

        if raw_text {
            match find_end_tag(bytes, idx, tag_name.as_bytes()) {
                Some((close_start, close_end)) => {
                    if close_start > idx {
                        tokens.push(Token::Text(&input[idx..close_start]));
                    }
                    tokens.push(Token::EndTag {
                        name: tag_name,
                        raw: &input[close_start..close_end],
                    });
                    idx = close_end;
                }
                None => {
                    diagnostics.push(Diagnostic::new(
                        idx,
                        DiagnosticKind::UnclosedElement(tag_name),
                    ));
                    if idx < bytes.len() {
                        tokens.push(Token::Text(&input[idx..]));
                    }
                    idx = bytes.len();
                }
            }
        }
    }

    (tokens, diagnostics)
}

/// Index just past the `>` closing the tag at `start`, honoring quotes.
fn tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut idx = start + 1;
    let mut quote: Option<u8> = None;
    while idx < bytes.len() {
        let byte = bytes[idx];
        match quote {
            Some(q) if byte == q => quote = None,
            Some(_) => {}
            None => match byte {
                b'"' | b'\'' => quote = Some(byte),
                b'>' => return Some(idx + 1),
                _ => {}
            },
        }
        idx += 1;
    }
    None
}

fn split_name(inner: &str) -> (String, &str) {
    let end = inner
        .bytes()
        .position(|b| !is_tag_name_char(b))
        .unwrap_or(inner.len());
    (inner[..end].to_ascii_lowercase(), &inner[end..])
}

/// Parses the attribute section of a start tag (everything after the name,
/// without the closing `>`).
fn parse_attributes(section: &str) -> (Vec<Attribute>, bool) {
    let bytes = section.as_bytes();
    let mut attrs = Vec::new();
    let mut self_closing = false;
    let mut idx = 0usize;

    loop {
        while idx < bytes.len() && (bytes[idx].is_ascii_whitespace() || bytes[idx] == b'/') {
            if bytes[idx] == b'/' {
                self_closing = true;
            }
            idx += 1;
        }
        if idx >= bytes.len() {
            break;
        }
        self_closing = false;

        let name_start = idx;
        while idx < bytes.len()
            && !bytes[idx].is_ascii_whitespace()
            && !matches!(bytes[idx], b'=' | b'/' | b'>')
        {
            idx += 1;
        }
        if idx == name_start {
            // Stray '=' without a name.
            idx += 1;
            continue;
        }
        let raw_name = &section[name_start..idx];

        let mut look = skip_spaces(bytes, idx);
        if bytes.get(look).copied() != Some(b'=') {
            attrs.push(Attribute {
                name: raw_name.to_ascii_lowercase(),
                raw_name: raw_name.to_string(),
                value: None,
            });
            continue;
        }
        look = skip_spaces(bytes, look + 1);

        let (value, next) = match bytes.get(look).copied() {
            Some(q @ (b'"' | b'\'')) => {
                let close = find_byte(bytes, look + 1, q).unwrap_or(bytes.len());
                (&section[look + 1..close], (close + 1).min(bytes.len()))
            }
            Some(_) => {
                let mut end = look;
                while end < bytes.len() && !bytes[end].is_ascii_whitespace() {
                    end += 1;
                }
                (&section[look..end], end)
            }
            None => ("", look),
        };
        attrs.push(Attribute {
            name: raw_name.to_ascii_lowercase(),
            raw_name: raw_name.to_string(),
            value: Some(super::decode_entities(value)),
        });
        idx = next;
    }

    (attrs, self_closing)
}

/// Locates `</name ...>` case-insensitively from `start`.
fn find_end_tag(bytes: &[u8], start: usize, name: &[u8]) -> Option<(usize, usize)> {
    let mut idx = start;
    while let Some(lt) = find_byte(bytes, idx, b'<') {
        if bytes.get(lt + 1).copied() == Some(b'/')
            && starts_with_ignore_ascii_case(bytes, lt + 2, name)
            && !bytes
                .get(lt + 2 + name.len())
                .is_some_and(|b| is_tag_name_char(*b))
        {
            if let Some(end) = find_byte(bytes, lt, b'>') {
                return Some((lt, end + 1));
            }
            return None;
        }
        idx = lt + 1;
    }
    None
}

fn is_tag_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b':'
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx += 1;
    }
    idx
}

fn starts_with(bytes: &[u8], idx: usize, prefix: &[u8]) -> bool {
    bytes.get(idx..idx + prefix.len()) == Some(prefix)
}

fn starts_with_ignore_ascii_case(bytes: &[u8], idx: usize, prefix: &[u8]) -> bool {
    bytes
        .get(idx..idx + prefix.len())
        .is_some_and(|s| s.eq_ignore_ascii_case(prefix))
}

fn find_byte(bytes: &[u8], start: usize, needle: u8) -> Option<usize> {
    bytes
        .get(start..)?
        .iter()
        .position(|&b| b == needle)
        .map(|p| start + p)
}

fn find_seq(bytes: &[u8], start: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(start..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| start + p)
}
