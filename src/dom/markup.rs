//! Markup parsing and serialization for template strings.
//!
//! Parsing runs in two logos passes: [`MarkupToken`] splits the input into
//! tags and text, then [`TagToken`] splits the inside of each opening tag into
//! its name and attributes. Comments are stripped before either pass.
//!
//! The parser is strict about structure: every non-void element must be
//! closed. A closing tag may implicitly close open descendants of the element
//! it names.

use logos::Logos;

use super::node::{is_void, NodeData, NodeId};
use super::tree::Dom;

/// Errors from markup parsing.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MarkupError {
    #[error("unexpected `{found}` at byte {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("unclosed <{tag}>")]
    UnclosedTag { tag: String },

    #[error("</{found}> does not close any open element")]
    MismatchedTag { found: String },
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Top-level markup token.
///
/// An opening tag is matched as a whole, quoted attribute values included, so
/// a `>` inside quotes does not end the tag.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
pub enum MarkupToken {
    /// `</name>`
    #[regex(r"</[a-zA-Z][a-zA-Z0-9_:\-]*[ \t\r\n]*>")]
    CloseTag,

    /// `<name attr="...">` or `<name/>`
    #[regex(r#"<[a-zA-Z]([^>"']|"[^"]*"|'[^']*')*>"#)]
    OpenTag,

    /// `<!DOCTYPE ...>` and similar declarations.
    #[regex(r"<![^>]*>")]
    Declaration,

    /// Character data between tags.
    #[regex(r"[^<]+")]
    Text,

    /// A `<` that starts no valid tag.
    #[token("<")]
    Stray,
}

/// Token inside an opening tag.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TagToken {
    #[token("=")]
    Equals,

    #[regex(r#""[^"]*""#)]
    DoubleQuoted,

    #[regex(r"'[^']*'")]
    SingleQuoted,

    /// Tag name, attribute name or unquoted attribute value.
    #[regex(r#"[^ \t\r\n\f"'=]+"#)]
    Word,
}

/// Tokenize markup into `(token, slice, byte offset)` triples. Input the
/// lexer rejects is reported as [`MarkupToken::Stray`].
pub fn tokenize(input: &str) -> Vec<(MarkupToken, &str, usize)> {
    MarkupToken::lexer(input)
        .spanned()
        .map(|(result, span)| {
            let token = result.unwrap_or(MarkupToken::Stray);
            (token, &input[span.clone()], span.start)
        })
        .collect()
}

/// Remove `<!-- ... -->` comments. An unterminated comment swallows the rest
/// of the input.
fn strip_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("<!--") {
        result.push_str(&rest[..start]);
        match rest[start + 4..].find("-->") {
            Some(end) => rest = &rest[start + 4 + end + 3..],
            None => rest = "",
        }
    }
    result.push_str(rest);
    result
}

// ---------------------------------------------------------------------------
// Tag parsing
// ---------------------------------------------------------------------------

/// An opening tag split into parts.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTag {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub self_closing: bool,
}

/// Parse the text of an opening tag, `<` and `>` included.
pub fn parse_open_tag(raw: &str) -> Option<OpenTag> {
    let inner = raw.strip_prefix('<')?.strip_suffix('>')?;
    let (inner, self_closing) = match inner.strip_suffix('/') {
        Some(rest) if !rest.ends_with('=') => (rest, true),
        _ => (inner, false),
    };

    let mut tokens = TagToken::lexer(inner)
        .spanned()
        .filter_map(|(result, span)| result.ok().map(|t| (t, &inner[span])))
        .peekable();

    let name = match tokens.next() {
        Some((TagToken::Word, text)) => text.to_ascii_lowercase(),
        _ => return None,
    };

    let mut attributes: Vec<(String, String)> = Vec::new();
    while let Some((token, text)) = tokens.next() {
        if token != TagToken::Word {
            continue;
        }
        let attr_name = text.to_ascii_lowercase();
        let value = if matches!(tokens.peek(), Some((TagToken::Equals, _))) {
            tokens.next();
            match tokens.next() {
                Some((TagToken::DoubleQuoted | TagToken::SingleQuoted, quoted)) => {
                    decode_entities(&quoted[1..quoted.len() - 1])
                }
                Some((TagToken::Word, bare)) => decode_entities(bare),
                _ => String::new(),
            }
        } else {
            String::new()
        };
        if !attributes.iter().any(|(n, _)| *n == attr_name) {
            attributes.push((attr_name, value));
        }
    }

    Some(OpenTag {
        name,
        attributes,
        self_closing,
    })
}

fn close_tag_name(raw: &str) -> String {
    raw.trim_start_matches("</")
        .trim_end_matches('>')
        .trim()
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse `input` into detached nodes owned by `dom`. Returns the top-level
/// nodes in document order. Whitespace-only text is dropped.
///
/// On error, every node created so far is removed again.
pub fn parse_fragment(dom: &mut Dom, input: &str) -> Result<Vec<NodeId>, MarkupError> {
    let mut roots = Vec::new();
    match build(dom, input, &mut roots) {
        Ok(()) => Ok(roots),
        Err(err) => {
            for root in roots {
                dom.remove(root);
            }
            Err(err)
        }
    }
}

fn build(dom: &mut Dom, input: &str, roots: &mut Vec<NodeId>) -> Result<(), MarkupError> {
    let cleaned = strip_comments(input);
    let mut stack: Vec<(String, NodeId)> = Vec::new();

    let mut attach = |dom: &mut Dom, stack: &[(String, NodeId)], node: NodeId| {
        match stack.last() {
            Some(&(_, parent)) => {
                dom.append_child(parent, node);
            }
            None => roots.push(node),
        }
    };

    for (token, text, position) in tokenize(&cleaned) {
        match token {
            MarkupToken::Text => {
                if text.trim().is_empty() {
                    continue;
                }
                let node = dom.create(NodeData::text(decode_entities(text)));
                attach(dom, &stack, node);
            }
            MarkupToken::OpenTag => {
                let tag = parse_open_tag(text).ok_or_else(|| MarkupError::UnexpectedToken {
                    found: text.to_owned(),
                    position,
                })?;
                let mut data = NodeData::element(&tag.name);
                for (name, value) in &tag.attributes {
                    data.set_attribute(name, value.as_str());
                }
                let node = dom.create(data);
                attach(dom, &stack, node);
                if !tag.self_closing && !is_void(&tag.name) {
                    stack.push((tag.name, node));
                }
            }
            MarkupToken::CloseTag => {
                let name = close_tag_name(text);
                if is_void(&name) {
                    continue;
                }
                let Some(depth) = stack.iter().rposition(|(open, _)| *open == name) else {
                    return Err(MarkupError::MismatchedTag { found: name });
                };
                stack.truncate(depth);
            }
            MarkupToken::Declaration => {}
            MarkupToken::Stray => {
                return Err(MarkupError::UnexpectedToken {
                    found: text.to_owned(),
                    position,
                });
            }
        }
    }

    match stack.pop() {
        Some((tag, _)) => Err(MarkupError::UnclosedTag { tag }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------------

/// Serialize `id` and its subtree.
pub fn outer_html(dom: &Dom, id: NodeId) -> String {
    let mut out = String::new();
    write_node(dom, id, &mut out);
    out
}

/// Serialize the children of `id`.
pub fn inner_html(dom: &Dom, id: NodeId) -> String {
    let mut out = String::new();
    for &child in dom.children(id) {
        write_node(dom, child, &mut out);
    }
    out
}

/// `<tag attr="value">` for an element, attributes in serialization order.
pub fn start_tag(data: &NodeData) -> String {
    let mut out = String::from("<");
    out.push_str(&data.tag);
    for (name, value) in data.attribute_list() {
        out.push(' ');
        out.push_str(&name);
        if !value.is_empty() {
            out.push_str("=\"");
            out.push_str(&encode_attribute(&value));
            out.push('"');
        }
    }
    out.push('>');
    out
}

fn write_node(dom: &Dom, id: NodeId, out: &mut String) {
    let Some(data) = dom.get(id) else {
        return;
    };
    if data.is_text() {
        out.push_str(&encode_entities(&data.text));
        return;
    }
    out.push_str(&start_tag(data));
    if is_void(&data.tag) {
        return;
    }
    for &child in dom.children(id) {
        write_node(dom, child, out);
    }
    out.push_str("</");
    out.push_str(&data.tag);
    out.push('>');
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Escape `&`, `<` and `>` for text content.
pub fn encode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn encode_attribute(text: &str) -> String {
    encode_entities(text).replace('"', "&quot;")
}

/// Decode named and numeric character references. Unknown references are
/// kept verbatim.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_reference(&tail[1..semi]).map(|ch| (ch, semi)));
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
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
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
