//! Snapshot rendering helpers.
//!
//! Functions for turning a document subtree into indented plain text suitable
//! for snapshot tests. Whitespace-only text is dropped and every element sits
//! on its own line, so snapshots stay readable regardless of the markup's
//! original formatting.

use crate::dom::markup::{encode_entities, start_tag};
use crate::dom::{Document, Dom, NodeId};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render `root` and its subtree, one node per line, indented two spaces
/// per level. Text nodes are trimmed and quoted.
///
/// ```ignore
/// let doc = Document::new();
/// doc.set_inner_html(doc.body(), "<ul><li>a</li></ul>")?;
/// assert_eq!(render_tree(&doc, doc.body()), "<body>\n  <ul>\n    <li>\n      \"a\"");
/// ```
pub fn render_tree(document: &Document, root: NodeId) -> String {
    document.with_dom(|dom| {
        let mut lines = Vec::new();
        write_lines(dom, root, 0, &mut lines);
        lines.join("\n")
    })
}

/// Render the children of `root` without `root` itself.
pub fn render_children(document: &Document, root: NodeId) -> String {
    document.with_dom(|dom| {
        let mut lines = Vec::new();
        for &child in dom.children(root) {
            write_lines(dom, child, 0, &mut lines);
        }
        lines.join("\n")
    })
}

/// The visible text of `root` with runs of whitespace collapsed.
pub fn visible_text(document: &Document, root: NodeId) -> String {
    document
        .text_content(root)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn write_lines(dom: &Dom, id: NodeId, depth: usize, lines: &mut Vec<String>) {
    let Some(data) = dom.get(id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    if data.is_text() {
        let text = data.text.trim();
        if !text.is_empty() {
            lines.push(format!("{indent}\"{}\"", encode_entities(text)));
        }
        return;
    }
    lines.push(format!("{indent}{}", start_tag(data)));
    for &child in dom.children(id) {
        write_lines(dom, child, depth + 1, lines);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
