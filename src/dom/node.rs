//! Node types: NodeId, NodeKind, NodeData.

use std::collections::BTreeMap;

use slotmap::new_key_type;

use crate::value::Value;

new_key_type! {
    /// Unique identifier for a DOM node. Copy, lightweight (u64).
    pub struct NodeId;
}

/// Elements that never have children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Whether `tag` is a void element.
pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
}

/// Data associated with a single DOM node.
///
/// `id`, `class` and `style` are kept apart from the other attributes but are
/// still readable and writable through the attribute methods.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    /// Lower-case tag name; `#text` for text nodes.
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// Inline style declarations in insertion order.
    pub styles: Vec<(String, String)>,
    /// Every other attribute in insertion order.
    pub attributes: Vec<(String, String)>,
    /// Text content of a text node.
    pub text: String,
    /// Live (non-reflected) property state: `value`, `checked`, expandos.
    pub properties: BTreeMap<String, Value>,
}

impl NodeData {
    fn blank(kind: NodeKind, tag: String) -> Self {
        Self {
            kind,
            tag,
            id: None,
            classes: Vec::new(),
            styles: Vec::new(),
            attributes: Vec::new(),
            text: String::new(),
            properties: BTreeMap::new(),
        }
    }

    /// An element with the given tag name.
    pub fn element(tag: impl Into<String>) -> Self {
        Self::blank(NodeKind::Element, tag.into().to_ascii_lowercase())
    }

    /// A text node.
    pub fn text(text: impl Into<String>) -> Self {
        let mut data = Self::blank(NodeKind::Text, "#text".to_owned());
        data.text = text.into();
        data
    }

    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    /// Set the id (builder).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a single class (builder).
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        self.add_class(&class);
        self
    }

    /// Add multiple classes (builder).
    pub fn with_classes(mut self, classes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for class in classes {
            let class = class.into();
            self.add_class(&class);
        }
        self
    }

    /// Set an attribute (builder).
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    // -----------------------------------------------------------------------
    // Classes
    // -----------------------------------------------------------------------

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Add a class. No-op if already present.
    pub fn add_class(&mut self, class: &str) {
        if !class.is_empty() && !self.has_class(class) {
            self.classes.push(class.to_owned());
        }
    }

    /// Remove a class. No-op if not present.
    pub fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }

    /// Toggle a class: add if absent, remove if present.
    pub fn toggle_class(&mut self, class: &str) {
        if self.has_class(class) {
            self.remove_class(class);
        } else {
            self.add_class(class);
        }
    }

    // -----------------------------------------------------------------------
    // Styles
    // -----------------------------------------------------------------------

    pub fn style(&self, name: &str) -> Option<&str> {
        self.styles
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an inline style. An empty value removes the declaration.
    pub fn set_style(&mut self, name: &str, value: &str) {
        let name = name.trim();
        let value = value.trim();
        if value.is_empty() {
            self.styles.retain(|(n, _)| n != name);
            return;
        }
        match self.styles.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value.to_owned(),
            None => self.styles.push((name.to_owned(), value.to_owned())),
        }
    }

    /// The `style` attribute text.
    pub fn style_text(&self) -> String {
        self.styles
            .iter()
            .map(|(n, v)| format!("{n}: {v};"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn parse_style_text(&mut self, text: &str) {
        self.styles.clear();
        for declaration in text.split(';') {
            if let Some((name, value)) = declaration.split_once(':') {
                self.set_style(name, value);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    /// Read an attribute, including the `id`, `class` and `style` views.
    pub fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id.clone(),
            "class" => (!self.classes.is_empty()).then(|| self.classes.join(" ")),
            "style" => (!self.styles.is_empty()).then(|| self.style_text()),
            _ => self
                .attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Write an attribute. Names are lower-cased like HTML attribute names.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match name.as_str() {
            "id" => self.id = Some(value),
            "class" => {
                self.classes.clear();
                for class in value.split_whitespace() {
                    self.add_class(class);
                }
            }
            "style" => self.parse_style_text(&value),
            _ => match self.attributes.iter_mut().find(|(n, _)| *n == name) {
                Some((_, existing)) => *existing = value,
                None => self.attributes.push((name, value)),
            },
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        match name {
            "id" => self.id = None,
            "class" => self.classes.clear(),
            "style" => self.styles.clear(),
            _ => self.attributes.retain(|(n, _)| n != name),
        }
    }

    /// Every attribute in serialization order: `id`, `class`, `style`, then
    /// the rest in insertion order.
    pub fn attribute_list(&self) -> Vec<(String, String)> {
        let mut list = Vec::with_capacity(self.attributes.len() + 3);
        for name in ["id", "class", "style"] {
            if let Some(value) = self.attribute(name) {
                list.push((name.to_owned(), value));
            }
        }
        list.extend(self.attributes.iter().cloned());
        list
    }

    // -----------------------------------------------------------------------
    // Dataset
    // -----------------------------------------------------------------------

    /// `data-*` attributes keyed by their camelCase names.
    pub fn dataset(&self) -> Vec<(String, String)> {
        self.attributes
            .iter()
            .filter_map(|(name, value)| {
                name.strip_prefix("data-")
                    .map(|key| (kebab_to_camel(key), value.clone()))
            })
            .collect()
    }

    /// Set `data-<key>` from a camelCase key.
    pub fn set_data(&mut self, key: &str, value: impl Into<String>) {
        let name = format!("data-{}", camel_to_kebab(key));
        self.set_attribute(&name, value);
    }
}

/// `foo-bar-baz` → `fooBarBaz`.
pub fn kebab_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '-' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// `fooBarBaz` → `foo-bar-baz`.
pub fn camel_to_kebab(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if !out.is_empty() {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_defaults() {
        let data = NodeData::element("DIV");
        assert_eq!(data.tag, "div");
        assert!(data.is_element());
        assert!(data.id.is_none());
        assert!(data.classes.is_empty());
    }

    #[test]
    fn text_node() {
        let data = NodeData::text("hi");
        assert!(data.is_text());
        assert_eq!(data.text, "hi");
        assert_eq!(data.tag, "#text");
    }

    #[test]
    fn builder_with_class_dedup() {
        let data = NodeData::element("p").with_class("a").with_classes(["a", "b"]);
        assert_eq!(data.classes, vec!["a", "b"]);
    }

    #[test]
    fn toggle_class() {
        let mut data = NodeData::element("p");
        data.toggle_class("on");
        assert!(data.has_class("on"));
        data.toggle_class("on");
        assert!(!data.has_class("on"));
    }

    #[test]
    fn class_attribute_round_trips() {
        let mut data = NodeData::element("p");
        data.set_attribute("class", "a  b a");
        assert_eq!(data.classes, vec!["a", "b"]);
        assert_eq!(data.attribute("class").as_deref(), Some("a b"));
        data.remove_attribute("class");
        assert!(!data.has_attribute("class"));
    }

    #[test]
    fn style_attribute_round_trips() {
        let mut data = NodeData::element("p");
        data.set_attribute("style", "color: red; width:10px");
        assert_eq!(data.style("color"), Some("red"));
        assert_eq!(data.style("width"), Some("10px"));
        data.set_style("color", "");
        assert_eq!(data.attribute("style").as_deref(), Some("width: 10px;"));
    }

    #[test]
    fn attributes_keep_order_and_lowercase() {
        let data = NodeData::element("input")
            .with_attribute("TYPE", "text")
            .with_attribute("cb-bind", "name")
            .with_id("n");
        assert_eq!(
            data.attribute_list(),
            vec![
                ("id".to_owned(), "n".to_owned()),
                ("type".to_owned(), "text".to_owned()),
                ("cb-bind".to_owned(), "name".to_owned()),
            ]
        );
    }

    #[test]
    fn dataset_maps_names() {
        let mut data = NodeData::element("div");
        data.set_data("userId", "7");
        assert_eq!(data.attribute("data-user-id").as_deref(), Some("7"));
        assert_eq!(data.dataset(), vec![("userId".to_owned(), "7".to_owned())]);
    }

    #[test]
    fn case_conversion() {
        assert_eq!(kebab_to_camel("cb-include-in"), "cbIncludeIn");
        assert_eq!(camel_to_kebab("cbIncludeIn"), "cb-include-in");
        assert_eq!(camel_to_kebab("myFontName"), "my-font-name");
    }

    #[test]
    fn void_elements() {
        assert!(is_void("input"));
        assert!(!is_void("div"));
    }

    #[test]
    fn node_id_is_copy() {
        fn assert_copy<T: Copy>() {}
        assert_copy::<NodeId>();
    }
}
