//! Shared document handle: tree access, native properties and DOM events.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use slotmap::SecondaryMap;
use tracing::trace;

use super::markup::{self, MarkupError};
use super::node::{NodeData, NodeId};
use super::tree::Dom;
use crate::event::{Dispatcher, Event, EventError, Listener};
use crate::value::{Map, Value};

/// Element properties with native behavior. Everything else set through
/// [`Document::set_property`] is an expando.
const GLOBAL_PROPERTIES: &[&str] = &[
    "id",
    "title",
    "hidden",
    "lang",
    "dir",
    "classname",
    "innerhtml",
    "textcontent",
];

const FORM_CONTROLS: &[&str] = &["input", "select", "textarea", "button", "option", "fieldset"];

/// Properties whose values are coerced to booleans.
const BOOLEAN_PROPERTIES: &[&str] = &["checked", "selected", "disabled", "hidden", "readonly"];

/// Events an element exposes as `on<event>` properties.
const NATIVE_EVENTS: &[&str] = &[
    "click", "dblclick", "input", "change", "submit", "reset", "focus", "blur", "keydown", "keyup",
    "keypress", "mousedown", "mouseup", "mouseover", "mouseout", "mousemove", "load", "scroll",
];

/// Element methods; `cb-click` naming one of these is a mistake for
/// `cb-onclick`.
const NATIVE_METHODS: &[&str] = &["click", "focus", "blur", "remove", "submit", "reset", "select"];

fn element_properties(tag: &str) -> &'static [&'static str] {
    match tag {
        "input" => &[
            "value", "checked", "disabled", "name", "type", "placeholder", "readonly", "src", "alt",
        ],
        "textarea" => &["value", "disabled", "name", "placeholder", "readonly"],
        "select" => &["value", "disabled", "name"],
        "option" => &["value", "selected", "disabled"],
        "button" => &["value", "disabled", "name", "type"],
        "fieldset" => &["disabled", "name"],
        "a" | "area" => &["href", "target", "name"],
        "link" => &["href"],
        "form" => &["name", "target"],
        "img" => &["src", "alt"],
        "script" | "iframe" | "audio" | "video" | "source" => &["src"],
        _ => &[],
    }
}

/// A headless document.
///
/// Cloning the handle shares the document. Every element created through it
/// lives in one arena; elements outside the tree under [`body`](Self::body)
/// are detached but remain usable until removed.
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

struct DocumentInner {
    dom: RefCell<Dom>,
    dispatchers: RefCell<SecondaryMap<NodeId, Dispatcher>>,
    body: NodeId,
}

impl Document {
    /// Create a document with an empty `<body>`.
    pub fn new() -> Self {
        let mut dom = Dom::new();
        let body = dom.create(NodeData::element("body"));
        Self {
            inner: Rc::new(DocumentInner {
                dom: RefCell::new(dom),
                dispatchers: RefCell::new(SecondaryMap::new()),
                body,
            }),
        }
    }

    /// Whether two handles refer to the same document.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn body(&self) -> NodeId {
        self.inner.body
    }

    /// Run `f` against the underlying arena.
    pub fn with_dom<R>(&self, f: impl FnOnce(&Dom) -> R) -> R {
        f(&self.inner.dom.borrow())
    }

    fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&NodeData) -> R) -> Option<R> {
        self.inner.dom.borrow().get(id).map(f)
    }

    fn with_node_mut<R>(&self, id: NodeId, f: impl FnOnce(&mut NodeData) -> R) -> Option<R> {
        self.inner.dom.borrow_mut().get_mut(id).map(f)
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.dom.borrow_mut().create(NodeData::element(tag))
    }

    /// Create a detached element from prepared data.
    pub fn create_node(&self, data: NodeData) -> NodeId {
        self.inner.dom.borrow_mut().create(data)
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner.dom.borrow_mut().create(NodeData::text(text))
    }

    /// Parse markup into detached top-level nodes.
    pub fn parse_fragment(&self, markup: &str) -> Result<Vec<NodeId>, MarkupError> {
        markup::parse_fragment(&mut self.inner.dom.borrow_mut(), markup)
    }

    /// Deep-copy a subtree. The copy is detached and carries no listeners.
    pub fn clone_node(&self, id: NodeId) -> Option<NodeId> {
        self.inner.dom.borrow_mut().clone_subtree(id)
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.dom.borrow().contains(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner.dom.borrow().parent(id)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.inner.dom.borrow().children(id).to_vec()
    }

    /// Element children only, text skipped.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        let dom = self.inner.dom.borrow();
        dom.children(id)
            .iter()
            .copied()
            .filter(|&c| dom.get(c).is_some_and(NodeData::is_element))
            .collect()
    }

    /// Element descendants in tree order, `id` excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let dom = self.inner.dom.borrow();
        dom.descendants(id)
            .into_iter()
            .filter(|&n| dom.get(n).is_some_and(NodeData::is_element))
            .collect()
    }

    /// Whether `ancestor` strictly contains `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.inner.dom.borrow().is_ancestor(ancestor, id)
    }

    /// Whether `id` is attached under the body.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.body() || self.is_ancestor(self.body(), id)
    }

    /// Nearest of `id` or its ancestors matching `predicate`.
    pub fn closest(&self, id: NodeId, predicate: impl Fn(&NodeData) -> bool) -> Option<NodeId> {
        self.inner.dom.borrow().closest(id, predicate)
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> bool {
        self.inner.dom.borrow_mut().append_child(parent, child)
    }

    pub fn prepend_child(&self, parent: NodeId, child: NodeId) -> bool {
        self.inner.dom.borrow_mut().prepend_child(parent, child)
    }

    pub fn insert_before(&self, reference: NodeId, node: NodeId) -> bool {
        self.inner.dom.borrow_mut().insert_before(reference, node)
    }

    pub fn insert_after(&self, reference: NodeId, node: NodeId) -> bool {
        self.inner.dom.borrow_mut().insert_after(reference, node)
    }

    /// Unlink from the parent, keeping the subtree and its listeners.
    pub fn detach(&self, id: NodeId) {
        self.inner.dom.borrow_mut().detach(id);
    }

    /// Destroy a subtree together with its event listeners.
    pub fn remove(&self, id: NodeId) {
        let removed = self.inner.dom.borrow_mut().remove(id);
        self.drop_dispatchers(&removed);
    }

    /// Destroy every child subtree of `id`.
    pub fn empty(&self, id: NodeId) {
        let removed = self.inner.dom.borrow_mut().clear_children(id);
        self.drop_dispatchers(&removed);
    }

    fn drop_dispatchers(&self, removed: &[NodeId]) {
        let dropped: Vec<Dispatcher> = {
            let mut dispatchers = self.inner.dispatchers.borrow_mut();
            removed.iter().filter_map(|&id| dispatchers.remove(id)).collect()
        };
        for dispatcher in dropped {
            dispatcher.remove_event_listener(None, None, None);
        }
    }

    // -----------------------------------------------------------------------
    // Markup
    // -----------------------------------------------------------------------

    /// Replace the children of `id` with parsed markup. On a parse error the
    /// element is left untouched.
    pub fn set_inner_html(&self, id: NodeId, markup: &str) -> Result<(), MarkupError> {
        let nodes = self.parse_fragment(markup)?;
        self.empty(id);
        let mut dom = self.inner.dom.borrow_mut();
        for node in nodes {
            dom.append_child(id, node);
        }
        Ok(())
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        markup::inner_html(&self.inner.dom.borrow(), id)
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        markup::outer_html(&self.inner.dom.borrow(), id)
    }

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self, id: NodeId) -> String {
        let dom = self.inner.dom.borrow();
        dom.walk_depth_first(id)
            .into_iter()
            .filter_map(|n| dom.get(n).filter(|d| d.is_text()).map(|d| d.text.clone()))
            .collect()
    }

    /// Replace the children of `id` with a single text node.
    pub fn set_text_content(&self, id: NodeId, text: &str) {
        self.empty(id);
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
    }

    // -----------------------------------------------------------------------
    // Attributes, classes, styles, dataset
    // -----------------------------------------------------------------------

    /// Lower-case tag name, empty for missing nodes.
    pub fn tag_name(&self, id: NodeId) -> String {
        self.with_node(id, |d| d.tag.clone()).unwrap_or_default()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.with_node(id, NodeData::is_element).unwrap_or(false)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.with_node(id, |d| d.attribute(name)).flatten()
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.with_node(id, |d| d.has_attribute(name)).unwrap_or(false)
    }

    pub fn set_attribute(&self, id: NodeId, name: &str, value: &str) {
        self.with_node_mut(id, |d| d.set_attribute(name, value));
    }

    pub fn remove_attribute(&self, id: NodeId, name: &str) {
        self.with_node_mut(id, |d| d.remove_attribute(name));
    }

    /// Every attribute in serialization order.
    pub fn attributes(&self, id: NodeId) -> Vec<(String, String)> {
        self.with_node(id, NodeData::attribute_list).unwrap_or_default()
    }

    pub fn classes(&self, id: NodeId) -> Vec<String> {
        self.with_node(id, |d| d.classes.clone()).unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.with_node(id, |d| d.has_class(class)).unwrap_or(false)
    }

    /// Add space-separated classes.
    pub fn add_class(&self, id: NodeId, classes: &str) {
        self.with_node_mut(id, |d| classes.split_whitespace().for_each(|c| d.add_class(c)));
    }

    /// Remove space-separated classes.
    pub fn remove_class(&self, id: NodeId, classes: &str) {
        self.with_node_mut(id, |d| classes.split_whitespace().for_each(|c| d.remove_class(c)));
    }

    /// Add or remove a class depending on `on`.
    pub fn set_class(&self, id: NodeId, class: &str, on: bool) {
        if on {
            self.add_class(id, class);
        } else {
            self.remove_class(id, class);
        }
    }

    pub fn style(&self, id: NodeId, name: &str) -> Option<String> {
        self.with_node(id, |d| d.style(name).map(str::to_owned)).flatten()
    }

    /// Set an inline style; an empty value removes it.
    pub fn set_style(&self, id: NodeId, name: &str, value: &str) {
        self.with_node_mut(id, |d| d.set_style(name, value));
    }

    /// `data-*` attributes keyed by camelCase names.
    pub fn dataset(&self, id: NodeId) -> Map {
        self.with_node(id, NodeData::dataset)
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect()
    }

    pub fn set_data(&self, id: NodeId, key: &str, value: &str) {
        self.with_node_mut(id, |d| d.set_data(key, value));
    }

    // -----------------------------------------------------------------------
    // Native properties
    // -----------------------------------------------------------------------

    /// Whether `name` is a native property of the element: its own or global
    /// properties, or an `on<event>` handler slot.
    pub fn has_native_property(&self, id: NodeId, name: &str) -> bool {
        let tag = self.tag_name(id);
        if tag.is_empty() || tag == "#text" {
            return false;
        }
        GLOBAL_PROPERTIES.contains(&name)
            || element_properties(&tag).contains(&name)
            || name.strip_prefix("on").is_some_and(|e| NATIVE_EVENTS.contains(&e))
    }

    /// Whether `name` is a native element method such as `click`.
    pub fn has_native_method(&self, id: NodeId, name: &str) -> bool {
        self.is_element(id) && NATIVE_METHODS.contains(&name)
    }

    /// Whether the native property holds a boolean.
    pub fn is_boolean_property(name: &str) -> bool {
        BOOLEAN_PROPERTIES.contains(&name)
    }

    /// Read a property. Native properties reflect element state; anything
    /// else reads the element's expando table (undefined when unset).
    pub fn property(&self, id: NodeId, name: &str) -> Value {
        if !self.has_native_property(id, name) {
            return self
                .with_node(id, |d| d.properties.get(name).cloned())
                .flatten()
                .unwrap_or_default();
        }
        match name {
            "value" => Value::from(self.value(id)),
            "checked" | "selected" => {
                let live = self.with_node(id, |d| d.properties.get(name).map(Value::is_truthy));
                let on = live
                    .flatten()
                    .unwrap_or_else(|| self.has_attribute(id, name));
                Value::from(on)
            }
            "disabled" | "hidden" | "readonly" => Value::from(self.has_attribute(id, name)),
            "classname" => Value::from(self.attribute(id, "class").unwrap_or_default()),
            "innerhtml" => Value::from(self.inner_html(id)),
            "textcontent" => Value::from(self.text_content(id)),
            _ if name.starts_with("on") => self
                .with_node(id, |d| d.properties.get(name).cloned())
                .flatten()
                .unwrap_or(Value::Null),
            _ => Value::from(self.attribute(id, name).unwrap_or_default()),
        }
    }

    /// Write a property. Boolean properties are coerced by truthiness.
    /// Setting `checked` on a radio button unchecks the other radios of the
    /// same name in the same tree.
    pub fn set_property(&self, id: NodeId, name: &str, value: Value) {
        if !self.has_native_property(id, name) {
            self.with_node_mut(id, |d| d.properties.insert(name.to_owned(), value));
            return;
        }
        trace!(property = name, "set native property");
        match name {
            "value" => {
                let text = value.to_display_string();
                self.with_node_mut(id, |d| d.properties.insert("value".to_owned(), Value::from(text)));
            }
            "checked" => self.set_checked_state(id, value.is_truthy()),
            "selected" => {
                self.with_node_mut(id, |d| {
                    d.properties.insert("selected".to_owned(), Value::from(value.is_truthy()))
                });
            }
            "disabled" | "hidden" | "readonly" => {
                if value.is_truthy() {
                    self.set_attribute(id, name, "");
                } else {
                    self.remove_attribute(id, name);
                }
            }
            "classname" => self.set_attribute(id, "class", &value.to_display_string()),
            "innerhtml" => {
                let markup = value.to_display_string();
                if self.set_inner_html(id, &markup).is_err() {
                    self.set_text_content(id, &markup);
                }
            }
            "textcontent" => self.set_text_content(id, &value.to_display_string()),
            _ if name.starts_with("on") => {
                self.with_node_mut(id, |d| d.properties.insert(name.to_owned(), value));
            }
            _ => self.set_attribute(id, name, &value.to_display_string()),
        }
    }

    /// The form value of an element.
    ///
    /// Falls back to the element's markup when unset: the `value` attribute,
    /// a textarea's text, or a select's selected (else first) option.
    pub fn value(&self, id: NodeId) -> String {
        let live = self.with_node(id, |d| d.properties.get("value").map(Value::to_display_string));
        if let Some(value) = live.flatten() {
            return value;
        }
        match self.tag_name(id).as_str() {
            "textarea" => self.text_content(id),
            "select" => {
                let options = self.with_dom(|dom| dom.query_by_tag(id, "option"));
                let chosen = options
                    .iter()
                    .copied()
                    .find(|&o| self.property(o, "selected").is_truthy())
                    .or_else(|| options.first().copied());
                chosen.map(|o| self.value(o)).unwrap_or_default()
            }
            "option" => self
                .attribute(id, "value")
                .unwrap_or_else(|| self.text_content(id)),
            _ => self.attribute(id, "value").unwrap_or_default(),
        }
    }

    fn set_checked_state(&self, id: NodeId, checked: bool) {
        self.with_node_mut(id, |d| d.properties.insert("checked".to_owned(), Value::from(checked)));
        let is_radio = self.attribute(id, "type").as_deref() == Some("radio");
        let Some(name) = self.attribute(id, "name").filter(|_| checked && is_radio) else {
            return;
        };
        let top = self.with_dom(|dom| dom.ancestors(id).last().copied()).unwrap_or(id);
        let peers = self.with_dom(|dom| {
            dom.query_all(top, |d| {
                d.tag == "input"
                    && d.attribute("type").as_deref() == Some("radio")
                    && d.attribute("name").as_deref() == Some(name.as_str())
            })
        });
        for peer in peers.into_iter().filter(|&p| p != id) {
            self.with_node_mut(peer, |d| d.properties.insert("checked".to_owned(), Value::from(false)));
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// The event dispatcher of an element, created on first use.
    pub fn dispatcher(&self, id: NodeId) -> Result<Dispatcher, EventError> {
        if !self.contains(id) {
            return Err(EventError::UnknownNode);
        }
        let mut dispatchers = self.inner.dispatchers.borrow_mut();
        if let Some(existing) = dispatchers.get(id) {
            return Ok(existing.clone());
        }
        let dispatcher = Dispatcher::new();
        dispatchers.insert(id, dispatcher.clone());
        Ok(dispatcher)
    }

    /// Listen for native events on an element; `types` may be space-separated.
    pub fn add_event_listener(
        &self,
        id: NodeId,
        types: &str,
        handler: Listener,
    ) -> Result<(), EventError> {
        self.dispatcher(id)?.add_event_listener(types, handler)
    }

    pub fn remove_event_listener(&self, id: NodeId, types: &str, handler: Option<&Listener>) {
        let dispatcher = self.inner.dispatchers.borrow().get(id).cloned();
        if let Some(dispatcher) = dispatcher {
            dispatcher.remove_event_listener(Some(types), handler, None);
        }
    }

    /// Dispatch an event on an element.
    pub fn dispatch_event(&self, id: NodeId, event: Event) -> Result<Event, EventError> {
        let dispatcher = self.dispatcher(id)?;
        Ok(dispatcher.dispatch_event(event))
    }

    /// Dispatch a plain event of the given type on an element.
    pub fn dispatch(&self, id: NodeId, event_type: &str) -> Result<Event, EventError> {
        let event = Event::new(event_type)?;
        self.dispatch_event(id, event)
    }

    // -----------------------------------------------------------------------
    // User interaction
    // -----------------------------------------------------------------------

    /// Type into a form control: set its value, then dispatch `input`.
    pub fn simulate_input(&self, id: NodeId, value: &str) -> Result<(), EventError> {
        if !self.contains(id) {
            return Err(EventError::UnknownNode);
        }
        self.set_property(id, "value", Value::from(value));
        self.dispatch(id, "input")?;
        Ok(())
    }

    /// Pick an option of a select by value, then dispatch `change`.
    pub fn simulate_select(&self, id: NodeId, value: &str) -> Result<(), EventError> {
        if !self.contains(id) {
            return Err(EventError::UnknownNode);
        }
        self.set_property(id, "value", Value::from(value));
        self.dispatch(id, "change")?;
        Ok(())
    }

    /// Set the checked state of a checkbox or radio, then dispatch `change`.
    pub fn set_checked(&self, id: NodeId, checked: bool) -> Result<(), EventError> {
        if !self.contains(id) {
            return Err(EventError::UnknownNode);
        }
        self.set_property(id, "checked", Value::from(checked));
        self.dispatch(id, "change")?;
        Ok(())
    }

    /// Click an element. Checkboxes toggle and radios check before `click`,
    /// and both then dispatch `change`.
    pub fn click(&self, id: NodeId) -> Result<(), EventError> {
        if !self.contains(id) {
            return Err(EventError::UnknownNode);
        }
        let kind = (self.tag_name(id) == "input")
            .then(|| self.attribute(id, "type"))
            .flatten();
        let toggled = match kind.as_deref() {
            Some("checkbox") => {
                let on = !self.property(id, "checked").is_truthy();
                self.set_property(id, "checked", Value::from(on));
                true
            }
            Some("radio") => {
                self.set_property(id, "checked", Value::from(true));
                true
            }
            _ => false,
        };
        self.dispatch(id, "click")?;
        if toggled {
            self.dispatch(id, "change")?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get_element_by_id(&self, root: NodeId, id: &str) -> Option<NodeId> {
        self.with_dom(|dom| dom.query_by_id(root, id))
    }

    pub fn query_by_class(&self, root: NodeId, class: &str) -> Vec<NodeId> {
        self.with_dom(|dom| dom.query_by_class(root, class))
    }

    pub fn query_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        self.with_dom(|dom| dom.query_by_tag(root, tag))
    }

    pub fn query_by_attribute(&self, root: NodeId, name: &str) -> Vec<NodeId> {
        self.with_dom(|dom| dom.query_by_attribute(root, name))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.inner.dom.borrow().len())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
