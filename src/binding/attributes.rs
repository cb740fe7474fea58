//! Directive table: built-in `cb-*` directives and custom registrations.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::binder::Binder;
use super::record::BindingRecord;
use super::repeat;
use crate::context::Context;
use crate::dom::markup::encode_entities;
use crate::dom::{Document, NodeId};
use crate::event::{change_type, Listener};
use crate::reactive::{EventTarget, Injectable};
use crate::value::Value;
use crate::view::{View, WeakView};

/// Attributes marking view, application and content roots. Never bound.
pub const RESERVED_ATTRIBUTES: &[&str] = &["cb-app", "cb-view", "cb-glimpse", "cb-content"];

/// Namespaces custom directives may not use.
pub const RESERVED_NAMESPACES: &[&str] = &["cb", "data", "aria"];

/// The built-in directive namespace.
pub const BUILTIN_NAMESPACE: &str = "cb";

/// Class applied by `cb-hide` / `cb-show`.
pub const HIDE_CLASS: &str = "cb-hide";
/// Class applied by `cb-exclude` / `cb-include`.
pub const EXCLUDE_CLASS: &str = "cb-exclude";

pub fn is_reserved_attribute(name: &str) -> bool {
    RESERVED_ATTRIBUTES.contains(&name)
}

// ---------------------------------------------------------------------------
// Binding options
// ---------------------------------------------------------------------------

/// Per-binding information handed to directive handlers.
#[derive(Clone)]
pub struct BindingOptions {
    view: Option<WeakView>,
    /// The bound property (last path segment) or, for raw directives, the raw
    /// attribute value.
    pub property: String,
    pub context: Option<Context>,
    pub binder: Binder,
    records: Rc<RefCell<Vec<BindingRecord>>>,
}

impl BindingOptions {
    /// Options for a binding made outside any view. Records tracked by
    /// handlers are kept in a private list.
    pub fn new(binder: &Binder) -> Self {
        Self {
            view: None,
            property: String::new(),
            context: None,
            binder: binder.clone(),
            records: Rc::default(),
        }
    }

    /// Options for a binding owned by `view`; tracked records join the
    /// view's binding list.
    pub fn for_view(view: &View, binder: &Binder) -> Self {
        Self {
            view: Some(view.downgrade()),
            property: String::new(),
            context: view.context(),
            binder: binder.clone(),
            records: view.binding_list(),
        }
    }

    pub fn with_property(mut self, property: &str) -> Self {
        self.property = property.to_owned();
        self
    }

    pub fn view(&self) -> Option<View> {
        self.view.as_ref().and_then(WeakView::upgrade)
    }

    /// Keep `record` for teardown alongside the owner's other bindings.
    pub fn track(&self, record: BindingRecord) {
        self.records.borrow_mut().push(record);
    }

    /// Records tracked through these options so far.
    pub fn tracked(&self) -> usize {
        self.records.borrow().len()
    }

    /// Hand every tracked record to the caller.
    pub(crate) fn take_tracked(&self) -> Vec<BindingRecord> {
        std::mem::take(&mut *self.records.borrow_mut())
    }

    /// Release and forget every tracked record, newest first.
    pub fn release_tracked(&self) {
        loop {
            let record = self.records.borrow_mut().pop();
            match record {
                Some(record) => record.release(),
                None => break,
            }
        }
    }
}

impl fmt::Debug for BindingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingOptions")
            .field("property", &self.property)
            .field("has_view", &self.view.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Directive
// ---------------------------------------------------------------------------

/// Per-binding scratch space for directives that remember things between
/// calls (previous classes, repeated views).
#[derive(Default, Clone)]
pub struct DirectiveState(Rc<RefCell<Option<Rc<dyn Any>>>>);

impl DirectiveState {
    /// The stored state, if it exists and has type `T`.
    pub(crate) fn peek<T: 'static>(&self) -> Option<Rc<T>> {
        self.0.borrow().clone().and_then(|s| s.downcast::<T>().ok())
    }
}

/// One invocation of a directive handler.
pub struct DirectiveCall<'a> {
    pub document: &'a Document,
    pub element: NodeId,
    /// The parsed bound value, or the raw attribute text for raw directives.
    pub value: Value,
    /// The `:param` part of the clause.
    pub param: Option<&'a str>,
    pub options: &'a BindingOptions,
    pub(crate) state: &'a DirectiveState,
}

impl DirectiveCall<'_> {
    /// State kept for this binding, created on first use.
    pub fn state<T: Default + 'static>(&self) -> Rc<T> {
        let mut slot = self.state.0.borrow_mut();
        if let Some(existing) = slot.clone().and_then(|s| s.downcast::<T>().ok()) {
            return existing;
        }
        let fresh = Rc::new(T::default());
        *slot = Some(fresh.clone() as Rc<dyn Any>);
        fresh
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.options.binder.warn(message);
    }
}

type Handler = Rc<dyn Fn(&DirectiveCall<'_>)>;

/// A directive handler plus its flags.
#[derive(Clone)]
pub struct Directive {
    handler: Handler,
    multiple: bool,
    raw: bool,
    read_only: bool,
}

impl Directive {
    pub fn new(handler: impl Fn(&DirectiveCall<'_>) + 'static) -> Self {
        Self {
            handler: Rc::new(handler),
            multiple: false,
            raw: false,
            read_only: false,
        }
    }

    /// Accept several comma-separated clauses (builder).
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Receive the raw attribute text instead of a bound value (builder).
    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    /// Usable without a value (builder).
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn call(&self, call: &DirectiveCall<'_>) {
        (self.handler)(call)
    }
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directive")
            .field("multiple", &self.multiple)
            .field("raw", &self.raw)
            .field("read_only", &self.read_only)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Built-in and custom directives keyed by attribute name (`cb-show`).
pub struct AttributeTable {
    builtin: HashMap<String, Directive>,
    custom: HashMap<String, Directive>,
    namespaces: Vec<String>,
}

impl AttributeTable {
    /// A table holding every built-in directive.
    pub fn new() -> Self {
        let mut builtin = HashMap::new();
        let mut add = |name: &str, directive: Directive| {
            builtin.insert(format!("{BUILTIN_NAMESPACE}-{name}"), directive);
        };
        add("show", Directive::new(|c| toggle(c, HIDE_CLASS, !c.value.is_truthy())));
        add("hide", Directive::new(|c| toggle(c, HIDE_CLASS, c.value.is_truthy())));
        add("include", Directive::new(|c| toggle(c, EXCLUDE_CLASS, !c.value.is_truthy())));
        add("exclude", Directive::new(|c| toggle(c, EXCLUDE_CLASS, c.value.is_truthy())));
        add("enabled", Directive::new(cb_enabled));
        add("html", Directive::new(cb_html));
        add("text", Directive::new(cb_text));
        add("class", Directive::new(cb_class).multiple());
        add("classes", Directive::new(cb_classes));
        add("style", Directive::new(cb_style).multiple());
        add("repeat", Directive::new(repeat::cb_repeat));
        add("dataset", Directive::new(cb_dataset));
        add("data", Directive::new(cb_dataset));
        add("include-in", Directive::new(|c| state_filter(c, false)).raw());
        add("exclude-from", Directive::new(|c| state_filter(c, true)).raw());
        add("remove", Directive::new(|c| cb_remove(c, c.value.is_truthy())));
        add("keep", Directive::new(|c| cb_remove(c, !c.value.is_truthy())));
        add("onbind", Directive::new(cb_onbind));
        add("detect-change", Directive::new(cb_detect_change).read_only());
        add("validate", Directive::new(cb_validate));

        Self {
            builtin,
            custom: HashMap::new(),
            namespaces: vec![BUILTIN_NAMESPACE.to_owned()],
        }
    }

    /// Look up a directive by attribute name. Built-ins win over custom
    /// registrations, and only `cb-` names are built-in.
    pub fn get(&self, name: &str) -> Option<Directive> {
        let builtin = name
            .starts_with("cb-")
            .then(|| self.builtin.get(name))
            .flatten();
        builtin.or_else(|| self.custom.get(name)).cloned()
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtin.contains_key(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builtin.contains_key(name) || self.custom.contains_key(name)
    }

    /// Whether `name` accepts several clauses.
    pub fn can_handle_multiple(&self, name: &str) -> bool {
        self.get(name).is_some_and(|d| d.is_multiple())
    }

    pub fn is_registered_namespace(&self, namespace: &str) -> bool {
        self.namespaces.iter().any(|ns| ns == namespace)
    }

    pub(crate) fn insert_custom(&mut self, name: String, namespace: &str, directive: Directive) {
        if !self.is_registered_namespace(namespace) {
            self.namespaces.push(namespace.to_owned());
        }
        self.custom.insert(name, directive);
    }
}

impl Default for AttributeTable {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Built-in handlers
// ---------------------------------------------------------------------------

fn toggle(call: &DirectiveCall<'_>, class: &str, on: bool) {
    call.document.set_class(call.element, class, on);
}

fn cb_enabled(call: &DirectiveCall<'_>) {
    call.document
        .set_property(call.element, "disabled", Value::from(!call.value.is_truthy()));
}

/// Replace the element's children with markup; text that fails to parse is
/// inserted as text.
pub(crate) fn set_html(document: &Document, element: NodeId, markup: &str) {
    if document.set_inner_html(element, markup).is_err() {
        document.set_text_content(element, markup);
    }
}

fn cb_html(call: &DirectiveCall<'_>) {
    set_html(call.document, call.element, &call.value.to_display_string());
}

fn cb_text(call: &DirectiveCall<'_>) {
    let text = call.value.to_display_string();
    let escaped = encode_entities(&text)
        .replace("\r\n", "<br/>")
        .replace(['\r', '\n'], "<br/>");
    set_html(call.document, call.element, &escaped);
}

fn cb_class(call: &DirectiveCall<'_>) {
    let Some(class) = call.param else {
        call.warn("cb-class attributes must name a CSS class, e.g. cb-class=\"myProperty:class-name\"");
        return;
    };
    toggle(call, class, call.value.is_truthy());
}

fn class_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(Value::to_display_string).collect(),
        Value::List(list) => list.to_vec().iter().map(Value::to_display_string).collect(),
        other => other
            .to_display_string()
            .split_whitespace()
            .map(str::to_owned)
            .collect(),
    }
}

#[derive(Default)]
struct PreviousClasses(RefCell<Vec<String>>);

fn cb_classes(call: &DirectiveCall<'_>) {
    let previous = call.state::<PreviousClasses>();
    for class in previous.0.borrow().iter() {
        call.document.remove_class(call.element, class);
    }
    let next = if call.value.is_truthy() {
        class_list(&call.value)
    } else {
        Vec::new()
    };
    for class in &next {
        call.document.add_class(call.element, class);
    }
    *previous.0.borrow_mut() = next;
}

fn cb_style(call: &DirectiveCall<'_>) {
    let Some(style) = call.param else {
        call.warn("cb-style attributes must name a style, e.g. cb-style=\"myProperty:style-name\"");
        return;
    };
    call.document
        .set_style(call.element, style, &call.value.to_display_string());
}

fn cb_dataset(call: &DirectiveCall<'_>) {
    let entries = match &call.value {
        Value::Object(map) => map.clone(),
        Value::Hash(hash) => hash.snapshot(),
        _ => return,
    };
    for (key, value) in entries {
        call.document
            .set_data(call.element, &key, &value.to_display_string());
    }
}

fn state_filter(call: &DirectiveCall<'_>, exclude_listed: bool) {
    let Some(view) = call.options.view() else {
        call.warn("cb-include-in and cb-exclude-from can only be used inside a view");
        return;
    };
    let states: Vec<String> = call
        .value
        .to_display_string()
        .split_whitespace()
        .map(str::to_owned)
        .collect();

    let document = call.document.clone();
    let element = call.element;
    let apply = move |current: &Value| {
        let listed = states.iter().any(|s| *s == current.to_display_string());
        document.set_class(element, EXCLUDE_CLASS, listed == exclude_listed);
    };
    apply(&view.current_state());

    let listener = Listener::new(move |event| apply(&event.value));
    match BindingRecord::listen(view.dispatcher(), &change_type("currentState"), listener) {
        Ok(record) => call.options.track(record),
        Err(err) => call.warn(err),
    }
}

fn cb_remove(call: &DirectiveCall<'_>, remove: bool) {
    if remove {
        call.document.remove(call.element);
    }
}

#[derive(Default)]
struct InstalledListener(RefCell<Option<Listener>>);

/// Swap the listener installed on the element by a previous call of the same
/// binding for `next`.
fn replace_element_listener(call: &DirectiveCall<'_>, types: &str, next: Option<Listener>) {
    let installed = call.state::<InstalledListener>();
    if let Some(previous) = installed.0.borrow_mut().take() {
        call.document
            .remove_event_listener(call.element, types, Some(&previous));
    }
    let Some(next) = next else {
        return;
    };
    match call.document.dispatcher(call.element) {
        Ok(dispatcher) => match BindingRecord::listen(&dispatcher, types, next.clone()) {
            Ok(record) => {
                call.options.track(record);
                *installed.0.borrow_mut() = Some(next);
            }
            Err(err) => call.warn(err),
        },
        Err(err) => call.warn(err),
    }
}

fn cb_onbind(call: &DirectiveCall<'_>) {
    let Some(callback) = call.value.as_callback().cloned() else {
        call.warn(format!(
            "{} is not a function and cannot handle the bind event",
            call.options.property
        ));
        replace_element_listener(call, "bind", None);
        return;
    };
    let listener = Listener::new(move |event| {
        callback.call(&event.data);
    });
    replace_element_listener(call, "bind", Some(listener));
}

/// Form value of a control, falling back to its markup.
fn control_value(document: &Document, element: NodeId) -> String {
    let value = document.value(element);
    if value.is_empty() {
        document.inner_html(element)
    } else {
        value
    }
}

/// Mark the enclosing form changed when any of its controls is.
fn update_form(document: &Document, element: NodeId) {
    let Some(form) = document.closest(element, |d| d.tag == "form") else {
        return;
    };
    document.remove_class(form, "cb-changed cb-unchanged");
    let any = !document.query_by_class(form, "cb-changed").is_empty();
    document.add_class(form, if any { "cb-changed" } else { "cb-unchanged" });
}

fn cb_detect_change(call: &DirectiveCall<'_>) {
    let document = call.document.clone();
    let element = call.element;
    let original = control_value(&document, element);

    document.add_class(element, "cb-unchanged");
    update_form(&document, element);

    let listener = Listener::new(move |_| {
        let changed = control_value(&document, element) != original;
        document.remove_class(element, "cb-changed cb-unchanged");
        document.add_class(element, if changed { "cb-changed" } else { "cb-unchanged" });
        update_form(&document, element);
    });
    replace_element_listener(call, "change input", Some(listener));
}

/// Outcome of a validation callback: `true` is valid, a string is an
/// invalid reason, anything else is invalid.
fn validation_classes(result: &Value) -> (bool, Vec<String>) {
    match result {
        Value::Bool(true) => (true, vec!["cb-valid".to_owned()]),
        Value::String(reason) if !reason.is_empty() => (
            false,
            vec!["cb-invalid".to_owned(), format!("cb-invalid-{reason}")],
        ),
        _ => (false, vec!["cb-invalid".to_owned()]),
    }
}

fn clear_validation(document: &Document, element: NodeId) {
    for class in document.classes(element) {
        if class == "cb-valid" || class.starts_with("cb-invalid") {
            document.remove_class(element, &class);
        }
    }
}

fn validate_form(document: &Document, element: NodeId, valid: bool) {
    let Some(form) = document.closest(element, |d| d.tag == "form") else {
        return;
    };
    clear_validation(document, form);
    let all_valid = valid
        && document.query_by_class(form, "cb-invalid").is_empty()
        && document
            .query_by_attribute(form, "required")
            .into_iter()
            .all(|field| !control_value(document, field).trim().is_empty());
    document.add_class(form, if all_valid { "cb-valid" } else { "cb-invalid" });
}

fn cb_validate(call: &DirectiveCall<'_>) {
    let Some(validator) = call.value.as_callback().cloned() else {
        call.warn(format!(
            "{} cannot be used with cb-validate, a function is required",
            call.options.property
        ));
        replace_element_listener(call, "change input blur", None);
        return;
    };
    let document = call.document.clone();
    let element = call.element;
    let listener = Listener::new(move |_| {
        let value = Value::from(control_value(&document, element));
        let (valid, classes) = validation_classes(&validator.call(&value));
        clear_validation(&document, element);
        for class in &classes {
            document.add_class(element, class);
        }
        validate_form(&document, element, valid);
    });
    replace_element_listener(call, "change input blur", Some(listener));
}
