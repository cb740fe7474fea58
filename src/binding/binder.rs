//! The binding engine.
//!
//! A [`Binder`] owns the directive table and installs bindings:
//!
//! - [`bind_element`](Binder::bind_element): two-way sync between a property
//!   and a form control, or one-way markup for other elements.
//! - [`bind_attribute`](Binder::bind_attribute): one `cb-*` directive clause.
//! - [`bind_view`](Binder::bind_view): every directive inside a view's
//!   element, skipping nested views.
//!
//! Every binding returns [`BindingRecord`]s so it can be torn down later.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use super::attributes::{
    is_reserved_attribute, set_html, AttributeTable, BindingOptions, Directive, DirectiveCall,
    DirectiveState, RESERVED_NAMESPACES,
};
use super::directive::{parse_clauses, Clause};
use super::record::BindingRecord;
use crate::context::Context;
use crate::dom::node::{camel_to_kebab, kebab_to_camel};
use crate::dom::{Document, NodeId};
use crate::event::{change_type, Event, EventError, Listener, BIND, BOUND, UNBOUND};
use crate::model::{Hash, List};
use crate::reactive::{scheduler, Bindable, EventTarget, Injectable, Observable};
use crate::value::{Callback, Map, Value};
use crate::view::{View, ViewOptions};

/// Errors from binding calls that indicate API misuse.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("element does not exist")]
    MissingElement,
    #[error("source of {property} is not an event dispatcher")]
    NotDispatcher { property: String },
    #[error("setter must be a callback")]
    InvalidSetter,
    #[error("view has been removed")]
    NoView,
    #[error(transparent)]
    Event(#[from] EventError),
}

// ---------------------------------------------------------------------------
// Binding sources
// ---------------------------------------------------------------------------

/// Anything a property binding can read from or write to.
pub trait BindingSource {
    fn binding_observable(&self) -> Option<Observable>;
}

impl BindingSource for Observable {
    fn binding_observable(&self) -> Option<Observable> {
        Some(self.clone())
    }
}

impl BindingSource for Hash {
    fn binding_observable(&self) -> Option<Observable> {
        Some(self.observable().clone())
    }
}

impl BindingSource for List {
    fn binding_observable(&self) -> Option<Observable> {
        Some(self.observable().clone())
    }
}

impl BindingSource for View {
    fn binding_observable(&self) -> Option<Observable> {
        Some(self.observable().clone())
    }
}

impl BindingSource for Context {
    fn binding_observable(&self) -> Option<Observable> {
        Some(self.observable().clone())
    }
}

impl BindingSource for Value {
    fn binding_observable(&self) -> Option<Observable> {
        self.as_observable()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse function used when a directive names none: `Undefined` renders as
/// an empty string, everything else passes through.
pub fn default_parse(value: &Value) -> Value {
    match value {
        Value::Undefined => Value::from(""),
        other => other.clone(),
    }
}

fn parse_with(parse: Option<&Callback>, value: &Value) -> Value {
    match parse {
        Some(parse) => parse.call(value),
        None => default_parse(value),
    }
}

/// Write a value coming from the DOM into `source`. Numeric-looking strings
/// become numbers; deep-equal values are not written.
pub fn set_value(source: &Observable, property: &str, value: Value) {
    let value = value.coerce_numeric();
    if source.get(property).deep_eq(&value) {
        return;
    }
    source.set(property, value);
}

/// `user-card` → `UserCard`.
fn tag_to_class_name(tag: &str) -> String {
    let camel = kebab_to_camel(tag);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether the element is the root of a view or application of its own.
fn is_view_root(document: &Document, element: NodeId) -> bool {
    document.has_class(element, "cb-view")
        || document.has_attribute(element, "cb-view")
        || document.has_attribute(element, "cb-app")
}

/// The elements a view binds: its element and descendants, minus nested
/// view subtrees and the content of `cb-repeat` templates.
fn scope_elements(document: &Document, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node != root && is_view_root(document, node) {
            continue;
        }
        out.push(node);
        if document.has_attribute(node, "cb-repeat") {
            continue;
        }
        stack.extend(document.element_children(node).into_iter().rev());
    }
    out
}

/// Follow `path` through nested entities starting at `scope`.
fn resolve_owner(scope: &Observable, path: &[String]) -> Option<Observable> {
    let mut owner = scope.clone();
    for segment in path {
        owner = owner.get(segment).as_observable()?;
    }
    Some(owner)
}

/// Resolve a dotted path naming a callback.
fn resolve_callback(scope: &Observable, path: &str) -> Option<Callback> {
    let segments: Vec<String> = path.split('.').map(str::to_owned).collect();
    let (name, owner) = segments.split_last()?;
    resolve_owner(scope, owner)?.get(name).as_callback().cloned()
}

#[derive(Clone, Copy, PartialEq)]
enum Control {
    Checkbox,
    Radio,
    Select,
    Field,
    Content,
}

fn control_kind(document: &Document, element: NodeId) -> Control {
    match document.tag_name(element).as_str() {
        "input" => match document
            .attribute(element, "type")
            .map(|t| t.to_ascii_lowercase())
            .as_deref()
        {
            Some("checkbox") => Control::Checkbox,
            Some("radio") => Control::Radio,
            _ => Control::Field,
        },
        "select" => Control::Select,
        "textarea" => Control::Field,
        _ => Control::Content,
    }
}

/// Push `value` into the element unless it already shows it.
fn apply_to_element(document: &Document, element: NodeId, control: Control, value: &Value) {
    if !document.contains(element) {
        return;
    }
    match control {
        Control::Checkbox => {
            let on = value.is_truthy();
            if document.property(element, "checked").is_truthy() != on {
                document.set_property(element, "checked", Value::from(on));
            }
        }
        Control::Radio => {
            let on = document.value(element) == value.to_display_string();
            if document.property(element, "checked").is_truthy() != on {
                document.set_property(element, "checked", Value::from(on));
            }
        }
        Control::Field | Control::Select => {
            let text = value.to_display_string();
            if document.value(element) != text {
                document.set_property(element, "value", Value::from(text));
            }
        }
        Control::Content => {
            let markup = value.to_display_string();
            if document.inner_html(element) != markup {
                set_html(document, element, &markup);
            }
        }
    }
}

/// The value an element currently holds, as seen by the bound property.
/// `None` for an unchecked radio button.
fn read_from_element(document: &Document, element: NodeId, control: Control) -> Option<Value> {
    match control {
        Control::Checkbox => Some(Value::from(document.property(element, "checked").is_truthy())),
        Control::Radio => document
            .property(element, "checked")
            .is_truthy()
            .then(|| Value::from(document.value(element))),
        Control::Field | Control::Select => Some(Value::from(document.value(element))),
        Control::Content => None,
    }
}

// ---------------------------------------------------------------------------
// Binder
// ---------------------------------------------------------------------------

struct BinderInner {
    table: RefCell<AttributeTable>,
    log_enabled: Cell<bool>,
}

/// The binding engine and its directive table. Cheap to clone; clones share
/// the table.
#[derive(Clone)]
pub struct Binder(Rc<BinderInner>);

impl Binder {
    pub fn new() -> Self {
        Self(Rc::new(BinderInner {
            table: RefCell::new(AttributeTable::new()),
            log_enabled: Cell::new(true),
        }))
    }

    pub fn ptr_eq(&self, other: &Binder) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn log_enabled(&self) -> bool {
        self.0.log_enabled.get()
    }

    pub fn set_log_enabled(&self, enabled: bool) {
        self.0.log_enabled.set(enabled);
    }

    /// Log a recoverable binding problem.
    pub fn warn(&self, message: impl fmt::Display) {
        if self.log_enabled() {
            warn!("{message}");
        }
    }

    // -----------------------------------------------------------------------
    // Directive registration
    // -----------------------------------------------------------------------

    /// Register a custom directive. `name` is camelCase (`myFoo`) or kebab
    /// (`my-foo`); its first segment is the namespace, which must not be
    /// reserved. Returns whether the directive was registered.
    pub fn register_attribute(&self, name: &str, directive: Directive) -> bool {
        let kebab = camel_to_kebab(name);
        let Some((namespace, rest)) = kebab.split_once('-') else {
            self.warn(format!("custom attribute {name} needs a namespace, e.g. myFoo"));
            return false;
        };
        if namespace.is_empty() || rest.is_empty() {
            self.warn(format!("custom attribute {name} needs a namespace, e.g. myFoo"));
            return false;
        }
        if RESERVED_NAMESPACES.contains(&namespace) {
            self.warn(format!("namespace {namespace} is reserved, {name} not registered"));
            return false;
        }
        let namespace = namespace.to_owned();
        let mut table = self.0.table.borrow_mut();
        if table.contains(&kebab) {
            self.warn(format!("{kebab} is already registered and will be replaced"));
        }
        table.insert_custom(kebab, &namespace, directive);
        true
    }

    /// Register several directives; returns how many were accepted.
    pub fn register_attributes<'a>(
        &self,
        directives: impl IntoIterator<Item = (&'a str, Directive)>,
    ) -> usize {
        directives
            .into_iter()
            .filter(|(name, directive)| self.register_attribute(name, directive.clone()))
            .count()
    }

    /// Whether a built-in or custom directive exists for `name` (camelCase or
    /// kebab).
    pub fn attribute_exists(&self, name: &str) -> bool {
        self.0.table.borrow().contains(&camel_to_kebab(name))
    }

    fn directive(&self, name: &str) -> Option<Directive> {
        self.0.table.borrow().get(name)
    }

    fn is_bindable_namespace(&self, name: &str) -> bool {
        name.split_once('-')
            .is_some_and(|(ns, _)| self.0.table.borrow().is_registered_namespace(ns))
    }

    /// Apply a read-only directive to an element once, without a value.
    ///
    /// Returns `None` when nothing was applied. Otherwise returns the records
    /// the directive installed; the caller owns them and releases them when
    /// the element is done with.
    pub fn apply_attribute(
        &self,
        document: &Document,
        element: NodeId,
        name: &str,
    ) -> Option<Vec<BindingRecord>> {
        let name = camel_to_kebab(name);
        match self.directive(&name) {
            Some(directive) if directive.is_read_only() => {
                let options = BindingOptions::new(self);
                Self::invoke(&directive, document, element, Value::Undefined, None, &options);
                Some(options.take_tracked())
            }
            Some(_) => {
                self.warn(format!("{name} requires a value and cannot be applied directly"));
                None
            }
            None => {
                self.warn(format!("{name} is not a recognized attribute"));
                None
            }
        }
    }

    fn invoke(
        directive: &Directive,
        document: &Document,
        element: NodeId,
        value: Value,
        param: Option<&str>,
        options: &BindingOptions,
    ) {
        let state = DirectiveState::default();
        directive.call(&DirectiveCall {
            document,
            element,
            value,
            param,
            options,
            state: &state,
        });
    }

    // -----------------------------------------------------------------------
    // Element binding
    // -----------------------------------------------------------------------

    /// Two-way bind `property` of `source` to a form control, or one-way to
    /// the markup of any other element.
    pub fn bind_element(
        &self,
        source: &Observable,
        property: &str,
        document: &Document,
        element: NodeId,
        parse: Option<&Callback>,
    ) -> Result<Vec<BindingRecord>, BindingError> {
        if !document.contains(element) {
            return Err(BindingError::MissingElement);
        }
        source.make_bindable(&[property]);
        let control = control_kind(document, element);
        let mut records = Vec::new();

        let initial = parse_with(parse, &source.get(property));
        apply_to_element(document, element, control, &initial);
        if control == Control::Select {
            // Options may still be rendered by directives later in the scan.
            let (doc, initial) = (document.clone(), initial.clone());
            scheduler::defer(move || apply_to_element(&doc, element, control, &initial));
        }

        let doc = document.clone();
        let parse_fn = parse.cloned();
        let to_element = Listener::new(move |event| {
            let value = parse_with(parse_fn.as_ref(), &event.value);
            apply_to_element(&doc, element, control, &value);
        });
        records.push(BindingRecord::listen(
            source.dispatcher(),
            &change_type(property),
            to_element,
        )?);

        if control != Control::Content {
            let weak = source.downgrade();
            let doc = document.clone();
            let name = property.to_owned();
            let to_source = Listener::new(move |_| {
                let Some(source) = weak.upgrade() else {
                    return;
                };
                if let Some(value) = read_from_element(&doc, element, control) {
                    set_value(&source, &name, value);
                }
            });
            let dispatcher = document.dispatcher(element)?;
            records.push(BindingRecord::listen(&dispatcher, "input change", to_source)?);
        }
        Ok(records)
    }

    // -----------------------------------------------------------------------
    // Attribute binding
    // -----------------------------------------------------------------------

    /// Bind one directive clause: `name` is the attribute (`cb-show`),
    /// `property` the last segment of its path on `source`.
    #[allow(clippy::too_many_arguments)]
    pub fn bind_attribute(
        &self,
        source: &Observable,
        property: &str,
        document: &Document,
        element: NodeId,
        name: &str,
        parse: Option<&Callback>,
        param: Option<&str>,
        options: &BindingOptions,
    ) -> Result<Vec<BindingRecord>, BindingError> {
        if !document.contains(element) {
            return Err(BindingError::MissingElement);
        }
        if is_reserved_attribute(name) || !self.is_bindable_namespace(name) {
            return Ok(Vec::new());
        }
        if name == "cb-bind" {
            return self.bind_element(source, property, document, element, parse);
        }

        if let Some(directive) = self.directive(name) {
            source.make_bindable(&[property]);
            return self.bind_directive(source, property, document, element, &directive, parse, param, options);
        }

        let native = name.strip_prefix("cb-").unwrap_or(name);
        if document.has_native_property(element, native) {
            source.make_bindable(&[property]);
            return match native.strip_prefix("on") {
                Some(event_type) => self.bind_native_event(source, property, document, element, event_type),
                None => self.bind_native_property(source, property, document, element, native, parse),
            };
        }
        if document.has_native_method(element, native) {
            self.warn(format!("{name} is a native method, did you mean cb-on{native}?"));
        } else {
            self.warn(format!("{name} is not a recognized attribute, did you make a typo?"));
        }
        Ok(Vec::new())
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_directive(
        &self,
        source: &Observable,
        property: &str,
        document: &Document,
        element: NodeId,
        directive: &Directive,
        parse: Option<&Callback>,
        param: Option<&str>,
        options: &BindingOptions,
    ) -> Result<Vec<BindingRecord>, BindingError> {
        let options = options.clone().with_property(property);
        let state = DirectiveState::default();
        let run = {
            let document = document.clone();
            let directive = directive.clone();
            let parse = parse.cloned();
            let param = param.map(str::to_owned);
            let options = options.clone();
            move |value: &Value| {
                if !document.contains(element) {
                    return;
                }
                directive.call(&DirectiveCall {
                    document: &document,
                    element,
                    value: parse_with(parse.as_ref(), value),
                    param: param.as_deref(),
                    options: &options,
                    state: &state,
                });
            }
        };
        let run = Rc::new(run);

        let on_change = {
            let run = run.clone();
            Listener::new(move |event| run(&event.value))
        };
        let record = BindingRecord::listen(source.dispatcher(), &change_type(property), on_change)?;
        run(&source.get(property));
        Ok(vec![record])
    }

    fn bind_native_event(
        &self,
        source: &Observable,
        property: &str,
        document: &Document,
        element: NodeId,
        event_type: &str,
    ) -> Result<Vec<BindingRecord>, BindingError> {
        let Some(callback) = source.get(property).as_callback().cloned() else {
            self.warn(format!("{property} is not a function and cannot handle {event_type} events"));
            return Ok(Vec::new());
        };
        let handler = Listener::new(move |event| {
            let mut detail = Map::new();
            detail.insert("type".to_owned(), Value::from(event.event_type()));
            callback.call(&Value::Object(detail));
        });
        let dispatcher = document.dispatcher(element)?;
        Ok(vec![BindingRecord::listen(&dispatcher, event_type, handler)?])
    }

    fn bind_native_property(
        &self,
        source: &Observable,
        property: &str,
        document: &Document,
        element: NodeId,
        native: &str,
        parse: Option<&Callback>,
    ) -> Result<Vec<BindingRecord>, BindingError> {
        let boolean = Document::is_boolean_property(native);
        let write = {
            let document = document.clone();
            let native = native.to_owned();
            let parse = parse.cloned();
            move |value: &Value| {
                if !document.contains(element) {
                    return;
                }
                let value = parse_with(parse.as_ref(), value);
                let value = if boolean { Value::from(value.is_truthy()) } else { value };
                if !document.property(element, &native).deep_eq(&value) {
                    document.set_property(element, &native, value);
                }
            }
        };
        write(&source.get(property));

        let to_element = Listener::new(move |event| write(&event.value));
        let mut records = vec![BindingRecord::listen(
            source.dispatcher(),
            &change_type(property),
            to_element,
        )?];

        let weak = source.downgrade();
        let doc = document.clone();
        let (name, native) = (property.to_owned(), native.to_owned());
        let to_source = Listener::new(move |_| {
            if let Some(source) = weak.upgrade() {
                set_value(&source, &name, doc.property(element, &native));
            }
        });
        let dispatcher = document.dispatcher(element)?;
        records.push(BindingRecord::listen(&dispatcher, "input change", to_source)?);
        Ok(records)
    }

    // -----------------------------------------------------------------------
    // Entity to entity
    // -----------------------------------------------------------------------

    /// Copy `property` of `source` into `dest_property` of `dest` now and on
    /// every change; with `two_way`, changes flow back as well.
    pub fn bind_property(
        &self,
        source: &impl BindingSource,
        property: &str,
        dest: &impl BindingSource,
        dest_property: Option<&str>,
        two_way: bool,
    ) -> Result<Vec<BindingRecord>, BindingError> {
        let src = source.binding_observable().ok_or_else(|| BindingError::NotDispatcher {
            property: property.to_owned(),
        })?;
        let dest_property = dest_property.unwrap_or(property);
        let dst = dest.binding_observable().ok_or_else(|| BindingError::NotDispatcher {
            property: dest_property.to_owned(),
        })?;

        src.make_bindable(&[property]);
        let mut records = vec![Self::forward(&src, property, &dst, dest_property)?];
        dst.set(dest_property, src.get(property));
        if two_way {
            dst.make_bindable(&[dest_property]);
            records.push(Self::forward(&dst, dest_property, &src, property)?);
        }
        Ok(records)
    }

    fn forward(
        from: &Observable,
        property: &str,
        to: &Observable,
        to_property: &str,
    ) -> Result<BindingRecord, BindingError> {
        let weak = to.downgrade();
        let to_property = to_property.to_owned();
        let listener = Listener::new(move |event| {
            if let Some(to) = weak.upgrade() {
                to.set(&to_property, event.value.clone());
            }
        });
        Ok(BindingRecord::listen(from.dispatcher(), &change_type(property), listener)?)
    }

    /// Call `setter` with the value of `property` now and on every change.
    pub fn bind_setter(
        &self,
        source: &impl BindingSource,
        property: &str,
        setter: &Value,
    ) -> Result<BindingRecord, BindingError> {
        let src = source.binding_observable().ok_or_else(|| BindingError::NotDispatcher {
            property: property.to_owned(),
        })?;
        let setter = setter.as_callback().cloned().ok_or(BindingError::InvalidSetter)?;
        src.make_bindable(&[property]);
        let call = setter.clone();
        let record = BindingRecord::listen(
            src.dispatcher(),
            &change_type(property),
            Listener::new(move |event| {
                call.call(&event.value);
            }),
        )?;
        setter.call(&src.get(property));
        Ok(record)
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Bind every directive in the view's element. Existing bindings are
    /// removed first, nested views are instantiated, then `bound` is
    /// dispatched on the view.
    pub fn bind_view(&self, view: &View) -> Result<(), BindingError> {
        if view.is_removed() {
            return Err(BindingError::NoView);
        }
        if !view.binding_list().borrow().is_empty() {
            self.unbind_view(view);
        }
        let nested = self.apply_views(view);
        view.adopt_children(nested);

        let document = view.document();
        let elements = scope_elements(document, view.element());
        let options = BindingOptions::for_view(view, self);
        for element in elements {
            let attributes = document.attributes(element);
            let repeat = attributes.iter().find(|(name, _)| name == "cb-repeat").cloned();
            let attributes = match repeat {
                Some(repeat) => vec![repeat],
                None => attributes,
            };
            for (name, value) in attributes {
                if !document.contains(element) {
                    break;
                }
                if is_reserved_attribute(&name) || !self.is_bindable_namespace(&name) {
                    continue;
                }
                self.bind_view_attribute(view, document, element, &name, &value, &options);

                let doc = document.clone();
                scheduler::defer(move || {
                    if !doc.contains(element) {
                        return;
                    }
                    if let Err(err) = doc.dispatch(element, BIND) {
                        warn!(error = %err, "bind event not dispatched");
                    }
                });
            }
        }

        debug!(bindings = options.tracked(), "view bound");
        view.dispatch_event(Event::typed(BOUND));
        Ok(())
    }

    fn bind_view_attribute(
        &self,
        view: &View,
        document: &Document,
        element: NodeId,
        name: &str,
        value: &str,
        options: &BindingOptions,
    ) {
        let directive = self.directive(name);
        if let Some(directive) = directive.as_ref().filter(|d| d.is_raw()) {
            let options = options.clone().with_property(value);
            Self::invoke(directive, document, element, Value::from(value), None, &options);
            return;
        }

        let multiple = directive.as_ref().is_some_and(Directive::is_multiple);
        for clause in parse_clauses(value, multiple) {
            if let Err(err) = self.bind_clause(view, document, element, name, &clause, directive.as_ref(), options) {
                self.warn(format!("{name}=\"{value}\": {err}"));
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_clause(
        &self,
        view: &View,
        document: &Document,
        element: NodeId,
        name: &str,
        clause: &Clause,
        directive: Option<&Directive>,
        options: &BindingOptions,
    ) -> Result<(), BindingError> {
        if clause.is_empty() || clause.property().is_empty() {
            match directive {
                Some(d) if d.is_read_only() => {
                    Self::invoke(d, document, element, Value::Undefined, None, options);
                }
                _ => self.warn(format!("{name} attributes require a value")),
            }
            return Ok(());
        }

        let scope = view.observable();
        let Some(source) = resolve_owner(scope, clause.owner_path()) else {
            self.warn(format!("{name}: cannot resolve {} on the view", clause.path.join(".")));
            return Ok(());
        };
        let parse = match clause.parse.as_deref() {
            Some(path) => {
                let found = resolve_callback(scope, path);
                if found.is_none() {
                    self.warn(format!("{name}: parse function {path} not found"));
                }
                found
            }
            None => None,
        };

        let records = self.bind_attribute(
            &source,
            clause.property(),
            document,
            element,
            name,
            parse.as_ref(),
            clause.param.as_deref(),
            options,
        )?;
        for record in records {
            options.track(record);
        }
        Ok(())
    }

    /// Release every binding of the view and dispatch `unbound`.
    pub fn unbind_view(&self, view: &View) {
        let options = BindingOptions::for_view(view, self);
        let count = options.tracked();
        options.release_tracked();
        debug!(released = count, "view unbound");
        view.dispatch_event(Event::typed(UNBOUND));
    }

    /// Instantiate nested views: elements with a `cb-view="Name"` attribute,
    /// or whose tag name (`user-card` → `UserCard`) is registered.
    pub fn apply_views(&self, view: &View) -> Vec<View> {
        let document = view.document();
        let root = view.element();
        let registry = view.registry();
        let mut created = Vec::new();

        for element in document.descendants(root) {
            if !document.contains(element) || Self::inside_nested(document, root, element) {
                continue;
            }
            let name = match document.attribute(element, "cb-view") {
                Some(name) => name,
                None => {
                    let name = tag_to_class_name(&document.tag_name(element));
                    if !registry.contains(&name) {
                        continue;
                    }
                    name
                }
            };
            let mut options = ViewOptions::new(document)
                .element(element)
                .binder(self.clone())
                .registry(registry.clone());
            if let Some(context) = view.context() {
                options = options.context(context);
            }
            match registry.create(&name, options) {
                Some(child) => created.push(child),
                None => self.warn(format!("view {name} is not registered")),
            }
        }
        created
    }

    /// Whether `element` is, or sits inside, a view root or repeat template
    /// below `root`.
    fn inside_nested(document: &Document, root: NodeId, element: NodeId) -> bool {
        let mut current = Some(element);
        while let Some(node) = current {
            if node == root {
                return false;
            }
            if document.has_class(node, "cb-view") || document.has_attribute(node, "cb-repeat") {
                return true;
            }
            current = document.parent(node);
        }
        false
    }
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("log_enabled", &self.log_enabled())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input(document: &Document, markup: &str) -> NodeId {
        let holder = document.create_element("div");
        document.set_inner_html(holder, markup).unwrap();
        document.element_children(holder)[0]
    }

    // ── Element binding ────────────────────────────────────────────

    #[test]
    fn text_input_two_way() {
        let doc = Document::new();
        let el = input(&doc, "<input type=\"text\">");
        let source = Observable::new();
        source.set("p", "x");
        Binder::new().bind_element(&source, "p", &doc, el, None).unwrap();

        assert_eq!(doc.value(el), "x");
        source.set("p", "y");
        assert_eq!(doc.value(el), "y");
        doc.simulate_input(el, "z").unwrap();
        assert_eq!(source.get("p"), Value::from("z"));
    }

    #[test]
    fn numeric_input_is_coerced() {
        let doc = Document::new();
        let el = input(&doc, "<input>");
        let source = Observable::new();
        Binder::new().bind_element(&source, "age", &doc, el, None).unwrap();
        assert_eq!(doc.value(el), "");
        doc.simulate_input(el, "42").unwrap();
        assert_eq!(source.get("age"), Value::from(42));
    }

    #[test]
    fn checkbox_uses_checked() {
        let doc = Document::new();
        let el = input(&doc, "<input type=\"checkbox\">");
        let source = Observable::new();
        source.set("on", true);
        Binder::new().bind_element(&source, "on", &doc, el, None).unwrap();
        assert!(doc.property(el, "checked").is_truthy());
        doc.click(el).unwrap();
        assert_eq!(source.get("on"), Value::from(false));
    }

    #[test]
    fn radio_group_tracks_value() {
        let doc = Document::new();
        let form = doc.create_element("form");
        doc.set_inner_html(
            form,
            "<input type=\"radio\" name=\"c\" value=\"red\"><input type=\"radio\" name=\"c\" value=\"blue\">",
        )
        .unwrap();
        let radios = doc.element_children(form);
        let source = Observable::new();
        source.set("colour", "blue");
        let binder = Binder::new();
        for &radio in &radios {
            binder.bind_element(&source, "colour", &doc, radio, None).unwrap();
        }
        assert!(doc.property(radios[1], "checked").is_truthy());
        doc.click(radios[0]).unwrap();
        assert_eq!(source.get("colour"), Value::from("red"));
        assert!(!doc.property(radios[1], "checked").is_truthy());
    }

    #[test]
    fn content_element_is_one_way() {
        let doc = Document::new();
        let el = doc.create_element("span");
        let source = Observable::new();
        let shout = Callback::new(|v| Value::from(v.to_display_string().to_uppercase()));
        let records = Binder::new()
            .bind_element(&source, "label", &doc, el, Some(&shout))
            .unwrap();
        assert_eq!(records.len(), 1);
        source.set("label", "hi");
        assert_eq!(doc.inner_html(el), "HI");
    }

    #[test]
    fn missing_element_is_an_error() {
        let doc = Document::new();
        let el = doc.create_element("input");
        doc.remove(el);
        let result = Binder::new().bind_element(&Observable::new(), "p", &doc, el, None);
        assert!(matches!(result, Err(BindingError::MissingElement)));
    }

    // ── Attribute binding ──────────────────────────────────────────

    #[test]
    fn directive_follows_changes_until_released() {
        let doc = Document::new();
        let el = doc.create_element("div");
        let binder = Binder::new();
        let options = BindingOptions::new(&binder);
        let source = Observable::new();
        source.set("visible", false);
        let records = binder
            .bind_attribute(&source, "visible", &doc, el, "cb-show", None, None, &options)
            .unwrap();
        assert!(doc.has_class(el, "cb-hide"));
        source.set("visible", true);
        assert!(!doc.has_class(el, "cb-hide"));

        for record in &records {
            record.release();
        }
        source.set("visible", false);
        assert!(!doc.has_class(el, "cb-hide"));
    }

    #[test]
    fn native_property_bridge() {
        let doc = Document::new();
        let el = input(&doc, "<input>");
        let binder = Binder::new();
        let options = BindingOptions::new(&binder);
        let source = Observable::new();
        source.set("tip", "hello");
        binder
            .bind_attribute(&source, "tip", &doc, el, "cb-title", None, None, &options)
            .unwrap();
        assert_eq!(doc.attribute(el, "title").as_deref(), Some("hello"));

        source.set("locked", 1);
        binder
            .bind_attribute(&source, "locked", &doc, el, "cb-disabled", None, None, &options)
            .unwrap();
        assert!(doc.has_attribute(el, "disabled"));
        source.set("locked", 0);
        assert!(!doc.has_attribute(el, "disabled"));
    }

    #[test]
    fn native_event_calls_callback() {
        let doc = Document::new();
        let el = doc.create_element("button");
        let binder = Binder::new();
        let options = BindingOptions::new(&binder);
        let source = Observable::new();
        let seen = Rc::new(RefCell::new(String::new()));
        let s = seen.clone();
        source.set(
            "save",
            Callback::new(move |detail| {
                if let Value::Object(map) = detail {
                    *s.borrow_mut() = map["type"].to_display_string();
                }
                Value::Undefined
            }),
        );
        let records = binder
            .bind_attribute(&source, "save", &doc, el, "cb-onclick", None, None, &options)
            .unwrap();
        doc.click(el).unwrap();
        assert_eq!(*seen.borrow(), "click");
        assert_eq!(records[0].event_type(), Some("click"));
    }

    #[test]
    fn unknown_and_foreign_attributes_bind_nothing() {
        let doc = Document::new();
        let el = doc.create_element("div");
        let binder = Binder::new();
        binder.set_log_enabled(false);
        let options = BindingOptions::new(&binder);
        let source = Observable::new();
        for name in ["cb-nonsense", "cb-click", "data-x", "cb-view", "class"] {
            let records = binder
                .bind_attribute(&source, "p", &doc, el, name, None, None, &options)
                .unwrap();
            assert!(records.is_empty(), "{name}");
        }
    }

    // ── Registration ───────────────────────────────────────────────

    #[test]
    fn custom_attribute_registration() {
        let binder = Binder::new();
        binder.set_log_enabled(false);
        assert!(binder.register_attribute("myColour", Directive::new(|c| {
            c.document.set_style(c.element, "color", &c.value.to_display_string());
        })));
        assert!(binder.attribute_exists("my-colour"));
        assert!(binder.attribute_exists("myColour"));
        assert!(!binder.register_attribute("cbThing", Directive::new(|_| {})));
        assert!(!binder.register_attribute("plain", Directive::new(|_| {})));
        assert_eq!(
            binder.register_attributes([
                ("xA", Directive::new(|_| {})),
                ("dataB", Directive::new(|_| {})),
            ]),
            1
        );

        let doc = Document::new();
        let el = doc.create_element("p");
        let source = Observable::new();
        source.set("tint", "red");
        binder
            .bind_attribute(&source, "tint", &doc, el, "my-colour", None, None, &BindingOptions::new(&binder))
            .unwrap();
        assert_eq!(doc.style(el, "color").as_deref(), Some("red"));
    }

    #[test]
    fn apply_attribute_only_for_read_only() {
        let doc = Document::new();
        let el = input(&doc, "<input value=\"a\">");
        let binder = Binder::new();
        binder.set_log_enabled(false);
        let records = binder.apply_attribute(&doc, el, "cb-detect-change").unwrap();
        assert!(doc.has_class(el, "cb-unchanged"));
        assert!(binder.apply_attribute(&doc, el, "cb-show").is_none());
        assert!(binder.apply_attribute(&doc, el, "cb-nothing").is_none());

        assert_eq!(records.len(), 1);
        let dispatcher = doc.dispatcher(el).unwrap();
        assert!(dispatcher.has_event_listener("input", None, None));
        for record in records {
            record.release();
        }
        assert!(!dispatcher.has_event_listener("input", None, None));
        assert!(!dispatcher.has_event_listener("change", None, None));
    }

    // ── Entity to entity ───────────────────────────────────────────

    #[test]
    fn bind_property_one_and_two_way() {
        let binder = Binder::new();
        let a = Hash::new();
        let b = Hash::new();
        a.set("n", 1);
        binder.bind_property(&a, "n", &b, Some("m"), false).unwrap();
        assert_eq!(b.get("m"), Value::from(1));
        a.set("n", 2);
        assert_eq!(b.get("m"), Value::from(2));
        b.set("m", 3);
        assert_eq!(a.get("n"), Value::from(2));

        let c = Hash::new();
        binder.bind_property(&a, "n", &c, None, true).unwrap();
        c.set("n", 9);
        assert_eq!(a.get("n"), Value::from(9));
        assert_eq!(b.get("m"), Value::from(9));
    }

    #[test]
    fn bind_property_needs_dispatchers() {
        let binder = Binder::new();
        let result = binder.bind_property(&Value::from(1), "n", &Hash::new(), None, false);
        assert!(matches!(result, Err(BindingError::NotDispatcher { .. })));
    }

    #[test]
    fn bind_setter_requires_callback() {
        let binder = Binder::new();
        let hash = Hash::new();
        hash.set("n", 5);
        let seen = Rc::new(Cell::new(0.0));
        let s = seen.clone();
        let setter = Value::from(Callback::new(move |v| {
            s.set(v.as_f64().unwrap_or_default());
            Value::Undefined
        }));
        let record = binder.bind_setter(&hash, "n", &setter).unwrap();
        assert_eq!(seen.get(), 5.0);
        hash.set("n", 6);
        assert_eq!(seen.get(), 6.0);
        record.release();
        hash.set("n", 7);
        assert_eq!(seen.get(), 6.0);

        assert!(matches!(
            binder.bind_setter(&hash, "n", &Value::from("nope")),
            Err(BindingError::InvalidSetter)
        ));
    }

    // ── View binding ───────────────────────────────────────────────

    #[test]
    fn bind_event_skips_elements_removed_before_flush() {
        scheduler::clear();
        let doc = Document::new();
        let view = View::new(
            ViewOptions::new(&doc)
                .property("label", "x")
                .template("<b cb-text=\"label\"></b><i cb-text=\"label\"></i>"),
        );
        let children = doc.element_children(view.element());
        let seen = Rc::new(Cell::new(0));
        for &element in &children {
            let s = seen.clone();
            doc.add_event_listener(element, BIND, Listener::new(move |_| s.set(s.get() + 1)))
                .unwrap();
        }
        doc.remove(children[0]);
        scheduler::flush();
        assert_eq!(seen.get(), 1);
    }

    // ── Helpers ────────────────────────────────────────────────────

    #[test]
    fn default_parse_blanks_undefined() {
        assert_eq!(default_parse(&Value::Undefined), Value::from(""));
        assert_eq!(default_parse(&Value::Null), Value::Null);
    }

    #[test]
    fn set_value_skips_equal() {
        let obs = Observable::new();
        obs.make_bindable(&["n"]);
        obs.set("n", 3);
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        obs.add_event_listener("change:n", Listener::new(move |_| h.set(h.get() + 1)))
            .unwrap();
        set_value(&obs, "n", Value::from("3"));
        assert_eq!(hits.get(), 0);
        set_value(&obs, "n", Value::from("4"));
        assert_eq!(obs.get("n"), Value::from(4));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn tag_names_become_view_names() {
        assert_eq!(tag_to_class_name("user-card"), "UserCard");
        assert_eq!(tag_to_class_name("div"), "Div");
    }

    #[test]
    fn view_context_is_used_for_nested_views() {
        let context = Context::new();
        let doc = Document::new();
        let view = View::new(ViewOptions::new(&doc).context(context.clone()));
        assert!(view.context().is_some_and(|c| c.ptr_eq(&context)));
    }
}
