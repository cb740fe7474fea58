//! View: an element, a property scope and the bindings between them.
//!
//! Lifecycle:
//!
//! 1. construction: the element is created or adopted and marked `cb-view`,
//!    options are applied and the context injects its singletons;
//! 2. [`init_template`](View::init_template) or
//!    [`load_template`](View::load_template) fills the element;
//! 3. `templateloaded`, binding (`bound`), then a deferred `init`;
//! 4. [`remove`](View::remove) unbinds and releases everything.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use super::registry::ViewRegistry;
use super::template::{TemplateError, TemplateLoader};
use crate::binding::{Binder, BindingError, BindingRecord};
use crate::context::Context;
use crate::dom::{Document, NodeId};
use crate::event::{Dispatcher, Event, DETACH, INIT, REMOVE, TEMPLATE_ERROR, TEMPLATE_LOADED};
use crate::reactive::{scheduler, Bindable, EventTarget, Injectable, Observable};
use crate::value::Value;

/// Class marking view root elements.
pub const VIEW_CLASS: &str = "cb-view";

/// Attribute marking where captured content is placed in a template.
pub const CONTENT_ATTRIBUTE: &str = "cb-content";

type Setup = Rc<dyn Fn(&View)>;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Construction options for a [`View`].
#[derive(Clone)]
pub struct ViewOptions {
    document: Document,
    pub element: Option<NodeId>,
    pub tag_name: String,
    pub id: Option<String>,
    pub class_name: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub context: Option<Context>,
    pub binder: Option<Binder>,
    pub registry: Option<ViewRegistry>,
    pub template: Option<String>,
    pub template_url: Option<String>,
    pub data: Option<Value>,
    pub properties: Vec<(String, Value)>,
    /// Run [`View::init_template`] at the end of construction.
    pub auto_init_template: bool,
    pub template_cache_enabled: bool,
    pub name: Option<String>,
    setup: Option<Setup>,
}

impl ViewOptions {
    pub fn new(document: &Document) -> Self {
        Self {
            document: document.clone(),
            element: None,
            tag_name: "div".to_owned(),
            id: None,
            class_name: None,
            attributes: Vec::new(),
            context: None,
            binder: None,
            registry: None,
            template: None,
            template_url: None,
            data: None,
            properties: Vec::new(),
            auto_init_template: true,
            template_cache_enabled: true,
            name: None,
            setup: None,
        }
    }

    /// Adopt an existing element instead of creating one (builder).
    pub fn element(mut self, element: NodeId) -> Self {
        self.element = Some(element);
        self
    }

    pub fn tag_name(mut self, tag: &str) -> Self {
        self.tag_name = tag.to_ascii_lowercase();
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_owned());
        self
    }

    /// Space-separated classes added to the element (builder).
    pub fn class_name(mut self, classes: &str) -> Self {
        self.class_name = Some(classes.to_owned());
        self
    }

    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    pub fn binder(mut self, binder: Binder) -> Self {
        self.binder = Some(binder);
        self
    }

    pub fn registry(mut self, registry: ViewRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Markup placed into the element on [`View::init_template`] (builder).
    pub fn template(mut self, markup: &str) -> Self {
        self.template = Some(markup.to_owned());
        self
    }

    /// URL for [`View::load_template`] (builder).
    pub fn template_url(mut self, url: &str) -> Self {
        self.template_url = Some(url.to_owned());
        self
    }

    pub fn data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Initial bindable property (builder).
    pub fn property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.push((name.to_owned(), value.into()));
        self
    }

    pub fn auto_init_template(mut self, enabled: bool) -> Self {
        self.auto_init_template = enabled;
        self
    }

    pub fn template_cache_enabled(mut self, enabled: bool) -> Self {
        self.template_cache_enabled = enabled;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_owned());
        self
    }

    /// Hook run after options are applied and before the template is
    /// initialized; the place to define callbacks the markup refers to.
    pub fn setup(mut self, setup: impl Fn(&View) + 'static) -> Self {
        self.setup = Some(Rc::new(setup));
        self
    }
}

impl fmt::Debug for ViewOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewOptions")
            .field("element", &self.element)
            .field("tag_name", &self.tag_name)
            .field("name", &self.name)
            .field("template", &self.template.is_some())
            .field("template_url", &self.template_url)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

struct ViewInner {
    observable: Observable,
    document: Document,
    element: NodeId,
    removed: Cell<bool>,
    context: RefCell<Option<Context>>,
    binder: Binder,
    records: Rc<RefCell<Vec<BindingRecord>>>,
    registry: ViewRegistry,
    name: Option<String>,
    template: RefCell<Option<String>>,
    template_url: RefCell<Option<String>>,
    template_cache_enabled: bool,
    /// Children the element had before its template replaced them.
    content: RefCell<Vec<NodeId>>,
    /// Views instantiated from markup inside this one.
    children: RefCell<Vec<View>>,
}

/// A view. Cheap to clone; clones are the same view.
#[derive(Clone)]
pub struct View(Rc<ViewInner>);

/// Non-owning handle to a [`View`].
#[derive(Clone)]
pub struct WeakView(Weak<ViewInner>);

impl WeakView {
    pub fn upgrade(&self) -> Option<View> {
        self.0.upgrade().map(View)
    }
}

impl View {
    pub fn new(options: ViewOptions) -> Self {
        let ViewOptions {
            document,
            element,
            tag_name,
            id,
            class_name,
            attributes,
            context,
            binder,
            registry,
            template,
            template_url,
            data,
            properties,
            auto_init_template,
            template_cache_enabled,
            name,
            setup,
        } = options;

        let element = element
            .filter(|&e| document.is_element(e))
            .unwrap_or_else(|| document.create_element(&tag_name));
        if let Some(id) = &id {
            document.set_attribute(element, "id", id);
        }
        for (attr, value) in &attributes {
            document.set_attribute(element, attr, value);
        }
        if let Some(classes) = &class_name {
            document.add_class(element, classes);
        }
        document.add_class(element, VIEW_CLASS);

        let content = if template.is_some() || template_url.is_some() {
            let children = document.children(element);
            for &child in &children {
                document.detach(child);
            }
            children
        } else {
            Vec::new()
        };

        let registry = registry
            .or_else(|| context.as_ref().map(|c| c.registry().clone()))
            .unwrap_or_default();

        let view = Self(Rc::new(ViewInner {
            observable: Observable::new(),
            document,
            element,
            removed: Cell::new(false),
            context: RefCell::new(None),
            binder: binder.unwrap_or_default(),
            records: Rc::default(),
            registry,
            name,
            template: RefCell::new(template),
            template_url: RefCell::new(template_url),
            template_cache_enabled,
            content: RefCell::new(content),
            children: RefCell::new(Vec::new()),
        }));

        let obs = view.observable();
        obs.make_bindable(&["currentState", "data"]);
        if let Some(data) = data {
            obs.set("data", data);
        }
        for (name, value) in properties {
            obs.set(&name, value);
            obs.make_bindable(&[name.as_str()]);
        }
        view.set_context(context);
        if let Some(setup) = setup {
            setup(&view);
        }
        debug!(name = view.name().unwrap_or("View"), "view created");

        if auto_init_template {
            view.init_template();
        }
        view
    }

    pub fn ptr_eq(&self, other: &View) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakView {
        WeakView(Rc::downgrade(&self.0))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn document(&self) -> &Document {
        &self.0.document
    }

    pub fn element(&self) -> NodeId {
        self.0.element
    }

    pub fn binder(&self) -> &Binder {
        &self.0.binder
    }

    pub fn registry(&self) -> ViewRegistry {
        self.0.registry.clone()
    }

    /// The name the view was registered or created under.
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn is_removed(&self) -> bool {
        self.0.removed.get()
    }

    pub fn is_bound(&self) -> bool {
        !self.0.records.borrow().is_empty()
    }

    /// Number of live bindings owned by the view.
    pub fn binding_count(&self) -> usize {
        self.0.records.borrow().len()
    }

    /// Views created from this view's markup (`cb-view` elements).
    pub fn child_views(&self) -> Vec<View> {
        self.0.children.borrow().clone()
    }

    pub(crate) fn adopt_children(&self, views: Vec<View>) {
        self.0.children.borrow_mut().extend(views);
    }

    pub(crate) fn binding_list(&self) -> Rc<RefCell<Vec<BindingRecord>>> {
        self.0.records.clone()
    }

    pub fn current_state(&self) -> Value {
        self.get("currentState")
    }

    pub fn set_current_state(&self, state: &str) {
        self.observable().set("currentState", state);
    }

    pub fn template(&self) -> Option<String> {
        self.0.template.borrow().clone()
    }

    pub fn set_template(&self, markup: &str) {
        *self.0.template.borrow_mut() = Some(markup.to_owned());
    }

    pub fn template_url(&self) -> Option<String> {
        self.0.template_url.borrow().clone()
    }

    /// The element marked `cb-content` inside the view, else the view's
    /// element.
    pub fn body(&self) -> NodeId {
        self.content_slot().unwrap_or(self.0.element)
    }

    fn content_slot(&self) -> Option<NodeId> {
        self.document()
            .query_by_attribute(self.0.element, CONTENT_ATTRIBUTE)
            .into_iter()
            .next()
    }

    // -----------------------------------------------------------------------
    // Templates
    // -----------------------------------------------------------------------

    /// Fill the element from the string template, if any, then bind. A view
    /// with only a template URL waits for [`load_template`](Self::load_template).
    pub fn init_template(&self) {
        if self.is_removed() {
            return;
        }
        let template = self.template();
        match template {
            Some(markup) => {
                if self.is_bound() {
                    self.unbind_view();
                }
                self.remove_children();
                if let Err(err) = self.document().set_inner_html(self.0.element, &markup) {
                    self.template_failed(TemplateError::from(err));
                }
                self.init_view();
            }
            None if self.template_url().is_some() => {
                debug!("template url set, waiting for load_template");
            }
            None => self.init_view(),
        }
    }

    /// Load markup for `url` through `loader`, then bind. Failures dispatch
    /// `templateerror` and leave the element empty; the view is still bound.
    pub async fn load_template<L: TemplateLoader>(&self, loader: &L, url: &str) {
        if self.is_removed() {
            return;
        }
        *self.0.template_url.borrow_mut() = Some(url.to_owned());
        if self.is_bound() {
            self.unbind_view();
        }

        let result = if self.0.template_cache_enabled {
            loader.load(url).await
        } else {
            loader.load_fresh(url).await
        };
        if self.is_removed() {
            return;
        }

        self.remove_children();
        let loaded = result.and_then(|markup| {
            self.document()
                .set_inner_html(self.0.element, &markup)
                .map_err(TemplateError::from)
        });
        if let Err(err) = loaded {
            self.template_failed(err);
        }
        self.init_view();
    }

    /// Remove the nested views created from the current markup.
    fn remove_children(&self) {
        let children = std::mem::take(&mut *self.0.children.borrow_mut());
        for child in children {
            child.remove();
        }
    }

    fn template_failed(&self, err: TemplateError) {
        warn!(error = %err, "template failed");
        self.document().empty(self.0.element);
        self.dispatch_event(Event::typed(TEMPLATE_ERROR).with_data(err.to_string()));
    }

    /// Put the captured content into the `cb-content` slot, or drop it when
    /// the template has none.
    fn restore_content(&self) {
        let content = std::mem::take(&mut *self.0.content.borrow_mut());
        if content.is_empty() {
            return;
        }
        let document = self.document();
        match self.content_slot() {
            Some(slot) => {
                for node in content {
                    document.append_child(slot, node);
                }
            }
            None => {
                for node in content {
                    document.remove(node);
                }
            }
        }
    }

    fn init_view(&self) {
        self.restore_content();
        self.dispatch_event(Event::typed(TEMPLATE_LOADED));
        if let Err(err) = self.bind_view() {
            warn!(error = %err, "view could not be bound");
        }
        let weak = self.downgrade();
        scheduler::defer(move || {
            if let Some(view) = weak.upgrade().filter(|v| !v.is_removed()) {
                view.dispatch_event(Event::typed(INIT));
            }
        });
    }

    // -----------------------------------------------------------------------
    // Binding
    // -----------------------------------------------------------------------

    /// Bind every directive in the element; dispatches `bound`.
    pub fn bind_view(&self) -> Result<(), BindingError> {
        self.0.binder.bind_view(self)
    }

    /// Release every binding; dispatches `unbound`.
    pub fn unbind_view(&self) {
        self.0.binder.unbind_view(self);
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    /// Append the views' elements to [`body`](Self::body).
    pub fn append_view(&self, views: &[View]) -> &Self {
        let body = self.body();
        for view in views {
            self.document().append_child(body, view.element());
        }
        self
    }

    /// Prepend the views' elements to [`body`](Self::body), keeping their
    /// order.
    pub fn prepend_view(&self, views: &[View]) -> &Self {
        let body = self.body();
        for view in views.iter().rev() {
            self.document().prepend_child(body, view.element());
        }
        self
    }

    /// Take the element out of the document, keeping bindings.
    pub fn detach(&self) -> &Self {
        self.document().detach(self.0.element);
        self.dispatch_event(Event::typed(DETACH));
        self
    }

    /// Tear the view down: dispatch `remove`, unbind, drop every listener,
    /// destroy the element and release injected singletons.
    pub fn remove(&self) {
        if self.is_removed() {
            return;
        }
        self.dispatch_event(Event::typed(REMOVE));
        self.unbind_view();
        self.0.removed.set(true);
        self.remove_children();
        self.dispatcher().remove_event_listener(None, None, None);
        self.document().remove(self.0.element);

        self.observable().set("data", Value::Undefined);
        self.uninject();
        if let Some(context) = self.context() {
            context.remove_event_listener(None, None, Some(self.dispatcher().scope()));
        }
        *self.0.context.borrow_mut() = None;
        debug!(name = self.name().unwrap_or("View"), "view removed");
    }
}

impl EventTarget for View {
    fn dispatcher(&self) -> &Dispatcher {
        self.0.observable.dispatcher()
    }
}

impl Bindable for View {
    fn observable(&self) -> &Observable {
        &self.0.observable
    }
}

impl Injectable for View {
    fn context_cell(&self) -> &RefCell<Option<Context>> {
        &self.0.context
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.0.name)
            .field("element", &self.0.element)
            .field("bindings", &self.binding_count())
            .field("removed", &self.is_removed())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
