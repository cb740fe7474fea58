//! `cb-repeat`: one item view per list entry.
//!
//! The element carrying the directive is a template. Each render clones it
//! once per item, wraps the clone in an item view and inserts the views
//! before the template, which is then taken out of the document. An empty
//! list leaves the template in place with the `cb-exclude` class.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use super::attributes::{BindingOptions, DirectiveCall, EXCLUDE_CLASS};
use super::record::BindingRecord;
use crate::dom::{Document, NodeId};
use crate::event::{Listener, CHANGE};
use crate::model::List;
use crate::reactive::{EventTarget, Injectable};
use crate::value::Value;
use crate::view::{View, ViewOptions, ViewRegistry};

/// Class added to every repeated item view.
pub const REPEAT_CLASS: &str = "cb-repeat";

/// Everything one `cb-repeat` binding keeps between renders.
struct Repeater {
    document: Document,
    template: NodeId,
    options: BindingOptions,
    /// Name of the item renderer in the view registry.
    renderer: Option<String>,
    list: RefCell<Option<List>>,
    listener: RefCell<Option<Listener>>,
    views: RefCell<Vec<View>>,
}

#[derive(Default)]
pub(crate) struct RepeatState(RefCell<Option<Rc<Repeater>>>);

pub(crate) fn cb_repeat(call: &DirectiveCall<'_>) {
    let state = call.state::<RepeatState>();
    let existing = state.0.borrow().clone();
    let repeater = match existing {
        Some(repeater) => repeater,
        None => {
            let repeater = Rc::new(Repeater {
                document: call.document.clone(),
                template: call.element,
                options: call.options.clone(),
                renderer: call.param.map(str::to_owned),
                list: RefCell::new(None),
                listener: RefCell::new(None),
                views: RefCell::new(Vec::new()),
            });
            let teardown = Rc::downgrade(&repeater);
            call.options.track(BindingRecord::teardown(move || {
                if let Some(repeater) = teardown.upgrade() {
                    repeater.teardown();
                }
            }));
            *state.0.borrow_mut() = Some(repeater.clone());
            repeater
        }
    };
    repeater.render(list_from(&call.value));
}

fn list_from(value: &Value) -> List {
    match value {
        Value::List(list) => list.clone(),
        Value::Array(items) => List::from_vec(items.clone()),
        _ => List::new(),
    }
}

impl Repeater {
    fn registry(&self) -> Option<ViewRegistry> {
        if let Some(view) = self.options.view() {
            return Some(view.registry());
        }
        self.options.context.as_ref().map(|c| c.registry().clone())
    }

    /// Follow `list`, replacing the listener on the previous list.
    fn watch(self: &Rc<Self>, list: &List) {
        let same = self
            .list
            .borrow()
            .as_ref()
            .is_some_and(|current| current.ptr_eq(list));
        if same {
            return;
        }
        self.unwatch();

        let weak = Rc::downgrade(self);
        let listener = Listener::new(move |_| {
            if let Some(repeater) = weak.upgrade() {
                let current = repeater.list.borrow().clone();
                if let Some(list) = current {
                    repeater.render(list);
                }
            }
        });
        if list.add_event_listener(CHANGE, listener.clone()).is_ok() {
            *self.listener.borrow_mut() = Some(listener);
        }
        *self.list.borrow_mut() = Some(list.clone());
    }

    fn unwatch(&self) {
        let previous = self.list.borrow_mut().take();
        let listener = self.listener.borrow_mut().take();
        if let (Some(list), Some(listener)) = (previous, listener) {
            list.remove_event_listener(Some(CHANGE), Some(&listener), None);
        }
    }

    /// Put the template back where the first item view sits, then drop every
    /// item view.
    fn clear(&self) {
        let views = std::mem::take(&mut *self.views.borrow_mut());
        if let Some(first) = views.first() {
            self.document.insert_before(first.element(), self.template);
        }
        for view in views {
            view.remove();
        }
    }

    fn render(self: &Rc<Self>, list: List) {
        let document = &self.document;
        if !document.contains(self.template) {
            return;
        }
        document.remove_class(self.template, EXCLUDE_CLASS);
        self.watch(&list);
        self.clear();

        let registry = self.registry();
        let factory = self
            .renderer
            .as_deref()
            .zip(registry.as_ref())
            .and_then(|(name, registry)| registry.get(name));
        if let (Some(name), None) = (self.renderer.as_deref(), &factory) {
            self.options
                .binder
                .warn(format!("cb-repeat item renderer {name} is not registered"));
        }

        let items = list.to_vec();
        let last = items.len().saturating_sub(1);
        let mut views = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let Some(clone) = document.clone_node(self.template) else {
                continue;
            };
            document.remove_attribute(clone, "cb-repeat");

            let mut options = ViewOptions::new(document)
                .element(clone)
                .class_name(REPEAT_CLASS)
                .binder(self.options.binder.clone())
                .data(item)
                .property("index", Value::from(index))
                .property("isLast", Value::from(index == last))
                .property("list", Value::List(list.clone()));
            if let Some(context) = self.context() {
                options = options.context(context);
            }
            if let Some(registry) = &registry {
                options = options.registry(registry.clone());
            }
            let view = match &factory {
                Some(factory) => factory(options),
                None => View::new(options),
            };
            document.insert_before(self.template, view.element());
            views.push(view);
        }

        debug!(items = views.len(), "cb-repeat rendered");
        if views.is_empty() {
            document.add_class(self.template, EXCLUDE_CLASS);
        } else {
            document.detach(self.template);
        }
        *self.views.borrow_mut() = views;
    }

    fn context(&self) -> Option<crate::context::Context> {
        self.options
            .view()
            .and_then(|view| view.context())
            .or_else(|| self.options.context.clone())
    }

    fn teardown(&self) {
        self.unwatch();
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::attributes::{AttributeTable, DirectiveState};
    use crate::binding::Binder;
    use crate::reactive::Bindable;
    use serde_json::json;

    struct Fixture {
        doc: Document,
        parent: NodeId,
        template: NodeId,
        options: BindingOptions,
        state: DirectiveState,
    }

    fn fixture() -> Fixture {
        let doc = Document::new();
        let parent = doc.create_element("ul");
        doc.set_inner_html(parent, "<li cb-repeat=\"items\" cb-text=\"data.name\"></li>")
            .unwrap();
        let template = doc.element_children(parent)[0];
        Fixture {
            doc,
            parent,
            template,
            options: BindingOptions::new(&Binder::new()),
            state: DirectiveState::default(),
        }
    }

    fn repeat(f: &Fixture, value: Value) {
        let directive = AttributeTable::new().get("cb-repeat").unwrap();
        directive.call(&DirectiveCall {
            document: &f.doc,
            element: f.template,
            value,
            param: None,
            options: &f.options,
            state: &f.state,
        });
    }

    #[test]
    fn renders_one_view_per_item() {
        let f = fixture();
        let list = List::from_vec(vec![
            Value::from(json!({"name": "a"})),
            Value::from(json!({"name": "b"})),
        ]);
        repeat(&f, Value::List(list));

        let items = f.doc.element_children(f.parent);
        assert_eq!(items.len(), 2);
        assert!(!f.doc.is_ancestor(f.parent, f.template));
        assert_eq!(f.doc.text_content(items[0]), "a");
        assert_eq!(f.doc.text_content(items[1]), "b");
        assert!(f.doc.has_class(items[0], REPEAT_CLASS));
        assert!(!f.doc.has_attribute(items[0], "cb-repeat"));
        assert_eq!(f.options.tracked(), 1);
    }

    #[test]
    fn empty_list_excludes_template() {
        let f = fixture();
        repeat(&f, Value::List(List::new()));
        assert_eq!(f.doc.element_children(f.parent), vec![f.template]);
        assert!(f.doc.has_class(f.template, EXCLUDE_CLASS));
    }

    #[test]
    fn list_changes_rerender() {
        let f = fixture();
        let list = List::new();
        repeat(&f, Value::List(list.clone()));
        list.push(json!({"name": "x"}));
        let items = f.doc.element_children(f.parent);
        assert_eq!(items.len(), 1);
        assert_eq!(f.doc.text_content(items[0]), "x");

        list.pop();
        assert_eq!(f.doc.element_children(f.parent), vec![f.template]);
    }

    #[test]
    fn item_views_see_index_and_last() {
        let f = fixture();
        let list = List::from_vec(vec![Value::from(1), Value::from(2), Value::from(3)]);
        repeat(&f, Value::List(list));
        let views: Vec<View> = f.state_views();
        assert_eq!(views[1].get("index"), Value::from(1));
        assert_eq!(views[2].get("isLast"), Value::from(true));
        assert_eq!(views[0].get("isLast"), Value::from(false));
    }

    #[test]
    fn replacing_the_list_drops_old_listener() {
        let f = fixture();
        let first = List::new();
        repeat(&f, Value::List(first.clone()));
        let second = List::from_vec(vec![Value::from(json!({"name": "n"}))]);
        repeat(&f, Value::List(second));
        assert!(!first.has_event_listener(CHANGE, None, None));
        first.push(json!({"name": "ignored"}));
        assert_eq!(f.doc.element_children(f.parent).len(), 1);
    }

    #[test]
    fn teardown_restores_template() {
        let f = fixture();
        let list = List::from_vec(vec![Value::from(json!({"name": "a"}))]);
        repeat(&f, Value::List(list.clone()));
        f.options.release_tracked();
        assert_eq!(f.doc.element_children(f.parent), vec![f.template]);
        assert!(!list.has_event_listener(CHANGE, None, None));
    }

    impl Fixture {
        fn state_views(&self) -> Vec<View> {
            let state = self.state.peek::<RepeatState>().unwrap();
            let repeater = state.0.borrow().clone().unwrap();
            let views = repeater.views.borrow();
            views.clone()
        }
    }
}
