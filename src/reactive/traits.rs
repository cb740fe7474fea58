//! Capability traits shared by entities.
//!
//! - [`EventTarget`]: owns a [`Dispatcher`]; gains the listener API.
//! - [`Bindable`]: owns an [`Observable`]; gains property access.
//! - [`Injectable`]: may hold a [`Context`]; gains singleton injection.

use std::cell::RefCell;

use crate::context::Context;
use crate::event::{Dispatcher, Event, EventError, Listener, ListenerOptions, Scope};
use crate::value::Value;

use super::observable::Observable;

/// Anything that can register listeners and dispatch events.
pub trait EventTarget {
    fn dispatcher(&self) -> &Dispatcher;

    fn add_event_listener(&self, types: &str, handler: Listener) -> Result<(), EventError> {
        self.dispatcher().add_event_listener(types, handler)
    }

    fn add_event_listener_with(
        &self,
        types: &str,
        handler: Listener,
        options: ListenerOptions,
    ) -> Result<(), EventError> {
        self.dispatcher()
            .add_event_listener_with(types, handler, options)
    }

    fn remove_event_listener(
        &self,
        types: Option<&str>,
        handler: Option<&Listener>,
        scope: Option<Scope>,
    ) {
        self.dispatcher()
            .remove_event_listener(types, handler, scope)
    }

    fn has_event_listener(
        &self,
        event_type: &str,
        handler: Option<&Listener>,
        scope: Option<Scope>,
    ) -> bool {
        self.dispatcher()
            .has_event_listener(event_type, handler, scope)
    }

    fn dispatch_event(&self, event: Event) -> Event {
        self.dispatcher().dispatch_event(event)
    }
}

/// Anything with an observable property table.
pub trait Bindable: EventTarget {
    fn observable(&self) -> &Observable;

    fn get(&self, name: &str) -> Value {
        self.observable().get(name)
    }

    fn set(&self, name: &str, value: impl Into<Value>)
    where
        Self: Sized,
    {
        self.observable().set(name, value)
    }

    fn make_bindable(&self, names: &[&str]) {
        self.observable().make_bindable(names)
    }

    fn dispatch_change(&self, names: &[&str]) {
        self.observable().dispatch_change(names)
    }
}

/// Anything that can receive singletons from a [`Context`].
pub trait Injectable: Bindable {
    /// Storage for the current context.
    fn context_cell(&self) -> &RefCell<Option<Context>>;

    fn context(&self) -> Option<Context> {
        self.context_cell().borrow().clone()
    }

    /// Attach (or detach) a context. Attaching fills undefined properties
    /// whose names match the context's singletons.
    fn set_context(&self, context: Option<Context>) {
        let unchanged = match (self.context_cell().borrow().as_ref(), context.as_ref()) {
            (Some(current), Some(next)) => current.ptr_eq(next),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        if let Some(context) = &context {
            context.inject_singletons(self.observable());
        }
        *self.context_cell().borrow_mut() = context;
    }

    /// Reset every property matching a singleton of the current context.
    fn uninject(&self) {
        if let Some(context) = self.context() {
            context.uninject_singletons(self.observable());
        }
    }
}
