//! # tether
//!
//! A reactive MVC binding framework: observable properties, an event bus,
//! bindable collections and declarative `cb-*` directives over a headless DOM.
//!
//! Entities announce writes as `change:<name>` and `change` events. Views scan
//! their markup for directives and keep the DOM in step with those events,
//! and form controls write back the other way.
//!
//! ## Core Systems
//!
//! - **[`value`]**: the dynamic [`Value`](value::Value) held by every property
//! - **[`event`]**: event objects, prioritized listeners, dispatch
//! - **[`reactive`]**: observable property tables and the deferred task queue
//! - **[`model`]**: [`Hash`](model::Hash) and [`List`](model::List) entities
//! - **[`context`]**: singleton injection, command mapping and the app event bus
//! - **[`dom`]**: slotmap-backed document with a markup parser and serializer
//! - **[`binding`]**: the directive table and the [`Binder`](binding::Binder)
//! - **[`view`]**: views, templates and the view registry
//! - **[`app`]**: the application root
//! - **[`testing`]**: headless pilot and snapshot helpers

// Foundation
pub mod value;

// Events and reactivity
pub mod event;
pub mod reactive;

// Entities
pub mod context;
pub mod model;

// Document and bindings
pub mod binding;
pub mod dom;

// Views
pub mod app;
pub mod view;

// Test support
pub mod testing;

/// Common imports.
pub mod prelude {
    pub use crate::app::{AppConfig, Application};
    pub use crate::binding::{Binder, BindingRecord, Directive, DirectiveCall};
    pub use crate::context::{Command, CommandFactory, Context};
    pub use crate::dom::{Document, NodeId};
    pub use crate::event::{Dispatcher, Event, Listener, ListenerOptions};
    pub use crate::model::{Hash, ItemClass, List};
    pub use crate::reactive::{Bindable, EventTarget, Injectable, Observable};
    pub use crate::value::{Callback, Map, Value};
    pub use crate::view::{View, ViewOptions, ViewRegistry};
}
