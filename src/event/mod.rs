//! Event system: event objects, built-in types, dispatch.

pub mod handler;
pub mod message;

pub use handler::{Dispatcher, EventError, Flow, Listener, ListenerOptions, Scope, WeakDispatcher};
pub use message::{
    change_type, Event, ADD, ALL, BIND, BOUND, CHANGE, DETACH, ERROR, FAULT, INIT, REMOVE, RESET,
    RESULT, SORT, TEMPLATE_ERROR, TEMPLATE_LOADED, UNBOUND,
};
