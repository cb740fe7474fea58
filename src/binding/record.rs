//! Binding records: everything a view needs to undo one installed binding.

use std::fmt;
use std::rc::Rc;

use crate::event::{Dispatcher, EventError, Listener};

/// One live synchronization.
///
/// Most records are a listener registration on a dispatcher (an entity or a
/// DOM element). Directives that own more than listeners, such as repeated
/// item views, register a teardown closure instead.
#[derive(Clone)]
pub enum BindingRecord {
    Listener {
        owner: Dispatcher,
        event_type: String,
        handler: Listener,
    },
    Teardown(Rc<dyn Fn()>),
}

impl BindingRecord {
    /// Register `handler` on `owner` and record the registration.
    pub fn listen(owner: &Dispatcher, types: &str, handler: Listener) -> Result<Self, EventError> {
        owner.add_event_listener(types, handler.clone())?;
        Ok(Self::Listener {
            owner: owner.clone(),
            event_type: types.to_owned(),
            handler,
        })
    }

    pub fn teardown(f: impl Fn() + 'static) -> Self {
        Self::Teardown(Rc::new(f))
    }

    /// Undo the binding. Releasing twice is harmless.
    pub fn release(&self) {
        match self {
            Self::Listener {
                owner,
                event_type,
                handler,
            } => owner.remove_event_listener(Some(event_type), Some(handler), None),
            Self::Teardown(f) => f(),
        }
    }

    /// The event type a listener record is subscribed to.
    pub fn event_type(&self) -> Option<&str> {
        match self {
            Self::Listener { event_type, .. } => Some(event_type),
            Self::Teardown(_) => None,
        }
    }

    /// Whether this record listens on `dispatcher`.
    pub fn is_owned_by(&self, dispatcher: &Dispatcher) -> bool {
        matches!(self, Self::Listener { owner, .. } if owner.ptr_eq(dispatcher))
    }
}

impl fmt::Debug for BindingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listener { event_type, .. } => write!(f, "BindingRecord({event_type})"),
            Self::Teardown(_) => f.write_str("BindingRecord(teardown)"),
        }
    }
}
