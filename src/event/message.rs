//! Event object and the framework's built-in event types.
//!
//! An [`Event`] is constructed right before a dispatch and discarded after all
//! listeners have run. Change events carry the changed `property` and its new
//! `value`; other events carry an arbitrary `data` payload.

use std::fmt;

use super::handler::{Dispatcher, EventError};
use crate::value::Value;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Wildcard type: listeners registered for it receive every event.
pub const ALL: &str = "*";
/// Registry key the wildcard type is stored under.
pub(crate) const WILDCARD_KEY: &str = "all";

/// A bindable property changed. Also dispatched as `change:<property>`.
pub const CHANGE: &str = "change";
/// Items were added to a list.
pub const ADD: &str = "add";
/// Items were removed from a list, or a view was removed.
pub const REMOVE: &str = "remove";
/// A list was re-sorted.
pub const SORT: &str = "sort";
/// A list's backing sequence was replaced wholesale.
pub const RESET: &str = "reset";
/// An element finished having properties bound to it.
pub const BIND: &str = "bind";
/// All elements of a view are bound.
pub const BOUND: &str = "bound";
/// All elements of a view are unbound.
pub const UNBOUND: &str = "unbound";
/// Template loaded, elements bound, content rendered.
pub const INIT: &str = "init";
/// A view's element was taken out of the document.
pub const DETACH: &str = "detach";
/// Template markup has been applied to a view's element.
pub const TEMPLATE_LOADED: &str = "templateloaded";
/// A template could not be loaded or parsed.
pub const TEMPLATE_ERROR: &str = "templateerror";
/// A result has been received.
pub const RESULT: &str = "result";
/// A fault has occurred.
pub const FAULT: &str = "fault";
/// An error occurred.
pub const ERROR: &str = "error";

/// The `change:<property>` type for a property name.
pub fn change_type(property: &str) -> String {
    format!("{CHANGE}:{property}")
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// One dispatch occurrence.
#[derive(Clone)]
pub struct Event {
    event_type: String,
    /// Arbitrary payload.
    pub data: Value,
    /// For change events: the property that changed.
    pub property: Option<String>,
    /// For change events: the property's new value.
    pub value: Value,
    /// For item events on lists: the item concerned.
    pub item: Value,
    pub(crate) target: Option<Dispatcher>,
    pub(crate) current_target: Option<Dispatcher>,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
}

impl Event {
    /// Create an event of the given type.
    ///
    /// Fails with [`EventError::MissingType`] if the type is empty.
    pub fn new(event_type: impl Into<String>) -> Result<Self, EventError> {
        let event_type = event_type.into();
        if event_type.trim().is_empty() {
            return Err(EventError::MissingType);
        }
        Ok(Self::typed(event_type))
    }

    /// Construct without validation; callers guarantee a non-empty type.
    pub(crate) fn typed(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: Value::Undefined,
            property: None,
            value: Value::Undefined,
            item: Value::Undefined,
            target: None,
            current_target: None,
            default_prevented: false,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
        }
    }

    /// A `change:<property>` event, or a generic `change` event when
    /// `specific` is false, both carrying `{property, value}`.
    pub(crate) fn property_change(property: &str, value: Value, specific: bool) -> Self {
        let event_type = if specific {
            change_type(property)
        } else {
            CHANGE.to_owned()
        };
        let mut event = Self::typed(event_type);
        event.property = Some(property.to_owned());
        event.value = value;
        event
    }

    /// Attach a payload (builder).
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }

    /// Attach an item (builder).
    pub fn with_item(mut self, item: impl Into<Value>) -> Self {
        self.item = item.into();
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The dispatcher that originally emitted this event.
    pub fn target(&self) -> Option<&Dispatcher> {
        self.target.as_ref()
    }

    /// The dispatcher currently running its listeners.
    pub fn current_target(&self) -> Option<&Dispatcher> {
        self.current_target.as_ref()
    }

    /// Prevent whatever the default framework action for this event is.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Mark propagation as stopped. Dispatch is flat, so this only records
    /// intent for consumers that forward events.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    /// Keep the remaining listeners of this dispatch from running.
    pub fn stop_immediate_propagation(&mut self) {
        self.immediate_propagation_stopped = true;
        self.stop_propagation();
    }

    pub fn is_immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.event_type)
            .field("property", &self.property)
            .field("value", &self.value)
            .field("data", &self.data)
            .field("default_prevented", &self.default_prevented)
            .field("immediate_propagation_stopped", &self.immediate_propagation_stopped)
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
