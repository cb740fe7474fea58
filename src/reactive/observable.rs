//! Observable: a dispatcher plus a table of property slots.
//!
//! Every entity (hashes, lists, views, contexts) is built on an `Observable`.
//! Bindable properties notify `change:<name>` and then `change` whenever a
//! write changes their value; writes of a deep-equal value are dropped.
//!
//! ```ignore
//! let obs = Observable::new();
//! obs.set("name", "Conbo");
//! obs.make_bindable(&["name"]);
//! obs.set("name", "Tether"); // dispatches change:name, change
//! obs.set("name", "Tether"); // no-op
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::property::{Accessor, Slot};
use super::traits::EventTarget;
use crate::event::{Dispatcher, Event};
use crate::value::Value;

struct ObservableInner {
    dispatcher: Dispatcher,
    slots: RefCell<BTreeMap<String, Slot>>,
}

/// Shared handle to a property table and its dispatcher.
#[derive(Clone)]
pub struct Observable(Rc<ObservableInner>);

/// Non-owning handle to an [`Observable`].
#[derive(Clone)]
pub struct WeakObservable(Weak<ObservableInner>);

impl WeakObservable {
    pub fn upgrade(&self) -> Option<Observable> {
        self.0.upgrade().map(Observable)
    }
}

impl Observable {
    pub fn new() -> Self {
        Self(Rc::new(ObservableInner {
            dispatcher: Dispatcher::new(),
            slots: RefCell::new(BTreeMap::new()),
        }))
    }

    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakObservable {
        WeakObservable(Rc::downgrade(&self.0))
    }

    // -----------------------------------------------------------------------
    // Reads and writes
    // -----------------------------------------------------------------------

    /// Read a property. Missing properties read as `Undefined`.
    pub fn get(&self, name: &str) -> Value {
        let getter = {
            let slots = self.0.slots.borrow();
            match slots.get(name) {
                None => return Value::Undefined,
                Some(Slot::Field { value, .. }) => return value.clone(),
                Some(Slot::Accessor(accessor)) => accessor.get.clone(),
            }
        };
        getter()
    }

    /// Write a property.
    ///
    /// A missing property becomes a plain field. Bindable fields notify when
    /// the value changes. Accessors forward to their setter; read-only
    /// accessors ignore the write.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let setter = {
            let mut slots = self.0.slots.borrow_mut();
            match slots.get_mut(name) {
                None => {
                    slots.insert(name.to_owned(), Slot::plain(value));
                    return;
                }
                Some(Slot::Field {
                    value: current,
                    bindable,
                }) => {
                    if !*bindable {
                        *current = value;
                        return;
                    }
                    if current.deep_eq(&value) {
                        return;
                    }
                    *current = value.clone();
                    None
                }
                Some(Slot::Accessor(accessor)) => match &accessor.set {
                    Some(set) => Some(set.clone()),
                    None => {
                        trace!(property = name, "write to read-only accessor ignored");
                        return;
                    }
                },
            }
        };

        match setter {
            Some(set) => set(value),
            None => self.notify(name, value),
        }
    }

    fn notify(&self, name: &str, value: Value) {
        self.0
            .dispatcher
            .dispatch_event(Event::property_change(name, value.clone(), true));
        self.0
            .dispatcher
            .dispatch_event(Event::property_change(name, value, false));
    }

    /// Dispatch `change:<name>` and `change` for each name with its current
    /// value, whether or not the value actually changed.
    pub fn dispatch_change(&self, names: &[&str]) {
        for name in names {
            let value = self.get(name);
            self.notify(name, value);
        }
    }

    // -----------------------------------------------------------------------
    // Reactivity
    // -----------------------------------------------------------------------

    /// Convert the named properties into bindable fields.
    ///
    /// Missing properties are created as `Undefined`. Properties that are
    /// already bindable, and hand-written accessors, are left untouched.
    pub fn make_bindable(&self, names: &[&str]) {
        let mut slots = self.0.slots.borrow_mut();
        for name in names {
            match slots.get_mut(*name) {
                None => {
                    slots.insert((*name).to_owned(), Slot::bindable(Value::Undefined));
                }
                Some(Slot::Field { bindable, .. }) => *bindable = true,
                Some(Slot::Accessor(_)) => {}
            }
        }
    }

    /// Make every enumerable, non-callback field bindable, plus `extra`.
    pub fn make_all_bindable(&self, extra: &[&str]) {
        let names = self.property_names();
        let mut all: Vec<&str> = names.iter().map(String::as_str).collect();
        all.extend_from_slice(extra);
        self.make_bindable(&all);
    }

    /// Install a hand-written accessor, replacing whatever slot was there.
    pub fn define_accessor(&self, name: &str, accessor: Accessor) {
        self.0
            .slots
            .borrow_mut()
            .insert(name.to_owned(), Slot::Accessor(accessor));
    }

    /// Whether the property reads and writes through an accessor, generated
    /// or hand-written.
    pub fn is_accessor(&self, name: &str) -> bool {
        matches!(
            self.0.slots.borrow().get(name),
            Some(Slot::Accessor(_)) | Some(Slot::Field { bindable: true, .. })
        )
    }

    /// Whether the property has a generated, change-notifying accessor.
    pub fn is_bindable(&self, name: &str) -> bool {
        matches!(
            self.0.slots.borrow().get(name),
            Some(Slot::Field { bindable: true, .. })
        )
    }

    /// Whether a hand-written accessor without a setter guards the property.
    pub fn is_read_only(&self, name: &str) -> bool {
        matches!(
            self.0.slots.borrow().get(name),
            Some(Slot::Accessor(accessor)) if accessor.is_read_only()
        )
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn has_property(&self, name: &str) -> bool {
        self.0.slots.borrow().contains_key(name)
    }

    /// Remove a property entirely. Returns whether it existed.
    pub fn delete_property(&self, name: &str) -> bool {
        self.0.slots.borrow_mut().remove(name).is_some()
    }

    /// Every property name, enumerable or not.
    pub fn keys(&self) -> Vec<String> {
        self.0.slots.borrow().keys().cloned().collect()
    }

    /// Enumerable, non-callback, non-private property names.
    pub fn property_names(&self) -> Vec<String> {
        let names: Vec<String> = self
            .0
            .slots
            .borrow()
            .iter()
            .filter(|(name, slot)| slot.is_enumerable(name))
            .map(|(name, _)| name.clone())
            .collect();
        names
            .into_iter()
            .filter(|name| !self.get(name).is_callback())
            .collect()
    }
}

impl Default for Observable {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTarget for Observable {
    fn dispatcher(&self) -> &Dispatcher {
        &self.0.dispatcher
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("properties", &self.property_names())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
