//! Property slots: the storage behind an [`Observable`](super::Observable).
//!
//! A slot is either a field (plain or bindable) or a hand-written accessor.
//! Bindable fields are the generated accessors: reads return the stored value,
//! writes are deep-equality gated and notify the owner's dispatcher.

use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// Names starting with this marker are private: non-enumerable and excluded
/// from JSON snapshots.
pub const PRIVATE_PREFIX: char = '_';

/// Whether a property name is private.
pub fn is_private(name: &str) -> bool {
    name.starts_with(PRIVATE_PREFIX)
}

/// A hand-written getter/setter pair. The framework never rewrites these.
#[derive(Clone)]
pub struct Accessor {
    pub(crate) get: Rc<dyn Fn() -> Value>,
    pub(crate) set: Option<Rc<dyn Fn(Value)>>,
    pub(crate) enumerable: bool,
}

impl Accessor {
    /// A read-only accessor. Writes through [`Observable::set`](super::Observable::set)
    /// are ignored.
    pub fn new(get: impl Fn() -> Value + 'static) -> Self {
        Self {
            get: Rc::new(get),
            set: None,
            enumerable: true,
        }
    }

    /// Attach a setter (builder).
    pub fn with_setter(mut self, set: impl Fn(Value) + 'static) -> Self {
        self.set = Some(Rc::new(set));
        self
    }

    /// Exclude from [`property_names`](super::Observable::property_names) (builder).
    pub fn hidden(mut self) -> Self {
        self.enumerable = false;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.set.is_none()
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("read_only", &self.is_read_only())
            .field("enumerable", &self.enumerable)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Field { value: Value, bindable: bool },
    Accessor(Accessor),
}

impl Slot {
    pub(crate) fn plain(value: Value) -> Self {
        Slot::Field {
            value,
            bindable: false,
        }
    }

    pub(crate) fn bindable(value: Value) -> Self {
        Slot::Field {
            value,
            bindable: true,
        }
    }

    /// Whether the slot shows up when enumerating an object's properties.
    pub(crate) fn is_enumerable(&self, name: &str) -> bool {
        if is_private(name) {
            return false;
        }
        match self {
            Slot::Field { .. } => true,
            Slot::Accessor(accessor) => accessor.enumerable,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_names() {
        assert!(is_private("_secret"));
        assert!(!is_private("secret"));
        assert!(!is_private(""));
    }

    #[test]
    fn accessor_builder() {
        let accessor = Accessor::new(|| Value::from(1));
        assert!(accessor.is_read_only());
        let accessor = accessor.with_setter(|_| {}).hidden();
        assert!(!accessor.is_read_only());
        assert!(!accessor.enumerable);
        assert_eq!((accessor.get)(), Value::from(1));
    }

    #[test]
    fn enumerability() {
        assert!(Slot::plain(Value::Null).is_enumerable("a"));
        assert!(!Slot::bindable(Value::Null).is_enumerable("_a"));
        assert!(!Slot::Accessor(Accessor::new(|| Value::Null).hidden()).is_enumerable("a"));
    }
}
