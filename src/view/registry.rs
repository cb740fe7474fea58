//! Name → view factory lookup.
//!
//! Used to instantiate nested views (`cb-view="Name"` or a registered tag
//! name) and `cb-repeat` item renderers.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::lifecycle::{View, ViewOptions};

/// Builds a view from its options.
pub type ViewFactory = Rc<dyn Fn(ViewOptions) -> View>;

/// Shared registry of view factories. Cheap to clone; clones share entries.
#[derive(Clone, Default)]
pub struct ViewRegistry(Rc<RefCell<HashMap<String, ViewFactory>>>);

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ptr_eq(&self, other: &ViewRegistry) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register(&self, name: &str, factory: impl Fn(ViewOptions) -> View + 'static) -> &Self {
        self.0
            .borrow_mut()
            .insert(name.to_owned(), Rc::new(factory));
        self
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.0.borrow_mut().remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<ViewFactory> {
        self.0.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.borrow().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Build the view registered as `name`.
    pub fn create(&self, name: &str, options: ViewOptions) -> Option<View> {
        let factory = self.get(name)?;
        Some(factory(options.name(name)))
    }
}

impl fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ViewRegistry").field(&self.names()).finish()
    }
}
