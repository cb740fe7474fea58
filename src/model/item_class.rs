//! Named item factories used by lists to coerce plain objects.

use std::fmt;
use std::rc::Rc;

use super::hash::{Hash, HashOptions, HASH_CLASS};
use crate::value::Value;

type Factory = Rc<dyn Fn(HashOptions) -> Hash>;

/// A named factory turning [`HashOptions`] into a typed [`Hash`].
///
/// ```ignore
/// let person = ItemClass::new("Person", |options| {
///     Hash::with_options(options.defaults(defaults()))
/// });
/// ```
#[derive(Clone)]
pub struct ItemClass {
    name: Rc<str>,
    factory: Factory,
}

impl ItemClass {
    pub fn new(name: &str, factory: impl Fn(HashOptions) -> Hash + 'static) -> Self {
        Self {
            name: Rc::from(name),
            factory: Rc::new(factory),
        }
    }

    /// The default class: plain [`Hash`].
    pub fn hash() -> Self {
        Self::new(HASH_CLASS, Hash::with_options)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instantiate an item. The result reports this class's name.
    pub fn create(&self, mut options: HashOptions) -> Hash {
        options.class_name = Some(self.name.clone());
        (self.factory)(options)
    }

    /// Whether `value` is an item created by a class of this name.
    pub fn is_instance(&self, value: &Value) -> bool {
        value
            .as_hash()
            .is_some_and(|hash| hash.class_name() == &*self.name)
    }
}

impl Default for ItemClass {
    fn default() -> Self {
        Self::hash()
    }
}

impl fmt::Debug for ItemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemClass({})", self.name)
    }
}
