//! Hash: a bindable key/value entity.
//!
//! Every property seeded at construction is bindable, so writes that change a
//! value dispatch `change:<name>` and `change`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::event::Dispatcher;
use crate::reactive::{is_private, Bindable, EventTarget, Injectable, Observable};
use crate::value::{Map, Value};

/// Default class name reported by [`Hash::class_name`].
pub const HASH_CLASS: &str = "Hash";

/// Construction options for a [`Hash`].
#[derive(Debug, Clone, Default)]
pub struct HashOptions {
    pub source: Map,
    pub defaults: Map,
    pub context: Option<Context>,
    pub(crate) class_name: Option<Rc<str>>,
}

impl HashOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial values (builder). Wins over defaults.
    pub fn source(mut self, source: Map) -> Self {
        self.source = source;
        self
    }

    /// Set one initial value (builder).
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.source.insert(key.to_owned(), value.into());
        self
    }

    /// Fallback values for properties the source leaves undefined (builder).
    pub fn defaults(mut self, defaults: Map) -> Self {
        self.defaults = defaults;
        self
    }

    /// Context to inject singletons from (builder).
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }
}

struct HashInner {
    observable: Observable,
    class_name: Rc<str>,
    context: RefCell<Option<Context>>,
}

/// A bindable map of named properties. Cheap to clone; clones are the same
/// entity.
#[derive(Clone)]
pub struct Hash(Rc<HashInner>);

impl Hash {
    pub fn new() -> Self {
        Self::with_options(HashOptions::default())
    }

    /// A hash seeded from `source`.
    pub fn from_map(source: Map) -> Self {
        Self::with_options(HashOptions::new().source(source))
    }

    pub fn with_options(options: HashOptions) -> Self {
        let HashOptions {
            source,
            defaults,
            context,
            class_name,
        } = options;

        let hash = Self(Rc::new(HashInner {
            observable: Observable::new(),
            class_name: class_name.unwrap_or_else(|| Rc::from(HASH_CLASS)),
            context: RefCell::new(None),
        }));

        let obs = &hash.0.observable;
        for (key, value) in source.into_iter().chain(defaults) {
            if !value.is_undefined() && obs.get(&key).is_undefined() {
                obs.set(&key, value);
            } else if !obs.has_property(&key) {
                obs.set(&key, Value::Undefined);
            }
        }
        obs.make_all_bindable(&[]);

        if context.is_some() {
            hash.set_context(context);
        }
        hash
    }

    pub fn class_name(&self) -> &str {
        &self.0.class_name
    }

    pub fn ptr_eq(&self, other: &Hash) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Plain snapshot of every enumerable, non-private, defined property.
    pub fn snapshot(&self) -> Map {
        let obs = &self.0.observable;
        obs.property_names()
            .into_iter()
            .filter(|name| !is_private(name))
            .filter_map(|name| {
                let value = obs.get(&name);
                (!value.is_undefined()).then_some((name, value))
            })
            .collect()
    }

    /// JSON object of the [`snapshot`](Self::snapshot). Nested entities
    /// serialize through their own `to_json`.
    pub fn to_json(&self) -> serde_json::Value {
        crate::value::map_to_json(&self.snapshot())
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTarget for Hash {
    fn dispatcher(&self) -> &Dispatcher {
        self.0.observable.dispatcher()
    }
}

impl Bindable for Hash {
    fn observable(&self) -> &Observable {
        &self.0.observable
    }
}

impl Injectable for Hash {
    fn context_cell(&self) -> &RefCell<Option<Context>> {
        &self.0.context
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.class_name)?;
        f.debug_map().entries(self.snapshot()).finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
