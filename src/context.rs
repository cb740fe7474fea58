//! Context: event bus, singleton injection and command mapping.
//!
//! A context is shared by the views and entities of one application. It
//! injects singletons into properties declared as `Undefined`, and runs mapped
//! [`Command`]s for events dispatched on it.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::event::{Dispatcher, Event, Listener, ListenerOptions, ALL};
use crate::event::message::WILDCARD_KEY;
use crate::reactive::{Bindable, EventTarget, Observable};
use crate::value::Value;
use crate::view::ViewRegistry;

/// Errors from context mapping calls.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("property name cannot be empty")]
    MissingName,
    #[error("event type cannot be empty")]
    MissingEventType,
}

/// A unit of work run in response to an event on a context.
pub trait Command {
    fn execute(&mut self, event: &Event);
}

/// Builds a fresh [`Command`] each time its event fires. Identity is the
/// `Rc` pointer.
#[derive(Clone)]
pub struct CommandFactory(Rc<dyn Fn(&Context) -> Box<dyn Command>>);

impl CommandFactory {
    pub fn new(f: impl Fn(&Context) -> Box<dyn Command> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn ptr_eq(&self, other: &CommandFactory) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CommandFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandFactory(<fn>)")
    }
}

struct ContextInner {
    observable: Observable,
    singletons: RefCell<BTreeMap<String, Value>>,
    commands: RefCell<HashMap<String, Vec<CommandFactory>>>,
    parent: Option<Context>,
    registry: ViewRegistry,
}

/// Shared application context. Cheap to clone.
#[derive(Clone)]
pub struct Context(Rc<ContextInner>);

fn split_names(names: &str) -> Vec<&str> {
    names.split_whitespace().collect()
}

impl Context {
    pub fn new() -> Self {
        Self::build(None, ViewRegistry::new())
    }

    /// A context resolving view names through `registry`.
    pub fn with_registry(registry: ViewRegistry) -> Self {
        Self::build(None, registry)
    }

    fn build(parent: Option<Context>, registry: ViewRegistry) -> Self {
        let context = Self(Rc::new(ContextInner {
            observable: Observable::new(),
            singletons: RefCell::new(BTreeMap::new()),
            commands: RefCell::new(HashMap::new()),
            parent,
            registry,
        }));

        let weak: Weak<ContextInner> = Rc::downgrade(&context.0);
        context.dispatcher().subscribe(
            ALL,
            Listener::new(move |event| {
                if let Some(inner) = weak.upgrade() {
                    Context(inner).run_commands(event);
                }
            }),
            ListenerOptions::default(),
        );
        context
    }

    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The context this one was created from, if any.
    pub fn parent_context(&self) -> Option<&Context> {
        self.0.parent.as_ref()
    }

    /// Name → view factory lookup shared by every view in this context.
    pub fn registry(&self) -> &ViewRegistry {
        &self.0.registry
    }

    /// A child context sharing this context's registry.
    pub fn create_subcontext(&self) -> Context {
        Self::build(Some(self.clone()), self.0.registry.clone())
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Run `factory`'s command whenever one of the space-separated event
    /// types is dispatched on this context. `*` maps every event.
    pub fn map_command(
        &self,
        event_types: &str,
        factory: CommandFactory,
    ) -> Result<&Self, ContextError> {
        let types = split_names(event_types);
        if types.is_empty() {
            return Err(ContextError::MissingEventType);
        }
        let mut commands = self.0.commands.borrow_mut();
        for event_type in types {
            let key = if event_type == ALL { WILDCARD_KEY } else { event_type };
            let mapped = commands.entry(key.to_owned()).or_default();
            if !mapped.iter().any(|existing| existing.ptr_eq(&factory)) {
                mapped.push(factory.clone());
            }
        }
        Ok(self)
    }

    /// Unmap one command, or every command of the types when `factory` is
    /// `None`.
    pub fn unmap_command(
        &self,
        event_types: &str,
        factory: Option<&CommandFactory>,
    ) -> Result<&Self, ContextError> {
        let types = split_names(event_types);
        if types.is_empty() {
            return Err(ContextError::MissingEventType);
        }
        let mut commands = self.0.commands.borrow_mut();
        for event_type in types {
            let key = if event_type == ALL { WILDCARD_KEY } else { event_type };
            match factory {
                None => {
                    commands.remove(key);
                }
                Some(factory) => {
                    if let Some(mapped) = commands.get_mut(key) {
                        mapped.retain(|existing| !existing.ptr_eq(factory));
                    }
                }
            }
        }
        Ok(self)
    }

    fn run_commands(&self, event: &Event) {
        let factories: Vec<CommandFactory> = {
            let commands = self.0.commands.borrow();
            let wildcard = commands.get(WILDCARD_KEY).into_iter().flatten();
            let exact = commands.get(event.event_type()).into_iter().flatten();
            let mut union: Vec<CommandFactory> = Vec::new();
            for factory in wildcard.chain(exact) {
                if !union.iter().any(|f| f.ptr_eq(factory)) {
                    union.push(factory.clone());
                }
            }
            union
        };
        for factory in factories {
            debug!(event_type = event.event_type(), "executing command");
            let mut command = (factory.0)(self);
            command.execute(event);
        }
    }

    // -----------------------------------------------------------------------
    // Singletons
    // -----------------------------------------------------------------------

    /// Map a value to one or more space-separated property names.
    pub fn map_singleton(
        &self,
        names: &str,
        value: impl Into<Value>,
    ) -> Result<&Self, ContextError> {
        let names = split_names(names);
        if names.is_empty() {
            return Err(ContextError::MissingName);
        }
        let value = value.into();
        let mut singletons = self.0.singletons.borrow_mut();
        for name in names {
            singletons.insert(name.to_owned(), value.clone());
        }
        Ok(self)
    }

    pub fn unmap_singleton(&self, names: &str) -> Result<&Self, ContextError> {
        let names = split_names(names);
        if names.is_empty() {
            return Err(ContextError::MissingName);
        }
        let mut singletons = self.0.singletons.borrow_mut();
        for name in names {
            singletons.remove(name);
        }
        Ok(self)
    }

    /// Same as [`map_singleton`](Self::map_singleton); reads better for plain
    /// values.
    pub fn map_constant(
        &self,
        names: &str,
        value: impl Into<Value>,
    ) -> Result<&Self, ContextError> {
        self.map_singleton(names, value)
    }

    pub fn unmap_constant(&self, names: &str) -> Result<&Self, ContextError> {
        self.unmap_singleton(names)
    }

    /// The value mapped to `name`, if any.
    pub fn singleton(&self, name: &str) -> Option<Value> {
        self.0.singletons.borrow().get(name).cloned()
    }

    /// Fill every `Undefined` property of `target` whose name matches a
    /// singleton.
    pub fn inject_singletons(&self, target: &Observable) {
        for name in target.keys() {
            if !target.get(&name).is_undefined() {
                continue;
            }
            if let Some(value) = self.singleton(&name) {
                target.set(&name, value);
            }
        }
    }

    /// Reset every property of `target` whose name matches a singleton.
    pub fn uninject_singletons(&self, target: &Observable) {
        for name in target.keys() {
            if self.0.singletons.borrow().contains_key(&name) {
                target.set(&name, Value::Undefined);
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTarget for Context {
    fn dispatcher(&self) -> &Dispatcher {
        self.0.observable.dispatcher()
    }
}

impl Bindable for Context {
    fn observable(&self) -> &Observable {
        &self.0.observable
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let singletons: Vec<String> = self.0.singletons.borrow().keys().cloned().collect();
        f.debug_struct("Context")
            .field("singletons", &singletons)
            .field("is_subcontext", &self.0.parent.is_some())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
