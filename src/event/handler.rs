//! Event dispatch: per-object listener registry.
//!
//! A [`Dispatcher`] maps event types to priority-ordered listener sequences.
//! Types may be registered several at a time (`"input change"`), the wildcard
//! `*` receives every event, and `once` listeners remove themselves after
//! their first invocation.
//!
//! Dispatch iterates a snapshot of the merged exact-type and wildcard
//! sequences. A registration removed while the dispatch is running is skipped;
//! one added while it runs first fires on the next dispatch.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{trace, warn};

use super::message::{Event, ALL, WILDCARD_KEY};

/// Errors from listener registration and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event type is undefined or empty")]
    MissingType,
    #[error("event target node no longer exists")]
    UnknownNode,
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

static NEXT_SCOPE: AtomicU64 = AtomicU64::new(1);

/// Identity token a listener is registered under.
///
/// Scopes group registrations so that an owner can later remove everything it
/// registered (`remove_event_listener(None, None, Some(scope))`). Every
/// dispatcher has its own scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope(u64);

impl Scope {
    /// Allocate a fresh, unique scope.
    pub fn new() -> Self {
        Self(NEXT_SCOPE.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// What a listener asks the dispatch loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Skip the remaining listeners of this dispatch.
    Stop,
}

/// An event handler. Identity is the `Rc` pointer, so keep a clone around to
/// remove it later.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&mut Event) -> Flow>);

impl Listener {
    /// A handler that always lets the dispatch continue.
    pub fn new(f: impl Fn(&mut Event) + 'static) -> Self {
        Self(Rc::new(move |event| {
            f(event);
            Flow::Continue
        }))
    }

    /// A handler that decides whether the dispatch continues.
    pub fn with_flow(f: impl Fn(&mut Event) -> Flow + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn ptr_eq(&self, other: &Listener) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn call(&self, event: &mut Event) -> Flow {
        (self.0)(event)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener(<fn>)")
    }
}

/// Registration options: scope, priority and one-shot flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenerOptions {
    pub scope: Option<Scope>,
    /// Higher priorities run first. Default 0.
    pub priority: i32,
    pub once: bool,
}

impl ListenerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scope (builder).
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Set the priority (builder).
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Remove the listener after its first invocation (builder).
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
}

#[derive(Clone)]
struct Registration {
    handler: Listener,
    scope: Option<Scope>,
    priority: i32,
    once: bool,
    live: Rc<Cell<bool>>,
}

impl Registration {
    fn matches(&self, handler: Option<&Listener>, scope: Option<Scope>) -> bool {
        handler.is_none_or(|h| self.handler.ptr_eq(h)) && scope.is_none_or(|s| self.scope == Some(s))
    }
}

fn registry_key(event_type: &str) -> &str {
    if event_type == ALL {
        WILDCARD_KEY
    } else {
        event_type
    }
}

fn split_types(types: &str) -> Result<Vec<&str>, EventError> {
    let split: Vec<&str> = types.split_whitespace().collect();
    if split.is_empty() {
        return Err(EventError::MissingType);
    }
    Ok(split)
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Registry {
    queue: HashMap<String, Vec<Registration>>,
}

impl Registry {
    fn remove_matching(&mut self, key: &str, handler: Option<&Listener>, scope: Option<Scope>) {
        if let Some(queue) = self.queue.get_mut(key) {
            queue.retain(|reg| {
                let matched = reg.matches(handler, scope);
                if matched {
                    reg.live.set(false);
                }
                !matched
            });
            if queue.is_empty() {
                self.queue.remove(key);
            }
        }
    }
}

/// Per-object listener registry. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Rc<RefCell<Registry>>,
    scope: Scope,
}

/// Non-owning handle to a [`Dispatcher`].
#[derive(Clone)]
pub struct WeakDispatcher {
    registry: Weak<RefCell<Registry>>,
    scope: Scope,
}

impl WeakDispatcher {
    pub fn upgrade(&self) -> Option<Dispatcher> {
        self.registry.upgrade().map(|registry| Dispatcher {
            registry,
            scope: self.scope,
        })
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry::default())),
            scope: Scope::new(),
        }
    }

    /// The scope identifying this dispatcher.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn ptr_eq(&self, other: &Dispatcher) -> bool {
        Rc::ptr_eq(&self.registry, &other.registry)
    }

    pub fn downgrade(&self) -> WeakDispatcher {
        WeakDispatcher {
            registry: Rc::downgrade(&self.registry),
            scope: self.scope,
        }
    }

    /// Register `handler` for one or more space-separated event types with
    /// default options.
    pub fn add_event_listener(&self, types: &str, handler: Listener) -> Result<(), EventError> {
        self.add_event_listener_with(types, handler, ListenerOptions::default())
    }

    /// Register `handler` for one or more space-separated event types.
    ///
    /// Re-adding an identical `(type, handler, scope)` triple is a no-op.
    /// Sequences stay sorted by descending priority; equal priorities keep
    /// registration order.
    pub fn add_event_listener_with(
        &self,
        types: &str,
        handler: Listener,
        options: ListenerOptions,
    ) -> Result<(), EventError> {
        for event_type in split_types(types)? {
            self.subscribe(event_type, handler.clone(), options);
        }
        Ok(())
    }

    /// Register for a single event type the caller knows to be valid.
    pub(crate) fn subscribe(&self, event_type: &str, handler: Listener, options: ListenerOptions) {
        debug_assert!(!event_type.trim().is_empty());
        let mut registry = self.registry.borrow_mut();
        let queue = registry
            .queue
            .entry(registry_key(event_type).to_owned())
            .or_default();
        let exists = queue
            .iter()
            .any(|reg| reg.handler.ptr_eq(&handler) && reg.scope == options.scope);
        if exists {
            return;
        }
        queue.push(Registration {
            handler,
            scope: options.scope,
            priority: options.priority,
            once: options.once,
            live: Rc::new(Cell::new(true)),
        });
        // Stable: ties keep insertion order.
        queue.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Remove listeners.
    ///
    /// With every argument `None` the whole registry is cleared. `types` may
    /// be space-separated; `None` removes from every registered type. Omitting
    /// `handler` or `scope` removes all matches for the given criteria.
    pub fn remove_event_listener(
        &self,
        types: Option<&str>,
        handler: Option<&Listener>,
        scope: Option<Scope>,
    ) {
        let mut registry = self.registry.borrow_mut();

        if types.is_none() && handler.is_none() && scope.is_none() {
            for queue in registry.queue.values() {
                for reg in queue {
                    reg.live.set(false);
                }
            }
            registry.queue.clear();
            return;
        }

        match types {
            Some(types) => {
                for event_type in types.split_whitespace() {
                    registry.remove_matching(registry_key(event_type), handler, scope);
                }
            }
            None => {
                let keys: Vec<String> = registry.queue.keys().cloned().collect();
                for key in keys {
                    registry.remove_matching(&key, handler, scope);
                }
            }
        }
    }

    /// Whether a matching listener is registered. An empty sequence counts as
    /// absent.
    pub fn has_event_listener(
        &self,
        event_type: &str,
        handler: Option<&Listener>,
        scope: Option<Scope>,
    ) -> bool {
        let registry = self.registry.borrow();
        registry
            .queue
            .get(registry_key(event_type))
            .is_some_and(|queue| queue.iter().any(|reg| reg.matches(handler, scope)))
    }

    /// Number of listeners registered for an exact type.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.registry
            .borrow()
            .queue
            .get(registry_key(event_type))
            .map_or(0, Vec::len)
    }

    /// Dispatch an event to its listeners and return it afterwards, so callers
    /// can inspect flags such as [`Event::is_default_prevented`].
    ///
    /// Sets `target` if unset and always sets `current_target`. Exact-type and
    /// wildcard listeners are merged by descending priority. Iteration stops
    /// when a listener returns [`Flow::Stop`] or calls
    /// [`Event::stop_immediate_propagation`].
    pub fn dispatch_event(&self, mut event: Event) -> Event {
        if event.target.is_none() {
            event.target = Some(self.clone());
        }
        event.current_target = Some(self.clone());

        let snapshot = self.merged_listeners(event.event_type());
        if snapshot.is_empty() {
            return event;
        }
        trace!(event_type = event.event_type(), listeners = snapshot.len(), "dispatch");

        for reg in snapshot {
            if !reg.live.get() {
                continue;
            }
            if reg.once {
                reg.live.set(false);
            }
            let flow = reg.handler.call(&mut event);
            if reg.once {
                self.remove_registration(&reg);
            }
            if flow == Flow::Stop || event.is_immediate_propagation_stopped() {
                break;
            }
        }
        event
    }

    /// Dispatch a bare event type. Deprecated path: prefer building an
    /// [`Event`] and calling [`dispatch_event`](Self::dispatch_event).
    pub fn dispatch_type(&self, event_type: &str) -> Result<Event, EventError> {
        warn!(
            "dispatching a bare event type ({event_type:?}) is deprecated, dispatch an Event instead"
        );
        let event = Event::new(event_type)?;
        Ok(self.dispatch_event(event))
    }

    /// Exact-type listeners merged with wildcard listeners by descending
    /// priority. On ties, exact-type listeners come first.
    fn merged_listeners(&self, event_type: &str) -> Vec<Registration> {
        let registry = self.registry.borrow();
        let key = registry_key(event_type);
        let exact = registry.queue.get(key).map(Vec::as_slice).unwrap_or(&[]);
        let wildcard = if key == WILDCARD_KEY {
            &[][..]
        } else {
            registry
                .queue
                .get(WILDCARD_KEY)
                .map(Vec::as_slice)
                .unwrap_or(&[])
        };

        let mut merged = Vec::with_capacity(exact.len() + wildcard.len());
        let (mut i, mut j) = (0, 0);
        while i < exact.len() && j < wildcard.len() {
            if exact[i].priority >= wildcard[j].priority {
                merged.push(exact[i].clone());
                i += 1;
            } else {
                merged.push(wildcard[j].clone());
                j += 1;
            }
        }
        merged.extend_from_slice(&exact[i..]);
        merged.extend_from_slice(&wildcard[j..]);
        merged
    }

    fn remove_registration(&self, target: &Registration) {
        let mut registry = self.registry.borrow_mut();
        let mut emptied = Vec::new();
        for (key, queue) in registry.queue.iter_mut() {
            queue.retain(|reg| !Rc::ptr_eq(&reg.live, &target.live));
            if queue.is_empty() {
                emptied.push(key.clone());
            }
        }
        for key in emptied {
            registry.queue.remove(&key);
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        let mut types: Vec<&String> = registry.queue.keys().collect();
        types.sort();
        f.debug_struct("Dispatcher")
            .field("scope", &self.scope)
            .field("types", &types)
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Listener) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_c = log.clone();
        let make = move |name: &str| {
            let log = log_c.clone();
            let name = name.to_owned();
            Listener::new(move |_| log.borrow_mut().push(name.clone()))
        };
        (log, make)
    }

    fn event(event_type: &str) -> Event {
        Event::new(event_type).unwrap()
    }

    // ── Registration ─────────────────────────────────────────────────

    #[test]
    fn add_requires_type() {
        let disp = Dispatcher::new();
        let err = disp.add_event_listener("", Listener::new(|_| {}));
        assert!(matches!(err, Err(EventError::MissingType)));
        let err = disp.add_event_listener("   ", Listener::new(|_| {}));
        assert!(matches!(err, Err(EventError::MissingType)));
    }

    #[test]
    fn add_multiple_types() {
        let disp = Dispatcher::new();
        let l = Listener::new(|_| {});
        disp.add_event_listener("input change", l.clone()).unwrap();
        assert!(disp.has_event_listener("input", Some(&l), None));
        assert!(disp.has_event_listener("change", Some(&l), None));
    }

    #[test]
    fn duplicate_registration_is_noop() {
        let disp = Dispatcher::new();
        let (log, make) = recorder();
        let l = make("a");
        disp.add_event_listener("ping", l.clone()).unwrap();
        disp.add_event_listener("ping", l.clone()).unwrap();
        assert_eq!(disp.listener_count("ping"), 1);
        disp.dispatch_event(event("ping"));
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn same_handler_different_scope_is_distinct() {
        let disp = Dispatcher::new();
        let l = Listener::new(|_| {});
        disp.add_event_listener("ping", l.clone()).unwrap();
        disp.add_event_listener_with("ping", l, ListenerOptions::new().scope(Scope::new()))
            .unwrap();
        assert_eq!(disp.listener_count("ping"), 2);
    }

    // ── Ordering ─────────────────────────────────────────────────────

    #[test]
    fn priority_ordering() {
        let disp = Dispatcher::new();
        let (log, make) = recorder();
        for p in [1, 5, 3] {
            disp.add_event_listener_with(
                "ping",
                make(&p.to_string()),
                ListenerOptions::new().priority(p),
            )
            .unwrap();
        }
        disp.dispatch_event(event("ping"));
        assert_eq!(*log.borrow(), vec!["5", "3", "1"]);
    }

    #[test]
    fn equal_priority_keeps_registration_order() {
        let disp = Dispatcher::new();
        let (log, make) = recorder();
        disp.add_event_listener("ping", make("first")).unwrap();
        disp.add_event_listener("ping", make("second")).unwrap();
        disp.add_event_listener("ping", make("third")).unwrap();
        disp.dispatch_event(event("ping"));
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn wildcard_merged_by_priority() {
        let disp = Dispatcher::new();
        let (log, make) = recorder();
        disp.add_event_listener_with("ping", make("exact-1"), ListenerOptions::new().priority(1))
            .unwrap();
        disp.add_event_listener_with("*", make("all-5"), ListenerOptions::new().priority(5))
            .unwrap();
        disp.add_event_listener_with("ping", make("exact-9"), ListenerOptions::new().priority(9))
            .unwrap();
        disp.add_event_listener("*", make("all-0")).unwrap();
        disp.dispatch_event(event("ping"));
        assert_eq!(*log.borrow(), vec!["exact-9", "all-5", "exact-1", "all-0"]);
    }

    #[test]
    fn wildcard_receives_every_type() {
        let disp = Dispatcher::new();
        let (log, make) = recorder();
        disp.add_event_listener("*", make("all")).unwrap();
        disp.dispatch_event(event("a"));
        disp.dispatch_event(event("b"));
        assert_eq!(log.borrow().len(), 2);
        assert!(disp.has_event_listener("*", None, None));
        assert!(disp.has_event_listener("all", None, None));
    }

    // ── Once / early exit ────────────────────────────────────────────

    #[test]
    fn once_fires_exactly_once() {
        let disp = Dispatcher::new();
        let (log, make) = recorder();
        let l = make("once");
        disp.add_event_listener_with("ping", l.clone(), ListenerOptions::new().once())
            .unwrap();
        disp.dispatch_event(event("ping"));
        disp.dispatch_event(event("ping"));
        assert_eq!(log.borrow().len(), 1);
        assert!(!disp.has_event_listener("ping", Some(&l), None));
    }

    #[test]
    fn once_wildcard_is_removed() {
        let disp = Dispatcher::new();
        let (log, make) = recorder();
        disp.add_event_listener_with("*", make("w"), ListenerOptions::new().once())
            .unwrap();
        disp.dispatch_event(event("a"));
        disp.dispatch_event(event("b"));
        assert_eq!(log.borrow().len(), 1);
        assert!(!disp.has_event_listener("*", None, None));
    }

    #[test]
    fn stop_flow_halts_lower_priority() {
        let disp = Dispatcher::new();
        let (log, make) = recorder();
        disp.add_event_listener_with(
            "ping",
            Listener::with_flow(|_| Flow::Stop),
            ListenerOptions::new().priority(10),
        )
        .unwrap();
        disp.add_event_listener("ping", make("low")).unwrap();
        disp.add_event_listener("pong", make("other")).unwrap();

        disp.dispatch_event(event("ping"));
        assert!(log.borrow().is_empty());
        disp.dispatch_event(event("pong"));
        assert_eq!(*log.borrow(), vec!["other"]);
    }

    #[test]
    fn stop_immediate_propagation_halts() {
        let disp = Dispatcher::new();
        let (log, make) = recorder();
        disp.add_event_listener("ping", Listener::new(|e| e.stop_immediate_propagation()))
            .unwrap();
        disp.add_event_listener("ping", make("after")).unwrap();
        let event = disp.dispatch_event(event("ping"));
        assert!(log.borrow().is_empty());
        assert!(event.is_immediate_propagation_stopped());
    }

    // ── Removal ──────────────────────────────────────────────────────

    #[test]
    fn remove_all() {
        let disp = Dispatcher::new();
        disp.add_event_listener("a b c", Listener::new(|_| {})).unwrap();
        disp.remove_event_listener(None, None, None);
        assert!(!disp.has_event_listener("a", None, None));
        assert!(!disp.has_event_listener("c", None, None));
    }

    #[test]
    fn remove_by_type_only() {
        let disp = Dispatcher::new();
        disp.add_event_listener("a", Listener::new(|_| {})).unwrap();
        disp.add_event_listener("a", Listener::new(|_| {})).unwrap();
        disp.add_event_listener("b", Listener::new(|_| {})).unwrap();
        disp.remove_event_listener(Some("a"), None, None);
        assert!(!disp.has_event_listener("a", None, None));
        assert!(disp.has_event_listener("b", None, None));
    }

    #[test]
    fn remove_specific_handler() {
        let disp = Dispatcher::new();
        let keep = Listener::new(|_| {});
        let drop = Listener::new(|_| {});
        disp.add_event_listener("a", keep.clone()).unwrap();
        disp.add_event_listener("a", drop.clone()).unwrap();
        disp.remove_event_listener(Some("a"), Some(&drop), None);
        assert!(disp.has_event_listener("a", Some(&keep), None));
        assert!(!disp.has_event_listener("a", Some(&drop), None));
    }

    #[test]
    fn remove_by_scope_across_types() {
        let disp = Dispatcher::new();
        let scope = Scope::new();
        let opts = ListenerOptions::new().scope(scope);
        disp.add_event_listener_with("a", Listener::new(|_| {}), opts).unwrap();
        disp.add_event_listener_with("b", Listener::new(|_| {}), opts).unwrap();
        disp.add_event_listener("b", Listener::new(|_| {})).unwrap();
        disp.remove_event_listener(None, None, Some(scope));
        assert!(!disp.has_event_listener("a", None, None));
        assert_eq!(disp.listener_count("b"), 1);
    }

    #[test]
    fn removed_during_dispatch_is_skipped() {
        let disp = Dispatcher::new();
        let (log, make) = recorder();
        let victim = make("victim");
        let disp_c = disp.clone();
        let victim_c = victim.clone();
        disp.add_event_listener_with(
            "ping",
            Listener::new(move |_| {
                disp_c.remove_event_listener(Some("ping"), Some(&victim_c), None);
            }),
            ListenerOptions::new().priority(1),
        )
        .unwrap();
        disp.add_event_listener("ping", victim).unwrap();
        disp.dispatch_event(event("ping"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn added_during_dispatch_fires_next_time() {
        let disp = Dispatcher::new();
        let (log, make) = recorder();
        let late = make("late");
        let disp_c = disp.clone();
        disp.add_event_listener(
            "ping",
            Listener::new(move |_| {
                disp_c.add_event_listener("ping", late.clone()).unwrap();
            }),
        )
        .unwrap();
        disp.dispatch_event(event("ping"));
        assert!(log.borrow().is_empty());
        disp.dispatch_event(event("ping"));
        assert_eq!(*log.borrow(), vec!["late"]);
    }

    // ── Targets ──────────────────────────────────────────────────────

    #[test]
    fn dispatch_sets_targets() {
        let disp = Dispatcher::new();
        let seen = Rc::new(Cell::new(false));
        let seen_c = seen.clone();
        let disp_c = disp.clone();
        disp.add_event_listener(
            "ping",
            Listener::new(move |e| {
                assert!(e.current_target().unwrap().ptr_eq(&disp_c));
                seen_c.set(true);
            }),
        )
        .unwrap();
        let event = disp.dispatch_event(event("ping"));
        assert!(seen.get());
        assert!(event.target().unwrap().ptr_eq(&disp));
    }

    #[test]
    fn existing_target_is_preserved() {
        let origin = Dispatcher::new();
        let relay = Dispatcher::new();
        let first = origin.dispatch_event(event("ping"));
        let relayed = relay.dispatch_event(first);
        assert!(relayed.target().unwrap().ptr_eq(&origin));
        assert!(relayed.current_target().unwrap().ptr_eq(&relay));
    }

    #[test]
    fn dispatch_type_wraps_string() {
        let disp = Dispatcher::new();
        let (log, make) = recorder();
        disp.add_event_listener("ping", make("a")).unwrap();
        disp.dispatch_type("ping").unwrap();
        assert_eq!(*log.borrow(), vec!["a"]);
        assert!(disp.dispatch_type("").is_err());
    }

    #[test]
    fn weak_dispatcher_upgrade() {
        let disp = Dispatcher::new();
        let weak = disp.downgrade();
        assert!(weak.upgrade().unwrap().ptr_eq(&disp));
        drop(disp);
        assert!(weak.upgrade().is_none());
    }
}
