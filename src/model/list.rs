//! List: a bindable ordered sequence.
//!
//! Plain objects inserted into a list are coerced into items of the list's
//! [`ItemClass`]. Items that are entities have their `change` events forwarded
//! through the list. Every structural mutator dispatches exactly one `add`,
//! `remove` or `sort` event, followed by `change:length` when the length moved.
//!
//! Indexed properties (`"0"`, `"1"`, ...) mirror the backing sequence. They are
//! regenerated by a high-priority `change` listener, so stale indices beyond
//! the current length disappear as soon as the length change is dispatched.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};
use std::slice;

use crate::context::Context;
use crate::event::{Dispatcher, Event, Listener, ListenerOptions, ADD, CHANGE, REMOVE, RESET, SORT};
use crate::reactive::{Accessor, Bindable, EventTarget, Injectable, Observable};
use crate::value::Value;

use super::hash::HashOptions;
use super::item_class::ItemClass;

/// Priority of the index-mirror listener; runs before user `change` listeners.
const INDEX_MIRROR_PRIORITY: i32 = 999;

/// Construction options for a [`List`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub source: Vec<Value>,
    pub item_class: ItemClass,
    pub context: Option<Context>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial items (builder).
    pub fn source(mut self, source: Vec<Value>) -> Self {
        self.source = source;
        self
    }

    /// Class used to coerce plain objects (builder).
    pub fn item_class(mut self, item_class: ItemClass) -> Self {
        self.item_class = item_class;
        self
    }

    /// Context handed to coerced items (builder).
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }
}

struct ListInner {
    observable: Observable,
    source: RefCell<Vec<Value>>,
    item_class: ItemClass,
    context: RefCell<Option<Context>>,
    /// Re-dispatches item `change` events on the list.
    forwarder: Listener,
}

/// A bindable sequence. Cheap to clone; clones are the same entity.
#[derive(Clone)]
pub struct List(Rc<ListInner>);

impl List {
    pub fn new() -> Self {
        Self::with_options(ListOptions::default())
    }

    /// A list of `items` using the default item class.
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self::with_options(ListOptions::new().source(items))
    }

    pub fn with_options(options: ListOptions) -> Self {
        let ListOptions {
            source,
            item_class,
            context,
        } = options;

        let inner = Rc::new_cyclic(|weak: &Weak<ListInner>| {
            let weak = weak.clone();
            ListInner {
                observable: Observable::new(),
                source: RefCell::new(Vec::new()),
                item_class,
                context: RefCell::new(None),
                forwarder: Listener::new(move |event| {
                    if let Some(inner) = weak.upgrade() {
                        inner.observable.dispatch_event(event.clone());
                    }
                }),
            }
        });

        let list = Self(inner);
        list.install_accessors();
        if context.is_some() {
            list.set_context(context);
        }
        list.set_source(source);
        list
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn item_class(&self) -> &ItemClass {
        &self.0.item_class
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn install_accessors(&self) {
        let weak = Rc::downgrade(&self.0);
        let mirror = Listener::new(move |_| {
            if let Some(inner) = weak.upgrade() {
                List(inner).sync_indices();
            }
        });
        self.dispatcher().subscribe(
            CHANGE,
            mirror,
            ListenerOptions::new().priority(INDEX_MIRROR_PRIORITY),
        );

        let weak = Rc::downgrade(&self.0);
        self.0.observable.define_accessor(
            "length",
            Accessor::new(move || {
                weak.upgrade()
                    .map_or(Value::from(0), |inner| Value::from(inner.source.borrow().len()))
            })
            .hidden(),
        );

        let get = Rc::downgrade(&self.0);
        let set = Rc::downgrade(&self.0);
        self.0.observable.define_accessor(
            "source",
            Accessor::new(move || {
                get.upgrade()
                    .map_or(Value::Undefined, |inner| Value::Array(inner.source.borrow().clone()))
            })
            .with_setter(move |value| {
                if let Some(inner) = set.upgrade() {
                    List(inner).set_source(into_items(value));
                }
            })
            .hidden(),
        );
    }

    /// Regenerate the indexed accessors and drop those past the end.
    fn sync_indices(&self) {
        let len = self.len();
        let obs = &self.0.observable;
        for index in 0..len {
            let key = index.to_string();
            if obs.is_accessor(&key) {
                continue;
            }
            let get = Rc::downgrade(&self.0);
            let set = Rc::downgrade(&self.0);
            obs.define_accessor(
                &key,
                Accessor::new(move || {
                    get.upgrade()
                        .map_or(Value::Undefined, |inner| List(inner).item_at(index))
                })
                .with_setter(move |value| {
                    if let Some(inner) = set.upgrade() {
                        List(inner).set_item_at(index, value);
                    }
                }),
            );
        }
        let mut index = len;
        while obs.delete_property(&index.to_string()) {
            index += 1;
        }
    }

    fn coerce(&self, item: Value) -> Value {
        match item {
            Value::Object(map) => {
                let mut options = HashOptions::new().source(map);
                options.context = self.context();
                Value::Hash(self.0.item_class.create(options))
            }
            other => other,
        }
    }

    fn attach(&self, items: &[Value]) {
        let options = ListenerOptions::new().scope(self.dispatcher().scope());
        for item in items {
            if let Some(obs) = item.as_observable() {
                obs.dispatcher()
                    .subscribe(CHANGE, self.0.forwarder.clone(), options);
            }
        }
    }

    fn detach(&self, items: &[Value]) {
        let scope = self.dispatcher().scope();
        for item in items {
            if let Some(obs) = item.as_observable() {
                obs.remove_event_listener(Some(CHANGE), Some(&self.0.forwarder), Some(scope));
            }
        }
    }

    fn dispatch_structural(&self, event_type: &str, items: Vec<Value>) {
        self.dispatch_event(Event::typed(event_type).with_data(items));
    }

    /// Announce a length change, or a plain `change` when the contents moved
    /// without altering the length.
    fn dispatch_resized(&self, before: usize) {
        if self.len() != before {
            self.dispatch_change(&["length"]);
        } else {
            self.dispatch_event(Event::typed(CHANGE));
        }
    }

    fn derive(&self, items: Vec<Value>) -> List {
        List::with_options(
            ListOptions::new()
                .source(items)
                .item_class(self.0.item_class.clone()),
        )
    }

    // -----------------------------------------------------------------------
    // Mutators
    // -----------------------------------------------------------------------

    /// Append one item. Returns the new length.
    pub fn push(&self, item: impl Into<Value>) -> usize {
        self.push_all(vec![item.into()])
    }

    /// Append several items with a single `add` event. Returns the new length.
    pub fn push_all(&self, items: Vec<Value>) -> usize {
        if items.is_empty() {
            return self.len();
        }
        let before = self.len();
        let items: Vec<Value> = items.into_iter().map(|item| self.coerce(item)).collect();
        self.attach(&items);
        self.0.source.borrow_mut().extend(items.iter().cloned());
        self.dispatch_structural(ADD, items);
        self.dispatch_resized(before);
        self.len()
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Option<Value> {
        let item = self.0.source.borrow_mut().pop()?;
        self.detach(slice::from_ref(&item));
        self.dispatch_structural(REMOVE, vec![item.clone()]);
        self.dispatch_change(&["length"]);
        Some(item)
    }

    /// Prepend one item. Returns the new length.
    pub fn unshift(&self, item: impl Into<Value>) -> usize {
        self.unshift_all(vec![item.into()])
    }

    /// Prepend several items, keeping their order. Returns the new length.
    pub fn unshift_all(&self, items: Vec<Value>) -> usize {
        if items.is_empty() {
            return self.len();
        }
        let before = self.len();
        let items: Vec<Value> = items.into_iter().map(|item| self.coerce(item)).collect();
        self.attach(&items);
        self.0
            .source
            .borrow_mut()
            .splice(0..0, items.iter().cloned());
        self.dispatch_structural(ADD, items);
        self.dispatch_resized(before);
        self.len()
    }

    /// Remove and return the first item.
    pub fn shift(&self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        let item = self.0.source.borrow_mut().remove(0);
        self.detach(slice::from_ref(&item));
        self.dispatch_structural(REMOVE, vec![item.clone()]);
        self.dispatch_change(&["length"]);
        Some(item)
    }

    /// Remove `delete_count` items from `begin` (everything after `begin` when
    /// `None`), insert `inserts` in their place, and return the removed items
    /// as a new list.
    pub fn splice(&self, begin: usize, delete_count: Option<usize>, inserts: Vec<Value>) -> List {
        let before = self.len();
        let begin = begin.min(before);
        let end = delete_count.map_or(before, |count| begin.saturating_add(count).min(before));
        let inserts: Vec<Value> = inserts.into_iter().map(|item| self.coerce(item)).collect();

        let removed: Vec<Value> = self
            .0
            .source
            .borrow_mut()
            .splice(begin..end, inserts.iter().cloned())
            .collect();

        self.detach(&removed);
        self.attach(&inserts);

        let changed = !removed.is_empty() || !inserts.is_empty();
        if !removed.is_empty() {
            self.dispatch_structural(REMOVE, removed.clone());
        }
        if !inserts.is_empty() {
            self.dispatch_structural(ADD, inserts);
        }
        if changed {
            self.dispatch_resized(before);
        }
        self.derive(removed)
    }

    /// Replace the item at `index`, or append it when `index` is at or past
    /// the end. Returns the replaced item, `Undefined` for an append.
    pub fn set_item_at(&self, index: usize, item: impl Into<Value>) -> Value {
        let before = self.len();
        let item = self.coerce(item.into());
        let replaced = {
            let mut source = self.0.source.borrow_mut();
            match source.get_mut(index) {
                Some(slot) => std::mem::replace(slot, item.clone()),
                None => {
                    source.push(item.clone());
                    Value::Undefined
                }
            }
        };

        self.detach(slice::from_ref(&replaced));
        self.attach(slice::from_ref(&item));

        if self.len() > before {
            self.dispatch_structural(ADD, vec![item.clone()]);
            self.dispatch_change(&["length"]);
        }
        self.dispatch_event(Event::typed(CHANGE).with_item(item));
        replaced
    }

    /// Sort in place with `compare`, then dispatch `sort` and `change`.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) -> &Self {
        let mut items = self.0.source.take();
        items.sort_by(compare);
        *self.0.source.borrow_mut() = items;
        self.dispatch_event(Event::typed(SORT));
        self.dispatch_event(Event::typed(CHANGE));
        self
    }

    /// Sort by natural value order.
    pub fn sort(&self) -> &Self {
        self.sort_by(Value::compare)
    }

    /// Sort items by one of their fields.
    pub fn sort_on(&self, field: &str) -> &Self {
        self.sort_by(|a, b| field_of(a, field).compare(&field_of(b, field)))
    }

    /// Replace the whole backing sequence.
    ///
    /// Dispatches `add` for the new items, `reset`, then `change:source` and
    /// `change:length`.
    pub fn set_source(&self, items: Vec<Value>) {
        let old = self.0.source.take();
        self.detach(&old);
        self.push_all(items);
        self.dispatch_event(Event::typed(RESET));
        self.dispatch_change(&["source", "length"]);
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.0.source.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Alias of [`len`](Self::len).
    pub fn size(&self) -> usize {
        self.len()
    }

    /// The item at `index`, or `Undefined`.
    pub fn item_at(&self, index: usize) -> Value {
        self.0
            .source
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the backing sequence.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.source.borrow().clone()
    }

    /// Items from `begin` up to (not including) `end`, as a new list.
    pub fn slice(&self, begin: usize, end: Option<usize>) -> List {
        let items = self.to_vec();
        let end = end.unwrap_or(items.len()).min(items.len());
        let begin = begin.min(end);
        self.derive(items[begin..end].to_vec())
    }

    /// A new list holding the same items.
    pub fn clone_list(&self) -> List {
        let mut options = ListOptions::new()
            .source(self.to_vec())
            .item_class(self.0.item_class.clone());
        options.context = self.context();
        List::with_options(options)
    }

    /// JSON array of every item.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.to_vec().iter().map(Value::to_json).collect())
    }

    // -----------------------------------------------------------------------
    // Sequence helpers
    // -----------------------------------------------------------------------

    pub fn for_each(&self, mut f: impl FnMut(&Value, usize)) {
        for (index, item) in self.to_vec().iter().enumerate() {
            f(item, index);
        }
    }

    pub fn map(&self, f: impl FnMut(&Value) -> Value) -> List {
        self.derive(self.to_vec().iter().map(f).collect())
    }

    pub fn filter(&self, mut predicate: impl FnMut(&Value) -> bool) -> List {
        self.derive(
            self.to_vec()
                .into_iter()
                .filter(|item| predicate(item))
                .collect(),
        )
    }

    pub fn reject(&self, mut predicate: impl FnMut(&Value) -> bool) -> List {
        self.filter(|item| !predicate(item))
    }

    pub fn find(&self, mut predicate: impl FnMut(&Value) -> bool) -> Option<Value> {
        self.to_vec().into_iter().find(|item| predicate(item))
    }

    pub fn find_index(&self, predicate: impl FnMut(&Value) -> bool) -> Option<usize> {
        self.to_vec().iter().position(predicate)
    }

    pub fn every(&self, predicate: impl FnMut(&Value) -> bool) -> bool {
        self.to_vec().iter().all(predicate)
    }

    pub fn some(&self, predicate: impl FnMut(&Value) -> bool) -> bool {
        self.to_vec().iter().any(predicate)
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.index_of(value).is_some()
    }

    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.0.source.borrow().iter().position(|item| item.deep_eq(value))
    }

    pub fn last_index_of(&self, value: &Value) -> Option<usize> {
        self.0.source.borrow().iter().rposition(|item| item.deep_eq(value))
    }

    pub fn first(&self) -> Option<Value> {
        self.0.source.borrow().first().cloned()
    }

    pub fn last(&self) -> Option<Value> {
        self.0.source.borrow().last().cloned()
    }

    /// Every item after the first `n`.
    pub fn rest(&self, n: usize) -> List {
        self.slice(n, None)
    }

    /// The first `n` items.
    pub fn take(&self, n: usize) -> List {
        self.slice(0, Some(n))
    }

    /// Items deep-equal to none of `values`.
    pub fn without(&self, values: &[Value]) -> List {
        self.reject(|item| values.iter().any(|value| item.deep_eq(value)))
    }

    pub fn reduce<T>(&self, init: T, f: impl FnMut(T, &Value) -> T) -> T {
        self.to_vec().iter().fold(init, f)
    }
}

/// Field lookup used by [`List::sort_on`].
fn field_of(item: &Value, field: &str) -> Value {
    match item {
        Value::Object(map) => map.get(field).cloned().unwrap_or_default(),
        other => other
            .as_observable()
            .map(|obs| obs.get(field))
            .unwrap_or_default(),
    }
}

/// Flatten a value assigned to `source` into items.
fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::List(list) => list.to_vec(),
        Value::Undefined | Value::Null => Vec::new(),
        other => vec![other],
    }
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<Value>> for List {
    fn from(items: Vec<Value>) -> Self {
        Self::from_vec(items)
    }
}

impl EventTarget for List {
    fn dispatcher(&self) -> &Dispatcher {
        self.0.observable.dispatcher()
    }
}

impl Bindable for List {
    fn observable(&self) -> &Observable {
        &self.0.observable
    }
}

impl Injectable for List {
    fn context_cell(&self) -> &RefCell<Option<Context>> {
        &self.0.context
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "List")?;
        f.debug_list().entries(self.to_vec()).finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Hash;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn obj(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn event_log(list: &List) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_c = log.clone();
        list.add_event_listener(
            "*",
            Listener::new(move |e| log_c.borrow_mut().push(e.event_type().to_owned())),
        )
        .unwrap();
        log
    }

    fn numbers(list: &List) -> Vec<f64> {
        list.to_vec().iter().filter_map(Value::as_f64).collect()
    }

    // ── Structure ────────────────────────────────────────────────────

    #[test]
    fn push_coerces_and_notifies() {
        let list = List::new();
        let log = event_log(&list);
        let len = list.push(obj(json!({"a": 1})));
        assert_eq!(len, 1);
        assert_eq!(list.len(), 1);
        assert_eq!(*log.borrow(), vec!["add", "change:length", "change"]);

        let item = list.item_at(0);
        let hash = item.as_hash().unwrap();
        assert_eq!(hash.class_name(), "Hash");
        assert_eq!(hash.get("a"), Value::from(1));
    }

    #[test]
    fn custom_item_class() {
        let class = ItemClass::new("Point", Hash::with_options);
        let list = List::with_options(ListOptions::new().item_class(class.clone()));
        list.push(obj(json!({"x": 1})));
        assert!(class.is_instance(&list.item_at(0)));
    }

    #[test]
    fn non_objects_pass_through() {
        let list = List::from_vec(vec![Value::from(1), Value::from("two")]);
        assert_eq!(list.item_at(1), Value::from("two"));
        let existing = Hash::new();
        list.push(existing.clone());
        assert!(list.item_at(2).as_hash().unwrap().ptr_eq(&existing));
    }

    #[test]
    fn pop_and_shift() {
        let list = List::from_vec(vec![Value::from(1), Value::from(2), Value::from(3)]);
        let log = event_log(&list);
        assert_eq!(list.pop(), Some(Value::from(3)));
        assert_eq!(list.shift(), Some(Value::from(1)));
        assert_eq!(numbers(&list), vec![2.0]);
        assert_eq!(
            *log.borrow(),
            vec!["remove", "change:length", "change", "remove", "change:length", "change"]
        );
    }

    #[test]
    fn pop_empty_is_silent() {
        let list = List::new();
        let log = event_log(&list);
        assert_eq!(list.pop(), None);
        assert_eq!(list.shift(), None);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn unshift_keeps_order() {
        let list = List::from_vec(vec![Value::from(3)]);
        list.unshift_all(vec![Value::from(1), Value::from(2)]);
        assert_eq!(numbers(&list), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn splice_removes_and_inserts() {
        let list = List::from_vec((1..=5).map(Value::from).collect());
        let log = event_log(&list);
        let removed = list.splice(1, Some(2), vec![Value::from(9)]);
        assert_eq!(numbers(&removed), vec![2.0, 3.0]);
        assert_eq!(numbers(&list), vec![1.0, 9.0, 4.0, 5.0]);
        assert_eq!(
            *log.borrow(),
            vec!["remove", "add", "change:length", "change"]
        );
    }

    #[test]
    fn splice_without_count_removes_tail() {
        let list = List::from_vec((1..=4).map(Value::from).collect());
        let removed = list.splice(2, None, vec![]);
        assert_eq!(removed.len(), 2);
        assert_eq!(numbers(&list), vec![1.0, 2.0]);
    }

    #[test]
    fn splice_same_length_dispatches_change() {
        let list = List::from_vec(vec![Value::from(1)]);
        let log = event_log(&list);
        list.splice(0, Some(1), vec![Value::from(2)]);
        assert_eq!(*log.borrow(), vec!["remove", "add", "change"]);
    }

    #[test]
    fn splice_coerces_inserts() {
        let list = List::new();
        list.splice(0, Some(0), vec![obj(json!({"a": 1}))]);
        assert!(list.item_at(0).as_hash().is_some());
    }

    #[test]
    fn set_item_at_replaces_and_appends() {
        let list = List::from_vec(vec![Value::from(1)]);
        let items = Rc::new(RefCell::new(Vec::new()));
        let items_c = items.clone();
        list.add_event_listener(
            "change",
            Listener::new(move |e| items_c.borrow_mut().push(e.item.clone())),
        )
        .unwrap();

        let replaced = list.set_item_at(0, 5);
        assert_eq!(replaced, Value::from(1));
        assert_eq!(items.borrow().last(), Some(&Value::from(5)));

        assert!(list.set_item_at(3, 7).is_undefined());
        assert_eq!(list.len(), 2);
        assert_eq!(list.item_at(1), Value::from(7));

        list.set_item_at(usize::MAX, 9);
        assert_eq!(list.len(), 3);
        assert_eq!(list.item_at(2), Value::from(9));
    }

    // ── Context ──────────────────────────────────────────────────────

    #[test]
    fn context_option_reaches_list_and_items() {
        let context = Context::new();
        context.map_singleton("service", "svc").unwrap();
        let mut item = crate::value::Map::new();
        item.insert("service".to_owned(), Value::Undefined);
        let list = List::with_options(
            ListOptions::new()
                .context(context.clone())
                .source(vec![Value::Object(item)]),
        );

        assert!(list.context().unwrap().ptr_eq(&context));
        let first = list.item_at(0);
        let hash = first.as_hash().unwrap();
        assert_eq!(hash.get("service"), Value::from("svc"));
        assert!(hash.context().unwrap().ptr_eq(&context));
    }

    #[test]
    fn set_context_injects_list_properties() {
        let context = Context::new();
        context.map_singleton("service", "svc").unwrap();
        let list = List::new();
        list.observable().set("service", Value::Undefined);
        list.set_context(Some(context));
        assert_eq!(list.get("service"), Value::from("svc"));
    }

    // ── Index mirror ─────────────────────────────────────────────────

    #[test]
    fn index_properties_mirror_source() {
        let list = List::new();
        list.push(obj(json!({"a": 1})));
        let via_index = list.get("0");
        assert!(via_index.as_hash().unwrap().ptr_eq(list.item_at(0).as_hash().unwrap()));

        list.pop();
        assert!(!list.observable().has_property("0"));
    }

    #[test]
    fn index_property_write_sets_item() {
        let list = List::from_vec(vec![Value::from(1), Value::from(2)]);
        list.set("1", 20);
        assert_eq!(list.item_at(1), Value::from(20));
    }

    #[test]
    fn length_and_source_properties() {
        let list = List::from_vec(vec![Value::from(1), Value::from(2)]);
        assert_eq!(list.get("length"), Value::from(2));
        assert_eq!(
            list.get("source"),
            Value::Array(vec![Value::from(1), Value::from(2)])
        );
        list.set("source", Value::Array(vec![Value::from(7)]));
        assert_eq!(numbers(&list), vec![7.0]);
        assert!(!list.observable().has_property("1"));
    }

    // ── Forwarding ───────────────────────────────────────────────────

    #[test]
    fn item_changes_are_forwarded() {
        let list = List::new();
        list.push(obj(json!({"name": "a"})));
        let item = list.item_at(0).as_hash().unwrap().clone();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_c = seen.clone();
        list.add_event_listener(
            "change",
            Listener::new(move |e| seen_c.borrow_mut().push(e.property.clone())),
        )
        .unwrap();

        item.set("name", "b");
        assert_eq!(*seen.borrow(), vec![Some("name".to_owned())]);
    }

    #[test]
    fn removed_items_stop_forwarding() {
        let list = List::new();
        list.push(obj(json!({"name": "a"})));
        let item = list.pop().unwrap();
        let log = event_log(&list);
        item.as_hash().unwrap().set("name", "b");
        assert!(log.borrow().is_empty());
    }

    // ── Sorting ──────────────────────────────────────────────────────

    #[test]
    fn sort_dispatches_sort_then_change() {
        let list = List::from_vec(vec![Value::from(3), Value::from(1), Value::from(2)]);
        let log = event_log(&list);
        list.sort();
        assert_eq!(numbers(&list), vec![1.0, 2.0, 3.0]);
        assert_eq!(*log.borrow(), vec!["sort", "change"]);
    }

    #[test]
    fn sort_on_field() {
        let list = List::from_vec(vec![
            obj(json!({"n": "b"})),
            obj(json!({"n": "c"})),
            obj(json!({"n": "a"})),
        ]);
        list.sort_on("n");
        let names: Vec<String> = list
            .to_vec()
            .iter()
            .map(|item| item.as_hash().unwrap().get("n").to_display_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    // ── Helpers ──────────────────────────────────────────────────────

    #[test]
    fn proxies_wrap_sequences_in_lists() {
        let list = List::from_vec((1..=5).map(Value::from).collect());
        let even = list.filter(|v| v.as_f64().is_some_and(|n| n % 2.0 == 0.0));
        assert_eq!(numbers(&even), vec![2.0, 4.0]);
        let odd = list.reject(|v| v.as_f64().is_some_and(|n| n % 2.0 == 0.0));
        assert_eq!(numbers(&odd), vec![1.0, 3.0, 5.0]);
        let doubled = list.map(|v| Value::from(v.as_f64().unwrap_or(0.0) * 2.0));
        assert_eq!(numbers(&doubled), vec![2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(numbers(&list.take(2)), vec![1.0, 2.0]);
        assert_eq!(numbers(&list.rest(3)), vec![4.0, 5.0]);
        assert_eq!(numbers(&list.without(&[Value::from(1), Value::from(5)])), vec![2.0, 3.0, 4.0]);
        assert_eq!(numbers(&list.slice(1, Some(3))), vec![2.0, 3.0]);
    }

    #[test]
    fn proxies_return_scalars() {
        let list = List::from_vec(vec![Value::from(1), Value::from(2), Value::from(1)]);
        assert_eq!(list.find(|v| v.as_f64() == Some(2.0)), Some(Value::from(2)));
        assert_eq!(list.find_index(|v| v.as_f64() == Some(2.0)), Some(1));
        assert!(list.every(|v| v.as_f64().is_some()));
        assert!(list.some(|v| v.as_f64() == Some(2.0)));
        assert!(list.contains(&Value::from(2)));
        assert_eq!(list.index_of(&Value::from(1)), Some(0));
        assert_eq!(list.last_index_of(&Value::from(1)), Some(2));
        assert_eq!(list.first(), Some(Value::from(1)));
        assert_eq!(list.last(), Some(Value::from(1)));
        assert_eq!(list.size(), 3);
        assert_eq!(list.reduce(0.0, |acc, v| acc + v.as_f64().unwrap_or(0.0)), 4.0);

        let mut seen = Vec::new();
        list.for_each(|_, index| seen.push(index));
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn derived_lists_share_item_class() {
        let class = ItemClass::new("Row", Hash::with_options);
        let list = List::with_options(ListOptions::new().item_class(class));
        list.push(obj(json!({"a": 1})));
        assert_eq!(list.filter(|_| true).item_class().name(), "Row");
        assert_eq!(list.clone_list().item_class().name(), "Row");
    }

    #[test]
    fn clone_list_shares_items_not_identity() {
        let list = List::new();
        list.push(obj(json!({"a": 1})));
        let copy = list.clone_list();
        assert!(!copy.ptr_eq(&list));
        assert!(copy.item_at(0).as_hash().unwrap().ptr_eq(list.item_at(0).as_hash().unwrap()));
    }

    #[test]
    fn to_json_serializes_items() {
        let list = List::from_vec(vec![obj(json!({"a": 1, "_p": 2})), Value::from("x")]);
        assert_eq!(list.to_json(), json!([{"a": 1}, "x"]));
    }

    #[test]
    fn set_source_resets() {
        let list = List::from_vec(vec![Value::from(1), Value::from(2)]);
        let log = event_log(&list);
        list.set_source(vec![Value::from(3)]);
        assert_eq!(numbers(&list), vec![3.0]);
        assert_eq!(
            *log.borrow(),
            vec![
                "add",
                "change:length",
                "change",
                "reset",
                "change:source",
                "change",
                "change:length",
                "change"
            ]
        );
    }
}
