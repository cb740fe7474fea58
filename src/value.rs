//! Dynamic values stored in bindable properties.
//!
//! [`Value`] is the currency of the whole framework: property slots hold it,
//! change events carry it, directives receive it. Primitives, arrays and plain
//! objects compare structurally; entities ([`Hash`], [`List`]) and callbacks
//! compare by identity.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::model::{Hash, List};
use crate::reactive::{Bindable, Observable};

/// A plain key/value object.
pub type Map = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Callback
// ---------------------------------------------------------------------------

/// A function stored as a property value.
///
/// Used for parse functions (`cb-text="name|toUpper"`), DOM event handlers
/// (`cb-onclick="save"`) and setters. Identity is the `Rc` pointer.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&Value) -> Value>);

impl Callback {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&Value) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the callback with a single argument.
    pub fn call(&self, arg: &Value) -> Value {
        (self.0)(arg)
    }

    /// Whether two callbacks are the same function instance.
    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback(<fn>)")
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A dynamically typed property value.
#[derive(Clone, Default)]
pub enum Value {
    /// No value has been assigned.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    /// A plain object. Lists coerce these into their item class.
    Object(Map),
    Hash(Hash),
    List(List),
    Callback(Callback),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `undefined` or `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callback(&self) -> bool {
        matches!(self, Value::Callback(_))
    }

    /// Script-style truthiness: `false`, `0`, `NaN`, `""`, `null` and
    /// `undefined` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&Hash> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Value::Callback(c) => Some(c),
            _ => None,
        }
    }

    /// The observable core of an entity value, if this is one.
    pub fn as_observable(&self) -> Option<Observable> {
        match self {
            Value::Hash(h) => Some(h.observable().clone()),
            Value::List(l) => Some(l.observable().clone()),
            _ => None,
        }
    }

    /// Deep equality: structural for data, identity for entities and callbacks.
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.deep_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.deep_eq(vb))
            }
            (Value::Hash(a), Value::Hash(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Callback(a), Value::Callback(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Strict identity check used by the binding `set` helper before numeric
    /// coercion: primitives by value, everything else by reference.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => false,
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self.deep_eq(other),
        }
    }

    /// Convert numeric-looking strings into numbers, leaving everything else
    /// untouched. Empty and whitespace-only strings stay strings.
    pub fn coerce_numeric(self) -> Value {
        match self {
            Value::String(s) if !s.trim().is_empty() => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Value::Number(n),
                _ => Value::String(s),
            },
            other => other,
        }
    }

    /// Text used when a value is written into the DOM. `undefined` and `null`
    /// render as the empty string.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) | Value::Hash(_) => "[object Object]".to_owned(),
            Value::List(list) => list
                .to_vec()
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(","),
            Value::Callback(_) => "function".to_owned(),
        }
    }

    /// Convert into JSON. Undefined values and callbacks are dropped from
    /// objects and become `null` elsewhere.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Callback(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(|num| {
                    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                        serde_json::Value::from(*n as i64)
                    } else {
                        serde_json::Value::Number(num)
                    }
                })
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => map_to_json(map),
            Value::Hash(hash) => hash.to_json(),
            Value::List(list) => list.to_json(),
        }
    }

    /// Ordering used by sort helpers: numbers numerically, strings
    /// lexicographically, mixed types by their display string.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Undefined, Value::Undefined) => Ordering::Equal,
            (Value::Undefined, _) => Ordering::Greater,
            (_, Value::Undefined) => Ordering::Less,
            _ => self.to_display_string().cmp(&other.to_display_string()),
        }
    }
}

/// Format a number the way script engines print them: integral values have
/// no fractional part.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

pub(crate) fn map_to_json(map: &Map) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    for (key, value) in map {
        if value.is_undefined() || value.is_callback() {
            continue;
        }
        out.insert(key.clone(), value.to_json());
    }
    serde_json::Value::Object(out)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::Object(map) => f.debug_tuple("Object").field(map).finish(),
            Value::Hash(hash) => write!(f, "Hash({})", hash.to_json()),
            Value::List(list) => write!(f, "List({})", list.to_json()),
            Value::Callback(_) => write!(f, "Callback(<fn>)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

impl From<Hash> for Value {
    fn from(hash: Hash) -> Self {
        Value::Hash(hash)
    }
}

impl From<List> for Value {
    fn from(list: List) -> Self {
        Value::List(list)
    }
}

impl From<Callback> for Value {
    fn from(callback: Callback) -> Self {
        Value::Callback(callback)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

/// Build a [`Map`] from a JSON object literal. Non-object JSON yields an
/// empty map.
pub fn map_from_json(json: serde_json::Value) -> Map {
    match Value::from(json) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
