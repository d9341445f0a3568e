//! Data values of the reactive graph.
//!
//! Scalars are plain values. Objects and arrays live in shared containers with
//! a process-unique identity, so one container can be reachable through more
//! than one path. Equality follows that split: scalars compare by value,
//! containers by identity.

use serde_json::{Map, Number};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{BindError, Result};
use crate::path::PathKey;

static CONTAINER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn generate_container_id() -> u64 {
    CONTAINER_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTAINERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub enum Body {
    Object(BTreeMap<String, Value>),
    Array(Vec<Value>),
}

#[derive(Debug)]
struct ContainerInner {
    id: u64,
    body: RefCell<Body>,
}

/// Shared object or array. Cloning shares the same storage.
#[derive(Clone)]
pub struct Container(Rc<ContainerInner>);

impl Container {
    pub fn object() -> Self {
        Self::with_body(Body::Object(BTreeMap::new()))
    }

    pub fn array() -> Self {
        Self::with_body(Body::Array(Vec::new()))
    }

    pub fn with_body(body: Body) -> Self {
        Container(Rc::new(ContainerInner {
            id: generate_container_id(),
            body: RefCell::new(body),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn ptr_eq(&self, other: &Container) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_array(&self) -> bool {
        matches!(*self.0.body.borrow(), Body::Array(_))
    }

    pub fn len(&self) -> usize {
        match &*self.0.body.borrow() {
            Body::Object(map) => map.len(),
            Body::Array(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in iteration order (sorted names, or ascending indices).
    pub fn keys(&self) -> Vec<PathKey> {
        match &*self.0.body.borrow() {
            Body::Object(map) => map.keys().cloned().map(PathKey::Name).collect(),
            Body::Array(items) => (0..items.len()).map(PathKey::Index).collect(),
        }
    }

    /// Normalize a key for this container: all-digit names become indices.
    ///
    /// Objects still store them under their decimal name; only the event path
    /// spelling changes, so `obj.0` and `obj[0]` address the same entry.
    pub fn normalize_key(&self, key: PathKey) -> PathKey {
        match key.as_index() {
            Some(index) => PathKey::Index(index),
            None => key,
        }
    }

    pub fn get(&self, key: &PathKey) -> Option<Value> {
        match &*self.0.body.borrow() {
            Body::Object(map) => map.get(&key.as_name()).cloned(),
            Body::Array(items) => key.as_index().and_then(|i| items.get(i).cloned()),
        }
    }

    pub fn contains(&self, key: &PathKey) -> bool {
        match &*self.0.body.borrow() {
            Body::Object(map) => map.contains_key(&key.as_name()),
            Body::Array(items) => key.as_index().map(|i| i < items.len()).unwrap_or(false),
        }
    }

    /// Assign `value` under `key`, returning the previous value.
    ///
    /// Arrays grow with `Null` padding when `key` lies past the end.
    pub fn set(&self, key: &PathKey, value: Value) -> Result<Option<Value>> {
        match &mut *self.0.body.borrow_mut() {
            Body::Object(map) => Ok(map.insert(key.as_name(), value)),
            Body::Array(items) => {
                let index = key.as_index().ok_or_else(|| BindError::InvalidTarget {
                    key: key.to_string(),
                    target: "array".to_string(),
                })?;
                if index < items.len() {
                    Ok(Some(std::mem::replace(&mut items[index], value)))
                } else {
                    items.resize(index, Value::Null);
                    items.push(value);
                    Ok(None)
                }
            }
        }
    }

    /// Remove `key`, returning the removed value. Array removal shifts later items.
    pub fn remove(&self, key: &PathKey) -> Option<Value> {
        match &mut *self.0.body.borrow_mut() {
            Body::Object(map) => map.remove(&key.as_name()),
            Body::Array(items) => {
                let index = key.as_index()?;
                if index < items.len() {
                    Some(items.remove(index))
                } else {
                    None
                }
            }
        }
    }

    /// Deep copy into JSON. A container met again on its own ancestry becomes `null`.
    pub fn snapshot(&self) -> serde_json::Value {
        let mut stack = HashSet::new();
        self.snapshot_guarded(&mut stack)
    }

    fn snapshot_guarded(&self, stack: &mut HashSet<u64>) -> serde_json::Value {
        if !stack.insert(self.id()) {
            return serde_json::Value::Null;
        }
        let out = match &*self.0.body.borrow() {
            Body::Object(map) => {
                let mut json = Map::new();
                for (key, value) in map {
                    json.insert(key.clone(), value.snapshot_guarded(stack));
                }
                serde_json::Value::Object(json)
            }
            Body::Array(items) => serde_json::Value::Array(
                items.iter().map(|v| v.snapshot_guarded(stack)).collect(),
            ),
        };
        stack.remove(&self.id());
        out
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_array() { "Array" } else { "Object" };
        write!(f, "{}#{}", kind, self.id())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Container(Container),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Container(_))
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Strict identity: scalar equality, container identity.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Container(a), Value::Container(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Text shown in the DOM: `""` for null, plain scalars, compact JSON for containers.
    pub fn display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Container(c) => serde_json::to_string(&c.snapshot()).unwrap_or_default(),
        }
    }

    pub fn snapshot(&self) -> serde_json::Value {
        let mut stack = HashSet::new();
        self.snapshot_guarded(&mut stack)
    }

    fn snapshot_guarded(&self, stack: &mut HashSet<u64>) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Container(c) => c.snapshot_guarded(stack),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Container(Container::with_body(
                Body::Array(items.into_iter().map(Value::from).collect()),
            )),
            serde_json::Value::Object(map) => Value::Container(Container::with_body(
                Body::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
            )),
        }
    }
}

impl From<Container> for Value {
    fn from(container: Container) -> Self {
        Value::Container(container)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
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

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}
