//! Reactive Wrapper
//!
//! Wraps the data root, and lazily every container reached through it, so
//! that every read, write and delete is observable.
//!
//! ## Invariants
//!
//! 1. **Stable identity**: reading the same container through the same path
//!    returns the same `Reactive` view (`Reactive::ptr_eq`) for as long as a
//!    caller holds it.
//! 2. **Alias sets grow only**: every path through which a container was read,
//!    or under which it was stored by a wrapped write, is remembered.
//! 3. **One event per alias**: a mutation of a container emits one
//!    `ChangeEvent` for each alias of that container, after the mutation took
//!    effect. Mutation and emission happen in the same call.
//! 4. **Idempotent writes**: assigning a value identical to the current one
//!    (scalar equality, container identity) emits nothing.
//! 5. **No borrow across callbacks**: the change hook runs with no store
//!    state borrowed, so it may read and write through wrappers freely.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::diagnostics::{Diagnostics, Level};
use crate::path::{to_canonical, Path, PathKey};
use crate::value::{Container, Value};

// ═══════════════════════════════════════════════════════════════════════════════
// CHANGE EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Set,
    Delete,
    Define,
}

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: Path,
    pub path_string: String,
    /// Raw container that owns the mutated key.
    pub target: Container,
    pub key: PathKey,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
}

pub type ChangeHook = Rc<dyn Fn(&ChangeEvent)>;

// ═══════════════════════════════════════════════════════════════════════════════
// STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct StoreState {
    /// container id -> every path it was observed at, in first-seen order
    aliases: HashMap<u64, Vec<Path>>,
    /// (container id, canonical path) -> wrapped view
    views: HashMap<(u64, String), Weak<ViewInner>>,
    hook: Option<ChangeHook>,
}

/// Bookkeeping shared by every wrapped view of one data root.
#[derive(Clone)]
pub struct Store {
    state: Rc<RefCell<StoreState>>,
    diagnostics: Rc<dyn Diagnostics>,
}

impl Store {
    pub fn new(diagnostics: Rc<dyn Diagnostics>) -> Self {
        Store {
            state: Rc::new(RefCell::new(StoreState::default())),
            diagnostics,
        }
    }

    /// Wrap a value as a data root. Scalars come back unchanged.
    pub fn wrap(&self, value: Value) -> Field {
        match value {
            Value::Container(raw) => Field::Node(self.view(raw, Path::root())),
            other => Field::Value(other),
        }
    }

    /// Install the single change subscriber, replacing any previous one.
    pub fn on_change(&self, hook: ChangeHook) {
        self.state.borrow_mut().hook = Some(hook);
    }

    /// Every path the container has been observed at.
    pub fn aliases_of(&self, raw: &Container) -> Vec<Path> {
        self.state
            .borrow()
            .aliases
            .get(&raw.id())
            .cloned()
            .unwrap_or_default()
    }

    fn record_alias(&self, raw: &Container, path: &Path) {
        let mut state = self.state.borrow_mut();
        let paths = state.aliases.entry(raw.id()).or_default();
        if !paths.contains(path) {
            paths.push(path.clone());
        }
    }

    /// Cached view for (container, path); creates and records the alias when absent.
    fn view(&self, raw: Container, path: Path) -> Reactive {
        let path_string = to_canonical(&path);
        let cache_key = (raw.id(), path_string.clone());

        if let Some(existing) = self
            .state
            .borrow()
            .views
            .get(&cache_key)
            .and_then(Weak::upgrade)
        {
            return Reactive(existing);
        }

        self.record_alias(&raw, &path);
        let view = Rc::new(ViewInner {
            store: self.clone(),
            raw,
            path,
            path_string,
        });
        self.state
            .borrow_mut()
            .views
            .insert(cache_key, Rc::downgrade(&view));
        Reactive(view)
    }

    /// Emit one event per alias of `owner`. Called after the mutation took effect.
    fn emit(
        &self,
        owner: &Container,
        fallback: &Path,
        key: &PathKey,
        kind: ChangeKind,
        new_value: Option<Value>,
        old_value: Option<Value>,
    ) {
        let mut aliases = self.aliases_of(owner);
        if aliases.is_empty() {
            aliases.push(fallback.clone());
        }

        let events: Vec<ChangeEvent> = aliases
            .iter()
            .map(|alias| {
                let path = alias.child(key.clone());
                ChangeEvent {
                    kind,
                    path_string: to_canonical(&path),
                    path,
                    target: owner.clone(),
                    key: key.clone(),
                    new_value: new_value.clone(),
                    old_value: old_value.clone(),
                }
            })
            .collect();

        let hook = self.state.borrow().hook.clone();
        if let Some(hook) = hook {
            for event in &events {
                hook(event);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WRAPPED VIEWS
// ═══════════════════════════════════════════════════════════════════════════════

struct ViewInner {
    store: Store,
    raw: Container,
    path: Path,
    path_string: String,
}

/// Path-qualified, observable view of one container.
#[derive(Clone)]
pub struct Reactive(Rc<ViewInner>);

/// Result of a read: a scalar, or a wrapped view of a nested container.
#[derive(Clone, Debug)]
pub enum Field {
    Value(Value),
    Node(Reactive),
}

impl Field {
    pub fn as_node(&self) -> Option<&Reactive> {
        match self {
            Field::Node(node) => Some(node),
            Field::Value(_) => None,
        }
    }

    /// Raw value, unwrapping views.
    pub fn to_value(&self) -> Value {
        match self {
            Field::Value(v) => v.clone(),
            Field::Node(node) => Value::Container(node.raw()),
        }
    }

    pub fn display(&self) -> String {
        self.to_value().display()
    }
}

impl Reactive {
    pub fn path(&self) -> &Path {
        &self.0.path
    }

    pub fn path_string(&self) -> &str {
        &self.0.path_string
    }

    /// Explicit unwrap accessor: the raw container behind this view.
    pub fn raw(&self) -> Container {
        self.0.raw.clone()
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_array(&self) -> bool {
        self.0.raw.is_array()
    }

    pub fn len(&self) -> usize {
        self.0.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.raw.is_empty()
    }

    pub fn keys(&self) -> Vec<PathKey> {
        self.0.raw.keys()
    }

    pub fn contains(&self, key: impl Into<PathKey>) -> bool {
        self.0.raw.contains(&key.into())
    }

    pub fn snapshot(&self) -> serde_json::Value {
        self.0.raw.snapshot()
    }

    /// Read one key. Containers come back wrapped and qualified by path.
    pub fn get(&self, key: impl Into<PathKey>) -> Option<Field> {
        let key = self.0.raw.normalize_key(key.into());
        match self.0.raw.get(&key)? {
            Value::Container(child) => {
                let path = self.0.path.child(key);
                Some(Field::Node(self.0.store.view(child, path)))
            }
            scalar => Some(Field::Value(scalar)),
        }
    }

    /// Walk `path` from this view.
    pub fn resolve(&self, path: &Path) -> Option<Field> {
        let mut current = Field::Node(self.clone());
        for key in path.keys() {
            let node = current.as_node()?.clone();
            current = node.get(key.clone())?;
        }
        Some(current)
    }

    /// Intercepted assignment. Emits `Add` or `Set` per alias of this container.
    pub fn set(&self, key: impl Into<PathKey>, value: impl Into<Value>) {
        self.write(key.into(), value.into(), false);
    }

    /// Intercepted definition. Always emits `Define`, even for an unchanged value.
    pub fn define(&self, key: impl Into<PathKey>, value: impl Into<Value>) {
        self.write(key.into(), value.into(), true);
    }

    /// Append to an array view.
    pub fn push(&self, value: impl Into<Value>) {
        if !self.is_array() {
            self.0.store.diagnostics.log(
                Level::Warn,
                "push on a non-array value ignored",
                Some(&self.0.path_string),
            );
            return;
        }
        let index = self.len();
        self.write(PathKey::Index(index), value.into(), false);
    }

    /// Intercepted delete. Absent keys are a no-op.
    ///
    /// Array deletes shift later items down: every shifted index reports a
    /// `Set` and the old last index reports the `Delete`.
    pub fn delete(&self, key: impl Into<PathKey>) {
        let raw = &self.0.raw;
        let key = raw.normalize_key(key.into());
        let shifted: Vec<Value> = match key.as_index() {
            Some(index) if raw.is_array() => (index..raw.len())
                .filter_map(|i| raw.get(&PathKey::Index(i)))
                .collect(),
            _ => Vec::new(),
        };
        let Some(old) = raw.remove(&key) else {
            return;
        };
        let Some(start) = key.as_index().filter(|_| raw.is_array()) else {
            self.0
                .store
                .emit(raw, &self.0.path, &key, ChangeKind::Delete, None, Some(old));
            return;
        };

        for (offset, previous) in shifted.into_iter().enumerate() {
            let slot = PathKey::Index(start + offset);
            match raw.get(&slot) {
                Some(current) => {
                    if let Value::Container(child) = &current {
                        self.record_child_alias(child, &slot);
                    }
                    self.0.store.emit(
                        raw,
                        &self.0.path,
                        &slot,
                        ChangeKind::Set,
                        Some(current),
                        Some(previous),
                    );
                }
                None => self.0.store.emit(
                    raw,
                    &self.0.path,
                    &slot,
                    ChangeKind::Delete,
                    None,
                    Some(previous),
                ),
            }
        }
    }

    fn record_child_alias(&self, child: &Container, key: &PathKey) {
        let mut owners = self.0.store.aliases_of(&self.0.raw);
        if owners.is_empty() {
            owners.push(self.0.path.clone());
        }
        for owner in owners {
            self.0.store.record_alias(child, &owner.child(key.clone()));
        }
    }

    fn write(&self, key: PathKey, value: Value, define: bool) {
        let raw = &self.0.raw;
        let key = raw.normalize_key(key);
        let old = raw.get(&key);

        if !define {
            if let Some(previous) = &old {
                if previous.same_as(&value) {
                    return;
                }
            }
        }

        if let Err(e) = raw.set(&key, value.clone()) {
            self.0
                .store
                .diagnostics
                .log(Level::Warn, &e.to_string(), Some(&self.0.path_string));
            return;
        }

        if let Value::Container(child) = &value {
            self.record_child_alias(child, &key);
        }

        let kind = if define {
            ChangeKind::Define
        } else if old.is_none() {
            ChangeKind::Add
        } else {
            ChangeKind::Set
        };
        self.0
            .store
            .emit(raw, &self.0.path, &key, kind, Some(value), old);
    }
}

impl From<Reactive> for Value {
    fn from(view: Reactive) -> Self {
        Value::Container(view.raw())
    }
}

impl From<&Reactive> for Value {
    fn from(view: &Reactive) -> Self {
        Value::Container(view.raw())
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("path", &self.0.path_string)
            .field("raw", &self.0.raw)
            .finish()
    }
}
