//! Binding Engine
//!
//! One `Engine` per mounted document. It owns the wrapped data root, the four
//! binding registries and the rebuild scheduler, and installs itself as the
//! store's change subscriber.
//!
//! ## Turns
//!
//! Mutations propagate synchronously, in issue order. Rebuilds that were
//! coalesced (select models, repeats) wait for the host to end the turn with
//! [`Engine::flush`], or to drain everything with [`Engine::settle`].
//!
//! ## Re-entrancy
//!
//! No `RefCell` borrow of engine state is held while a change hook or a
//! binding apply runs. Every apply is free to read and write the data root,
//! which may propagate again.

use markup5ever_rcdom::{Handle, WeakHandle};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use crate::bind::{self, Listener};
use crate::compile::{self, CompileReport};
use crate::diagnostics::{Diagnostics, Level, TracingDiagnostics};
use crate::dom;
use crate::error::{BindError, Result};
use crate::options::EngineOptions;
use crate::path::{parse, Path};
use crate::propagate;
use crate::reactive::{ChangeEvent, Field, Reactive, Store};
use crate::registry::{Registries, RegistryStats};
use crate::repeat;
use crate::scheduler::{Scheduler, Task};
use crate::template::TemplateSyntax;
use crate::value::{Container, Value};

pub(crate) struct EngineInner {
    pub store: Store,
    pub root: Reactive,
    pub registries: RefCell<Registries>,
    pub scheduler: RefCell<Scheduler>,
    /// (node key, binding slot) -> node, so no slot is bound twice
    pub marks: RefCell<HashMap<(usize, String), WeakHandle>>,
    pub listeners: RefCell<HashMap<usize, Listener>>,
    /// Elements currently writing back into the data root.
    pub updating: RefCell<HashSet<usize>>,
    pub syntax: TemplateSyntax,
    pub options: EngineOptions,
    pub diagnostics: Rc<dyn Diagnostics>,
}

/// Clears the "currently updating" flag of one element when dropped.
pub(crate) struct UpdateGuard<'a> {
    engine: &'a EngineInner,
    key: usize,
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.engine.updating.borrow_mut().remove(&self.key);
    }
}

impl EngineInner {
    /// Resolve `path` from the data root.
    pub fn read(&self, path: &Path) -> Option<Field> {
        self.root.resolve(path)
    }

    /// Claim binding slot `slot` on `node`. False when it was already claimed.
    pub fn mark(&self, node: &Handle, slot: &str) -> bool {
        let key = (dom::node_key(node), slot.to_string());
        let mut marks = self.marks.borrow_mut();
        if let Some(existing) = marks.get(&key).and_then(|weak| weak.upgrade()) {
            if Rc::ptr_eq(&existing, node) {
                return false;
            }
        }
        marks.insert(key, Rc::downgrade(node));
        true
    }

    pub fn is_marked(&self, node: &Handle, slot: &str) -> bool {
        self.marks
            .borrow()
            .get(&(dom::node_key(node), slot.to_string()))
            .and_then(|weak| weak.upgrade())
            .is_some_and(|existing| Rc::ptr_eq(&existing, node))
    }

    pub fn is_updating(&self, node: &Handle) -> bool {
        self.updating.borrow().contains(&dom::node_key(node))
    }

    /// Flag `node` as writing back until the guard drops.
    pub fn begin_update(&self, node: &Handle) -> UpdateGuard<'_> {
        let key = dom::node_key(node);
        self.updating.borrow_mut().insert(key);
        UpdateGuard { engine: self, key }
    }

    pub fn log(&self, level: Level, message: &str, context: Option<&str>) {
        self.diagnostics.log(level, message, context);
    }

    /// Run one apply; an error is logged with `context` and swallowed.
    ///
    /// Data of the wrong shape is a warning, any other failure an error.
    pub fn run_isolated(&self, context: &str, apply: impl FnOnce() -> Result<()>) {
        match apply() {
            Ok(()) => {}
            Err(e @ BindError::ShapeMismatch { .. }) => {
                self.log(Level::Warn, &e.to_string(), Some(context))
            }
            Err(e) => self.log(Level::Error, &e.to_string(), Some(context)),
        }
    }

    /// Assign `value` at `path` through the wrapped parent container.
    pub fn write_path(&self, path: &Path, value: Value) -> bool {
        let (Some(parent), Some(key)) = (path.parent(), path.last()) else {
            self.log(Level::Warn, "cannot replace the data root", None);
            return false;
        };
        match self.read(&parent) {
            Some(Field::Node(view)) => {
                view.set(key.clone(), value);
                true
            }
            _ => {
                self.log(
                    Level::Warn,
                    "parent of path is not a container",
                    Some(&path.to_canonical()),
                );
                false
            }
        }
    }

    pub fn delete_path(&self, path: &Path) -> bool {
        let (Some(parent), Some(key)) = (path.parent(), path.last()) else {
            self.log(Level::Warn, "cannot delete the data root", None);
            return false;
        };
        match self.read(&parent) {
            Some(Field::Node(view)) if view.contains(key.clone()) => {
                view.delete(key.clone());
                true
            }
            _ => false,
        }
    }

    /// Drain one turn of coalesced rebuilds. Returns how many ran.
    fn flush(&self) -> usize {
        let tasks = self.scheduler.borrow_mut().take_turn();
        let mut ran = 0;
        for task in tasks {
            self.scheduler.borrow_mut().complete(&task);
            if !dom::is_attached(task.node()) {
                continue;
            }
            match &task {
                Task::Select(record) => {
                    self.run_isolated(&record.path_string, || bind::apply_deep_now(self, record))
                }
                Task::Repeat(record) => {
                    self.run_isolated(&record.source_string, || repeat::rebuild(self, record))
                }
            }
            ran += 1;
        }
        ran
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════════

/// Reactive binding engine for one data root and the DOM compiled against it.
pub struct Engine {
    inner: Rc<EngineInner>,
}

impl Engine {
    /// Engine with default options, reporting through `tracing`.
    ///
    /// A root that is not a JSON object is replaced by an empty object.
    pub fn new(data: serde_json::Value) -> Self {
        let diagnostics: Rc<dyn Diagnostics> = Rc::new(TracingDiagnostics);
        let options = EngineOptions::default();
        let syntax = match TemplateSyntax::new(&options.template_delimiter) {
            Ok(syntax) => syntax,
            Err(_) => unreachable!("default delimiter is a valid pattern"),
        };
        Self::build(data, options, syntax, diagnostics)
    }

    pub fn with_options(
        data: serde_json::Value,
        options: EngineOptions,
        diagnostics: Rc<dyn Diagnostics>,
    ) -> Result<Self> {
        options.validate()?;
        let syntax = TemplateSyntax::new(&options.template_delimiter)?;
        Ok(Self::build(data, options, syntax, diagnostics))
    }

    fn build(
        data: serde_json::Value,
        options: EngineOptions,
        syntax: TemplateSyntax,
        diagnostics: Rc<dyn Diagnostics>,
    ) -> Self {
        let data = if data.is_object() {
            data
        } else {
            diagnostics.log(
                Level::Warn,
                "data root is not an object; starting from an empty one",
                None,
            );
            serde_json::Value::Object(Default::default())
        };

        let store = Store::new(diagnostics.clone());
        let root = match store.wrap(Value::from(data)) {
            Field::Node(root) => root,
            Field::Value(_) => match store.wrap(Value::Container(Container::object())) {
                Field::Node(root) => root,
                Field::Value(_) => unreachable!("a container always wraps to a view"),
            },
        };

        let inner = Rc::new(EngineInner {
            store,
            root,
            registries: RefCell::new(Registries::default()),
            scheduler: RefCell::new(Scheduler::new()),
            marks: RefCell::new(HashMap::new()),
            listeners: RefCell::new(HashMap::new()),
            updating: RefCell::new(HashSet::new()),
            syntax,
            options,
            diagnostics,
        });

        let weak: Weak<EngineInner> = Rc::downgrade(&inner);
        inner.store.on_change(Rc::new(move |event: &ChangeEvent| {
            if let Some(engine) = weak.upgrade() {
                propagate::on_change(&engine, event);
            }
        }));

        Engine { inner }
    }

    /// The wrapped data root.
    pub fn root(&self) -> Reactive {
        self.inner.root.clone()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    pub fn diagnostics(&self) -> Rc<dyn Diagnostics> {
        self.inner.diagnostics.clone()
    }

    /// Plain JSON copy of the whole data root.
    pub fn snapshot(&self) -> serde_json::Value {
        self.inner.root.snapshot()
    }

    pub fn get_path(&self, path: &str) -> Option<Field> {
        self.inner.read(&parse(path))
    }

    /// Assign through the wrapped parent. False when the parent is missing.
    pub fn set_path(&self, path: &str, value: impl Into<Value>) -> bool {
        self.inner.write_path(&parse(path), value.into())
    }

    /// Delete through the wrapped parent. False when nothing was there.
    pub fn delete_path(&self, path: &str) -> bool {
        self.inner.delete_path(&parse(path))
    }

    /// Bind `root` and everything below it. Already bound nodes are skipped.
    pub fn compile(&self, root: &Handle) -> CompileReport {
        let report = compile::compile(&self.inner, root);
        self.inner.log(
            Level::Debug,
            &format!("compiled {} bindings", report.total()),
            dom::tag_name(root).as_deref(),
        );
        report
    }

    /// End the current turn: run every coalesced rebuild queued so far.
    pub fn flush(&self) -> usize {
        self.inner.flush()
    }

    /// Flush until no rebuild is pending, at most `max_settle_turns` times.
    pub fn settle(&self) -> usize {
        let mut ran = 0;
        for _ in 0..self.inner.options.max_settle_turns {
            if self.inner.scheduler.borrow().is_idle() {
                return ran;
            }
            ran += self.inner.flush();
        }
        if !self.inner.scheduler.borrow().is_idle() {
            self.inner.log(
                Level::Warn,
                &format!(
                    "rebuilds still pending after {} turns",
                    self.inner.options.max_settle_turns
                ),
                None,
            );
        }
        ran
    }

    pub fn pending_rebuilds(&self) -> usize {
        self.inner.scheduler.borrow().pending()
    }

    /// Turns that ran at least one rebuild.
    pub fn turns(&self) -> u64 {
        self.inner.scheduler.borrow().turns()
    }

    /// Host notification that the user changed `node`'s value.
    pub fn dispatch_change(&self, node: &Handle) -> bool {
        bind::dispatch_change(&self.inner, node)
    }

    /// Drop every record whose node left the document. Returns how many went.
    pub fn compact(&self) -> usize {
        let dropped = {
            let mut registries = self.inner.registries.borrow_mut();
            registries.leaf.retain(|r| dom::is_attached(&r.node))
                + registries.deep.retain(|r| dom::is_attached(&r.node))
                + registries.template.retain(|r| dom::is_attached(&r.node))
                + registries.repeat.retain(|r| dom::is_attached(&r.anchor))
        };
        self.inner
            .marks
            .borrow_mut()
            .retain(|_, node| node.upgrade().is_some_and(|n| dom::is_attached(&n)));
        self.inner
            .listeners
            .borrow_mut()
            .retain(|_, l| l.node.upgrade().is_some_and(|n| dom::is_attached(&n)));
        if dropped > 0 {
            self.inner.log(
                Level::Debug,
                &format!("compacted {} detached records", dropped),
                None,
            );
        }
        dropped
    }

    pub fn stats(&self) -> RegistryStats {
        self.inner.registries.borrow().stats()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.inner.options)
            .field("stats", &self.stats())
            .finish()
    }
}
