//! # ez-binding: Reactive Binding Engine
//!
//! Binds a mutable data graph to a DOM tree. Nodes carry binding markup:
//!
//! - `ez-bind="user.name"` binds an element value,
//! - `ez-bind:title="user.name"` binds one attribute,
//! - `ez-for="items"` repeats an element per array item,
//! - ``` ``user.name`` ``` interpolates into text and attribute values.
//!
//! Every write through the wrapped data root updates exactly the nodes that
//! depend on it.
//!
//! ## Binding Invariants
//!
//! 1. **Canonical Paths**: every registry key is a canonical path string.
//!    `a.b`, `.a.b`, `a["b"]` and `a['b']` all register under `a.b`;
//!    numeric brackets stay brackets (`items[0].name`).
//!
//! 2. **Aliases**: a container reachable through several paths emits one
//!    change event per path it has been observed at.
//!
//! 3. **Fan-out Order**: deep records first, then exact, then descendants
//!    (when a container was stored), then every ancestor. A record reacts at
//!    most once per event.
//!
//! 4. **Detached Guard**: a record whose node left the document never
//!    applies. Records are only dropped by an explicit `Engine::compact()`.
//!
//! 5. **Coalescing**: select and repeat rebuilds run at most once per
//!    key per turn, after `Engine::flush()`, in first-request order.
//!
//! 6. **Isolation**: a failing apply is logged and swallowed; it never
//!    stops propagation to the remaining records.

mod bind;
mod compile;
mod engine;
mod propagate;
mod repeat;
mod scheduler;
mod template;

pub mod diagnostics;
pub mod dom;
pub mod error;
pub mod options;
pub mod path;
pub mod reactive;
pub mod registry;
pub mod select;
pub mod value;

#[cfg(test)]
mod engine_tests;
#[cfg(test)]
mod path_tests;

pub use compile::CompileReport;
pub use diagnostics::{Diagnostics, Level, LogEntry, RecordingDiagnostics, TracingDiagnostics};
pub use engine::Engine;
pub use error::{BindError, Result};
pub use options::EngineOptions;
pub use path::{Path, PathKey};
pub use reactive::{ChangeEvent, ChangeKind, Field, Reactive, Store};
pub use registry::RegistryStats;
pub use scheduler::{CoalescingTable, Scheduler};
pub use select::{SelectModel, SelectOption};
pub use template::TemplateSyntax;
pub use value::{Container, Value};
