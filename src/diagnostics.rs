//! Diagnostics sink consumed by the engine.
//!
//! The engine reports through `Diagnostics::log(level, message, context)`.
//! `TracingDiagnostics` forwards to `tracing`; `RecordingDiagnostics` also
//! keeps every entry so hosts and tests can inspect what was reported.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;

use crate::error::BindError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

pub trait Diagnostics {
    fn log(&self, level: Level, message: &str, context: Option<&str>);

    /// Log at `Fatal` and hand back the error the caller must propagate.
    fn fatal(&self, message: &str, context: Option<&str>) -> BindError {
        self.log(Level::Fatal, message, context);
        BindError::Fatal {
            message: message.to_string(),
        }
    }
}

/// Default sink: one `tracing` event per entry, target `ez_binding`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn log(&self, level: Level, message: &str, context: Option<&str>) {
        let context = context.unwrap_or("");
        match level {
            Level::Trace => tracing::trace!(target: "ez_binding", context, "{}", message),
            Level::Debug => tracing::debug!(target: "ez_binding", context, "{}", message),
            Level::Info => tracing::info!(target: "ez_binding", context, "{}", message),
            Level::Warn => tracing::warn!(target: "ez_binding", context, "{}", message),
            Level::Error => tracing::error!(target: "ez_binding", context, "{}", message),
            Level::Fatal => {
                tracing::error!(target: "ez_binding", context, fatal = true, "{}", message)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
    pub context: Option<String>,
}

/// Sink that keeps entries in memory and forwards them to `tracing`.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    entries: RefCell<Vec<LogEntry>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    pub fn count_at(&self, level: Level) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.level == level)
            .count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|e| e.message.contains(needle))
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn log(&self, level: Level, message: &str, context: Option<&str>) {
        TracingDiagnostics.log(level, message, context);
        self.entries.borrow_mut().push(LogEntry {
            level,
            message: message.to_string(),
            context: context.map(str::to_string),
        });
    }
}
