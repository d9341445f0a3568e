//! Error taxonomy of the binding engine.
//!
//! Binding failures are isolated at the propagation boundary: they are
//! reported to diagnostics and swallowed. Only `Fatal` is meant to travel
//! further, and the engine itself never produces it.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("binding for '{path}' failed to apply: {reason}")]
    ApplyFailed { path: String, reason: String },

    #[error("value at '{path}' has the wrong shape: expected {expected}")]
    ShapeMismatch { path: String, expected: &'static str },

    #[error("cannot write key '{key}' on {target}")]
    InvalidTarget { key: String, target: String },

    #[error("node bound to '{path}' is detached")]
    Detached { path: String },

    #[error("fatal: {message}")]
    Fatal { message: String },

    #[error("invalid engine options: {0}")]
    Options(String),
}

pub type Result<T> = std::result::Result<T, BindError>;
