//! Capture configuration for weak callables.
//!
//! [`CaptureOptions`] follows the builder style used by the rest of the crate: start from
//! `CaptureOptions::new()` (or `default()`) and chain setters.

use crate::{function::Function, value::Value};

/// Qualified-name fragments of emitter methods that are always captured strongly.
///
/// Bound signal emitters are usually created on the fly and handed straight to `connect`,
/// so a weak reference to them would die immediately.
pub const DEFAULT_STRONG_QUALNAMES: [&str; 2] = ["pyqtBoundSignal.emit", "SignalInstance.emit"];

/// What to do when a part of a callback cannot be weakly referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum StrongFallback {
    /// Capture the part strongly without comment.
    Silent,
    /// Capture the part strongly and emit a `tracing` warning.
    #[default]
    Warn,
    /// Refuse to build the callback (`TypeError`).
    Deny,
}

/// Functions that are always captured strongly, matched by name or qualified name.
///
/// Anonymous functions are typically created inline at the registration site and have no
/// other owner; holding them weakly would make the callback dead on arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrongCapturePolicy {
    /// Exact function names (e.g. `<lambda>`).
    pub names: Vec<String>,
    /// Substrings matched against the qualified name.
    pub qualname_patterns: Vec<String>,
}

impl StrongCapturePolicy {
    /// A policy that never forces strong capture.
    #[must_use]
    pub fn none() -> Self {
        Self {
            names: Vec::new(),
            qualname_patterns: Vec::new(),
        }
    }

    /// Adds an exact function name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Adds a qualified-name fragment.
    #[must_use]
    pub fn qualname_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.qualname_patterns.push(pattern.into());
        self
    }

    /// Returns true if `func` must be held strongly.
    #[must_use]
    pub fn matches(&self, func: &Function) -> bool {
        self.names.iter().any(|name| name == func.name())
            || self
                .qualname_patterns
                .iter()
                .any(|pattern| func.qualname().contains(pattern.as_str()))
    }
}

impl Default for StrongCapturePolicy {
    fn default() -> Self {
        Self {
            names: vec![crate::function::LAMBDA_NAME.to_owned()],
            qualname_patterns: DEFAULT_STRONG_QUALNAMES.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Options consulted when a weak callable is built.
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Maximum number of positional arguments forwarded by the batch interface.
    pub max_args: Option<usize>,
    /// Attribute name or index for the setter variants.
    pub key: Option<Value>,
    /// Policy for parts that cannot be weakly referenced.
    pub fallback: StrongFallback,
    /// Functions that are always captured strongly.
    pub strong_capture: StrongCapturePolicy,
}

impl CaptureOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of forwarded positional arguments.
    #[must_use]
    pub fn max_args(mut self, limit: usize) -> Self {
        self.max_args = Some(limit);
        self
    }

    /// Sets the key used by `__setattr__` / `__setitem__` callbacks.
    #[must_use]
    pub fn key(mut self, key: impl Into<Value>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the strong-capture fallback policy.
    #[must_use]
    pub fn fallback(mut self, fallback: StrongFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Replaces the always-strong function policy.
    #[must_use]
    pub fn strong_capture(mut self, policy: StrongCapturePolicy) -> Self {
        self.strong_capture = policy;
        self
    }
}
