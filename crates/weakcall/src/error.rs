use std::{borrow::Cow, fmt};

use strum::{Display, EnumString, IntoStaticStr};

/// Result type alias for operations that can fail while building or calling a callback.
pub type CallResult<T> = Result<T, CallError>;

/// Python-style exception classes surfaced by callers and callback bodies.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `TypeError` -> "TypeError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ExcType {
    /// Catch-all class for errors raised by callback bodies.
    Exception,
    /// Wrong shape of value for an operation (e.g. non-callable target).
    TypeError,
    /// Liveness failures: a weakly-held part of a callback has been reclaimed.
    RuntimeError,
    /// Missing or read-only attribute.
    AttributeError,
    /// Missing mapping key.
    KeyError,
    /// Sequence index out of range.
    IndexError,
    /// Right type, wrong value.
    ValueError,
}

impl ExcType {
    /// Builds a `TypeError` with the given message.
    #[must_use]
    pub fn type_error(msg: impl Into<Cow<'static, str>>) -> CallError {
        CallError::exception(Self::TypeError, msg)
    }

    /// Builds an `AttributeError` for a missing attribute on an object of `type_name`.
    #[must_use]
    pub fn attribute_error(type_name: &str, attr: &str) -> CallError {
        CallError::exception(
            Self::AttributeError,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
    }

    /// Builds the `TypeError` raised when an object does not support item assignment.
    #[must_use]
    pub fn type_error_not_sub_assignment(type_name: &str) -> CallError {
        Self::type_error(format!("'{type_name}' object does not support item assignment"))
    }

    /// Builds the `TypeError` raised when a callable receives the wrong number of positional args.
    #[must_use]
    pub fn type_error_arg_count(name: &str, expected: usize, actual: usize) -> CallError {
        if expected == 1 {
            Self::type_error(format!("{name}() takes exactly one argument ({actual} given)"))
        } else {
            Self::type_error(format!("{name} expected {expected} arguments, got {actual}"))
        }
    }

    /// Builds the `TypeError` raised when a value is called but is not callable.
    #[must_use]
    pub fn type_error_not_callable(type_name: &str) -> CallError {
        Self::type_error(format!("'{type_name}' object is not callable"))
    }

    /// Builds a `KeyError` carrying the repr of the missing key.
    #[must_use]
    pub fn key_error(key_repr: String) -> CallError {
        CallError::exception(Self::KeyError, key_repr)
    }
}

/// Which part of a weak callback was found dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gone {
    /// The receiver object of a method, setter, or partial target.
    Object,
    /// The plain function itself.
    Function,
}

/// Where a dead bound argument of a weak partial was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgPosition {
    /// A positional argument, by index.
    Positional(usize),
    /// A keyword argument, by name.
    Keyword(String),
}

/// Error returned by weak callback construction and invocation.
///
/// Liveness failures (`TargetGone`, `ArgumentGone`) are kept apart from errors raised
/// by the callback body or by construction so that callers can prune dead registrations
/// without inspecting messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// A required weak part of the target (receiver or function) has been reclaimed.
    TargetGone(Gone),
    /// A weakly-held bound argument of a weak partial has been reclaimed.
    ArgumentGone(ArgPosition),
    /// An exception raised by construction or by the called body.
    Exception {
        exc_type: ExcType,
        message: Cow<'static, str>,
    },
}

impl CallError {
    /// Creates an exception-style error.
    #[must_use]
    pub fn exception(exc_type: ExcType, message: impl Into<Cow<'static, str>>) -> Self {
        Self::Exception {
            exc_type,
            message: message.into(),
        }
    }

    /// Returns the Python-style exception class for this error.
    ///
    /// Both liveness failures map to `RuntimeError`.
    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        match self {
            Self::TargetGone(_) | Self::ArgumentGone(_) => ExcType::RuntimeError,
            Self::Exception { exc_type, .. } => *exc_type,
        }
    }

    /// Returns true when this error only reports that a weak part was reclaimed.
    #[must_use]
    pub fn is_liveness(&self) -> bool {
        matches!(self, Self::TargetGone(_) | Self::ArgumentGone(_))
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetGone(Gone::Object) => write!(f, "RuntimeError: object has been deleted"),
            Self::TargetGone(Gone::Function) => write!(f, "RuntimeError: function has been deleted"),
            Self::ArgumentGone(ArgPosition::Positional(index)) => {
                write!(f, "RuntimeError: object in args has been deleted (position {index})")
            }
            Self::ArgumentGone(ArgPosition::Keyword(name)) => {
                write!(f, "RuntimeError: object in kwargs has been deleted (keyword '{name}')")
            }
            Self::Exception { exc_type, message } => write!(f, "{exc_type}: {message}"),
        }
    }
}

impl std::error::Error for CallError {}
