//! Error types for the bridge.
//!
//! Host-level exceptions are modelled as [`Error::Raised`], which carries the
//! [`ExceptionClass`] the exception was raised with. Every class registered by
//! the bootstrap descends from `OpenSSL::OpenSSLError`, which itself descends
//! from `StandardError`.

use std::collections::TryReserveError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::bootstrap::SubsystemKind;
use crate::passwd::PasswdError;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by the bridge.
#[derive(Debug, Error)]
pub enum Error {
    /// A host exception of the given class.
    #[error("{class}: {message}")]
    Raised {
        /// Class the exception was raised with.
        class: ExceptionClass,
        /// Fully rendered message, including the drained OpenSSL reason.
        message: String,
    },

    /// A store context handle was used after its callback returned.
    #[error("store context handle used outside of its verification callback")]
    InvalidatedHandle,

    /// Hex length is negative or doubling it overflows.
    #[error("invalid hex input length")]
    HexLength,

    /// Output buffer could not be reserved.
    #[error("allocation failed: {0}")]
    Alloc(#[from] TryReserveError),

    /// No passphrase could be obtained.
    #[error(transparent)]
    Passwd(#[from] PasswdError),

    /// A subsystem bootstrap routine failed.
    #[error("{kind} bootstrap failed: {source}")]
    Subsystem {
        /// Subsystem that failed.
        kind: SubsystemKind,
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Build a host exception without consulting the OpenSSL error queue.
    pub fn raised(class: &ExceptionClass, message: impl Into<String>) -> Self {
        Error::Raised {
            class: class.clone(),
            message: message.into(),
        }
    }

    /// Class of a raised exception, if this is one.
    pub fn class(&self) -> Option<&ExceptionClass> {
        match self {
            Error::Raised { class, .. } => Some(class),
            _ => None,
        }
    }

    /// Message without the class prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Raised { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// A host exception class.
///
/// Classes are cheap to clone and compare by name along the ancestry chain.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ExceptionClass {
    inner: Arc<ClassInner>,
}

#[derive(PartialEq, Eq, Hash)]
struct ClassInner {
    name: String,
    parent: Option<ExceptionClass>,
}

impl ExceptionClass {
    /// Define a new class deriving from `parent`.
    pub fn new(name: impl Into<String>, parent: Option<&ExceptionClass>) -> Self {
        Self {
            inner: Arc::new(ClassInner {
                name: name.into(),
                parent: parent.cloned(),
            }),
        }
    }

    /// Root of the host's recoverable error hierarchy.
    pub fn standard_error() -> Self {
        Self::new("StandardError", None)
    }

    /// Raised when a host function gets the wrong number or kind of arguments.
    pub fn argument_error() -> Self {
        Self::new("ArgumentError", Some(&Self::standard_error()))
    }

    /// Fully qualified class name, e.g. `OpenSSL::OpenSSLError`.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Direct superclass.
    pub fn parent(&self) -> Option<&ExceptionClass> {
        self.inner.parent.as_ref()
    }

    /// Whether `self` is `other` or one of its descendants.
    pub fn is_kind_of(&self, other: &ExceptionClass) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.name() == other.name() {
                return true;
            }
            current = class.parent();
        }
        false
    }
}

impl fmt::Display for ExceptionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for ExceptionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent() {
            Some(parent) => write!(f, "{} < {}", self.name(), parent.name()),
            None => f.write_str(self.name()),
        }
    }
}
