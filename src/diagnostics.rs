//! Diagnostics and OpenSSL error propagation.
//!
//! [`Diagnostics`] owns the debug flag and the diagnostic output stream. It is
//! an explicit object handed to whatever needs it rather than process-global
//! state, so independent instances can coexist (one per bootstrap, one per
//! test).
//!
//! Raising always drains the OpenSSL error queue first. The queue is
//! thread-local inside OpenSSL, so the drain must happen on the thread that
//! made the failing call, before control returns to the caller; otherwise a
//! later unrelated failure would be reported with a stale reason.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use openssl::error::ErrorStack;

use crate::configs::DebugConfig;
use crate::error::{Error, ExceptionClass};

/// Raise a host exception, draining the OpenSSL error queue.
///
/// ```no_run
/// # use ossl_bridge::{ossl_raise, diagnostics::Diagnostics, ExceptionClass};
/// # fn f(diag: &Diagnostics, class: &ExceptionClass) -> ossl_bridge::Error {
/// ossl_raise!(diag, class, "Could not parse {}", "PKey")
/// # }
/// ```
#[macro_export]
macro_rules! ossl_raise {
    ($diag:expr, $class:expr) => {
        $diag.raise($class, None)
    };
    ($diag:expr, $class:expr, $($arg:tt)+) => {
        $diag.raise($class, Some(format_args!($($arg)+)))
    };
}

/// Write a diagnostic line while debugging is enabled.
#[macro_export]
macro_rules! ossl_debug {
    ($diag:expr, $($arg:tt)+) => {
        $diag.debug_print(format_args!($($arg)+))
    };
}

/// Allocation instrumentation toggled together with the debug flag.
pub trait MemoryInstrumentation: Send + Sync {
    fn enable(&self);
    fn disable(&self);
}

/// Default instrumentation hook.
///
/// OpenSSL 3 has no runtime switch for its allocation checker, so this only
/// tracks whether checking was requested and reports the transition.
#[derive(Debug, Default)]
pub struct MemoryCheck {
    active: AtomicBool,
}

impl MemoryCheck {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl MemoryInstrumentation for MemoryCheck {
    fn enable(&self) {
        self.active.store(true, Ordering::SeqCst);
        tracing::info!("memory check requested");
    }

    fn disable(&self) {
        self.active.store(false, Ordering::SeqCst);
        tracing::info!("memory check released");
    }
}

/// One entry taken off an error queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedError {
    pub code: u64,
    /// Reason string alone, e.g. `bad decrypt`
    pub reason: Option<String>,
    /// Library, function and reason, e.g. `error:1C800064:Provider routines::bad decrypt`
    pub verbose: String,
}

impl From<&openssl::error::Error> for QueuedError {
    fn from(err: &openssl::error::Error) -> Self {
        Self {
            code: err.code() as u64,
            reason: err.reason().map(str::to_string),
            verbose: err.to_string(),
        }
    }
}

/// Source of pending native errors.
pub trait ErrorQueue {
    /// Remove and return every pending error, oldest first.
    fn drain(&mut self) -> Vec<QueuedError>;
}

/// The calling thread's OpenSSL error queue.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeErrorQueue;

impl ErrorQueue for NativeErrorQueue {
    fn drain(&mut self) -> Vec<QueuedError> {
        ErrorStack::get().errors().iter().map(QueuedError::from).collect()
    }
}

/// An `ErrorStack` already taken off the queue by the `openssl` crate.
struct DrainedStack(Option<ErrorStack>);

impl ErrorQueue for DrainedStack {
    fn drain(&mut self) -> Vec<QueuedError> {
        // anything pushed after the stack was captured is stale now
        let _ = ErrorStack::get();
        self.0
            .take()
            .map(|stack| stack.errors().iter().map(QueuedError::from).collect())
            .unwrap_or_default()
    }
}

/// Debug flag, diagnostic stream and error formatter.
pub struct Diagnostics {
    debug: AtomicBool,
    prefix: String,
    sink: Mutex<Box<dyn Write + Send>>,
    instrumentation: Arc<dyn MemoryInstrumentation>,
}

impl Diagnostics {
    /// Diagnostics writing to stderr, debug off.
    pub fn new(config: &DebugConfig) -> Self {
        Self::with_sink(config, Box::new(io::stderr()))
    }

    /// Diagnostics writing to `sink`, debug off.
    pub fn with_sink(config: &DebugConfig, sink: Box<dyn Write + Send>) -> Self {
        Self {
            debug: AtomicBool::new(false),
            prefix: config.prefix.clone(),
            sink: Mutex::new(sink),
            instrumentation: Arc::new(MemoryCheck::default()),
        }
    }

    /// Replace the allocation instrumentation hook.
    pub fn instrumentation(mut self, hook: Arc<dyn MemoryInstrumentation>) -> Self {
        self.instrumentation = hook;
        self
    }

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }

    /// Set the debug flag, returning the new value.
    ///
    /// Instrumentation follows the flag on a real transition only.
    pub fn set_debug(&self, on: bool) -> bool {
        let old = self.debug.swap(on, Ordering::SeqCst);
        if old != on {
            if on {
                self.instrumentation.enable();
                self.write_line(format_args!("{}: IS NOW ON!", self.prefix));
            } else {
                self.instrumentation.disable();
                self.write_line(format_args!("{}: IS NOW OFF!", self.prefix));
            }
        }
        on
    }

    /// Write `args` to the diagnostic stream when debugging is on.
    pub fn debug_print(&self, args: fmt::Arguments<'_>) {
        if self.debug() {
            self.write_line(format_args!("{}: {} [CONTEXT N/A]", self.prefix, args));
        }
    }

    /// Build a host exception from `message` and the thread's OpenSSL queue.
    pub fn raise(&self, class: &ExceptionClass, message: Option<fmt::Arguments<'_>>) -> Error {
        self.raise_from(class, message, &mut NativeErrorQueue)
    }

    /// Like [`Diagnostics::raise`] for an `ErrorStack` the `openssl` crate already drained.
    pub fn raise_stack(
        &self,
        class: &ExceptionClass,
        message: Option<fmt::Arguments<'_>>,
        stack: ErrorStack,
    ) -> Error {
        self.raise_from(class, message, &mut DrainedStack(Some(stack)))
    }

    /// Build a host exception from `message` and the first entry of `queue`.
    ///
    /// The whole queue is drained even though only its oldest entry is
    /// reported.
    pub fn raise_from(
        &self,
        class: &ExceptionClass,
        message: Option<fmt::Arguments<'_>>,
        queue: &mut dyn ErrorQueue,
    ) -> Error {
        let errors = queue.drain();
        let mut text = message.map(|m| m.to_string()).unwrap_or_default();

        if let Some(first) = errors.first() {
            let reason = if self.debug() {
                first.verbose.clone()
            } else {
                first
                    .reason
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string())
            };
            if !text.is_empty() {
                text.push_str(": ");
            }
            text.push_str(&reason);
        }

        tracing::debug!(class = %class, dropped = errors.len().saturating_sub(1), "{}", text);
        Error::raised(class, text)
    }

    fn write_line(&self, args: fmt::Arguments<'_>) {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(sink, "{}", args);
        let _ = sink.flush();
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("debug", &self.debug())
            .field("prefix", &self.prefix)
            .finish()
    }
}
