//! Catch-and-convert boundary for host code running under OpenSSL frames.
//!
//! OpenSSL calls back into the bridge from C; nothing raised by host code may
//! unwind through those frames. [`protect`] runs a host-side operation and
//! turns both returned errors and panics into a [`ProtectError`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

/// Failure captured by [`protect`].
#[derive(Debug, Error)]
pub enum ProtectError {
    /// The operation returned an error.
    #[error("{0}")]
    Raised(anyhow::Error),
    /// The operation panicked.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl ProtectError {
    /// Non-zero status for callers that only understand integers.
    pub fn status(&self) -> i32 {
        match self {
            ProtectError::Raised(_) => 1,
            ProtectError::Panicked(_) => 2,
        }
    }

    /// Recover a crate error carried by a `Raised` failure.
    pub fn into_error(self) -> Result<crate::Error, ProtectError> {
        match self {
            ProtectError::Raised(err) => match err.downcast::<crate::Error>() {
                Ok(err) => Ok(err),
                Err(err) => Err(ProtectError::Raised(err)),
            },
            other => Err(other),
        }
    }
}

/// Run `f`, converting errors and panics into a [`ProtectError`].
pub fn protect<T, F>(f: F) -> Result<T, ProtectError>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(ProtectError::Raised(err)),
        Err(payload) => Err(ProtectError::Panicked(panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_passes_value_through() {
        assert_eq!(protect(|| Ok(7)).unwrap(), 7);
    }

    #[test]
    fn test_captures_error() {
        let err = protect::<(), _>(|| Err(anyhow!("closure raised"))).unwrap_err();
        assert_eq!(err.status(), 1);
        assert_eq!(err.to_string(), "closure raised");
    }

    #[test]
    fn test_captures_panic() {
        let err = protect::<(), _>(|| panic!("closure panicked")).unwrap_err();
        assert_eq!(err.status(), 2);
        assert!(matches!(err, ProtectError::Panicked(ref m) if m == "closure panicked"));
    }
}
