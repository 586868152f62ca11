//! Conversion between host collections and native certificate stacks.
//!
//! Native stacks own what they hold. Every certificate pushed is a deep copy
//! of the host object, so the stack can outlive (or be mutated independently
//! of) the collection that produced it. A stack that fails halfway is dropped,
//! and dropping a `Stack<X509>` frees every element already pushed.

use openssl::stack::{Stack, StackRef};
use openssl::x509::X509;

use crate::diagnostics::Diagnostics;
use crate::error::{Error, ExceptionClass, Result};
use crate::protect::{protect, ProtectError};
use crate::value::{Certificate, Value};

/// Build a native stack from a host array of certificates.
///
/// Fails on the first element that is not a certificate; nothing allocated
/// before that point survives the failure.
pub fn x509_array_to_stack(
    diag: &Diagnostics,
    class: &ExceptionClass,
    values: &[Value],
) -> Result<Stack<X509>> {
    let mut stack = Stack::new().map_err(|e| diag.raise_stack(class, None, e))?;

    for (i, value) in values.iter().enumerate() {
        let cert = match value.as_certificate() {
            Some(cert) => cert,
            None => {
                tracing::debug!(index = i, found = value.type_name(), "rejecting array");
                return Err(Error::raised(class, "non-certificate element in array"));
            }
        };
        let dup = cert.dup().map_err(|e| diag.raise_stack(class, None, e))?;
        stack.push(dup).map_err(|e| diag.raise_stack(class, None, e))?;
    }

    Ok(stack)
}

/// [`x509_array_to_stack`] behind the [`protect`] boundary.
///
/// For callers sitting under native frames: failures come back as a
/// [`ProtectError`] with a non-zero status instead of propagating.
pub fn protect_x509_array_to_stack(
    diag: &Diagnostics,
    class: &ExceptionClass,
    values: &[Value],
) -> Result<Stack<X509>, ProtectError> {
    protect(|| Ok(x509_array_to_stack(diag, class, values)?))
}

/// Host array of certificates, in stack order.
///
/// Each element is duplicated so the array does not borrow from the stack.
pub fn stack_to_array(diag: &Diagnostics, class: &ExceptionClass, stack: &StackRef<X509>) -> Result<Vec<Value>> {
    stack
        .iter()
        .map(|x509| {
            Certificate::new(x509.to_owned())
                .dup()
                .map(|dup| Value::Certificate(Certificate::new(dup)))
                .map_err(|e| diag.raise_stack(class, None, e))
        })
        .collect()
}
