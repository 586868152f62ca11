//! Certificate verification callback bridge.
//!
//! OpenSSL calls the verify callback once for every certificate it examines
//! while building and checking a chain, passing its own verdict
//! (`preverify_ok`) and the store context. [`VerifyBridge`] looks up the host
//! closure registered in the context's extra-data slot (falling back to the
//! parent store's slot), hands it a [`StoreContextHandle`], and maps the
//! closure's answer back onto OpenSSL's accept/reject protocol.
//!
//! Tie-break rules:
//! - no closure registered anywhere: OpenSSL's verdict stands;
//! - a closure registered as nil, a closure that raises, or a handle that
//!   cannot be built: reject;
//! - on reject, the context's error code becomes `X509_V_ERR_CERT_REJECTED`
//!   only if it was still `X509_V_OK`; a more specific code is kept.

use std::ffi::c_int;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use openssl::error::ErrorStack;
use openssl::x509::{X509StoreContextRef, X509VerifyResult, X509};

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::ex_data::{CallbackSlot, ExData, ExDataIndex};
use crate::protect::protect;
use crate::value::{Certificate, Value};

pub const X509_V_OK: i32 = 0;
pub const X509_V_ERR_CERT_REJECTED: i32 = 28;

/// Host closure consulted for every certificate in a chain.
pub trait VerifyCallback: Send + Sync {
    fn call(&self, preverify_ok: bool, ctx: &StoreContextHandle) -> anyhow::Result<Value>;
}

impl<F, R> VerifyCallback for F
where
    F: Fn(bool, &StoreContextHandle) -> anyhow::Result<R> + Send + Sync,
    R: Into<Value>,
{
    fn call(&self, preverify_ok: bool, ctx: &StoreContextHandle) -> anyhow::Result<Value> {
        self(preverify_ok, ctx).map(Into::into)
    }
}

/// The verification context as seen by the bridge.
pub trait VerifyContext {
    fn error(&self) -> i32;
    fn set_error(&mut self, code: i32);
    fn error_depth(&self) -> u32;
    fn current_cert(&self) -> Option<X509>;
    fn chain(&self) -> Result<Vec<X509>, ErrorStack>;
    /// Slot on the context itself.
    fn ex_data(&self, index: ExDataIndex) -> Option<&CallbackSlot>;
    /// Slot on the store the context was created from.
    fn store_ex_data(&self, index: ExDataIndex) -> Option<&CallbackSlot>;
}

/// [`VerifyContext`] over a live OpenSSL store context.
///
/// The extra-data tables live on the Rust side; `context_data` stands for
/// the per-context slots and `store_data` for the parent store's.
pub struct NativeStoreContext<'a> {
    ctx: &'a mut X509StoreContextRef,
    context_data: &'a ExData,
    store_data: &'a ExData,
}

impl<'a> NativeStoreContext<'a> {
    pub fn new(
        ctx: &'a mut X509StoreContextRef,
        context_data: &'a ExData,
        store_data: &'a ExData,
    ) -> Self {
        Self {
            ctx,
            context_data,
            store_data,
        }
    }
}

impl VerifyContext for NativeStoreContext<'_> {
    fn error(&self) -> i32 {
        self.ctx.error().as_raw()
    }

    fn set_error(&mut self, code: i32) {
        // SAFETY: codes come from OpenSSL itself or from the X509_V_* constants.
        let result = unsafe { X509VerifyResult::from_raw(code) };
        self.ctx.set_error(result);
    }

    fn error_depth(&self) -> u32 {
        self.ctx.error_depth()
    }

    fn current_cert(&self) -> Option<X509> {
        self.ctx.current_cert().map(ToOwned::to_owned)
    }

    fn chain(&self) -> Result<Vec<X509>, ErrorStack> {
        Ok(self
            .ctx
            .chain()
            .map(|chain| chain.iter().map(ToOwned::to_owned).collect())
            .unwrap_or_default())
    }

    fn ex_data(&self, index: ExDataIndex) -> Option<&CallbackSlot> {
        self.context_data.get(index)
    }

    fn store_ex_data(&self, index: ExDataIndex) -> Option<&CallbackSlot> {
        self.store_data.get(index)
    }
}

struct ContextState {
    error: i32,
    error_depth: u32,
    current_cert: Option<X509>,
    chain: Vec<X509>,
    error_changed: bool,
}

/// Weak, call-scoped view of a store context handed to host closures.
///
/// The handle may be cloned and kept by the closure, but it only works while
/// the callback that created it is running. Afterwards every accessor returns
/// [`Error::InvalidatedHandle`].
#[derive(Clone)]
pub struct StoreContextHandle {
    inner: Arc<Mutex<Option<ContextState>>>,
}

impl StoreContextHandle {
    fn attach(ctx: &dyn VerifyContext) -> Result<Self, ErrorStack> {
        let state = ContextState {
            error: ctx.error(),
            error_depth: ctx.error_depth(),
            current_cert: ctx.current_cert(),
            chain: ctx.chain()?,
            error_changed: false,
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(Some(state))),
        })
    }

    fn with<T>(&self, f: impl FnOnce(&mut ContextState) -> T) -> Result<T> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_mut().map(f).ok_or(Error::InvalidatedHandle)
    }

    fn detach(&self) -> Option<ContextState> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_valid(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn error(&self) -> Result<i32> {
        self.with(|state| state.error)
    }

    /// Set the context's error code; applied when the callback returns.
    pub fn set_error(&self, code: i32) -> Result<()> {
        self.with(|state| {
            state.error = code;
            state.error_changed = true;
        })
    }

    pub fn error_string(&self) -> Result<&'static str> {
        let code = self.error()?;
        // SAFETY: X509_verify_cert_error_string accepts any code.
        Ok(unsafe { X509VerifyResult::from_raw(code) }.error_string())
    }

    pub fn error_depth(&self) -> Result<u32> {
        self.with(|state| state.error_depth)
    }

    pub fn current_cert(&self) -> Result<Option<Certificate>> {
        self.with(|state| state.current_cert.clone().map(Certificate::new))
    }

    /// Chain built so far, leaf first, as host certificate values.
    pub fn chain(&self) -> Result<Vec<Value>> {
        self.with(|state| {
            state
                .chain
                .iter()
                .cloned()
                .map(|x509| Value::Certificate(Certificate::new(x509)))
                .collect()
        })
    }
}

impl fmt::Debug for StoreContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreContextHandle")
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Closes a handle's window: writes back its error code and invalidates it.
struct ContextScope<'a> {
    handle: &'a StoreContextHandle,
    ctx: &'a mut dyn VerifyContext,
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.handle.detach() {
            if state.error_changed {
                self.ctx.set_error(state.error);
            }
        }
    }
}

/// Translates between OpenSSL's verify callback and host closures.
#[derive(Debug, Clone)]
pub struct VerifyBridge {
    index: ExDataIndex,
    diagnostics: Arc<Diagnostics>,
}

impl VerifyBridge {
    pub fn new(index: ExDataIndex, diagnostics: Arc<Diagnostics>) -> Self {
        Self { index, diagnostics }
    }

    /// Slot the bridge reads closures from.
    pub fn index(&self) -> ExDataIndex {
        self.index
    }

    /// Decide whether the current certificate is accepted.
    pub fn verify(&self, preverify_ok: bool, ctx: &mut dyn VerifyContext) -> bool {
        let slot = ctx
            .ex_data(self.index)
            .or_else(|| ctx.store_ex_data(self.index))
            .cloned();

        let accepted = match slot {
            None => return preverify_ok,
            Some(CallbackSlot::Nil) => {
                crate::ossl_debug!(self.diagnostics, "verify callback is nil, rejecting");
                false
            }
            Some(CallbackSlot::Callback(callback)) => {
                self.call(callback.as_ref(), preverify_ok, ctx)
            }
        };

        if accepted {
            ctx.set_error(X509_V_OK);
        } else if ctx.error() == X509_V_OK {
            ctx.set_error(X509_V_ERR_CERT_REJECTED);
        }
        tracing::debug!(
            preverify_ok,
            accepted,
            depth = ctx.error_depth(),
            error = ctx.error(),
            "verify callback"
        );
        accepted
    }

    /// C-shaped entry point: `ok` and the return value are 0 or 1.
    pub fn verify_cb(&self, ok: c_int, ctx: &mut dyn VerifyContext) -> c_int {
        self.verify(ok != 0, ctx) as c_int
    }

    fn call(
        &self,
        callback: &dyn VerifyCallback,
        preverify_ok: bool,
        ctx: &mut dyn VerifyContext,
    ) -> bool {
        let handle = match StoreContextHandle::attach(&*ctx) {
            Ok(handle) => handle,
            Err(err) => {
                crate::ossl_debug!(self.diagnostics, "store context wrap failed: {}", err);
                return false;
            }
        };

        let outcome = {
            let _scope = ContextScope {
                handle: &handle,
                ctx: &mut *ctx,
            };
            protect(|| callback.call(preverify_ok, &handle))
        };

        match outcome {
            Ok(value) => value.truthy(),
            Err(err) => {
                tracing::warn!(error = %err, "verify callback raised, rejecting certificate");
                false
            }
        }
    }
}
