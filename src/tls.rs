//! Installing the verify bridge on TLS contexts.
//!
//! OpenSSL runs the verify callback during the handshake, once per
//! certificate of the peer's chain. The closures it should consult are kept
//! in a [`VerifyHooks`] pair of extra-data tables: one standing for the
//! certificate store, one for the individual store context.

use std::sync::Arc;

use openssl::ssl::{SslContextBuilder, SslRef, SslVerifyMode};

use crate::bootstrap::{Ossl, Subsystem, SubsystemKind};
use crate::ex_data::{CallbackSlot, ExData, ExDataIndex};
use crate::verify::{NativeStoreContext, VerifyBridge, VerifyCallback};

/// Class raised for TLS failures, relative to the module.
pub const SSL_ERROR: &str = "SSL::SSLError";

/// Extra-data tables consulted by the bridge during a handshake.
#[derive(Debug, Default, Clone)]
pub struct VerifyHooks {
    /// Slots of the certificate store; shared by every context it creates.
    pub store: ExData,
    /// Slots checked before `store`.
    ///
    /// One table serves every store context the builder or connection
    /// creates, so a slot set here applies to each verification made through
    /// it, not to a single chain.
    pub context: ExData,
}

impl VerifyHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks with `callback` registered on the store.
    pub fn with_store_callback<C>(index: ExDataIndex, callback: C) -> Self
    where
        C: VerifyCallback + 'static,
    {
        let mut hooks = Self::new();
        hooks.store.set(index, CallbackSlot::callback(callback));
        hooks
    }
}

/// Verify peers of every connection made from `builder` through `bridge`.
pub fn set_verify_bridge(
    builder: &mut SslContextBuilder,
    mode: SslVerifyMode,
    bridge: Arc<VerifyBridge>,
    hooks: Arc<VerifyHooks>,
) {
    builder.set_verify_callback(mode, move |preverify_ok, ctx| {
        let mut native = NativeStoreContext::new(ctx, &hooks.context, &hooks.store);
        bridge.verify(preverify_ok, &mut native)
    });
}

/// Like [`set_verify_bridge`] for a single connection.
pub fn set_ssl_verify_bridge(
    ssl: &mut SslRef,
    mode: SslVerifyMode,
    bridge: Arc<VerifyBridge>,
    hooks: Arc<VerifyHooks>,
) {
    ssl.set_verify_callback(mode, move |preverify_ok, ctx| {
        let mut native = NativeStoreContext::new(ctx, &hooks.context, &hooks.store);
        bridge.verify(preverify_ok, &mut native)
    });
}

/// Defines `OpenSSL::SSL::SSLError`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SslSubsystem;

impl Subsystem for SslSubsystem {
    fn kind(&self) -> SubsystemKind {
        SubsystemKind::Ssl
    }

    fn init(&self, ossl: &mut Ossl) -> anyhow::Result<()> {
        let base = ossl.error_class().clone();
        ossl.module_mut().define_class_under(SSL_ERROR, &base);
        Ok(())
    }
}
