//! OSSL Bridge - Host-language glue for OpenSSL
//!
//! The layer between a dynamic, reference-counted host language and the OpenSSL
//! library. It converts host objects into OpenSSL structures, lets host closures
//! answer OpenSSL's passphrase and certificate-verification callbacks, turns the
//! OpenSSL error queue into host exceptions, and performs the one-time global
//! setup everything else depends on.
//!
//! # Overview
//!
//! ```text
//! host closure ──► PassphraseBridge ──► pem_password_cb ──► PEM decrypt / encrypt
//! host closure ──► VerifyBridge     ──► verify callback ──► chain verification / TLS
//! host array   ──► cert_stack       ──► STACK_OF(X509)
//! error queue  ──► Diagnostics      ──► Error::Raised { class, message }
//! ```
//!
//! Host code never unwinds through OpenSSL frames: every host closure runs
//! inside [`protect::protect`], and a failure becomes a return code OpenSSL
//! understands (a rejected certificate, a `-1` passphrase length).
//!
//! # Quick Start
//!
//! ```no_run
//! use ossl_bridge::bootstrap::Bootstrap;
//! use ossl_bridge::configs::AppConfig;
//! use ossl_bridge::pkey;
//!
//! fn main() -> anyhow::Result<()> {
//!     let ossl = Bootstrap::with_defaults(AppConfig::default()).run()?;
//!
//!     let provider = |_for_encryption: bool| anyhow::Ok("passphrase");
//!     let bridge = ossl.passphrase_bridge().provider(&provider);
//!     let pem = std::fs::read("key.pem")?;
//!     let key = pkey::read_private_key(&ossl, &pem, &bridge)?;
//!     println!("{} bit key", key.bits());
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! ## [`bootstrap`]
//!
//! Global setup: OpenSSL initialization, the `OpenSSL` module with its version
//! constants, the `OpenSSL::OpenSSLError` base class, the verify-callback slot,
//! the `debug` / `debug=` functions and the subsystems, in a fixed order.
//!
//! ## [`verify`]
//!
//! Calls a host closure for every certificate OpenSSL examines. The closure
//! gets OpenSSL's own verdict and a [`verify::StoreContextHandle`] that is only
//! valid for the duration of the call.
//!
//! ```no_run
//! use std::sync::Arc;
//! use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
//! use ossl_bridge::tls::{set_verify_bridge, VerifyHooks};
//! use ossl_bridge::verify::StoreContextHandle;
//! # fn example(ossl: &ossl_bridge::bootstrap::Ossl) -> anyhow::Result<()> {
//!
//! let hooks = VerifyHooks::with_store_callback(
//!     ossl.verify_cb_idx(),
//!     |preverify_ok: bool, ctx: &StoreContextHandle| {
//!         println!("depth {}: {}", ctx.error_depth()?, ctx.error_string()?);
//!         anyhow::Ok(preverify_ok)
//!     },
//! );
//! let mut builder = SslConnector::builder(SslMethod::tls())?;
//! set_verify_bridge(&mut builder, SslVerifyMode::PEER, Arc::new(ossl.verify_bridge()), Arc::new(hooks));
//! # Ok(())
//! # }
//! ```
//!
//! ## [`passwd`]
//!
//! Answers OpenSSL's passphrase requests from a static password, a host
//! provider (retried until the length is acceptable) or the console.
//!
//! ## [`cert_stack`]
//!
//! Host arrays of certificates to native `Stack<X509>` and back. Every element
//! is a deep copy.
//!
//! ## [`diagnostics`]
//!
//! Debug flag, diagnostic output and the conversion of the OpenSSL error queue
//! into [`Error::Raised`], through [`ossl_raise!`] and [`ossl_debug!`].
//!
//! # Error Handling
//!
//! Library operations return [`Result`]. Host-level exceptions are
//! [`Error::Raised`] values carrying their [`ExceptionClass`]; host closures
//! return `anyhow::Result` so they can fail with anything.

pub mod bootstrap;
pub mod cert_stack;
pub mod configs;
pub mod diagnostics;
pub mod error;
pub mod ex_data;
pub mod hex;
pub mod module;
pub mod passwd;
pub mod pkey;
pub mod protect;
pub mod tls;
pub mod value;
pub mod verify;

#[cfg(test)]
#[path = "../tests/common/certs.rs"]
mod test_support;

pub use bootstrap::{Bootstrap, Ossl};
pub use error::{Error, ExceptionClass, Result};
pub use value::{Certificate, Value};
