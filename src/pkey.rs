//! Encrypted PEM private keys through the passphrase bridge.
//!
//! Decryption asks the bridge with `for_encryption = false`, encryption with
//! `true`. When the passphrase source itself fails, that failure is what the
//! caller sees; it is not folded into the "bad decrypt" OpenSSL reports once
//! the callback gives up.

use std::cell::RefCell;

use openssl::error::ErrorStack;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::symm::Cipher;
use secrecy::zeroize::Zeroizing;

use crate::bootstrap::{Ossl, Subsystem, SubsystemKind};
use crate::error::{Error, Result};
use crate::passwd::{PassphraseBridge, PasswdError};

/// Class raised for private-key failures, relative to the module.
pub const PKEY_ERROR: &str = "PKey::PKeyError";

/// `PEM_BUFSIZE`, the passphrase buffer OpenSSL hands to callbacks.
const PEM_BUFSIZE: usize = 1024;

/// Decrypt a PEM private key.
pub fn read_private_key(ossl: &Ossl, pem: &[u8], bridge: &PassphraseBridge<'_>) -> Result<PKey<Private>> {
    let class = ossl.class_or_base(PKEY_ERROR);
    let failure = RefCell::new(None);

    let result = PKey::private_key_from_pem_callback(pem, |buf| {
        bridge.fill(buf, false).map_err(|err| {
            *failure.borrow_mut() = Some(err);
            ErrorStack::get()
        })
    });

    match (result, failure.into_inner()) {
        (Ok(key), _) => Ok(key),
        (Err(_), Some(err)) => {
            // the decode error that follows a refused passphrase is noise
            let _ = ErrorStack::get();
            Err(surface(err))
        }
        (Err(stack), None) => Err(ossl.diagnostics().raise_stack(
            &class,
            Some(format_args!("Could not parse PKey")),
            stack,
        )),
    }
}

/// Encrypt `key` as a PKCS#8 PEM document.
pub fn write_private_key(
    ossl: &Ossl,
    key: &PKeyRef<Private>,
    cipher: Cipher,
    bridge: &PassphraseBridge<'_>,
) -> Result<Vec<u8>> {
    let class = ossl.class_or_base(PKEY_ERROR);
    let mut buf = Zeroizing::new(vec![0u8; PEM_BUFSIZE]);
    let len = bridge.fill(&mut buf, true).map_err(surface)?;

    key.private_key_to_pem_pkcs8_passphrase(cipher, &buf[..len])
        .map_err(|stack| ossl.diagnostics().raise_stack(&class, None, stack))
}

/// Unwrap a host error raised by the passphrase provider.
fn surface(err: PasswdError) -> Error {
    match err {
        PasswdError::Raised(raised) => match raised.into_error() {
            Ok(err) => err,
            Err(raised) => Error::Passwd(PasswdError::Raised(raised)),
        },
        other => Error::Passwd(other),
    }
}

/// Defines `OpenSSL::PKey::PKeyError`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PKeySubsystem;

impl Subsystem for PKeySubsystem {
    fn kind(&self) -> SubsystemKind {
        SubsystemKind::PKey
    }

    fn init(&self, ossl: &mut Ossl) -> anyhow::Result<()> {
        let base = ossl.error_class().clone();
        ossl.module_mut().define_class_under(PKEY_ERROR, &base);
        Ok(())
    }
}
