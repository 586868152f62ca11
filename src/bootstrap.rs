//! One-time library setup.
//!
//! [`Bootstrap::run`] performs the global initialization every other part of
//! the crate depends on, in a fixed order:
//!
//! 1. load OpenSSL's algorithm tables and error strings;
//! 2. create the `OpenSSL` module;
//! 3. define `VERSION`, `OPENSSL_VERSION` and `OPENSSL_VERSION_NUMBER`;
//! 4. define `OpenSSL::OpenSSLError < StandardError`;
//! 5. register the verify-callback extra-data slot;
//! 6. clear the debug flag and expose `debug` / `debug=`;
//! 7. initialize the registered subsystems in [`SubsystemKind::ALL`] order.
//!
//! `run` takes the bootstrap by value, so a given bootstrap cannot run twice.
//!
//! # Example
//! ```no_run
//! # use ossl_bridge::bootstrap::Bootstrap;
//! # use ossl_bridge::configs::AppConfig;
//! # fn main() -> ossl_bridge::Result<()> {
//! let ossl = Bootstrap::with_defaults(AppConfig::default()).run()?;
//! println!("{}", ossl.module().name());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::configs::AppConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, ExceptionClass, Result};
use crate::ex_data::{ExDataIndex, ExDataRegistry};
use crate::module::{check_arity, Module};
use crate::passwd::PassphraseBridge;
use crate::pkey::PKeySubsystem;
use crate::tls::SslSubsystem;
use crate::value::Value;
use crate::verify::VerifyBridge;

/// The library's subsystems, in initialization order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubsystemKind {
    BigNum,
    Cipher,
    Config,
    Digest,
    Hmac,
    Spki,
    Pkcs7,
    PKey,
    Random,
    Ssl,
    X509,
    Ocsp,
}

impl SubsystemKind {
    pub const ALL: [SubsystemKind; 12] = [
        SubsystemKind::BigNum,
        SubsystemKind::Cipher,
        SubsystemKind::Config,
        SubsystemKind::Digest,
        SubsystemKind::Hmac,
        SubsystemKind::Spki,
        SubsystemKind::Pkcs7,
        SubsystemKind::PKey,
        SubsystemKind::Random,
        SubsystemKind::Ssl,
        SubsystemKind::X509,
        SubsystemKind::Ocsp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SubsystemKind::BigNum => "BN",
            SubsystemKind::Cipher => "Cipher",
            SubsystemKind::Config => "Config",
            SubsystemKind::Digest => "Digest",
            SubsystemKind::Hmac => "HMAC",
            SubsystemKind::Spki => "Netscape::SPKI",
            SubsystemKind::Pkcs7 => "PKCS7",
            SubsystemKind::PKey => "PKey",
            SubsystemKind::Random => "Random",
            SubsystemKind::Ssl => "SSL",
            SubsystemKind::X509 => "X509",
            SubsystemKind::Ocsp => "OCSP",
        }
    }
}

impl fmt::Display for SubsystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A subsystem initialized during bootstrap.
pub trait Subsystem: Send + Sync {
    fn kind(&self) -> SubsystemKind;

    /// Register the subsystem's classes, constants and functions.
    fn init(&self, ossl: &mut Ossl) -> anyhow::Result<()>;
}

/// Collects subsystems and runs the global setup.
pub struct Bootstrap {
    config: AppConfig,
    subsystems: BTreeMap<SubsystemKind, Box<dyn Subsystem>>,
    sink: Option<Box<dyn Write + Send>>,
}

impl Bootstrap {
    /// A bootstrap with no subsystems.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            subsystems: BTreeMap::new(),
            sink: None,
        }
    }

    /// A bootstrap with the subsystems this crate implements.
    pub fn with_defaults(config: AppConfig) -> Self {
        Self::new(config)
            .with_subsystem(PKeySubsystem)
            .with_subsystem(SslSubsystem)
    }

    /// Register a subsystem, replacing any earlier one of the same kind.
    pub fn with_subsystem(mut self, subsystem: impl Subsystem + 'static) -> Self {
        let kind = subsystem.kind();
        if self.subsystems.insert(kind, Box::new(subsystem)).is_some() {
            tracing::debug!(%kind, "replaced subsystem");
        }
        self
    }

    /// Send diagnostic output to `sink` instead of stderr.
    pub fn diagnostics_sink(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run the global setup.
    pub fn run(self) -> Result<Ossl> {
        openssl::init();
        tracing::debug!(version = openssl::version::version(), "OpenSSL initialized");

        let mut module = Module::new(self.config.module.name.as_str());
        module.define_const("VERSION", env!("CARGO_PKG_VERSION"));
        module.define_const("OPENSSL_VERSION", openssl::version::version());
        module.define_const("OPENSSL_VERSION_NUMBER", openssl::version::number());

        let error_class = module.define_class_under("OpenSSLError", &ExceptionClass::standard_error());

        let ex_data = ExDataRegistry::new();
        let verify_cb_idx = ex_data.new_index(&self.config.verify.slot_label);

        let diagnostics = Arc::new(match self.sink {
            Some(sink) => Diagnostics::with_sink(&self.config.debug, sink),
            None => Diagnostics::new(&self.config.debug),
        });
        diagnostics.set_debug(false);
        define_debug_functions(&mut module, &diagnostics);

        let mut ossl = Ossl {
            config: self.config,
            module,
            error_class,
            diagnostics,
            ex_data,
            verify_cb_idx,
            initialized: Vec::new(),
        };

        for kind in SubsystemKind::ALL {
            let Some(subsystem) = self.subsystems.get(&kind) else {
                tracing::debug!(%kind, "subsystem not registered, skipping");
                continue;
            };
            subsystem
                .init(&mut ossl)
                .map_err(|source| Error::Subsystem { kind, source })?;
            ossl.initialized.push(kind);
            tracing::debug!(%kind, "subsystem initialized");
        }

        Ok(ossl)
    }
}

impl fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("config", &self.config)
            .field("subsystems", &self.subsystems.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn define_debug_functions(module: &mut Module, diagnostics: &Arc<Diagnostics>) {
    let diag = diagnostics.clone();
    module.define_module_function("debug", move |args| {
        check_arity(args, 0)?;
        Ok(Value::Bool(diag.debug()))
    });

    let diag = diagnostics.clone();
    module.define_module_function("debug=", move |args| {
        check_arity(args, 1)?;
        Ok(Value::Bool(diag.set_debug(args[0].truthy())))
    });
}

/// The initialized library.
pub struct Ossl {
    config: AppConfig,
    module: Module,
    error_class: ExceptionClass,
    diagnostics: Arc<Diagnostics>,
    ex_data: ExDataRegistry,
    verify_cb_idx: ExDataIndex,
    initialized: Vec<SubsystemKind>,
}

impl Ossl {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }

    /// `OpenSSL::OpenSSLError`, the base of every class the library raises.
    pub fn error_class(&self) -> &ExceptionClass {
        &self.error_class
    }

    /// A class defined under the module, or the base class when it is missing.
    pub fn class_or_base(&self, name: &str) -> ExceptionClass {
        self.module
            .class(name)
            .unwrap_or(&self.error_class)
            .clone()
    }

    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    pub fn ex_data(&self) -> &ExDataRegistry {
        &self.ex_data
    }

    /// Slot holding verification closures.
    pub fn verify_cb_idx(&self) -> ExDataIndex {
        self.verify_cb_idx
    }

    /// Subsystems that ran, in order.
    pub fn subsystems(&self) -> &[SubsystemKind] {
        &self.initialized
    }

    pub fn verify_bridge(&self) -> VerifyBridge {
        VerifyBridge::new(self.verify_cb_idx, self.diagnostics.clone())
    }

    pub fn passphrase_bridge<'a>(&self) -> PassphraseBridge<'a> {
        PassphraseBridge::new(&self.config.passphrase)
    }
}

impl fmt::Debug for Ossl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ossl")
            .field("module", &self.module)
            .field("diagnostics", &self.diagnostics)
            .field("verify_cb_idx", &self.verify_cb_idx)
            .field("subsystems", &self.initialized)
            .finish()
    }
}
