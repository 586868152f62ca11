//! Shared fixtures for the integration tests.

#![allow(dead_code)]

mod certs;

pub use certs::{root_ca, server_cert};

use ossl_bridge::bootstrap::{Bootstrap, Ossl};
use ossl_bridge::configs::AppConfig;

pub fn ossl() -> Ossl {
    Bootstrap::with_defaults(AppConfig::default())
        .diagnostics_sink(Box::new(std::io::sink()))
        .run()
        .unwrap()
}
