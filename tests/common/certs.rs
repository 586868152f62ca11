//! Certificate fixtures shared by the unit and integration tests.

#![allow(dead_code)]

use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectAlternativeName};
use openssl::x509::{X509Name, X509NameBuilder, X509};

const X509_VERSION_3: i32 = 2;

fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

fn name(cn: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder.append_entry_by_text("CN", cn).unwrap();
    builder.append_entry_by_text("O", "ossl-bridge tests").unwrap();
    builder.build()
}

fn serial() -> Asn1Integer {
    let mut serial = BigNum::new().unwrap();
    serial.rand(128, MsbOption::MAYBE_ZERO, false).unwrap();
    serial.to_asn1_integer().unwrap()
}

/// Self-signed CA.
pub fn root_ca(cn: &str) -> (PKey<Private>, X509) {
    let key = rsa_key();
    let name = name(cn);

    let mut builder = X509::builder().unwrap();
    builder.set_version(X509_VERSION_3).unwrap();
    builder.set_serial_number(&serial()).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().ca().pathlen(0).build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .digital_signature()
                .build()
                .unwrap(),
        )
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    (key, builder.build())
}

/// TLS server certificate for `localhost`, signed by the given CA.
pub fn server_cert(ca_key: &PKey<Private>, ca_cert: &X509) -> (PKey<Private>, X509) {
    let key = rsa_key();

    let mut builder = X509::builder().unwrap();
    builder.set_version(X509_VERSION_3).unwrap();
    builder.set_serial_number(&serial()).unwrap();
    builder.set_subject_name(&name("localhost")).unwrap();
    builder.set_issuer_name(ca_cert.subject_name()).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .build()
                .unwrap(),
        )
        .unwrap();
    let san = SubjectAlternativeName::new()
        .dns("localhost")
        .build(&builder.x509v3_context(Some(ca_cert), None))
        .unwrap();
    builder.append_extension(san).unwrap();
    builder.sign(ca_key, MessageDigest::sha256()).unwrap();
    (key, builder.build())
}
