//! Host-side values.
//!
//! The bridge talks to a dynamic host language; these are the values that
//! cross the boundary: closure arguments and results, module constants and
//! the elements of collections handed to the certificate marshaller.

use std::fmt;

use openssl::error::ErrorStack;
use openssl::x509::{X509Ref, X509};

/// A dynamically typed host value.
#[derive(Clone, Debug)]
pub enum Value {
    Nil,
    Bool(bool),
    Integer(i64),
    String(String),
    Certificate(Certificate),
    Array(Vec<Value>),
}

impl Value {
    /// Host truthiness: everything except `nil` and `false` is true.
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Host type name, used in type-mismatch messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "NilClass",
            Value::Bool(true) => "TrueClass",
            Value::Bool(false) => "FalseClass",
            Value::Integer(_) => "Integer",
            Value::String(_) => "String",
            Value::Certificate(_) => "OpenSSL::X509::Certificate",
            Value::Array(_) => "Array",
        }
    }

    pub fn as_certificate(&self) -> Option<&Certificate> {
        match self {
            Value::Certificate(cert) => Some(cert),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Certificate> for Value {
    fn from(cert: Certificate) -> Self {
        Value::Certificate(cert)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

/// Host certificate object.
///
/// Cloning a `Certificate` shares the underlying `X509` the way host
/// references do. Handing it to native code goes through [`Certificate::dup`].
#[derive(Clone)]
pub struct Certificate {
    x509: X509,
}

impl Certificate {
    pub fn new(x509: X509) -> Self {
        Self { x509 }
    }

    pub fn x509(&self) -> &X509Ref {
        &self.x509
    }

    /// Independently owned deep copy of the certificate.
    ///
    /// `X509::clone` only bumps the reference count, so the copy goes through
    /// DER and shares nothing with `self`.
    pub fn dup(&self) -> Result<X509, ErrorStack> {
        let der = self.x509.to_der()?;
        X509::from_der(&der)
    }
}

impl From<X509> for Certificate {
    fn from(x509: X509) -> Self {
        Self::new(x509)
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.x509.subject_name())
            .finish()
    }
}
