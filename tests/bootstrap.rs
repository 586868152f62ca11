//! Bootstrap from a configuration file.

use std::io::Write;

use ossl_bridge::bootstrap::{Bootstrap, SubsystemKind};
use ossl_bridge::configs::AppConfig;
use ossl_bridge::Value;

#[test]
fn test_bootstrap_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[module]\nname = \"OSSL\"\n\n[verify]\nslot_label = \"verify_cb\"").unwrap();

    let config = AppConfig::from_file(file.path()).unwrap();
    let ossl = Bootstrap::with_defaults(config)
        .diagnostics_sink(Box::new(std::io::sink()))
        .run()
        .unwrap();

    assert_eq!(ossl.module().name(), "OSSL");
    assert_eq!(ossl.error_class().name(), "OSSL::OpenSSLError");
    assert_eq!(ossl.ex_data().label(ossl.verify_cb_idx()).as_deref(), Some("verify_cb"));
    assert_eq!(ossl.subsystems(), [SubsystemKind::PKey, SubsystemKind::Ssl].as_slice());
}

#[test]
fn test_version_constants() {
    let ossl = Bootstrap::new(AppConfig::default())
        .diagnostics_sink(Box::new(std::io::sink()))
        .run()
        .unwrap();
    let module = ossl.module();

    assert_eq!(
        module.const_get("VERSION").and_then(Value::as_str),
        Some(env!("CARGO_PKG_VERSION"))
    );
    assert!(matches!(
        module.const_get("OPENSSL_VERSION_NUMBER"),
        Some(Value::Integer(n)) if *n == openssl::version::number()
    ));
    assert!(ossl.subsystems().is_empty());
}

#[test]
fn test_independent_instances() {
    let a = Bootstrap::new(AppConfig::default())
        .diagnostics_sink(Box::new(std::io::sink()))
        .run()
        .unwrap();
    let b = Bootstrap::new(AppConfig::default())
        .diagnostics_sink(Box::new(std::io::sink()))
        .run()
        .unwrap();

    a.module().call("debug=", &[Value::Bool(true)]).unwrap();
    assert!(a.diagnostics().debug());
    assert!(!b.diagnostics().debug());
}
