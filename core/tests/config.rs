//! Configuration loading and validation.

use chasing_core::{config::ChasingConfig, error::ChasingError};
use std::path::PathBuf;

fn write_config(name: &str, body: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("chasing-config-{}-{name}.json", std::process::id()));
    std::fs::write(&path, body).unwrap();
    path
}

/// Absent keys take their defaults; present keys win.
#[test]
fn load_fills_in_defaults() {
    let path = write_config(
        "partial",
        r#"{ "database_path": "/var/lib/chasing/prod.db", "lock_namespace": "web-1", "customer_page_size": 50 }"#,
    );

    let config = ChasingConfig::load(path.to_str().unwrap()).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.database_path, "/var/lib/chasing/prod.db");
    assert_eq!(config.lock_namespace, "web-1");
    assert_eq!(config.customer_page_size, 50);
    assert_eq!(config.lock_ttl_secs, 3600);
    assert_eq!(config.chase_level, "customer");
    assert_eq!(config.smart_chasing_feature, "smart_chasing");
}

/// Values no run can work with are refused at load time.
#[test]
fn load_rejects_unusable_values() {
    let path = write_config("zero-page", r#"{ "customer_page_size": 0 }"#);
    let err = ChasingConfig::load(path.to_str().unwrap()).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(err.to_string().contains("customer_page_size"));

    let path = write_config("bad-ttl", r#"{ "lock_ttl_secs": -5 }"#);
    let err = ChasingConfig::load(path.to_str().unwrap()).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(err.to_string().contains("lock_ttl_secs"));
}

#[test]
fn load_reports_missing_and_malformed_files() {
    let missing = std::env::temp_dir().join("chasing-config-does-not-exist.json");
    let err = ChasingConfig::load(missing.to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains("Cannot read"));

    let path = write_config("malformed", "{ not json");
    assert!(ChasingConfig::load(path.to_str().unwrap()).is_err());
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn validate_flags_an_empty_namespace() {
    let mut config = ChasingConfig::default_test();
    assert!(config.validate().is_ok());

    config.lock_namespace = "  ".into();
    assert!(matches!(config.validate(), Err(ChasingError::Config(_))));
}
