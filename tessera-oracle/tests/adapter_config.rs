//! Integration tests for turning options into a configured Oracle data source.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::MockBackend;
use pretty_assertions::assert_eq;
use serde_json::json;
use tessera_core::{ConnectOptions, Driver, DriverError};
use tessera_oracle::OracleDriver;
use tessera_oracle::datasource::{IMPLICIT_STATEMENT_CACHE_SIZE, J2EE13_COMPLIANT, TNS_ADMIN};

fn driver_with(backend: MockBackend) -> (OracleDriver, Arc<common::Journal>) {
    let journal = Arc::clone(&backend.journal);
    (OracleDriver::new(Arc::new(backend)), journal)
}

#[test]
fn test_configures_in_order() {
    let (driver, journal) = driver_with(MockBackend::new());
    let options = ConnectOptions::for_driver("oracle")
        .host("db.example.com")
        .port(1521)
        .database("orcl")
        .user("scott")
        .password("tiger")
        .connect_timeout(Duration::from_secs(10))
        .property("tnsAdmin", "/etc/tns")
        .build();

    let data_source = driver.create_data_source(&options).unwrap();

    assert_eq!(
        journal.calls(),
        vec![
            "url=jdbc:oracle:thin:@db.example.com:1521/orcl".to_string(),
            "user=scott".to_string(),
            "password=tiger".to_string(),
            "login_timeout=10".to_string(),
            format!("property {}=/etc/tns", TNS_ADMIN),
            format!("property {}=true", J2EE13_COMPLIANT),
            format!("property {}=25", IMPLICIT_STATEMENT_CACHE_SIZE),
        ]
    );
    assert_eq!(data_source.connection_property(TNS_ADMIN).unwrap().as_deref(), Some("/etc/tns"));
}

#[test]
fn test_minimal_options_touch_only_url_and_defaults() {
    let (driver, journal) = driver_with(MockBackend::new());
    let options = ConnectOptions::builder().host("h").build();

    driver.create_data_source(&options).unwrap();

    let calls = journal.calls();
    assert_eq!(calls[0], "url=jdbc:oracle:thin:@h");
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| !c.starts_with("user=") && !c.starts_with("login_timeout=")));
}

#[test]
fn test_tls_locator_from_uri() {
    let (driver, journal) = driver_with(MockBackend::new());
    let options = driver
        .get_connect_options("oracle+tcps://db.example.com/orcl")
        .unwrap();

    driver.create_data_source(&options).unwrap();

    assert_eq!(journal.calls()[0], "url=jdbc:oracle:thin:@tcps:db.example.com/orcl");
}

#[test]
fn test_configuration_is_idempotent() {
    let (driver, journal) = driver_with(MockBackend::new());
    let options = ConnectOptions::for_driver("oracle")
        .host("h")
        .port(1521)
        .user("scott")
        .property("custom.flag", "on")
        .build();

    driver.create_data_source(&options).unwrap();
    let first = journal.calls();
    journal.clear();
    driver.create_data_source(&options).unwrap();

    assert_eq!(journal.calls(), first);
}

#[test]
fn test_defaults_do_not_clobber_caller_values() {
    let (driver, _journal) = driver_with(MockBackend::new());
    let options = ConnectOptions::builder()
        .host("h")
        .property("implicitStatementCacheSize", "100")
        .property(J2EE13_COMPLIANT, "false")
        .build();

    let data_source = driver.create_data_source(&options).unwrap();

    assert_eq!(
        data_source.connection_property(IMPLICIT_STATEMENT_CACHE_SIZE).unwrap().as_deref(),
        Some("100")
    );
    assert_eq!(
        data_source.connection_property(J2EE13_COMPLIANT).unwrap().as_deref(),
        Some("false")
    );
}

#[test]
fn test_unknown_properties_pass_through() {
    let (driver, _journal) = driver_with(MockBackend::new());
    let options = driver
        .get_connect_options("oracle://h/orcl?oracle.net.CONNECT_TIMEOUT=3000")
        .unwrap();

    let data_source = driver.create_data_source(&options).unwrap();

    assert_eq!(
        data_source.connection_property("oracle.net.CONNECT_TIMEOUT").unwrap().as_deref(),
        Some("3000")
    );
}

#[test]
fn test_override_document_reaches_data_source() {
    let (driver, journal) = driver_with(MockBackend::new());
    let options = driver
        .get_connect_options_with(
            "oracle://scott:tiger@db:1521/orcl?tnsAdmin=/etc/tns",
            &json!({ "port": 1522, "password": null, "properties": { "tnsAdmin": null } }),
        )
        .unwrap();

    driver.create_data_source(&options).unwrap();

    let calls = journal.calls();
    assert_eq!(calls[0], "url=jdbc:oracle:thin:@db:1522/orcl");
    assert!(calls.contains(&"user=scott".to_string()));
    assert!(calls.iter().all(|c| !c.starts_with("password=")));
    assert!(calls.iter().all(|c| !c.contains(TNS_ADMIN)));
}

#[test]
fn test_backend_init_failure() {
    let (driver, journal) = driver_with(MockBackend {
        fail_init: true,
        ..MockBackend::default()
    });

    let err = driver
        .create_data_source(&ConnectOptions::builder().host("h").build())
        .err()
        .unwrap();

    assert!(matches!(err, DriverError::BackendInitFailure { .. }));
    assert!(journal.calls().is_empty());
}

#[test]
fn test_setter_failure_drops_data_source() {
    let (driver, journal) = driver_with(MockBackend::failing_on(TNS_ADMIN));
    let options = ConnectOptions::builder()
        .host("h")
        .user("scott")
        .property("tns_admin", "/bad")
        .build();

    let err = driver.create_data_source(&options).err().unwrap();

    assert!(matches!(err, DriverError::ConfigurationFailure { .. }));
    assert!(err.is_configuration_error());
    let cause = std::error::Error::source(&err).unwrap();
    assert!(cause.to_string().contains("ORA-17004"));

    assert_eq!(journal.created.load(Ordering::SeqCst), 1);
    assert_eq!(journal.dropped.load(Ordering::SeqCst), 1);
    // Nothing after the failing step ran.
    assert!(journal.calls().iter().all(|c| !c.contains(J2EE13_COMPLIANT)));
}

#[test]
fn test_url_failure_is_configuration_failure() {
    let (driver, _journal) = driver_with(MockBackend::failing_on("url"));
    let err = driver
        .create_data_source(&ConnectOptions::builder().host("h").build())
        .err()
        .unwrap();

    assert!(matches!(err, DriverError::ConfigurationFailure { .. }));
}
