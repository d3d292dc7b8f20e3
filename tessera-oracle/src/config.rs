//! Oracle adapter configuration.
//!
//! Turns [`ConnectOptions`] into a configured [`OracleDataSource`]. The steps
//! run in a fixed order and none undoes the work of an earlier one:
//!
//! 1. construct an empty data source
//! 2. set the locator URL composed from host, port, service name and TLS flag
//! 3. set user, password and login timeout, only those that are set
//! 4. set extension properties, expanding short aliases to canonical names
//! 5. set adapter defaults for properties that still have no value
//!
//! Any backend error aborts the build and the half-configured data source is
//! dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tessera_core::{ConnectOptions, DriverError, DriverResult};
use tracing::debug;

use crate::datasource::{
    IMPLICIT_STATEMENT_CACHE_SIZE, J2EE13_COMPLIANT, OracleBackend, OracleDataSource, TNS_ADMIN,
};
use crate::error::BackendResult;

/// Locator prefix for the thin client.
pub const LOCATOR_PREFIX: &str = "jdbc:oracle:thin:@";

/// Host used when the options leave it unset.
pub const DEFAULT_HOST: &str = "localhost";

/// Short property names and the canonical names they expand to.
const PROPERTY_ALIASES: &[(&str, &str)] = &[
    ("tnsAdmin", TNS_ADMIN),
    ("tns_admin", TNS_ADMIN),
    ("TNS_ADMIN", TNS_ADMIN),
    ("implicitStatementCacheSize", IMPLICIT_STATEMENT_CACHE_SIZE),
    ("j2ee13Compliant", J2EE13_COMPLIANT),
];

/// Properties the adapter sets unless the caller already did.
///
/// The statement cache default assumes the database default of 50 open
/// cursors per session and stays at half of it.
pub const ADAPTER_DEFAULTS: &[(&str, &str)] = &[
    (J2EE13_COMPLIANT, "true"),
    (IMPLICIT_STATEMENT_CACHE_SIZE, "25"),
];

/// Expand a short property alias to its canonical name. Unknown names are
/// returned unchanged.
pub fn canonical_property_name(name: &str) -> &str {
    PROPERTY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, canonical)| *canonical)
}

/// Compose the thin-client locator for `options`.
///
/// The port segment is present only for a non-zero port and the service
/// segment only when a database is set.
///
/// ```rust
/// use tessera_core::ConnectOptions;
/// use tessera_oracle::config::compose_locator;
///
/// let options = ConnectOptions::builder().host("h").port(1521).build();
/// assert_eq!(compose_locator(&options), "jdbc:oracle:thin:@h:1521");
/// ```
pub fn compose_locator(options: &ConnectOptions) -> String {
    let mut url = String::from(LOCATOR_PREFIX);
    if options.ssl() {
        url.push_str("tcps:");
    }
    url.push_str(if options.host().is_empty() {
        DEFAULT_HOST
    } else {
        options.host()
    });
    if options.port() > 0 {
        url.push(':');
        url.push_str(&options.port().to_string());
    }
    if let Some(service) = options.database() {
        url.push('/');
        url.push_str(service);
    }
    url
}

/// Resolve extension properties to canonical names.
///
/// When both an alias and its canonical name are given, the canonical entry
/// wins.
pub fn resolve_properties(properties: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut resolved = BTreeMap::new();
    for (name, value) in properties {
        let canonical = canonical_property_name(name);
        if canonical != name.as_str() {
            resolved.insert(canonical.to_string(), value.clone());
        }
    }
    for (name, value) in properties {
        if canonical_property_name(name) == name.as_str() {
            resolved.insert(name.clone(), value.clone());
        }
    }
    resolved
}

/// Adapter defaults that still need writing, given the set of property
/// names that already have a value.
pub fn pending_defaults(present: &BTreeSet<String>) -> Vec<(&'static str, &'static str)> {
    ADAPTER_DEFAULTS
        .iter()
        .filter(|(name, _)| !present.contains(*name))
        .copied()
        .collect()
}

/// Login timeout in whole seconds, rounded up; `None` when unset.
fn login_timeout_secs(timeout: Duration) -> Option<u32> {
    if timeout.is_zero() {
        return None;
    }
    let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    Some(u32::try_from(secs).unwrap_or(u32::MAX))
}

/// Map a checked backend error raised while configuring.
fn configure<T>(result: BackendResult<T>) -> DriverResult<T> {
    result.map_err(DriverError::configuration)
}

/// Builds configured data sources for one Oracle client.
#[derive(Debug, Clone, Copy)]
pub struct OracleConfigBuilder<'a> {
    backend: &'a dyn OracleBackend,
}

impl<'a> OracleConfigBuilder<'a> {
    /// Create a builder on top of a native client.
    pub fn new(backend: &'a dyn OracleBackend) -> Self {
        Self { backend }
    }

    /// Create and fully configure a data source for `options`.
    pub fn create_data_source(&self, options: &ConnectOptions) -> DriverResult<Box<dyn OracleDataSource>> {
        let mut data_source = self
            .backend
            .create_data_source()
            .map_err(DriverError::backend_init)?;

        let url = compose_locator(options);
        debug!(url = %url, "Configuring Oracle data source");
        configure(data_source.set_url(&url))?;

        Self::configure_standard_options(data_source.as_mut(), options)?;
        Self::configure_extended_options(data_source.as_mut(), options)?;
        Self::configure_defaults(data_source.as_mut())?;

        Ok(data_source)
    }

    fn configure_standard_options(
        data_source: &mut dyn OracleDataSource,
        options: &ConnectOptions,
    ) -> DriverResult<()> {
        if let Some(user) = options.user() {
            configure(data_source.set_user(user))?;
        }
        if let Some(password) = options.password() {
            configure(data_source.set_password(password.expose()))?;
        }
        if let Some(secs) = login_timeout_secs(options.connect_timeout()) {
            configure(data_source.set_login_timeout(secs))?;
        }
        Ok(())
    }

    fn configure_extended_options(
        data_source: &mut dyn OracleDataSource,
        options: &ConnectOptions,
    ) -> DriverResult<()> {
        for (name, value) in resolve_properties(options.properties()) {
            debug!(property = %name, "Setting Oracle connection property");
            configure(data_source.set_connection_property(&name, &value))?;
        }
        Ok(())
    }

    fn configure_defaults(data_source: &mut dyn OracleDataSource) -> DriverResult<()> {
        let mut present = BTreeSet::new();
        for (name, _) in ADAPTER_DEFAULTS {
            if configure(data_source.connection_property(name))?.is_some() {
                present.insert(name.to_string());
            }
        }
        for (name, value) in pending_defaults(&present) {
            configure(data_source.set_connection_property(name, value))?;
        }
        Ok(())
    }
}
