//! Ordered driver registry with first-match dispatch.
//!
//! The registry never discovers drivers on its own: callers pass the drivers
//! in the order they should be consulted. The first driver that accepts a URI
//! or an options value wins, so two drivers claiming the same scheme is a
//! configuration mistake; [`DriverRegistry::ambiguous_schemes`] reports it.
//!
//! ```rust,ignore
//! let registry = DriverRegistry::builder()
//!     .register(PgDriver::new())
//!     .register(OracleDriver::new(backend))
//!     .build();
//!
//! let options = registry.connect_options("oracle://scott:tiger@db:1521/orcl")?;
//! let pool = registry.create_pool_for_options(&Handle::current(), &options, PoolOptions::new())?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::debug;

use crate::driver::{ConnectionFactory, Driver};
use crate::error::{DriverError, DriverResult, redact_uri};
use crate::options::{ConnectOptions, PoolOptions};
use crate::pool::Pool;

/// Builder for [`DriverRegistry`].
#[derive(Debug, Default)]
pub struct DriverRegistryBuilder {
    drivers: Vec<Arc<dyn Driver>>,
}

impl DriverRegistryBuilder {
    /// Append a driver. Drivers are consulted in registration order.
    pub fn register(mut self, driver: impl Driver + 'static) -> Self {
        self.drivers.push(Arc::new(driver));
        self
    }

    /// Append an already shared driver.
    pub fn register_arc(mut self, driver: Arc<dyn Driver>) -> Self {
        self.drivers.push(driver);
        self
    }

    /// Build the registry.
    pub fn build(self) -> DriverRegistry {
        let registry = DriverRegistry {
            drivers: self.drivers,
        };
        for (scheme, drivers) in registry.ambiguous_schemes() {
            debug!(scheme = %scheme, drivers = ?drivers, "Scheme is claimed by several drivers; first registered wins");
        }
        registry
    }
}

/// An ordered collection of drivers.
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    drivers: Vec<Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Create a builder.
    pub fn builder() -> DriverRegistryBuilder {
        DriverRegistryBuilder::default()
    }

    /// Registered drivers in dispatch order.
    pub fn drivers(&self) -> &[Arc<dyn Driver>] {
        &self.drivers
    }

    /// Number of registered drivers.
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// Whether no driver is registered.
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Look a driver up by name.
    pub fn driver(&self, name: &str) -> Option<&Arc<dyn Driver>> {
        self.drivers.iter().find(|d| d.name() == name)
    }

    /// Select the first driver that accepts `uri`.
    pub fn select_for_uri(&self, uri: &str) -> DriverResult<Arc<dyn Driver>> {
        let driver = self
            .drivers
            .iter()
            .find(|d| d.accepts_uri(uri))
            .ok_or_else(|| DriverError::NoMatchingDriver(format!("URI '{}'", redact_uri(uri))))?;
        debug!(driver = driver.name(), "Driver selected for URI");
        Ok(driver.clone())
    }

    /// Select the first driver that accepts `options`.
    pub fn select_for_options(&self, options: &ConnectOptions) -> DriverResult<Arc<dyn Driver>> {
        let driver = self
            .drivers
            .iter()
            .find(|d| d.accepts_options(options))
            .ok_or_else(|| {
                DriverError::NoMatchingDriver(match options.driver() {
                    Some(name) => format!("options tagged for driver '{}'", name),
                    None => "generic options".to_string(),
                })
            })?;
        debug!(driver = driver.name(), "Driver selected for options");
        Ok(driver.clone())
    }

    /// Resolve a URI into options using the driver that accepts it.
    pub fn connect_options(&self, uri: &str) -> DriverResult<ConnectOptions> {
        self.select_for_uri(uri)?.get_connect_options(uri)
    }

    /// Resolve a URI and layer an override document on top of it.
    pub fn connect_options_with(&self, uri: &str, overrides: &Value) -> DriverResult<ConnectOptions> {
        self.select_for_uri(uri)?.get_connect_options_with(uri, overrides)
    }

    /// Resolve the URI stored in an environment variable, e.g. `DATABASE_URL`.
    pub fn connect_options_from_env(&self, var: &str) -> DriverResult<ConnectOptions> {
        let uri = std::env::var(var).map_err(|e| {
            DriverError::invalid_uri(&format!("${}", var), format!("environment variable: {}", e))
        })?;
        self.connect_options(&uri)
    }

    /// Create a connection factory with the driver that accepts `options`.
    pub fn create_connection_factory(
        &self,
        runtime: &Handle,
        options: &ConnectOptions,
    ) -> DriverResult<Arc<dyn ConnectionFactory>> {
        self.select_for_options(options)?
            .create_connection_factory(runtime, options)
    }

    /// Create a pool for one database described by `options`.
    pub fn create_pool_for_options(
        &self,
        runtime: &Handle,
        options: &ConnectOptions,
        pool_options: PoolOptions,
    ) -> DriverResult<Pool> {
        self.select_for_options(options)?
            .create_pool(runtime, std::slice::from_ref(options), pool_options)
    }

    /// Create a pool over several databases. The first entry selects the
    /// driver; every entry must be accepted by it.
    pub fn create_pool_for_databases(
        &self,
        runtime: &Handle,
        databases: &[ConnectOptions],
        pool_options: PoolOptions,
    ) -> DriverResult<Pool> {
        let first = databases
            .first()
            .ok_or_else(|| DriverError::configuration("no database given to create a pool"))?;
        let driver = self.select_for_options(first)?;
        if let Some(rejected) = databases.iter().find(|db| !driver.accepts_options(db)) {
            return Err(DriverError::configuration(format!(
                "driver '{}' does not accept options tagged for '{}'",
                driver.name(),
                rejected.driver().unwrap_or("generic")
            )));
        }
        driver.create_pool(runtime, databases, pool_options)
    }

    /// Resolve a URI and create a pool for it.
    pub fn create_pool_for_uri(
        &self,
        runtime: &Handle,
        uri: &str,
        pool_options: PoolOptions,
    ) -> DriverResult<Pool> {
        let driver = self.select_for_uri(uri)?;
        let options = driver.get_connect_options(uri)?;
        driver.create_pool(runtime, &[options], pool_options)
    }

    /// Schemes claimed by more than one driver, with the claiming drivers in
    /// dispatch order.
    pub fn ambiguous_schemes(&self) -> BTreeMap<&'static str, Vec<&'static str>> {
        let mut claims: BTreeMap<&'static str, Vec<&'static str>> = BTreeMap::new();
        for driver in &self.drivers {
            for scheme in driver.schemes() {
                claims.entry(*scheme).or_default().push(driver.name());
            }
        }
        claims.retain(|_, drivers| drivers.len() > 1);
        claims
    }
}
