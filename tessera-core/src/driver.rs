//! The driver SPI: what every backend implements.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::{DriverError, DriverResult};
use crate::options::{ConnectOptions, PoolOptions};
use crate::overrides::OptionsOverride;
use crate::pool::Pool;
use crate::uri::ConnectionUri;

/// One live backend connection.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Whether the connection can no longer be used. Checked by the pool on
    /// release and before reuse; must not block.
    fn is_broken(&self) -> bool;

    /// Close the connection.
    async fn close(&mut self) -> DriverResult<()>;

    /// Access the backend connection type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable access to the backend connection type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Opens raw connections to one database.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Short description used in logs, e.g. `oracle@db:1521/orcl`.
    fn describe(&self) -> String;

    /// Open a new connection.
    async fn connect(&self) -> DriverResult<Box<dyn Connection>>;

    /// Release factory resources. Calling it twice is a no-op.
    async fn close(&self) -> DriverResult<()> {
        Ok(())
    }
}

/// A database driver.
///
/// Drivers are stateless capability objects: every method is pure except
/// [`create_connection_factory`](Driver::create_connection_factory) and
/// [`create_pool`](Driver::create_pool), which allocate backend resources.
pub trait Driver: Send + Sync + Debug {
    /// Driver name, also used as the tag in [`ConnectOptions::driver`].
    fn name(&self) -> &'static str;

    /// URI schemes this driver accepts, lower case.
    fn schemes(&self) -> &'static [&'static str];

    /// Map a parsed URI onto options for this driver.
    fn options_from_uri(&self, uri: &ConnectionUri) -> DriverResult<ConnectOptions>;

    /// Create a connection factory for one database.
    fn create_connection_factory(
        &self,
        runtime: &Handle,
        options: &ConnectOptions,
    ) -> DriverResult<Arc<dyn ConnectionFactory>>;

    /// Whether this driver accepts the URI. Only the scheme is inspected.
    fn accepts_uri(&self, uri: &str) -> bool {
        ConnectionUri::scheme_of(uri).is_some_and(|scheme| self.schemes().contains(&scheme.as_str()))
    }

    /// Whether this driver accepts the options: they are either generic or
    /// tagged with this driver's name.
    fn accepts_options(&self, options: &ConnectOptions) -> bool {
        options.driver().is_none_or(|driver| driver == self.name())
    }

    /// Resolve a URI into options for this driver.
    fn get_connect_options(&self, uri: &str) -> DriverResult<ConnectOptions> {
        if !self.accepts_uri(uri) {
            return Err(DriverError::invalid_uri(
                uri,
                format!("scheme not supported by the {} driver", self.name()),
            ));
        }
        let parsed = ConnectionUri::parse(uri)?;
        self.options_from_uri(&parsed)
    }

    /// Resolve a URI, then layer an override document on top of it.
    fn get_connect_options_with(&self, uri: &str, overrides: &Value) -> DriverResult<ConnectOptions> {
        let base = self.get_connect_options(uri)?;
        let overrides = OptionsOverride::from_json(overrides)?;
        Ok(base.apply_overrides(&overrides))
    }

    /// Create a pool over one or more databases. Connections are opened lazily.
    fn create_pool(
        &self,
        runtime: &Handle,
        databases: &[ConnectOptions],
        options: PoolOptions,
    ) -> DriverResult<Pool> {
        if databases.is_empty() {
            return Err(DriverError::configuration(format!(
                "the {} driver needs at least one database to create a pool",
                self.name()
            )));
        }
        let factories = databases
            .iter()
            .map(|db| self.create_connection_factory(runtime, db))
            .collect::<DriverResult<Vec<_>>>()?;
        debug!(driver = self.name(), databases = factories.len(), "Creating pool");
        Pool::new(runtime.clone(), factories, options)
    }
}
