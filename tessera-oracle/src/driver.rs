//! The Oracle driver and its data-source backed connection factory.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tessera_core::{
    Connection, ConnectionFactory, ConnectionUri, ConnectOptions, Driver, DriverError, DriverResult,
};
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::config::{LOCATOR_PREFIX, OracleConfigBuilder, compose_locator};
use crate::datasource::{OracleBackend, OracleDataSource};

/// Driver name, also the options tag.
pub const DRIVER_NAME: &str = "oracle";

/// Plain scheme.
pub const SCHEME: &str = "oracle";

/// Scheme that forces TLS.
pub const TCPS_SCHEME: &str = "oracle+tcps";

const SCHEMES: &[&str] = &[SCHEME, TCPS_SCHEME];

/// Oracle driver on top of a native client.
///
/// ```rust,ignore
/// let driver = OracleDriver::new(Arc::new(MyNativeClient::load()?));
/// let options = driver.get_connect_options("oracle://scott:tiger@db:1521/orcl?tnsAdmin=/etc/tns")?;
/// ```
#[derive(Debug, Clone)]
pub struct OracleDriver {
    backend: Arc<dyn OracleBackend>,
}

impl OracleDriver {
    /// Create a driver using `backend` for every data source.
    pub fn new(backend: Arc<dyn OracleBackend>) -> Self {
        Self { backend }
    }

    /// The native client.
    pub fn backend(&self) -> &Arc<dyn OracleBackend> {
        &self.backend
    }

    /// Create and configure a data source without wrapping it in a factory.
    pub fn create_data_source(&self, options: &ConnectOptions) -> DriverResult<Box<dyn OracleDataSource>> {
        OracleConfigBuilder::new(self.backend.as_ref()).create_data_source(options)
    }
}

impl Driver for OracleDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn schemes(&self) -> &'static [&'static str] {
        SCHEMES
    }

    fn options_from_uri(&self, uri: &ConnectionUri) -> DriverResult<ConnectOptions> {
        let tcps = uri.scheme() == TCPS_SCHEME;
        let mut builder = ConnectOptions::for_driver(DRIVER_NAME)
            .host(uri.host())
            .port(uri.port());

        if let Some(service) = uri.database() {
            builder = builder.database(service);
        }
        if let Some(user) = uri.user() {
            builder = builder.user(user);
        }
        if let Some(password) = uri.password() {
            builder = builder.password(password);
        }

        let ssl = match uri.flag("ssl")?.or(uri.flag("tcps")?) {
            Some(false) if tcps => {
                return Err(uri.invalid(format!("TLS cannot be disabled with the {} scheme", TCPS_SCHEME)));
            }
            Some(enabled) => enabled,
            None => tcps,
        };
        builder = builder.ssl(ssl);

        let timeout = match uri.seconds("connect_timeout")? {
            Some(timeout) => Some(timeout),
            None => uri.seconds("connectTimeout")?,
        };
        if let Some(timeout) = timeout {
            builder = builder.connect_timeout(timeout);
        }

        for (key, value) in uri.params() {
            if !matches!(key.as_str(), "ssl" | "tcps" | "connect_timeout" | "connectTimeout") {
                builder = builder.property(key.as_str(), value.as_str());
            }
        }

        Ok(builder.build())
    }

    fn create_connection_factory(
        &self,
        runtime: &Handle,
        options: &ConnectOptions,
    ) -> DriverResult<Arc<dyn ConnectionFactory>> {
        let data_source = self.create_data_source(options)?;
        let locator = compose_locator(options);
        debug!(locator = %locator, "Created Oracle connection factory");
        Ok(Arc::new(OracleConnectionFactory {
            runtime: runtime.clone(),
            data_source: Arc::from(data_source),
            locator,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Opens connections from one configured data source.
///
/// The native `get_connection` call blocks, so it runs on the blocking pool
/// of the runtime the factory was created with.
pub struct OracleConnectionFactory {
    runtime: Handle,
    data_source: Arc<dyn OracleDataSource>,
    locator: String,
    closed: AtomicBool,
}

impl OracleConnectionFactory {
    /// The locator the data source was configured with.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Whether [`close`](ConnectionFactory::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for OracleConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConnectionFactory")
            .field("locator", &self.locator)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl ConnectionFactory for OracleConnectionFactory {
    fn describe(&self) -> String {
        let target = self.locator.strip_prefix(LOCATOR_PREFIX).unwrap_or(&self.locator);
        format!("{}@{}", DRIVER_NAME, target)
    }

    async fn connect(&self) -> DriverResult<Box<dyn Connection>> {
        if self.is_closed() {
            return Err(DriverError::connect("connection factory is closed"));
        }
        trace!(locator = %self.locator, "Opening Oracle connection");
        let data_source = Arc::clone(&self.data_source);
        let conn = self
            .runtime
            .spawn_blocking(move || data_source.get_connection())
            .await
            .map_err(DriverError::connect)??;
        Ok(conn)
    }

    async fn close(&self) -> DriverResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(locator = %self.locator, "Closed Oracle connection factory");
        }
        Ok(())
    }
}
