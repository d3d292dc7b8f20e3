//! The PostgreSQL driver.

use std::sync::Arc;

use tessera_core::{ConnectOptions, ConnectionFactory, ConnectionUri, Driver, DriverResult};
use tokio::runtime::Handle;
use tokio_postgres::config::SslMode;
use tracing::debug;

use crate::config::{APPLICATION_NAME, DEFAULT_HOST, SSL_MODE, parse_ssl_mode, to_pg_config};
use crate::connection::PgConnectionFactory;

/// Driver name, also the options tag.
pub const DRIVER_NAME: &str = "postgres";

const SCHEMES: &[&str] = &["postgres", "postgresql"];

/// PostgreSQL driver backed by tokio-postgres.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgDriver;

impl PgDriver {
    /// Create the driver.
    pub fn new() -> Self {
        Self
    }
}

impl Driver for PgDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn schemes(&self) -> &'static [&'static str] {
        SCHEMES
    }

    fn options_from_uri(&self, uri: &ConnectionUri) -> DriverResult<ConnectOptions> {
        let mut builder = ConnectOptions::for_driver(DRIVER_NAME)
            .host(uri.host())
            .port(uri.port());

        if let Some(database) = uri.database() {
            builder = builder.database(database);
        }
        if let Some(user) = uri.user() {
            builder = builder.user(user);
        }
        if let Some(password) = uri.password() {
            builder = builder.password(password);
        }
        if let Some(timeout) = uri.seconds("connect_timeout")? {
            builder = builder.connect_timeout(timeout);
        }

        // The TLS flag carries `sslmode`; only `disable`, which the flag cannot
        // express, is kept as a property.
        let mut ssl = uri.flag("ssl")?.unwrap_or(false);
        if let Some(mode) = uri.param(SSL_MODE) {
            match parse_ssl_mode(mode) {
                Some(SslMode::Require) => ssl = true,
                Some(SslMode::Disable) if ssl => {
                    return Err(uri.invalid("sslmode=disable contradicts ssl=true"));
                }
                Some(SslMode::Disable) => builder = builder.property(SSL_MODE, "disable"),
                Some(_) => {}
                None => return Err(uri.invalid(format!("invalid sslmode '{}'", mode))),
            }
        }
        builder = builder.ssl(ssl);

        for (key, value) in uri.params() {
            if !matches!(key.as_str(), "ssl" | "connect_timeout" | SSL_MODE) {
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
        let config = to_pg_config(options)?;
        let description = describe(options);
        debug!(
            database = %description,
            application_name = options.property(APPLICATION_NAME).unwrap_or_default(),
            "Created PostgreSQL connection factory"
        );
        Ok(Arc::new(PgConnectionFactory::new(runtime.clone(), config, description)))
    }
}

/// `postgres@host:port/db`, without credentials.
fn describe(options: &ConnectOptions) -> String {
    let mut out = format!(
        "{}@{}",
        DRIVER_NAME,
        if options.host().is_empty() {
            DEFAULT_HOST
        } else {
            options.host()
        }
    );
    if options.port() > 0 {
        out.push_str(&format!(":{}", options.port()));
    }
    if let Some(database) = options.database() {
        out.push('/');
        out.push_str(database);
    }
    out
}
