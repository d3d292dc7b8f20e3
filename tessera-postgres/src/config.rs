//! Mapping of [`ConnectOptions`] onto `tokio_postgres::Config`.

use tessera_core::ConnectOptions;
use tokio_postgres::config::SslMode;

use crate::error::{PgError, PgResult};

/// Host used when the options leave it unset.
pub const DEFAULT_HOST: &str = "localhost";

/// Extension property holding the application name.
pub const APPLICATION_NAME: &str = "application_name";

/// Extension property holding a libpq style `sslmode`.
pub const SSL_MODE: &str = "sslmode";

/// Extension property holding server command-line options.
pub const OPTIONS: &str = "options";

/// Extension properties understood by this adapter.
pub const KNOWN_PROPERTIES: &[&str] = &[APPLICATION_NAME, SSL_MODE, OPTIONS];

/// Parse a libpq `sslmode` value.
///
/// The `verify-*` modes need TLS; certificate verification is the job of the
/// TLS connector, so they map to [`SslMode::Require`].
pub fn parse_ssl_mode(value: &str) -> Option<SslMode> {
    match value {
        "disable" => Some(SslMode::Disable),
        "prefer" => Some(SslMode::Prefer),
        "require" | "verify-ca" | "verify-full" => Some(SslMode::Require),
        _ => None,
    }
}

/// Resolve the TLS mode from the TLS flag and an optional `sslmode` property.
fn ssl_mode(options: &ConnectOptions) -> PgResult<SslMode> {
    let Some(value) = options.property(SSL_MODE) else {
        return Ok(if options.ssl() { SslMode::Require } else { SslMode::Prefer });
    };
    let mode = parse_ssl_mode(value).ok_or_else(|| PgError::config(format!("invalid sslmode: {}", value)))?;
    if options.ssl() != (mode == SslMode::Require) {
        return Err(PgError::config(format!(
            "sslmode '{}' contradicts the TLS flag ({})",
            value,
            options.ssl()
        )));
    }
    Ok(mode)
}

/// Convert options to a tokio-postgres config.
///
/// Unset values are left to tokio-postgres defaults. Extension properties
/// outside [`KNOWN_PROPERTIES`] are rejected since tokio-postgres has no
/// generic property bag.
pub fn to_pg_config(options: &ConnectOptions) -> PgResult<tokio_postgres::Config> {
    if let Some(unknown) = options
        .properties()
        .keys()
        .find(|key| !KNOWN_PROPERTIES.contains(&key.as_str()))
    {
        return Err(PgError::config(format!("unsupported connection property '{}'", unknown)));
    }

    let mut config = tokio_postgres::Config::new();
    config.host(match options.host() {
        "" => DEFAULT_HOST,
        // IPv6 literals arrive bracketed from URIs.
        host => host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host),
    });

    if options.port() > 0 {
        config.port(options.port());
    }
    if let Some(database) = options.database() {
        config.dbname(database);
    }
    if let Some(user) = options.user() {
        config.user(user);
    }
    if let Some(password) = options.password() {
        config.password(password.expose());
    }
    if !options.connect_timeout().is_zero() {
        config.connect_timeout(options.connect_timeout());
    }
    if let Some(app_name) = options.property(APPLICATION_NAME) {
        config.application_name(app_name);
    }
    if let Some(server_options) = options.property(OPTIONS) {
        config.options(server_options);
    }
    config.ssl_mode(ssl_mode(options)?);

    Ok(config)
}
