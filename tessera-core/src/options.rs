//! Connection and pool options.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::overrides::{OptionsOverride, Patch};

/// A password that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Wrap a password.
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// Get the clear-text password.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Resolved, backend-agnostic connection parameters.
///
/// Values are immutable once built. Unset fields use sentinels that mean
/// "use the backend default": an empty host, port `0`, a zero connect
/// timeout and `None` for the optional strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    driver: Option<String>,
    host: String,
    port: u16,
    database: Option<String>,
    user: Option<String>,
    password: Option<Password>,
    ssl: bool,
    connect_timeout: Duration,
    properties: BTreeMap<String, String>,
}

impl ConnectOptions {
    /// Create a builder for generic options (accepted by any driver).
    pub fn builder() -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::default()
    }

    /// Create a builder for options tagged with a driver name.
    pub fn for_driver(driver: impl Into<String>) -> ConnectOptionsBuilder {
        ConnectOptionsBuilder {
            options: Self {
                driver: Some(driver.into()),
                ..Self::default()
            },
        }
    }

    /// Start a builder seeded with these options.
    pub fn to_builder(&self) -> ConnectOptionsBuilder {
        ConnectOptionsBuilder {
            options: self.clone(),
        }
    }

    /// Name of the driver these options were resolved for, if any.
    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    /// Host name; empty when unset.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port; `0` when unset.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Database or service name.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// User name.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Password.
    pub fn password(&self) -> Option<&Password> {
        self.password.as_ref()
    }

    /// Whether TLS is enabled.
    pub fn ssl(&self) -> bool {
        self.ssl
    }

    /// Connect timeout; zero when unset.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Driver-specific extension properties.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Get one extension property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Layer an override document on top of these options, field by field.
    ///
    /// Absent fields keep their current value, `null` resets a field to its
    /// unset sentinel, and a value replaces it. Properties merge per key.
    pub fn apply_overrides(&self, overrides: &OptionsOverride) -> Self {
        let mut merged = self.clone();

        merge(&mut merged.host, &overrides.host, String::new());
        merge(&mut merged.port, &overrides.port, 0);
        merge(&mut merged.ssl, &overrides.ssl, false);
        merge_opt(&mut merged.database, &overrides.database);
        merge_opt(&mut merged.user, &overrides.user);
        match &overrides.password {
            Patch::Absent => {}
            Patch::Null => merged.password = None,
            Patch::Value(p) => merged.password = Some(Password::new(p.clone())),
        }
        match overrides.connect_timeout {
            Patch::Absent => {}
            Patch::Null => merged.connect_timeout = Duration::ZERO,
            Patch::Value(secs) => merged.connect_timeout = Duration::from_secs(secs),
        }

        if let Patch::Null = overrides.properties {
            merged.properties.clear();
        }
        for (key, value) in overrides.property_changes() {
            match value {
                Some(value) => {
                    merged.properties.insert(key.to_string(), value.to_string());
                }
                None => {
                    merged.properties.remove(key);
                }
            }
        }

        merged
    }
}

fn merge<T: Clone>(field: &mut T, patch: &Patch<T>, unset: T) {
    match patch {
        Patch::Absent => {}
        Patch::Null => *field = unset,
        Patch::Value(v) => *field = v.clone(),
    }
}

fn merge_opt<T: Clone>(field: &mut Option<T>, patch: &Patch<T>) {
    match patch {
        Patch::Absent => {}
        Patch::Null => *field = None,
        Patch::Value(v) => *field = Some(v.clone()),
    }
}

/// Builder for [`ConnectOptions`]. Building never fails.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptionsBuilder {
    options: ConnectOptions,
}

impl ConnectOptionsBuilder {
    /// Tag the options with a driver name.
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.options.driver = Some(driver.into());
        self
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options.host = host.into();
        self
    }

    /// Set the port (`0` for the backend default).
    pub fn port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    /// Set the database or service name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.options.database = Some(database.into());
        self
    }

    /// Set the user.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.options.user = Some(user.into());
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<Password>) -> Self {
        self.options.password = Some(password.into());
        self
    }

    /// Enable or disable TLS.
    pub fn ssl(mut self, enabled: bool) -> Self {
        self.options.ssl = enabled;
        self
    }

    /// Set the connect timeout (zero for the backend default).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Add an extension property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.properties.insert(key.into(), value.into());
        self
    }

    /// Build the options.
    pub fn build(self) -> ConnectOptions {
        self.options
    }
}

/// Pool sizing and timeouts. Passed through to [`Pool`](crate::Pool) untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum number of live connections.
    pub max_size: usize,
    /// Maximum time [`Pool::acquire`](crate::Pool::acquire) waits.
    pub acquire_timeout: Duration,
    /// Idle connections older than this are closed instead of reused.
    pub idle_timeout: Option<Duration>,
    /// Connections older than this are closed instead of reused.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 4,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: None,
        }
    }
}

impl PoolOptions {
    /// Create pool options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum pool size.
    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    /// Set the acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Keep idle connections forever.
    pub fn no_idle_timeout(mut self) -> Self {
        self.idle_timeout = None;
        self
    }

    /// Set the maximum connection lifetime.
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_defaults_are_unset() {
        let opts = ConnectOptions::builder().build();
        assert_eq!(opts.host(), "");
        assert_eq!(opts.port(), 0);
        assert_eq!(opts.database(), None);
        assert_eq!(opts.connect_timeout(), Duration::ZERO);
        assert!(!opts.ssl());
        assert!(opts.driver().is_none());
    }

    #[test]
    fn test_password_is_redacted() {
        let opts = ConnectOptions::builder()
            .host("h")
            .user("scott")
            .password("tiger")
            .build();
        let debug = format!("{:?}", opts);
        assert!(!debug.contains("tiger"));
        assert_eq!(opts.password().map(Password::expose), Some("tiger"));
    }

    #[test]
    fn test_to_builder_keeps_fields() {
        let opts = ConnectOptions::for_driver("oracle")
            .host("db")
            .port(1521)
            .property("tnsAdmin", "/etc/tns")
            .build();
        let copy = opts.to_builder().database("orcl").build();
        assert_eq!(copy.driver(), Some("oracle"));
        assert_eq!(copy.port(), 1521);
        assert_eq!(copy.database(), Some("orcl"));
        assert_eq!(copy.property("tnsAdmin"), Some("/etc/tns"));
    }

    #[test]
    fn test_pool_options_builder() {
        let opts = PoolOptions::new()
            .max_size(8)
            .acquire_timeout(Duration::from_millis(100))
            .no_idle_timeout();

        assert_eq!(opts.max_size, 8);
        assert_eq!(opts.acquire_timeout, Duration::from_millis(100));
        assert_eq!(opts.idle_timeout, None);
    }
}
