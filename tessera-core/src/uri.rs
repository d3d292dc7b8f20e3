//! Connection URI grammar shared by the drivers.
//!
//! ```text
//! scheme://[user[:password]@]host[:port][/database][?key=value&...]
//! ```
//!
//! The scheme selects the driver; each driver decides what its query keys
//! mean when it turns a [`ConnectionUri`] into
//! [`ConnectOptions`](crate::ConnectOptions).

use std::fmt;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::{DriverError, DriverResult, redact_uri};

/// A connection URI split into its components, percent-decoded.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionUri {
    original: String,
    scheme: String,
    user: Option<String>,
    password: Option<String>,
    host: String,
    port: u16,
    database: Option<String>,
    params: Vec<(String, String)>,
}

impl ConnectionUri {
    /// Parse a connection URI.
    ///
    /// ```rust
    /// use tessera_core::ConnectionUri;
    ///
    /// let uri = ConnectionUri::parse("oracle://scott:tiger@db:1521/orcl?tnsAdmin=/etc").unwrap();
    /// assert_eq!(uri.scheme(), "oracle");
    /// assert_eq!(uri.user(), Some("scott"));
    /// assert_eq!(uri.port(), 1521);
    /// assert_eq!(uri.database(), Some("orcl"));
    /// assert_eq!(uri.param("tnsAdmin"), Some("/etc"));
    /// ```
    pub fn parse(uri: &str) -> DriverResult<Self> {
        debug!(uri_len = uri.len(), "ConnectionUri::parse()");

        let parsed = Url::parse(uri).map_err(|e| DriverError::invalid_uri(uri, e.to_string()))?;

        if parsed.cannot_be_a_base() || !uri.contains("://") {
            return Err(DriverError::invalid_uri(
                uri,
                "expected scheme://host form",
            ));
        }

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| DriverError::invalid_uri(uri, "missing host"))?;

        let user = Some(parsed.username())
            .filter(|u| !u.is_empty())
            .map(percent_decode);
        let password = parsed.password().map(percent_decode);

        let path = parsed.path().trim_start_matches('/');
        let database = (!path.is_empty()).then(|| percent_decode(path));

        let params = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let parsed_uri = Self {
            original: uri.to_string(),
            scheme: parsed.scheme().to_string(),
            user,
            password,
            host: percent_decode(host),
            port: parsed.port().unwrap_or(0),
            database,
            params,
        };
        debug!(
            scheme = %parsed_uri.scheme,
            host = %parsed_uri.host,
            database = ?parsed_uri.database,
            "Connection URI parsed"
        );
        Ok(parsed_uri)
    }

    /// Extract only the scheme, without validating the rest.
    pub fn scheme_of(uri: &str) -> Option<String> {
        let (scheme, _) = uri.split_once("://")?;
        let valid = !scheme.is_empty()
            && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        valid.then(|| scheme.to_ascii_lowercase())
    }

    /// The URI as given.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Lower-cased scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// User name.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Password.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port; `0` when absent.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Database path component.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Query parameters in order of appearance.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Last value of a query parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Parse a boolean query parameter.
    pub fn flag(&self, key: &str) -> DriverResult<Option<bool>> {
        self.param(key)
            .map(|v| match v.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                other => Err(self.invalid(format!("'{}' is not a boolean for '{}'", other, key))),
            })
            .transpose()
    }

    /// Parse a query parameter holding a number of seconds.
    pub fn seconds(&self, key: &str) -> DriverResult<Option<Duration>> {
        self.param(key)
            .map(|v| {
                v.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| self.invalid(format!("'{}' is not a number of seconds for '{}'", v, key)))
            })
            .transpose()
    }

    /// Build an [`DriverError::InvalidUri`] for this URI.
    pub fn invalid(&self, reason: impl Into<String>) -> DriverError {
        DriverError::invalid_uri(&self.original, reason)
    }
}

impl fmt::Debug for ConnectionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionUri")
            .field("uri", &redact_uri(&self.original))
            .field("scheme", &self.scheme)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("params", &self.params)
            .finish()
    }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
