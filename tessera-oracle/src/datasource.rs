//! The native Oracle configuration object and the client that produces it.
//!
//! Tessera does not speak the Oracle wire protocol itself. A native client
//! binding implements [`OracleBackend`] and [`OracleDataSource`]; the adapter
//! only drives the setters below, in a fixed order.

use std::fmt::Debug;

use tessera_core::Connection;

use crate::error::BackendResult;

/// Directory holding `tnsnames.ora` and wallet files.
pub const TNS_ADMIN: &str = "oracle.net.tns_admin";

/// Makes result-set metadata follow JDBC typing (e.g. FLOAT columns
/// are reported as FLOAT rather than NUMBER).
pub const J2EE13_COMPLIANT: &str = "oracle.jdbc.J2EE13Compliant";

/// Number of prepared statements cached per session.
pub const IMPLICIT_STATEMENT_CACHE_SIZE: &str = "oracle.jdbc.implicitStatementCacheSize";

/// Native, mutable connection configuration of the Oracle client.
///
/// Every setter may fail with the client's checked [`BackendError`](crate::BackendError).
pub trait OracleDataSource: Send + Sync {
    /// Set the connection locator, e.g. `jdbc:oracle:thin:@db:1521/orcl`.
    fn set_url(&mut self, url: &str) -> BackendResult<()>;

    /// Set the user.
    fn set_user(&mut self, user: &str) -> BackendResult<()>;

    /// Set the password.
    fn set_password(&mut self, password: &str) -> BackendResult<()>;

    /// Set the login timeout in seconds.
    fn set_login_timeout(&mut self, seconds: u32) -> BackendResult<()>;

    /// Set a named connection property.
    fn set_connection_property(&mut self, name: &str, value: &str) -> BackendResult<()>;

    /// Read back a named connection property, `None` when never set.
    fn connection_property(&self, name: &str) -> BackendResult<Option<String>>;

    /// Open a connection. Blocks the calling thread.
    fn get_connection(&self) -> BackendResult<Box<dyn Connection>>;
}

/// Entry point into a native Oracle client.
pub trait OracleBackend: Send + Sync + Debug {
    /// Construct an empty data source.
    fn create_data_source(&self) -> BackendResult<Box<dyn OracleDataSource>>;
}
