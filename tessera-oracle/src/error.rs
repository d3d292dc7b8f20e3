//! Errors reported by the native Oracle client.

use std::fmt;

use tessera_core::DriverError;

/// Result type for calls into the native Oracle client.
pub type BackendResult<T> = Result<T, BackendError>;

/// A checked error raised by the native client, such as an invalid property
/// value or a refused connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    /// Human readable message.
    pub message: String,
    /// Vendor error code (`ORA-nnnnn`), `0` when unknown.
    pub vendor_code: i32,
    /// SQLSTATE, when the client reports one.
    pub sql_state: Option<String>,
}

impl BackendError {
    /// Create an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            vendor_code: 0,
            sql_state: None,
        }
    }

    /// Create an error with a vendor code.
    pub fn with_code(message: impl Into<String>, vendor_code: i32) -> Self {
        Self {
            vendor_code,
            ..Self::new(message)
        }
    }

    /// Attach a SQLSTATE.
    pub fn sql_state(mut self, state: impl Into<String>) -> Self {
        self.sql_state = Some(state.into());
        self
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.vendor_code != 0 {
            write!(f, "ORA-{:05}: ", self.vendor_code)?;
        }
        f.write_str(&self.message)?;
        if let Some(state) = &self.sql_state {
            write!(f, " (SQLSTATE {})", state)?;
        }
        Ok(())
    }
}

impl std::error::Error for BackendError {}

impl From<BackendError> for DriverError {
    /// Errors outside of configuration are connection failures.
    fn from(err: BackendError) -> Self {
        DriverError::connect(err)
    }
}
