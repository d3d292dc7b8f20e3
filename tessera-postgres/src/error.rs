//! Error types for the PostgreSQL adapter.

use tessera_core::DriverError;
use thiserror::Error;

/// Result type for PostgreSQL adapter operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors raised by the PostgreSQL adapter.
#[derive(Error, Debug)]
pub enum PgError {
    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Options that tokio-postgres cannot express.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Postgres(e) => e.is_closed() || e.code().is_none(),
            Self::Config(_) => false,
        }
    }
}

impl From<PgError> for DriverError {
    fn from(err: PgError) -> Self {
        match err {
            PgError::Config(_) => DriverError::configuration(err),
            _ => DriverError::connect(err),
        }
    }
}
