//! # Tessera
//!
//! Pluggable SQL driver negotiation, configuration resolution and connection
//! pooling.
//!
//! Tessera provides:
//! - An ordered driver registry that picks a backend from a URI or options
//! - A backend-agnostic options model with URI parsing and JSON overrides
//! - Adapter builders that turn options into each backend's native config
//! - A bounded async connection pool over one or more databases
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tessera::prelude::*;
//! use tokio::runtime::Handle;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tessera::DriverError> {
//!     let registry = tessera::default_registry();
//!
//!     let options = registry.connect_options_with(
//!         "postgres://app@localhost/app",
//!         &serde_json::json!({ "password": "from-vault", "connectTimeout": 5 }),
//!     )?;
//!     let pool = registry.create_pool_for_options(&Handle::current(), &options, PoolOptions::new())?;
//!
//!     let conn = pool.acquire().await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use tessera_core::*;

/// PostgreSQL driver.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use tessera_postgres::*;
}

/// Oracle adapter.
#[cfg(feature = "oracle")]
#[cfg_attr(docsrs, doc(cfg(feature = "oracle")))]
pub mod oracle {
    pub use tessera_oracle::*;
}

/// A registry with every driver that needs no external client.
///
/// The Oracle driver is not included since it needs a native client; add it
/// with [`DriverRegistryBuilder::register`].
pub fn default_registry() -> DriverRegistry {
    default_registry_builder().build()
}

/// Builder pre-loaded with the drivers of [`default_registry`].
pub fn default_registry_builder() -> DriverRegistryBuilder {
    let builder = DriverRegistry::builder();
    #[cfg(feature = "postgres")]
    let builder = builder.register(tessera_postgres::PgDriver::new());
    builder
}
