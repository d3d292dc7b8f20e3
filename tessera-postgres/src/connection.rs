//! PostgreSQL connection wrapper and factory.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tessera_core::{Connection, ConnectionFactory, DriverError, DriverResult};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, trace, warn};

use crate::error::PgError;

/// A live PostgreSQL connection.
///
/// The protocol I/O runs in a task on the factory's runtime; dropping the
/// client ends that task.
pub struct PgConnection {
    client: Option<Client>,
    driver_task: Option<JoinHandle<()>>,
}

impl PgConnection {
    /// The tokio-postgres client.
    pub fn client(&self) -> &Client {
        self.client.as_ref().expect("Connection already closed")
    }
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("closed", &self.is_broken())
            .finish()
    }
}

#[async_trait]
impl Connection for PgConnection {
    fn is_broken(&self) -> bool {
        self.client.as_ref().is_none_or(Client::is_closed)
    }

    async fn close(&mut self) -> DriverResult<()> {
        drop(self.client.take());
        if let Some(task) = self.driver_task.take() {
            task.await.map_err(DriverError::connect)?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Opens connections to one PostgreSQL database.
pub struct PgConnectionFactory {
    runtime: Handle,
    config: tokio_postgres::Config,
    description: String,
    closed: AtomicBool,
}

impl PgConnectionFactory {
    pub(crate) fn new(runtime: Handle, config: tokio_postgres::Config, description: String) -> Self {
        Self {
            runtime,
            config,
            description,
            closed: AtomicBool::new(false),
        }
    }

    /// The tokio-postgres config connections are opened with.
    pub fn config(&self) -> &tokio_postgres::Config {
        &self.config
    }

    /// Whether [`close`](ConnectionFactory::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for PgConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnectionFactory")
            .field("database", &self.description)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl ConnectionFactory for PgConnectionFactory {
    fn describe(&self) -> String {
        self.description.clone()
    }

    async fn connect(&self) -> DriverResult<Box<dyn Connection>> {
        if self.is_closed() {
            return Err(PgError::connection("connection factory is closed").into());
        }
        trace!(database = %self.description, "Opening PostgreSQL connection");

        let (client, connection) = self.config.connect(NoTls).await.map_err(PgError::from)?;
        let database = self.description.clone();
        let driver_task = self.runtime.spawn(async move {
            if let Err(e) = connection.await {
                warn!(database = %database, error = %e, "PostgreSQL connection error");
            }
        });

        Ok(Box::new(PgConnection {
            client: Some(client),
            driver_task: Some(driver_task),
        }))
    }

    async fn close(&self) -> DriverResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(database = %self.description, "Closed PostgreSQL connection factory");
        }
        Ok(())
    }
}
