//! Recording stand-in for a native Oracle client.

#![allow(dead_code)]

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tessera_core::{Connection, DriverResult};
use tessera_oracle::{BackendError, BackendResult, OracleBackend, OracleDataSource};

/// Shared state observed by the tests.
#[derive(Debug, Default)]
pub struct Journal {
    /// Every mutation, in call order.
    pub calls: Mutex<Vec<String>>,
    /// Data sources constructed.
    pub created: AtomicUsize,
    /// Data sources dropped.
    pub dropped: AtomicUsize,
    /// Connections opened.
    pub connections: AtomicUsize,
    /// Connections closed.
    pub closed: AtomicUsize,
}

impl Journal {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[derive(Debug, Default)]
pub struct MockBackend {
    pub journal: Arc<Journal>,
    /// Refuse to construct data sources.
    pub fail_init: bool,
    /// Reject the setter for this URL, user, or property name.
    pub fail_on: Option<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(what: &str) -> Self {
        Self {
            fail_on: Some(what.to_string()),
            ..Self::default()
        }
    }
}

impl OracleBackend for MockBackend {
    fn create_data_source(&self) -> BackendResult<Box<dyn OracleDataSource>> {
        if self.fail_init {
            return Err(BackendError::with_code("unable to load native client", 17002));
        }
        self.journal.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDataSource {
            journal: Arc::clone(&self.journal),
            fail_on: self.fail_on.clone(),
            properties: BTreeMap::new(),
        }))
    }
}

pub struct MockDataSource {
    journal: Arc<Journal>,
    fail_on: Option<String>,
    properties: BTreeMap<String, String>,
}

impl MockDataSource {
    fn record(&self, target: &str, call: String) -> BackendResult<()> {
        if self.fail_on.as_deref() == Some(target) {
            return Err(BackendError::with_code(format!("invalid value for {}", target), 17004).sql_state("99999"));
        }
        self.journal.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl Drop for MockDataSource {
    fn drop(&mut self) {
        self.journal.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

impl OracleDataSource for MockDataSource {
    fn set_url(&mut self, url: &str) -> BackendResult<()> {
        self.record("url", format!("url={}", url))
    }

    fn set_user(&mut self, user: &str) -> BackendResult<()> {
        self.record("user", format!("user={}", user))
    }

    fn set_password(&mut self, password: &str) -> BackendResult<()> {
        self.record("password", format!("password={}", password))
    }

    fn set_login_timeout(&mut self, seconds: u32) -> BackendResult<()> {
        self.record("login_timeout", format!("login_timeout={}", seconds))
    }

    fn set_connection_property(&mut self, name: &str, value: &str) -> BackendResult<()> {
        self.record(name, format!("property {}={}", name, value))?;
        self.properties.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn connection_property(&self, name: &str) -> BackendResult<Option<String>> {
        Ok(self.properties.get(name).cloned())
    }

    fn get_connection(&self) -> BackendResult<Box<dyn Connection>> {
        if self.fail_on.as_deref() == Some("connect") {
            return Err(BackendError::with_code("TNS:listener does not currently know of service", 12514));
        }
        let id = self.journal.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            id,
            journal: Arc::clone(&self.journal),
        }))
    }
}

#[derive(Debug)]
pub struct MockConnection {
    pub id: usize,
    journal: Arc<Journal>,
}

#[async_trait]
impl Connection for MockConnection {
    fn is_broken(&self) -> bool {
        false
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.journal.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
