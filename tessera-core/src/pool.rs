//! Generic connection pool over one or more [`ConnectionFactory`]s.
//!
//! A semaphore bounds the number of live connections; one mutex guards the
//! idle set. Connections go back to the idle set when the
//! [`PooledConnection`] guard is dropped, unless they are broken, in which case
//! they are closed and replaced lazily on the next acquisition.
//!
//! ```rust,ignore
//! let pool = driver.create_pool(&Handle::current(), &[options], PoolOptions::new())?;
//! let conn = pool.acquire().await?;
//! // Use connection...
//! drop(conn); // back to the pool
//! pool.close().await?;
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, trace, warn};

use crate::driver::{Connection, ConnectionFactory};
use crate::error::{DriverError, DriverResult};
use crate::options::PoolOptions;

/// Lifecycle state of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Accepting acquisitions.
    Open,
    /// Shut down; terminal.
    Closed,
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatus {
    /// Live connections, idle or in use.
    pub size: usize,
    /// Idle connections.
    pub idle: usize,
    /// Guards currently handed out.
    pub in_use: usize,
    /// Maximum number of live connections.
    pub max_size: usize,
    /// Lifecycle state.
    pub state: PoolState,
}

/// Statistics about pool usage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections opened through a factory.
    pub opened: u64,
    /// Acquisitions served from the idle set.
    pub reused: u64,
    /// Connections closed because they were broken, expired or released
    /// after shutdown.
    pub discarded: u64,
    /// Acquisitions that timed out.
    pub timeouts: u64,
}

struct IdleConnection {
    conn: Box<dyn Connection>,
    created_at: Instant,
    last_used: Instant,
}

struct PoolInner {
    runtime: Handle,
    factories: Vec<Arc<dyn ConnectionFactory>>,
    next_factory: AtomicUsize,
    semaphore: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleConnection>>,
    closed: AtomicBool,
    shutdown: Notify,
    size: AtomicUsize,
    options: PoolOptions,
    stats: Mutex<PoolStats>,
}

/// A bounded pool of reusable connections. Cheap to clone.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Create a pool. No connection is opened until the first
    /// [`acquire`](Pool::acquire).
    pub fn new(
        runtime: Handle,
        factories: Vec<Arc<dyn ConnectionFactory>>,
        options: PoolOptions,
    ) -> DriverResult<Self> {
        if factories.is_empty() {
            return Err(DriverError::configuration("a pool needs at least one connection factory"));
        }
        if options.max_size == 0 {
            return Err(DriverError::configuration("pool max_size must be greater than zero"));
        }
        if options.max_size > Semaphore::MAX_PERMITS {
            return Err(DriverError::configuration(format!(
                "pool max_size must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }

        info!(
            databases = factories.len(),
            max_size = options.max_size,
            acquire_timeout_ms = options.acquire_timeout.as_millis() as u64,
            "Connection pool created"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                runtime,
                next_factory: AtomicUsize::new(0),
                semaphore: Arc::new(Semaphore::new(options.max_size)),
                idle: Mutex::new(VecDeque::new()),
                closed: AtomicBool::new(false),
                shutdown: Notify::new(),
                size: AtomicUsize::new(0),
                stats: Mutex::new(PoolStats::default()),
                factories,
                options,
            }),
        })
    }

    /// Get a connection, waiting up to the acquire timeout.
    ///
    /// Fails with [`DriverError::AcquireTimeout`] when no connection becomes
    /// available in time and with [`DriverError::PoolClosed`] when the pool is
    /// or becomes closed while waiting.
    pub async fn acquire(&self) -> DriverResult<PooledConnection> {
        trace!("Acquiring connection from pool");
        let inner = &self.inner;
        if inner.is_closed() {
            return Err(DriverError::PoolClosed);
        }

        let timeout = inner.options.acquire_timeout;
        // `None` when the timeout is too large to represent: wait without a deadline.
        let deadline = tokio::time::Instant::now().checked_add(timeout);

        let permit = match within(deadline, inner.semaphore.clone().acquire_owned()).await {
            Some(Ok(permit)) => permit,
            // The semaphore is only closed by `close()`.
            Some(Err(_)) => return Err(DriverError::PoolClosed),
            None => return Err(inner.timed_out(timeout)),
        };
        if inner.is_closed() {
            return Err(DriverError::PoolClosed);
        }

        while let Some(idle) = inner.pop_idle() {
            if inner.is_expired(&idle) || idle.conn.is_broken() {
                debug!("Discarding stale idle connection");
                inner.discard(idle.conn);
                continue;
            }
            inner.stats.lock().reused += 1;
            return Ok(PooledConnection {
                conn: Some(idle.conn),
                created_at: idle.created_at,
                broken: false,
                pool: inner.clone(),
                _permit: permit,
            });
        }

        let factory = inner.next_factory();
        trace!(database = %factory.describe(), "No idle connections, opening new connection");

        let shutdown = inner.shutdown.notified();
        tokio::pin!(shutdown);
        // Registered before the flag check so a concurrent `close()` is not missed.
        shutdown.as_mut().enable();
        if inner.is_closed() {
            return Err(DriverError::PoolClosed);
        }

        let conn = tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!(database = %factory.describe(), "Pool closed while opening connection");
                return Err(DriverError::PoolClosed);
            }
            result = within(deadline, factory.connect()) => match result {
                Some(Ok(conn)) => conn,
                Some(Err(e)) => {
                    debug!(database = %factory.describe(), error = %e, "Failed to open connection");
                    return Err(e);
                }
                None => return Err(inner.timed_out(timeout)),
            },
        };
        inner.size.fetch_add(1, Ordering::SeqCst);
        inner.stats.lock().opened += 1;

        if inner.is_closed() {
            inner.discard(conn);
            return Err(DriverError::PoolClosed);
        }

        Ok(PooledConnection {
            conn: Some(conn),
            created_at: Instant::now(),
            broken: false,
            pool: inner.clone(),
            _permit: permit,
        })
    }

    /// Close the pool: fail pending and future acquisitions with
    /// [`DriverError::PoolClosed`], close idle connections and the factories.
    ///
    /// Connections still in use are closed when released. Closing an already
    /// closed pool is a no-op.
    pub async fn close(&self) -> DriverResult<()> {
        let drained: Vec<IdleConnection> = {
            let mut idle = self.inner.idle.lock();
            if self.inner.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            idle.drain(..).collect()
        };
        self.inner.semaphore.close();
        self.inner.shutdown.notify_waiters();
        self.inner.size.fetch_sub(drained.len(), Ordering::SeqCst);

        let connections = join_all(drained.into_iter().map(|mut idle| async move {
            idle.conn.close().await
        }));
        let factories = join_all(self.inner.factories.iter().map(|f| f.close()));
        let (connections, factories) = futures::join!(connections, factories);

        let mut first_error = None;
        for result in connections.into_iter().chain(factories) {
            if let Err(e) = result {
                warn!(error = %e, "Error while closing pool");
                first_error.get_or_insert(e);
            }
        }

        info!("Connection pool closed");
        first_error.map_or(Ok(()), Err)
    }

    /// Lifecycle state.
    pub fn state(&self) -> PoolState {
        if self.inner.is_closed() {
            PoolState::Closed
        } else {
            PoolState::Open
        }
    }

    /// Whether the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Get the current pool status.
    pub fn status(&self) -> PoolStatus {
        let max_size = self.inner.options.max_size;
        PoolStatus {
            size: self.inner.size.load(Ordering::SeqCst),
            idle: self.inner.idle.lock().len(),
            in_use: max_size.saturating_sub(self.inner.semaphore.available_permits()),
            max_size,
            state: self.state(),
        }
    }

    /// Get pool statistics.
    pub fn stats(&self) -> PoolStats {
        self.inner.stats.lock().clone()
    }

    /// Get the pool options.
    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let databases: Vec<String> = self.inner.factories.iter().map(|f| f.describe()).collect();
        f.debug_struct("Pool")
            .field("databases", &databases)
            .field("status", &self.status())
            .finish()
    }
}

/// Run `fut` until `deadline`; `None` when the deadline passed first.
async fn within<F: Future>(deadline: Option<tokio::time::Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

impl PoolInner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn next_factory(&self) -> &Arc<dyn ConnectionFactory> {
        let i = self.next_factory.fetch_add(1, Ordering::Relaxed);
        &self.factories[i % self.factories.len()]
    }

    fn pop_idle(&self) -> Option<IdleConnection> {
        self.idle.lock().pop_back()
    }

    fn is_expired(&self, idle: &IdleConnection) -> bool {
        let idle_expired = self
            .options
            .idle_timeout
            .is_some_and(|timeout| idle.last_used.elapsed() > timeout);
        let lifetime_expired = self
            .options
            .max_lifetime
            .is_some_and(|lifetime| idle.created_at.elapsed() > lifetime);
        idle_expired || lifetime_expired
    }

    fn timed_out(&self, timeout: Duration) -> DriverError {
        self.stats.lock().timeouts += 1;
        warn!(timeout_ms = timeout.as_millis() as u64, "Timed out waiting for a pooled connection");
        DriverError::AcquireTimeout(timeout)
    }

    /// Close a connection in the background and forget it.
    fn discard(&self, mut conn: Box<dyn Connection>) {
        self.size.fetch_sub(1, Ordering::SeqCst);
        self.stats.lock().discarded += 1;
        self.runtime.spawn(async move {
            if let Err(e) = conn.close().await {
                debug!(error = %e, "Error closing discarded connection");
            }
        });
    }

    fn release(&self, conn: Box<dyn Connection>, created_at: Instant, broken: bool) {
        if broken || conn.is_broken() {
            debug!("Released connection is broken, discarding");
            self.discard(conn);
            return;
        }

        let mut idle = self.idle.lock();
        // Checked under the idle lock so a concurrent `close()` cannot miss it.
        if self.is_closed() {
            drop(idle);
            self.discard(conn);
            return;
        }
        idle.push_back(IdleConnection {
            conn,
            created_at,
            last_used: Instant::now(),
        });
        trace!("Connection returned to pool");
    }
}

/// A connection checked out of a [`Pool`].
///
/// Dropping the guard returns the connection to the pool.
pub struct PooledConnection {
    conn: Option<Box<dyn Connection>>,
    created_at: Instant,
    broken: bool,
    pool: Arc<PoolInner>,
    // Dropped after `Drop::drop` has put the connection back.
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Flag the connection as unusable so it is discarded on release.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Time since the connection was opened.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Downcast to the backend connection type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.conn.as_ref()?.as_any().downcast_ref()
    }

    /// Mutably downcast to the backend connection type.
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.conn.as_mut()?.as_any_mut().downcast_mut()
    }

    /// Close the connection now instead of returning it to the pool.
    pub async fn discard(mut self) -> DriverResult<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        self.pool.size.fetch_sub(1, Ordering::SeqCst);
        self.pool.stats.lock().discarded += 1;
        conn.close().await
    }
}

impl Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_deref().expect("Connection already taken")
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("age", &self.age())
            .field("broken", &self.broken)
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.created_at, self.broken);
        }
    }
}
