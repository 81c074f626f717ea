//! Connection pool implementation.
//!
//! The pool owns a LIFO stack of idle driver instances behind a
//! `parking_lot::Mutex`, hands them out as [`Lease`]s, and runs a background
//! reaper thread that evicts stale or dead instances. The lock is never held
//! across driver I/O: construction, probing and closing all happen outside
//! it, with capacity reserved up front so that leased plus idle instances
//! never exceed `max_count`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use sqlpool_driver::{Driver, DriverError, DriverOptions, Dsn};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::lease::Lease;
use crate::lifecycle::{ConnectionMetadata, ConnectionState};
use crate::reaper::{self, SweepOutcome};
use crate::registry::{DriverConstructor, DriverRegistry};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A thread-safe pool of database connections.
///
/// The pool pre-opens `init_count` connections, grows on demand up to
/// `max_count`, and never blocks in [`acquire`](Pool::acquire): when every
/// connection is leased and the cap is reached it fails fast with
/// [`PoolError::PoolExhausted`]. Callers that prefer to wait use
/// [`acquire_timeout`](Pool::acquire_timeout).
///
/// # Example
///
/// ```rust,no_run
/// use sqlpool::{Pool, PoolConfig};
///
/// let pool = Pool::new("sqlite:///tmp/app.db?journal_mode=wal", PoolConfig::new())?;
/// {
///     let mut conn = pool.acquire()?;
///     conn.execute("CREATE TABLE IF NOT EXISTS t (x INTEGER)")?;
/// } // returned to the pool here
/// pool.shutdown()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Pool {
    pub(crate) inner: Arc<PoolInner>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

/// State shared between the pool handle and its reaper thread.
pub(crate) struct PoolInner {
    pub(crate) id: u64,
    pub(crate) config: PoolConfig,
    dsn: Dsn,
    constructor: DriverConstructor,
    options: DriverOptions,
    pub(crate) state: Mutex<PoolState>,
    /// Signalled whenever an idle instance or a capacity slot frees up.
    pub(crate) available: Condvar,
    pub(crate) stopped: Mutex<bool>,
    pub(crate) stop_signal: Condvar,
    next_connection_id: AtomicU64,
    created_at: Instant,
    pub(crate) metrics: MetricsCounters,
}

#[derive(Default)]
pub(crate) struct PoolState {
    /// Idle instances; the top of the stack is the most recently returned.
    pub(crate) idle: Vec<PooledDriver>,
    /// Leases handed out, including slots reserved for a connect in flight.
    pub(crate) leased: usize,
    /// Instances swapped out by a sweep and not yet merged back.
    pub(crate) probing: usize,
    pub(crate) closed: bool,
}

impl PoolState {
    /// Instances counted against `max_count`.
    pub(crate) fn committed(&self) -> usize {
        self.idle.len() + self.leased
    }

    fn total(&self) -> usize {
        self.committed() + self.probing
    }
}

/// A driver instance together with its bookkeeping.
pub(crate) struct PooledDriver {
    pub(crate) driver: Box<dyn Driver>,
    pub(crate) meta: ConnectionMetadata,
}

enum Checkout {
    Idle(PooledDriver),
    /// A capacity slot was reserved; the caller must open a connection.
    Reserved,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum CloseReason {
    IdleTimeout,
    Unhealthy,
    Surplus,
    Discarded,
    ClosedByCaller,
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IdleTimeout => "idle timeout",
            Self::Unhealthy => "failed ping",
            Self::Surplus => "over capacity after sweep",
            Self::Discarded => "discarded",
            Self::ClosedByCaller => "closed by caller",
            Self::Shutdown => "pool shutdown",
        })
    }
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
pub(crate) struct MetricsCounters {
    connections_created: AtomicU64,
    connections_closed: AtomicU64,
    checkouts_successful: AtomicU64,
    checkouts_exhausted: AtomicU64,
    checkouts_failed: AtomicU64,
    rollbacks_on_release: AtomicU64,
    pub(crate) sweeps: AtomicU64,
    pub(crate) idle_evictions: AtomicU64,
    pub(crate) unhealthy_evictions: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Pool {
    /// Create a new pool builder.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Create a pool for `dsn` using every backend compiled into this build.
    pub fn new(dsn: &str, config: PoolConfig) -> Result<Self, PoolError> {
        Self::with_registry(dsn, config, &DriverRegistry::with_defaults())
    }

    /// Create a pool for `dsn`, resolving the backend through `registry`.
    ///
    /// Opens `init_count` connections before returning. Individual connect
    /// failures are logged and tolerated; the call fails only if none of
    /// them succeeded.
    pub fn with_registry(
        dsn: &str,
        config: PoolConfig,
        registry: &DriverRegistry,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        let dsn = Dsn::parse(dsn).map_err(PoolError::malformed_dsn)?;
        let constructor = registry.resolve(dsn.scheme())?;

        let inner = Arc::new(PoolInner {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            options: config.driver_options(),
            config,
            dsn,
            constructor,
            state: Mutex::new(PoolState::default()),
            available: Condvar::new(),
            stopped: Mutex::new(false),
            stop_signal: Condvar::new(),
            next_connection_id: AtomicU64::new(1),
            created_at: Instant::now(),
            metrics: MetricsCounters::default(),
        });

        inner.fill()?;

        let handle = match reaper::spawn(Arc::clone(&inner)) {
            Ok(handle) => handle,
            Err(e) => {
                inner.drain(CloseReason::Shutdown);
                return Err(PoolError::ReaperSpawn(e));
            }
        };

        tracing::info!(
            pool_id = inner.id,
            dsn = %inner.dsn,
            init = inner.config.init_count,
            max = inner.config.max_count,
            "connection pool created"
        );

        Ok(Self {
            inner,
            reaper: Mutex::new(Some(handle)),
        })
    }

    /// Lease a connection without waiting.
    ///
    /// Pops the most recently returned idle connection if there is one.
    /// Otherwise opens a new connection if the pool is below `max_count`;
    /// a connect failure is returned as is, with no retry. At capacity the
    /// call fails immediately with [`PoolError::PoolExhausted`].
    pub fn acquire(&self) -> Result<Lease<'_>, PoolError> {
        let checkout = {
            let mut state = self.inner.state.lock();
            if state.closed {
                bump(&self.inner.metrics.checkouts_failed);
                return Err(PoolError::PoolClosed);
            }
            self.inner.try_take(&mut state)
        };

        match checkout {
            Some(checkout) => self.complete(checkout),
            None => {
                bump(&self.inner.metrics.checkouts_exhausted);
                tracing::trace!(pool_id = self.inner.id, "connection pool exhausted");
                Err(PoolError::PoolExhausted {
                    max: self.inner.config.max_count,
                })
            }
        }
    }

    /// Lease a connection, waiting up to `timeout` for one to free up.
    ///
    /// Wakes on release, discard and reaper eviction. Fails with
    /// [`PoolError::AcquisitionTimeout`] once the deadline passes, or with
    /// [`PoolError::PoolClosed`] if the pool is shut down while waiting.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<Lease<'_>, PoolError> {
        let deadline = Instant::now().checked_add(timeout);
        let checkout = {
            let mut state = self.inner.state.lock();
            let mut expired = false;
            loop {
                if state.closed {
                    bump(&self.inner.metrics.checkouts_failed);
                    return Err(PoolError::PoolClosed);
                }
                if let Some(checkout) = self.inner.try_take(&mut state) {
                    break checkout;
                }
                if expired {
                    bump(&self.inner.metrics.checkouts_failed);
                    tracing::debug!(
                        pool_id = self.inner.id,
                        timeout = ?timeout,
                        "timed out waiting for a connection"
                    );
                    return Err(PoolError::AcquisitionTimeout(timeout));
                }
                expired = match deadline {
                    Some(deadline) => self
                        .inner
                        .available
                        .wait_until(&mut state, deadline)
                        .timed_out(),
                    None => {
                        self.inner.available.wait(&mut state);
                        false
                    }
                };
            }
        };
        self.complete(checkout)
    }

    /// Return a lease to the pool. Equivalent to dropping it.
    pub fn release(&self, lease: Lease<'_>) {
        debug_assert!(
            std::ptr::eq(lease.pool(), self),
            "lease released to a pool that did not issue it"
        );
        lease.release();
    }

    /// Run one reaper sweep on the calling thread.
    pub fn reap_now(&self) -> SweepOutcome {
        self.inner.sweep()
    }

    /// Stop the reaper and close every idle connection.
    ///
    /// Every lease must have been released first. Shutting down with leases
    /// outstanding is a programming error: it panics in debug builds and
    /// returns [`PoolError::InvariantViolation`] in release builds. Calling
    /// this more than once is harmless.
    pub fn shutdown(&self) -> Result<(), PoolError> {
        let result = self.close();
        if let Err(PoolError::InvariantViolation { leased }) = &result {
            debug_assert_eq!(
                *leased, 0,
                "pool {} shut down with outstanding lease(s)",
                self.inner.id
            );
        }
        result
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            available: state.idle.len(),
            in_use: state.leased,
            probing: state.probing,
            total: state.total(),
            max: self.inner.config.max_count,
        }
    }

    /// Get a snapshot of the pool counters.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let m = &self.inner.metrics;
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        PoolMetrics {
            connections_created: load(&m.connections_created),
            connections_closed: load(&m.connections_closed),
            checkouts_successful: load(&m.checkouts_successful),
            checkouts_exhausted: load(&m.checkouts_exhausted),
            checkouts_failed: load(&m.checkouts_failed),
            rollbacks_on_release: load(&m.rollbacks_on_release),
            sweeps: load(&m.sweeps),
            idle_evictions: load(&m.idle_evictions),
            unhealthy_evictions: load(&m.unhealthy_evictions),
            uptime: self.inner.created_at.elapsed(),
        }
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Process-unique identifier of this pool.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The parsed connection descriptor.
    #[must_use]
    pub fn dsn(&self) -> &Dsn {
        &self.inner.dsn
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    fn complete(&self, checkout: Checkout) -> Result<Lease<'_>, PoolError> {
        let mut conn = match checkout {
            Checkout::Idle(conn) => conn,
            Checkout::Reserved => match self.inner.open() {
                Ok(conn) => conn,
                Err(e) => {
                    self.inner.release_slot();
                    bump(&self.inner.metrics.checkouts_failed);
                    tracing::debug!(pool_id = self.inner.id, error = %e, "failed to open connection");
                    return Err(PoolError::Connect(e));
                }
            },
        };

        conn.meta.mark_checkout();
        bump(&self.inner.metrics.checkouts_successful);
        tracing::trace!(
            pool_id = self.inner.id,
            connection_id = conn.meta.id,
            "connection acquired"
        );
        Ok(Lease::new(self, conn))
    }

    fn stop_reaper(&self) {
        let Some(handle) = self.reaper.lock().take() else {
            return;
        };
        {
            let mut stopped = self.inner.stopped.lock();
            *stopped = true;
        }
        self.inner.stop_signal.notify_all();
        if handle.join().is_err() {
            tracing::error!(pool_id = self.inner.id, "reaper thread panicked");
        }
    }

    fn close(&self) -> Result<(), PoolError> {
        self.stop_reaper();

        let (was_closed, leased) = {
            let mut state = self.inner.state.lock();
            (std::mem::replace(&mut state.closed, true), state.leased)
        };
        self.inner.available.notify_all();
        let closed = self.inner.drain(CloseReason::Shutdown);

        if leased > 0 {
            tracing::error!(
                pool_id = self.inner.id,
                leased,
                "pool shut down with outstanding leases"
            );
            return Err(PoolError::InvariantViolation { leased });
        }
        if !was_closed {
            tracing::info!(pool_id = self.inner.id, closed, "connection pool shut down");
        }
        Ok(())
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        // A live lease borrows the pool, so only a leaked lease can trip the
        // invariant here.
        if let Err(e) = self.close() {
            tracing::debug!(pool_id = self.inner.id, error = %e, "pool dropped uncleanly");
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.inner.id)
            .field("dsn", &self.inner.dsn)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl PoolInner {
    fn fill(&self) -> Result<(), PoolError> {
        let attempted = self.config.init_count;
        let mut opened = Vec::with_capacity(attempted);
        let mut last_error = None;

        for _ in 0..attempted {
            match self.open() {
                Ok(conn) => opened.push(conn),
                Err(e) => {
                    tracing::warn!(pool_id = self.id, error = %e, "failed to open initial connection");
                    last_error = Some(e);
                }
            }
        }

        if opened.is_empty() {
            return Err(PoolError::NoInitialConnections {
                attempted,
                source: last_error
                    .unwrap_or_else(|| DriverError::Connect("no connection attempted".into())),
            });
        }

        self.state.lock().idle.extend(opened);
        Ok(())
    }

    fn open(&self) -> Result<PooledDriver, DriverError> {
        let driver = (self.constructor)(&self.dsn, &self.options)?;
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        bump(&self.metrics.connections_created);
        tracing::debug!(pool_id = self.id, connection_id = id, "opened connection");
        Ok(PooledDriver {
            driver,
            meta: ConnectionMetadata::new(id, self.id),
        })
    }

    fn try_take(&self, state: &mut PoolState) -> Option<Checkout> {
        if let Some(conn) = state.idle.pop() {
            state.leased += 1;
            return Some(Checkout::Idle(conn));
        }
        // Instances out for probing are not counted; the sweep trims them on merge.
        if state.committed() < self.config.max_count {
            state.leased += 1;
            return Some(Checkout::Reserved);
        }
        None
    }

    fn release_slot(&self) {
        {
            let mut state = self.state.lock();
            state.leased = state.leased.saturating_sub(1);
        }
        self.available.notify_one();
    }

    /// Take back an instance from a dropped lease.
    pub(crate) fn checkin(&self, mut conn: PooledDriver) {
        if conn.driver.is_closed() {
            self.destroy(conn, CloseReason::ClosedByCaller);
            self.release_slot();
            return;
        }

        if self.config.rollback_on_release && conn.driver.in_transaction() {
            tracing::warn!(
                pool_id = self.id,
                connection_id = conn.meta.id,
                depth = conn.driver.transaction_depth(),
                "rolling back transaction left open by lease"
            );
            while conn.driver.in_transaction() {
                if !conn.driver.rollback() {
                    break;
                }
            }
            bump(&self.metrics.rollbacks_on_release);
        }

        conn.meta.mark_checkin();
        let connection_id = conn.meta.id;

        let late = {
            let mut state = self.state.lock();
            state.leased = state.leased.saturating_sub(1);
            if state.closed {
                Some(conn)
            } else {
                state.idle.push(conn);
                None
            }
        };
        self.available.notify_one();

        match late {
            Some(conn) => self.destroy(conn, CloseReason::Shutdown),
            None => tracing::trace!(pool_id = self.id, connection_id, "connection released"),
        }
    }

    /// Close an instance from a lease the caller gave up on.
    pub(crate) fn discard(&self, conn: PooledDriver) {
        self.destroy(conn, CloseReason::Discarded);
        self.release_slot();
    }

    pub(crate) fn destroy(&self, mut conn: PooledDriver, reason: CloseReason) {
        conn.driver.close();
        conn.meta.state = ConnectionState::Closed;
        bump(&self.metrics.connections_closed);
        tracing::debug!(
            pool_id = self.id,
            connection_id = conn.meta.id,
            reason = %reason,
            "closed connection"
        );
    }

    /// Close every idle instance, returning how many were closed.
    fn drain(&self, reason: CloseReason) -> usize {
        let drained = std::mem::take(&mut self.state.lock().idle);
        let count = drained.len();
        for conn in drained {
            self.destroy(conn, reason);
        }
        count
    }
}

/// Builder for creating a connection pool.
#[derive(Debug, Default)]
pub struct PoolBuilder {
    dsn: Option<String>,
    config: PoolConfig,
    registry: Option<DriverRegistry>,
}

impl PoolBuilder {
    /// Create a new pool builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection string.
    #[must_use]
    pub fn dsn(mut self, dsn: impl Into<String>) -> Self {
        self.dsn = Some(dsn.into());
        self
    }

    /// Set the driver registry. Defaults to [`DriverRegistry::with_defaults`].
    #[must_use]
    pub fn registry(mut self, registry: DriverRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the whole pool configuration.
    #[must_use]
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of connections opened at construction.
    #[must_use]
    pub fn init_count(mut self, count: usize) -> Self {
        self.config = self.config.init_count(count);
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_count(mut self, count: usize) -> Self {
        self.config = self.config.max_count(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.idle_timeout(timeout);
        self
    }

    /// Set the reaper sweep interval.
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config = self.config.sweep_interval(interval);
        self
    }

    /// Set the per-call timeout passed to drivers.
    #[must_use]
    pub fn execute_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.execute_timeout(timeout);
        self
    }

    /// Enable or disable rolling back open transactions on release.
    #[must_use]
    pub fn rollback_on_release(mut self, enabled: bool) -> Self {
        self.config = self.config.rollback_on_release(enabled);
        self
    }

    /// Build the pool.
    pub fn build(self) -> Result<Pool, PoolError> {
        let dsn = self
            .dsn
            .ok_or_else(|| PoolError::Configuration("a connection string is required".into()))?;
        let registry = self.registry.unwrap_or_else(DriverRegistry::with_defaults);
        Pool::with_registry(&dsn, self.config, &registry)
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: usize,
    /// Number of connections currently leased.
    pub in_use: usize,
    /// Number of connections the reaper is probing.
    pub probing: usize,
    /// Total number of open connections, including those being probed.
    pub total: usize,
    /// Maximum allowed connections.
    pub max: usize,
}

impl PoolStatus {
    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.in_use as f64 / self.max as f64) * 100.0
    }

    /// Check if the pool is at capacity.
    ///
    /// Connections being probed by the reaper do not count.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.in_use + self.available >= self.max
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Total connections opened since pool start.
    pub connections_created: u64,
    /// Total connections closed since pool start.
    pub connections_closed: u64,
    /// Successful acquires.
    pub checkouts_successful: u64,
    /// Acquires rejected because the pool was at capacity.
    pub checkouts_exhausted: u64,
    /// Acquires that failed to connect, timed out, or hit a closed pool.
    pub checkouts_failed: u64,
    /// Transactions rolled back because a lease was returned mid-transaction.
    pub rollbacks_on_release: u64,
    /// Reaper sweeps run, including [`Pool::reap_now`].
    pub sweeps: u64,
    /// Connections evicted for exceeding the idle timeout.
    pub idle_evictions: u64,
    /// Connections evicted because a ping failed.
    pub unhealthy_evictions: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate checkout success rate (0.0 to 1.0).
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_exhausted + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }

    /// Connections evicted by the reaper for any reason.
    #[must_use]
    pub fn evictions(&self) -> u64 {
        self.idle_evictions + self.unhealthy_evictions
    }
}
