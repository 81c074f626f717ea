//! Scoped, single-owner connection handles.

use std::fmt;
use std::ops::{Deref, DerefMut};

use sqlpool_driver::Driver;

use crate::lifecycle::ConnectionMetadata;
use crate::pool::{Pool, PooledDriver};

/// A connection leased from a [`Pool`].
///
/// Dereferences to [`Driver`], so every driver operation is available
/// directly on the lease. When the lease goes out of scope the connection
/// returns to the pool; [`release`](Lease::release) does the same
/// explicitly, and [`discard`](Lease::discard) closes it instead.
///
/// A lease borrows its pool, so the pool cannot be dropped while any lease
/// is alive.
pub struct Lease<'pool> {
    pool: &'pool Pool,
    conn: Option<PooledDriver>,
}

impl<'pool> Lease<'pool> {
    pub(crate) fn new(pool: &'pool Pool, conn: PooledDriver) -> Self {
        Self {
            pool,
            conn: Some(conn),
        }
    }

    /// Get the connection metadata.
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.entry().meta
    }

    /// Identifier of the leased connection, unique within its pool.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.entry().meta.id
    }

    /// The pool this lease returns to.
    #[must_use]
    pub fn pool(&self) -> &'pool Pool {
        self.pool
    }

    /// Return the connection to the pool now.
    pub fn release(self) {
        drop(self);
    }

    /// Close the connection instead of returning it.
    ///
    /// Use this when the connection is known to be broken. Its capacity slot
    /// is freed immediately.
    pub fn discard(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.inner.discard(conn);
        }
    }

    // `conn` is only emptied by `discard` and `drop`, both of which consume
    // the lease.
    #[allow(clippy::expect_used)]
    fn entry(&self) -> &PooledDriver {
        self.conn.as_ref().expect("lease already returned")
    }

    #[allow(clippy::expect_used)]
    fn entry_mut(&mut self) -> &mut PooledDriver {
        self.conn.as_mut().expect("lease already returned")
    }
}

impl Deref for Lease<'_> {
    type Target = dyn Driver;

    fn deref(&self) -> &Self::Target {
        self.entry().driver.as_ref()
    }
}

impl DerefMut for Lease<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.entry_mut().driver.as_mut()
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.inner.checkin(conn);
        }
    }
}

impl fmt::Debug for Lease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Lease");
        s.field("pool_id", &self.pool.id());
        if let Some(conn) = &self.conn {
            s.field("connection_id", &conn.meta.id)
                .field("state", &conn.meta.state)
                .field("transaction_depth", &conn.driver.transaction_depth());
        }
        s.finish()
    }
}
