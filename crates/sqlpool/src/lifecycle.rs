//! Per-connection bookkeeping.
//!
//! Every physical connection owned by the pool carries a
//! [`ConnectionMetadata`] record. The reaper reads `last_used_at` to decide
//! idle expiry; leases expose the record so callers can inspect it.

use std::time::{Duration, Instant};

/// Where a connection currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Sitting in the idle stack, ready to be leased.
    Idle,
    /// Held by a caller through a lease.
    Leased,
    /// Taken out of the idle stack by the reaper for a liveness probe.
    Probing,
    /// Closed and about to be dropped.
    Closed,
}

impl ConnectionState {
    /// Check if the connection is available for checkout.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if the connection is currently busy.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Leased | Self::Probing)
    }
}

/// Metadata about a pooled connection.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Identifier, unique within the owning pool.
    pub id: u64,
    /// Identifier of the owning pool.
    pub pool_id: u64,
    /// When the connection was opened.
    pub created_at: Instant,
    /// When the connection was last leased or returned.
    pub last_used_at: Instant,
    /// When the reaper last probed the connection.
    pub last_checked_at: Option<Instant>,
    /// Number of times the connection has been leased.
    pub checkout_count: u64,
    /// Current state of the connection.
    pub state: ConnectionState,
}

impl ConnectionMetadata {
    /// Create metadata for a freshly opened connection.
    #[must_use]
    pub fn new(id: u64, pool_id: u64) -> Self {
        let now = Instant::now();
        Self {
            id,
            pool_id,
            created_at: now,
            last_used_at: now,
            last_checked_at: None,
            checkout_count: 0,
            state: ConnectionState::Idle,
        }
    }

    /// Time since the connection was opened.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the connection was last leased or returned.
    #[must_use]
    pub fn idle_time(&self) -> Duration {
        self.last_used_at.elapsed()
    }

    /// Check if the connection has been idle for longer than `idle_timeout`.
    #[must_use]
    pub fn is_idle_expired(&self, idle_timeout: Duration) -> bool {
        self.idle_time() > idle_timeout
    }

    /// Mark the connection as leased.
    pub fn mark_checkout(&mut self) {
        self.last_used_at = Instant::now();
        self.checkout_count += 1;
        self.state = ConnectionState::Leased;
    }

    /// Mark the connection as returned to idle.
    pub fn mark_checkin(&mut self) {
        self.last_used_at = Instant::now();
        self.state = ConnectionState::Idle;
    }

    /// Mark the start of a reaper probe.
    pub fn mark_probing(&mut self) {
        self.state = ConnectionState::Probing;
    }

    /// Record the outcome of a reaper probe.
    ///
    /// A probe does not count as use, so `last_used_at` is left alone and an
    /// untouched connection still ages towards its idle timeout.
    pub fn mark_health_check(&mut self, healthy: bool) {
        self.last_checked_at = Some(Instant::now());
        self.state = if healthy {
            ConnectionState::Idle
        } else {
            ConnectionState::Closed
        };
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_availability() {
        assert!(ConnectionState::Idle.is_available());
        assert!(!ConnectionState::Leased.is_available());
        assert!(!ConnectionState::Probing.is_available());
        assert!(!ConnectionState::Closed.is_available());
    }

    #[test]
    fn test_connection_state_busy() {
        assert!(!ConnectionState::Idle.is_busy());
        assert!(ConnectionState::Leased.is_busy());
        assert!(ConnectionState::Probing.is_busy());
        assert!(!ConnectionState::Closed.is_busy());
    }

    #[test]
    fn test_connection_metadata_new() {
        let meta = ConnectionMetadata::new(7, 2);
        assert_eq!(meta.id, 7);
        assert_eq!(meta.pool_id, 2);
        assert_eq!(meta.checkout_count, 0);
        assert_eq!(meta.state, ConnectionState::Idle);
        assert!(meta.last_checked_at.is_none());
    }

    #[test]
    fn test_connection_metadata_checkout_checkin() {
        let mut meta = ConnectionMetadata::new(1, 1);
        meta.mark_checkout();
        assert_eq!(meta.checkout_count, 1);
        assert_eq!(meta.state, ConnectionState::Leased);

        meta.mark_checkin();
        assert_eq!(meta.state, ConnectionState::Idle);
    }

    #[test]
    fn test_probe_does_not_refresh_last_used() {
        let mut meta = ConnectionMetadata::new(1, 1);
        let before = meta.last_used_at;
        std::thread::sleep(Duration::from_millis(2));

        meta.mark_probing();
        assert_eq!(meta.state, ConnectionState::Probing);
        meta.mark_health_check(true);

        assert_eq!(meta.last_used_at, before);
        assert!(meta.last_checked_at.is_some());
        assert_eq!(meta.state, ConnectionState::Idle);
    }

    #[test]
    fn test_failed_probe_marks_closed() {
        let mut meta = ConnectionMetadata::new(1, 1);
        meta.mark_probing();
        meta.mark_health_check(false);
        assert_eq!(meta.state, ConnectionState::Closed);
    }

    #[test]
    fn test_idle_expiry() {
        let meta = ConnectionMetadata::new(1, 1);
        assert!(!meta.is_idle_expired(Duration::from_secs(60)));

        std::thread::sleep(Duration::from_millis(5));
        assert!(meta.is_idle_expired(Duration::from_millis(1)));
    }
}
