//! Pool configuration.

use std::time::Duration;

use sqlpool_driver::DriverOptions;

pub use sqlpool_driver::DEFAULT_EXECUTE_TIMEOUT;

/// Connections eagerly opened at construction.
pub const DEFAULT_INIT_COUNT: usize = 5;

/// Hard cap on physical connections.
pub const DEFAULT_MAX_COUNT: usize = 20;

/// Inactivity after which the reaper evicts an idle connection.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Time between reaper passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the connection pool.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Number of connections opened when the pool is created.
    pub init_count: usize,

    /// Maximum number of physical connections, leased or idle.
    pub max_count: usize,

    /// Time a connection can sit idle before the reaper closes it.
    pub idle_timeout: Duration,

    /// Interval between reaper sweeps.
    pub sweep_interval: Duration,

    /// Per-call timeout passed through to every driver.
    pub execute_timeout: Duration,

    /// Roll back a transaction left open when a lease is returned.
    pub rollback_on_release: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            init_count: DEFAULT_INIT_COUNT,
            max_count: DEFAULT_MAX_COUNT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            execute_timeout: DEFAULT_EXECUTE_TIMEOUT,
            rollback_on_release: true,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of connections opened at construction.
    #[must_use]
    pub fn init_count(mut self, count: usize) -> Self {
        self.init_count = count;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_count(mut self, count: usize) -> Self {
        self.max_count = count;
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the reaper sweep interval.
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the per-call timeout passed to drivers.
    #[must_use]
    pub fn execute_timeout(mut self, timeout: Duration) -> Self {
        self.execute_timeout = timeout;
        self
    }

    /// Enable or disable rolling back open transactions on release.
    #[must_use]
    pub fn rollback_on_release(mut self, enabled: bool) -> Self {
        self.rollback_on_release = enabled;
        self
    }

    /// Options handed to the driver constructor.
    #[must_use]
    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions::new().execute_timeout(self.execute_timeout)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), crate::error::PoolError> {
        if self.max_count == 0 {
            return Err(crate::error::PoolError::Configuration(
                "max_count must be greater than 0".into(),
            ));
        }
        if self.init_count == 0 {
            return Err(crate::error::PoolError::Configuration(
                "init_count must be greater than 0".into(),
            ));
        }
        if self.init_count > self.max_count {
            return Err(crate::error::PoolError::Configuration(
                "init_count cannot be greater than max_count".into(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(crate::error::PoolError::Configuration(
                "sweep_interval must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
