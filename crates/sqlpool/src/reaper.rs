//! Background eviction of stale and dead connections.
//!
//! A sweep swaps the whole idle stack out under the lock, probes each
//! instance with the lock released, and merges the survivors back underneath
//! anything returned meanwhile. Acquirers never wait on a probe: while a
//! sweep runs they see an empty idle stack and open a new connection if
//! fewer than `max_count` are leased. Survivors that no longer fit under
//! `max_count` when the sweep merges back are closed.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::MutexGuard;

use crate::pool::{CloseReason, PoolInner};

/// What a single sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Idle connections examined.
    pub probed: usize,
    /// Connections closed for exceeding the idle timeout.
    pub expired: usize,
    /// Connections closed because a ping failed.
    pub unhealthy: usize,
    /// Healthy connections closed because the pool refilled during the sweep.
    pub surplus: usize,
}

impl SweepOutcome {
    /// Total connections closed by the sweep.
    #[must_use]
    pub fn evicted(&self) -> usize {
        self.expired + self.unhealthy + self.surplus
    }
}

pub(crate) fn spawn(inner: Arc<PoolInner>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("sqlpool-reaper-{}", inner.id))
        .spawn(move || run(&inner))
}

fn run(inner: &PoolInner) {
    let interval = inner.config.sweep_interval;
    tracing::debug!(pool_id = inner.id, interval = ?interval, "reaper started");

    let mut stopped = inner.stopped.lock();
    loop {
        match Instant::now().checked_add(interval) {
            Some(deadline) => {
                while !*stopped {
                    if inner
                        .stop_signal
                        .wait_until(&mut stopped, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
            }
            None => {
                while !*stopped {
                    inner.stop_signal.wait(&mut stopped);
                }
            }
        }
        if *stopped {
            break;
        }
        MutexGuard::unlocked(&mut stopped, || {
            inner.sweep();
        });
    }
    drop(stopped);

    tracing::debug!(pool_id = inner.id, "reaper stopped");
}

impl PoolInner {
    /// Evict idle instances that timed out or fail a ping.
    pub(crate) fn sweep(&self) -> SweepOutcome {
        let batch = {
            let mut state = self.state.lock();
            let batch = std::mem::take(&mut state.idle);
            state.probing += batch.len();
            batch
        };
        self.metrics.sweeps.fetch_add(1, Ordering::Relaxed);

        let mut outcome = SweepOutcome {
            probed: batch.len(),
            ..SweepOutcome::default()
        };
        let mut survivors = Vec::with_capacity(batch.len());

        for mut conn in batch {
            if conn.meta.is_idle_expired(self.config.idle_timeout) {
                outcome.expired += 1;
                self.destroy(conn, CloseReason::IdleTimeout);
                continue;
            }

            conn.meta.mark_probing();
            let healthy = conn.driver.ping();
            conn.meta.mark_health_check(healthy);
            if healthy {
                survivors.push(conn);
            } else {
                outcome.unhealthy += 1;
                self.destroy(conn, CloseReason::Unhealthy);
            }
        }

        self.metrics
            .idle_evictions
            .fetch_add(outcome.expired as u64, Ordering::Relaxed);
        self.metrics
            .unhealthy_evictions
            .fetch_add(outcome.unhealthy as u64, Ordering::Relaxed);

        let (excess, reason, merged) = {
            let mut state = self.state.lock();
            state.probing = state.probing.saturating_sub(outcome.probed);
            if state.closed {
                (survivors, CloseReason::Shutdown, 0)
            } else {
                let room = self.config.max_count.saturating_sub(state.committed());
                let cut = survivors.len().saturating_sub(room);
                // Oldest survivors sit at the front of the stack.
                let excess: Vec<_> = survivors.drain(..cut).collect();
                let merged = survivors.len();
                // Instances released during the sweep are fresher; keep them on top.
                let returned = std::mem::replace(&mut state.idle, survivors);
                state.idle.extend(returned);
                (excess, CloseReason::Surplus, merged)
            }
        };
        if matches!(reason, CloseReason::Surplus) {
            outcome.surplus = excess.len();
        }
        if merged > 0 || outcome.evicted() > 0 {
            self.available.notify_all();
        }
        for conn in excess {
            self.destroy(conn, reason);
        }

        if outcome.evicted() > 0 {
            tracing::debug!(
                pool_id = self.id,
                probed = outcome.probed,
                expired = outcome.expired,
                unhealthy = outcome.unhealthy,
                surplus = outcome.surplus,
                "reaper evicted connections"
            );
        } else {
            tracing::trace!(pool_id = self.id, probed = outcome.probed, "reaper sweep");
        }

        outcome
    }
}
