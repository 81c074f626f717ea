//! Connection pooling with metrics example.
//!
//! Spins up a pool over an on-disk SQLite database, hammers it from a few
//! worker threads, and prints status and metrics along the way.
//!
//! # Running
//!
//! ```bash
//! export SQLPOOL_DSN="sqlite:///tmp/sqlpool-demo.db?journal_mode=wal"
//! RUST_LOG=sqlpool=debug cargo run --example connection_pool
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::thread;
use std::time::{Duration, Instant};

use sqlpool::{Pool, PoolConfig, PoolError};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dsn = std::env::var("SQLPOOL_DSN").unwrap_or_else(|_| {
        let path = std::env::temp_dir().join("sqlpool-demo.db");
        format!("sqlite://{}?journal_mode=wal", path.display())
    });

    println!("=== Connection Pool with Metrics Example ===\n");

    let pool_config = PoolConfig::new()
        .init_count(2)
        .max_count(6)
        .idle_timeout(Duration::from_secs(2))
        .sweep_interval(Duration::from_secs(1))
        .execute_timeout(Duration::from_secs(5));

    println!("Pool configuration:");
    println!("  Initial connections: {}", pool_config.init_count);
    println!("  Max connections: {}", pool_config.max_count);
    println!("  Idle timeout: {:?}", pool_config.idle_timeout);
    println!();

    let pool = Pool::new(&dsn, pool_config)?;
    print_status(&pool, "after creation");

    {
        let mut conn = pool.acquire()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS hits (id INTEGER PRIMARY KEY, worker INTEGER, at INTEGER)",
        )?;
    }

    println!("Running 8 workers for 200 inserts each...");
    let started = Instant::now();
    thread::scope(|s| {
        for worker in 0..8 {
            let pool = &pool;
            s.spawn(move || {
                for _ in 0..200 {
                    match pool.acquire_timeout(Duration::from_secs(1)) {
                        Ok(mut conn) => {
                            let mut stmt = conn
                                .prepare("INSERT INTO hits (worker, at) VALUES (?, unixepoch())")
                                .expect("prepare");
                            stmt.set_i32(1, worker).expect("bind");
                            stmt.execute().expect("insert");
                        }
                        Err(PoolError::AcquisitionTimeout(_)) => {
                            eprintln!("worker {worker}: timed out waiting for a connection");
                        }
                        Err(e) => panic!("worker {worker}: {e}"),
                    }
                }
            });
        }
    });
    println!("Done in {:?}\n", started.elapsed());
    print_status(&pool, "after load");

    println!("Sleeping past the idle timeout so the reaper trims the pool...");
    thread::sleep(Duration::from_secs(4));
    print_status(&pool, "after reaping");

    let metrics = pool.metrics();
    println!("Metrics:");
    println!("  Connections created: {}", metrics.connections_created);
    println!("  Connections closed: {}", metrics.connections_closed);
    println!("  Successful checkouts: {}", metrics.checkouts_successful);
    println!(
        "  Checkout success rate: {:.1}%",
        metrics.checkout_success_rate() * 100.0
    );
    println!("  Reaper sweeps: {}", metrics.sweeps);
    println!("  Evictions: {}", metrics.evictions());
    println!("  Uptime: {:?}", metrics.uptime);

    pool.shutdown()?;
    println!("\nPool shut down.");
    Ok(())
}

fn print_status(pool: &Pool, label: &str) {
    let status = pool.status();
    println!(
        "[{label}] available={} in_use={} total={}/{} utilization={:.0}%",
        status.available,
        status.in_use,
        status.total,
        status.max,
        status.utilization()
    );
}
