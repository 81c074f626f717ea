//! End-to-end pool tests over the bundled SQLite backend.

#![cfg(feature = "sqlite")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::thread;
use std::time::Duration;

use sqlpool::{Pool, PoolConfig, PoolError};
use sqlpool_testing::TestFixture;
use tempfile::TempDir;

fn file_pool(dir: &TempDir, config: PoolConfig) -> Pool {
    let dsn = format!(
        "sqlite://{}?journal_mode=wal&synchronous=normal",
        dir.path().join("pool.db").display()
    );
    Pool::new(&dsn, config).expect("sqlite pool")
}

fn fixture() -> TestFixture {
    TestFixture::new().with_table("events", "id INTEGER PRIMARY KEY, worker INTEGER, n INTEGER")
}

#[test]
fn test_reference_dsn_builds_pool() {
    let dir = TempDir::new().unwrap();
    let dsn = format!(
        "sqlite://{}?synchronous=normal&heap_limit=8000",
        dir.path().join("x.db").display()
    );
    let pool = Pool::new(&dsn, PoolConfig::new().init_count(2).max_count(4)).unwrap();

    assert_eq!(pool.dsn().param("heap_limit"), Some("8000"));
    assert_eq!(pool.status().available, 2);
    pool.shutdown().unwrap();
}

#[test]
fn test_unregistered_scheme_is_rejected() {
    let err = Pool::new("mysql://localhost:3306/test", PoolConfig::new()).unwrap_err();
    assert!(matches!(err, PoolError::UnsupportedBackend(_)));
}

#[test]
fn test_writes_visible_across_leases() {
    let dir = TempDir::new().unwrap();
    let pool = file_pool(&dir, PoolConfig::new().init_count(2).max_count(2));

    let mut writer = pool.acquire().unwrap();
    writer.execute(&fixture().create_sql()).unwrap();
    {
        let mut stmt = writer
            .prepare("INSERT INTO events (worker, n) VALUES (?, ?)")
            .unwrap();
        for n in 0..10 {
            stmt.set_i32(1, 0).unwrap();
            stmt.set_i32(2, n).unwrap();
            stmt.execute().unwrap();
        }
    }

    let mut reader = pool.acquire().unwrap();
    assert_ne!(reader.id(), writer.id());
    let mut cursor = reader.query("SELECT COUNT(*), SUM(n) FROM events").unwrap();
    assert!(cursor.next_row().unwrap());
    assert_eq!(cursor.get_i64(1).unwrap(), Some(10));
    assert_eq!(cursor.get_i64(2).unwrap(), Some(45));
}

#[test]
fn test_threads_share_pool() {
    let dir = TempDir::new().unwrap();
    let pool = file_pool(
        &dir,
        PoolConfig::new()
            .init_count(2)
            .max_count(4)
            .execute_timeout(Duration::from_secs(5)),
    );
    pool.acquire()
        .unwrap()
        .execute(&fixture().create_sql())
        .unwrap();

    thread::scope(|s| {
        for worker in 0..4 {
            let pool = &pool;
            s.spawn(move || {
                for n in 0..25 {
                    let mut conn = pool.acquire_timeout(Duration::from_secs(5)).unwrap();
                    conn.execute(&format!(
                        "INSERT INTO events (worker, n) VALUES ({worker}, {n})"
                    ))
                    .unwrap();
                }
            });
        }
    });

    let mut conn = pool.acquire().unwrap();
    let mut cursor = conn.query("SELECT COUNT(*) FROM events").unwrap();
    assert!(cursor.next_row().unwrap());
    assert_eq!(cursor.get_i64(1).unwrap(), Some(100));
    drop(cursor);
    drop(conn);

    assert!(pool.status().total <= 4);
}

#[test]
fn test_abandoned_transaction_rolled_back() {
    let dir = TempDir::new().unwrap();
    let pool = file_pool(&dir, PoolConfig::new().init_count(1).max_count(1));

    {
        let mut conn = pool.acquire().unwrap();
        conn.execute(&fixture().create_sql()).unwrap();
        assert!(conn.begin_transaction());
        conn.execute("INSERT INTO events (worker, n) VALUES (1, 1)")
            .unwrap();
    }

    let mut conn = pool.acquire().unwrap();
    assert!(!conn.in_transaction());
    let mut cursor = conn.query("SELECT COUNT(*) FROM events").unwrap();
    assert!(cursor.next_row().unwrap());
    assert_eq!(cursor.get_i64(1).unwrap(), Some(0));
}

#[test]
fn test_reap_keeps_live_sqlite_connections() {
    let dir = TempDir::new().unwrap();
    let pool = file_pool(&dir, PoolConfig::new().init_count(3).max_count(3));

    let outcome = pool.reap_now();
    assert_eq!(outcome.probed, 3);
    assert_eq!(outcome.evicted(), 0);
    pool.shutdown().unwrap();
}
