//! Bounded SQLite connection pool.
//!
//! The pool owns every live connection to one database file. Connections are
//! created lazily up to `max_size` (with `min_size` created eagerly at init),
//! checked out exclusively via [`DbPool::acquire`], and returned by the RAII
//! [`PooledConnection`] guard. Demand beyond `max_size` blocks on a condvar
//! rather than over-provisioning; this is the backpressure protecting SQLite
//! from excessive concurrent writers.
//!
//! Every new connection gets session pragmas (WAL journal, busy timeout,
//! relaxed synchronous level that WAL makes crash-safe) and the embedded
//! schema script before any caller sees it. A bootstrap failure destroys the
//! connection and surfaces from `acquire` instead of pooling a broken handle.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use rusqlite::Connection;
use signet_core::config::DbConfig;
use signet_core::{Error, Result};

use crate::bootstrap;

/// Sizing and timeout policy for a [`DbPool`], fixed at init time.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connections created eagerly so the hot path never pays open latency.
    pub min_size: u32,
    /// Hard cap on live connections.
    pub max_size: u32,
    /// SQLite busy handler timeout applied per connection.
    pub busy_timeout: std::time::Duration,
    /// How long `acquire` waits for capacity before failing with
    /// `PoolExhausted`. `None` waits indefinitely.
    pub acquire_timeout: Option<std::time::Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 5,
            busy_timeout: std::time::Duration::from_millis(5000),
            acquire_timeout: None,
        }
    }
}

impl From<&DbConfig> for PoolConfig {
    fn from(cfg: &DbConfig) -> Self {
        Self {
            min_size: cfg.min_connections,
            max_size: cfg.max_connections,
            busy_timeout: std::time::Duration::from_millis(cfg.busy_timeout_ms),
            acquire_timeout: cfg
                .acquire_timeout_ms
                .map(std::time::Duration::from_millis),
        }
    }
}

/// Mutable pool state, guarded by a single mutex.
#[derive(Debug)]
struct PoolState {
    /// Connections currently idle and eligible for checkout.
    idle: Vec<Connection>,
    /// All live connections, idle or checked out. Never exceeds `max_size`.
    total: u32,
    /// Once set, released connections are closed instead of pooled and new
    /// acquires fail.
    shutdown: bool,
}

#[derive(Debug)]
struct PoolShared {
    state: Mutex<PoolState>,
    /// Signalled when a connection is released or a creation slot frees up.
    available: Condvar,
    path: String,
    config: PoolConfig,
}

/// Handle to the connection pool. Cheap to clone; all clones share state.
#[derive(Debug, Clone)]
pub struct DbPool {
    shared: Arc<PoolShared>,
}

/// Initialize a pool backed by a database file (or `file:` URI).
///
/// Creates `min_size` connections eagerly; a schema bootstrap failure on any
/// of them aborts initialization.
pub fn init_pool(db_path: &str, config: PoolConfig) -> Result<DbPool> {
    let pool = DbPool {
        shared: Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                total: 0,
                shutdown: false,
            }),
            available: Condvar::new(),
            path: db_path.to_string(),
            config,
        }),
    };

    let min = pool.shared.config.min_size.min(pool.shared.config.max_size);
    for _ in 0..min {
        let conn = pool.create_connection()?;
        let mut state = pool.shared.state.lock();
        state.total += 1;
        state.idle.push(conn);
    }

    tracing::debug!(
        path = %pool.shared.path,
        min = min,
        max = pool.shared.config.max_size,
        "initialized connection pool"
    );
    Ok(pool)
}

/// Initialize an in-memory pool (useful for tests).
///
/// Each call creates a uniquely-named shared-cache in-memory database so
/// that parallel tests do not interfere with each other, while all
/// connections *within* a single pool still share state.
pub fn init_memory_pool(config: PoolConfig) -> Result<DbPool> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let uri = format!("file:signet_memdb_{n}?mode=memory&cache=shared");
    init_pool(&uri, config)
}

impl DbPool {
    /// Check out a connection, blocking until one is available.
    ///
    /// Pops an idle connection if there is one, creates a new connection if
    /// the pool is below `max_size`, and otherwise waits for a release. With
    /// an `acquire_timeout` configured, an expired wait yields
    /// [`Error::PoolExhausted`]; without one the wait is unbounded. A
    /// connection is never handed to two callers at once.
    pub fn acquire(&self) -> Result<PooledConnection> {
        let deadline = self.shared.config.acquire_timeout.map(|t| Instant::now() + t);
        let mut state = self.shared.state.lock();

        loop {
            if state.shutdown {
                return Err(Error::Internal(
                    "acquire on a shut-down connection pool".into(),
                ));
            }

            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection {
                    pool: self.clone(),
                    conn: Some(conn),
                });
            }

            if state.total < self.shared.config.max_size {
                // Reserve the slot before dropping the lock so concurrent
                // acquires cannot push the live count past max_size.
                state.total += 1;
                drop(state);

                match self.create_connection() {
                    Ok(conn) => {
                        return Ok(PooledConnection {
                            pool: self.clone(),
                            conn: Some(conn),
                        })
                    }
                    Err(e) => {
                        let mut state = self.shared.state.lock();
                        state.total -= 1;
                        drop(state);
                        // notify_all: the freed slot matters to waiting
                        // acquirers and to a shutdown waiting on total == 0.
                        self.shared.available.notify_all();
                        return Err(e);
                    }
                }
            }

            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .available
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return Err(Error::PoolExhausted(format!(
                            "no connection available within {:?}",
                            self.shared.config.acquire_timeout.unwrap_or_default()
                        )));
                    }
                }
                None => self.shared.available.wait(&mut state),
            }
        }
    }

    /// Shut down the pool: close idle connections, then wait for checked-out
    /// ones to come back (they are closed on release once shutdown has
    /// begun). Idempotent.
    pub fn shutdown(&self) {
        let idle: Vec<Connection> = {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            let drained: Vec<Connection> = state.idle.drain(..).collect();
            state.total -= drained.len() as u32;
            drained
        };

        // Wake blocked acquires so they observe the shutdown flag.
        self.shared.available.notify_all();

        for conn in idle {
            close_connection(conn);
        }

        let mut state = self.shared.state.lock();
        while state.total > 0 {
            self.shared.available.wait(&mut state);
        }
        tracing::info!("connection pool shut down");
    }

    /// Number of live connections (idle + checked out).
    pub fn live_connections(&self) -> u32 {
        self.shared.state.lock().total
    }

    /// Number of idle connections eligible for checkout.
    pub fn idle_connections(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    /// Open a connection, apply session pragmas, and run the schema script.
    ///
    /// WAL journaling provides crash consistency, which is what justifies
    /// `synchronous = NORMAL` instead of the slower FULL.
    fn create_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.shared.path).map_err(|e| {
            Error::database(format!("failed to open {}: {e}", self.shared.path))
        })?;

        let busy_ms = self.shared.config.busy_timeout.as_millis();
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = {busy_ms};
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;"
        ))
        .map_err(|e| Error::database(format!("failed to apply session pragmas: {e}")))?;

        // A bootstrap failure drops `conn` here; it is never pooled.
        bootstrap::apply(&conn)?;
        Ok(conn)
    }

    /// Return a connection to the idle set, or close it if the pool is
    /// shutting down. Called exactly once per checkout, from the guard's Drop.
    fn release(&self, conn: Connection) {
        // A panic inside a unit of work unwinds past its ROLLBACK; a
        // connection must never re-enter the pool with a transaction open.
        if !conn.is_autocommit() {
            tracing::warn!("connection released mid-transaction; rolling back");
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::error!("rollback on release failed, closing connection: {e}");
                let mut state = self.shared.state.lock();
                state.total -= 1;
                drop(state);
                close_connection(conn);
                self.shared.available.notify_all();
                return;
            }
        }

        let mut state = self.shared.state.lock();
        if state.shutdown {
            state.total -= 1;
            drop(state);
            close_connection(conn);
            // Wake the shutdown waiter.
            self.shared.available.notify_all();
        } else {
            state.idle.push(conn);
            drop(state);
            self.shared.available.notify_one();
        }
    }
}

fn close_connection(conn: Connection) {
    if let Err((_conn, e)) = conn.close() {
        tracing::warn!("failed to close database connection: {e}");
    }
}

/// RAII guard for a checked-out connection.
///
/// Derefs to [`rusqlite::Connection`]; Drop returns the connection to the
/// pool, so release happens on every exit path without caller cooperation.
/// Ownership of the underlying session is exclusive for the duration of the
/// checkout.
#[derive(Debug)]
pub struct PooledConnection {
    pool: DbPool,
    conn: Option<Connection>,
}

impl std::ops::Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Invariant: `conn` is Some until Drop takes it.
        self.conn.as_ref().expect("connection already released")
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection already released")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn small_pool(min: u32, max: u32) -> DbPool {
        init_memory_pool(PoolConfig {
            min_size: min,
            max_size: max,
            ..PoolConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn min_connections_created_eagerly() {
        let pool = small_pool(2, 4);
        assert_eq!(pool.live_connections(), 2);
        assert_eq!(pool.idle_connections(), 2);
    }

    #[test]
    fn bootstrap_runs_on_creation() {
        let pool = small_pool(1, 2);
        let conn = pool.acquire().unwrap();
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='users'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(exists);
    }

    #[test]
    fn session_pragmas_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pragmas.db");
        let pool = init_pool(path.to_str().unwrap(), PoolConfig::default()).unwrap();
        let conn = pool.acquire().unwrap();

        let journal: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal.to_lowercase(), "wal");

        let busy: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(busy, 5000);

        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn live_count_never_exceeds_max() {
        let pool = small_pool(1, 2);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!(pool.live_connections(), 2);
        drop(a);
        drop(b);
        assert_eq!(pool.live_connections(), 2);
        assert_eq!(pool.idle_connections(), 2);
    }

    #[test]
    fn release_rolls_back_open_transaction() {
        let pool = small_pool(1, 1);
        {
            let conn = pool.acquire().unwrap();
            conn.execute_batch("BEGIN IMMEDIATE").unwrap();
            conn.execute(
                "INSERT INTO users (id, email, created_ms) VALUES ('t1', 't1@example.com', 0)",
                [],
            )
            .unwrap();
            // Dropped without COMMIT or ROLLBACK.
        }

        let conn = pool.acquire().unwrap();
        assert!(conn.is_autocommit());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn third_acquire_blocks_until_release() {
        let pool = small_pool(1, 2);
        let a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();

        let (tx, rx) = mpsc::channel();
        let pool2 = pool.clone();
        let handle = thread::spawn(move || {
            let c = pool2.acquire().unwrap();
            tx.send(()).unwrap();
            drop(c);
        });

        // C must still be waiting while A and B are checked out.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(pool.live_connections(), 2);

        drop(a);
        rx.recv_timeout(Duration::from_secs(2))
            .expect("third acquire should unblock after a release");
        handle.join().unwrap();
        assert_eq!(pool.live_connections(), 2);
    }

    #[test]
    fn acquire_timeout_yields_pool_exhausted() {
        let pool = init_memory_pool(PoolConfig {
            min_size: 1,
            max_size: 1,
            acquire_timeout: Some(Duration::from_millis(50)),
            ..PoolConfig::default()
        })
        .unwrap();

        let _held = pool.acquire().unwrap();
        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, Error::PoolExhausted(_)));
    }

    #[test]
    fn no_double_checkout() {
        // Mark each checkout in a connection-private temp table. Temp
        // tables never outlive their connection and are invisible to other
        // connections, so seeing more than one marker row means the same
        // physical connection was handed to two holders at once.
        let pool = small_pool(1, 3);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..20 {
                    let conn = pool.acquire().unwrap();
                    conn.execute_batch(
                        "CREATE TEMP TABLE IF NOT EXISTS checkout_marker (x INTEGER)",
                    )
                    .unwrap();
                    conn.execute("INSERT INTO checkout_marker (x) VALUES (1)", [])
                        .unwrap();
                    let holders: i64 = conn
                        .query_row("SELECT COUNT(*) FROM checkout_marker", [], |row| row.get(0))
                        .unwrap();
                    assert_eq!(holders, 1, "connection handed out twice");
                    thread::yield_now();
                    conn.execute("DELETE FROM checkout_marker", []).unwrap();
                    drop(conn);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(pool.live_connections() <= 3);
    }

    #[test]
    fn bootstrap_failure_surfaces_from_acquire() {
        // Point the pool at a database whose schema can never apply by
        // pre-creating a conflicting non-table object.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE VIEW users AS SELECT 1 AS id")
                .unwrap();
        }

        let err = init_pool(path.to_str().unwrap(), PoolConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Bootstrap(_)));
    }

    #[test]
    fn failed_creation_releases_slot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flaky.db");

        // min_size 0 so init succeeds without touching the database.
        let pool = init_pool(
            path.to_str().unwrap(),
            PoolConfig {
                min_size: 0,
                max_size: 1,
                acquire_timeout: Some(Duration::from_millis(50)),
                ..PoolConfig::default()
            },
        )
        .unwrap();

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE VIEW users AS SELECT 1 AS id")
                .unwrap();
        }

        assert!(pool.acquire().is_err());
        assert_eq!(pool.live_connections(), 0, "failed creation must free its slot");

        // Repair the database; the slot must be reusable.
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("DROP VIEW users").unwrap();
        }
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let pool = small_pool(1, 2);
        pool.shutdown();
        pool.shutdown();
        assert_eq!(pool.live_connections(), 0);
    }

    #[test]
    fn shutdown_waits_for_checked_out_connections() {
        let pool = small_pool(1, 2);
        let conn = pool.acquire().unwrap();

        let pool2 = pool.clone();
        let handle = thread::spawn(move || {
            pool2.shutdown();
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished(), "shutdown must wait for in-flight checkout");

        drop(conn);
        handle.join().unwrap();
        assert_eq!(pool.live_connections(), 0);
    }

    #[test]
    fn acquire_after_shutdown_fails() {
        let pool = small_pool(1, 2);
        pool.shutdown();
        assert!(pool.acquire().is_err());
    }
}
