//! Per-adapter connection pool.
//!
//! A pool hands each request its own connection through [`PooledConnection`],
//! which installs the request deadline as a SQLite progress handler and gives
//! the connection back on drop. Connections are opened lazily, with one retry.

use std::{
    ops::Deref,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::{
    config::{StoreConfig, StoreLocation},
    errors::{FederationError, FederationResult},
};

const SETUP_TIMEOUT: Duration = Duration::from_secs(600);

struct PoolState {
    idle: Vec<Connection>,
    open: usize,
    closed: bool,
}

pub struct ConnectionPool {
    store: &'static str,
    config: StoreConfig,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl ConnectionPool {
    pub fn new(store: &'static str, config: StoreConfig) -> FederationResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                open: 0,
                closed: false,
            }),
            available: Condvar::new(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn store(&self) -> &'static str {
        self.store
    }

    /// Number of connections currently open, idle or checked out.
    pub fn open_connections(&self) -> usize {
        self.state.lock().open
    }

    /// Checks out a connection, waiting at most `query_timeout` for one to
    /// become free. The returned guard carries the deadline of the call.
    pub fn acquire(&self) -> FederationResult<PooledConnection<'_>> {
        self.acquire_with_timeout(self.config.query_timeout)
    }

    /// Checkout for schema setup and dataset loads, which are not bounded by
    /// the per-query timeout.
    pub fn acquire_for_setup(&self) -> FederationResult<PooledConnection<'_>> {
        self.acquire_with_timeout(SETUP_TIMEOUT.max(self.config.query_timeout))
    }

    pub fn acquire_with_timeout(&self, timeout: Duration) -> FederationResult<PooledConnection<'_>> {
        let deadline = Instant::now() + timeout;
        let max = self.config.effective_pool_size();
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(FederationError::connection(format!(
                    "{} store has been closed",
                    self.store
                )));
            }
            if let Some(conn) = state.idle.pop() {
                drop(state);
                return Ok(PooledConnection::new(self, conn, deadline));
            }
            if state.open < max {
                state.open += 1;
                drop(state);
                return match self.open_with_retry() {
                    Ok(conn) => Ok(PooledConnection::new(self, conn, deadline)),
                    Err(err) => {
                        self.state.lock().open -= 1;
                        self.available.notify_one();
                        Err(err)
                    }
                };
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                warn!(store = self.store, "no connection became available");
                return Err(FederationError::timeout(format!(
                    "no {} connection available within {timeout:?}",
                    self.store
                )));
            }
        }
    }

    /// Closes every idle connection and refuses further checkouts.
    /// Connections still checked out are closed when they come back.
    pub fn close(&self) {
        let drained: Vec<Connection> = {
            let mut state = self.state.lock();
            state.closed = true;
            let drained: Vec<Connection> = state.idle.drain(..).collect();
            state.open -= drained.len();
            drained
        };
        let count = drained.len();
        for conn in drained {
            if let Err((_, err)) = conn.close() {
                warn!(store = self.store, error = %err, "closing connection failed");
            }
        }
        self.available.notify_all();
        info!(store = self.store, closed = count, "connection pool closed");
    }

    fn open_with_retry(&self) -> FederationResult<Connection> {
        match self.open_connection() {
            Ok(conn) => Ok(conn),
            Err(first) => {
                warn!(store = self.store, error = %first, "connection failed, reconnecting once");
                self.open_connection()
            }
        }
    }

    fn open_connection(&self) -> FederationResult<Connection> {
        let conn = match &self.config.location {
            StoreLocation::InMemory => Connection::open_in_memory(),
            StoreLocation::File(path) => Connection::open(path),
        }
        .map_err(|e| FederationError::connection(e.to_string()))?;
        conn.busy_timeout(self.config.busy_timeout)
            .map_err(|e| FederationError::connection(e.to_string()))?;
        if let StoreLocation::File(path) = &self.config.location {
            let mode: String = conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                .map_err(|e| FederationError::connection(e.to_string()))?;
            debug!(store = self.store, path = %path.display(), journal_mode = %mode, "opened store file");
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| FederationError::connection(e.to_string()))?;
        debug!(store = self.store, "connection opened");
        Ok(conn)
    }

    fn release(&self, conn: Connection) {
        conn.progress_handler(0, None::<fn() -> bool>);
        if !conn.is_autocommit() {
            warn!(store = self.store, "connection returned inside a transaction, rolling back");
            let _ = conn.execute_batch("ROLLBACK");
            if !conn.is_autocommit() && matches!(self.config.location, StoreLocation::File(_)) {
                warn!(store = self.store, "discarding connection left in a transaction");
                self.state.lock().open -= 1;
                self.available.notify_one();
                return;
            }
        }
        let mut state = self.state.lock();
        if state.closed {
            state.open -= 1;
            drop(state);
            let _ = conn.close();
            return;
        }
        state.idle.push(conn);
        drop(state);
        self.available.notify_one();
    }
}

/// Exclusive use of one pooled connection for the duration of one call.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
    deadline: Instant,
}

impl<'a> PooledConnection<'a> {
    fn new(pool: &'a ConnectionPool, conn: Connection, deadline: Instant) -> Self {
        conn.progress_handler(
            pool.config.progress_interval,
            Some(move || Instant::now() >= deadline),
        );
        Self {
            pool,
            conn: Some(conn),
            deadline,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Fails with a timeout once the call has run past its deadline.
    pub fn check_deadline(&self) -> FederationResult<()> {
        if Instant::now() >= self.deadline {
            return Err(FederationError::timeout(format!(
                "{} call ran past its deadline",
                self.pool.store
            )));
        }
        Ok(())
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

/// Numbered statement placeholders `?first, ?first+1, ...` for `count`
/// dynamically bound values.
pub(crate) fn numbered_placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_from_first() {
        assert_eq!(numbered_placeholders(3, 3), "?3, ?4, ?5");
        assert_eq!(numbered_placeholders(1, 0), "");
    }

    #[test]
    fn in_memory_pool_reuses_single_connection() {
        let pool = ConnectionPool::new("test", StoreConfig::in_memory()).expect("pool");
        {
            let conn = pool.acquire().expect("acquire");
            conn.execute_batch("CREATE TABLE t(x INTEGER); INSERT INTO t VALUES (7);")
                .expect("seed");
        }
        let conn = pool.acquire().expect("acquire again");
        let value: i64 = conn
            .query_row("SELECT x FROM t", [], |row| row.get(0))
            .expect("read");
        assert_eq!(value, 7);
        assert_eq!(pool.open_connections(), 1);
    }

    #[test]
    fn exhausted_pool_times_out() {
        let config = StoreConfig::in_memory().with_query_timeout(Duration::from_millis(20));
        let pool = ConnectionPool::new("test", config).expect("pool");
        let _held = pool.acquire().expect("first");
        let err = pool.acquire().err().expect("second checkout must fail");
        assert!(matches!(err, FederationError::Timeout(_)));
    }

    #[test]
    fn open_transaction_is_rolled_back_on_release() {
        let pool = ConnectionPool::new("test", StoreConfig::in_memory()).expect("pool");
        {
            let conn = pool.acquire().expect("acquire");
            conn.execute_batch("CREATE TABLE t(x INTEGER)").expect("schema");
            conn.execute_batch("BEGIN; INSERT INTO t VALUES (1);")
                .expect("open tx");
        }
        let conn = pool.acquire().expect("acquire");
        assert!(conn.is_autocommit());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 0);
    }

    #[test]
    fn closed_pool_rejects_checkout() {
        let pool = ConnectionPool::new("test", StoreConfig::in_memory()).expect("pool");
        drop(pool.acquire().expect("warm"));
        pool.close();
        assert_eq!(pool.open_connections(), 0);
        assert!(matches!(
            pool.acquire().err(),
            Some(FederationError::ConnectionError(_))
        ));
    }
}
