use rusqlite::Connection;
use tracing::{debug, warn};

use crate::errors::{FederationError, FederationResult};

/// Write transaction with automatic rollback on drop.
///
/// `BEGIN IMMEDIATE` takes the store's write lock up front, so two mutations
/// never interleave and readers outside the transaction only ever observe the
/// state before `BEGIN` or after `COMMIT`.
pub struct TransactionGuard<'a> {
    conn: &'a Connection,
    store: &'static str,
    committed: bool,
}

impl<'a> TransactionGuard<'a> {
    pub fn begin(conn: &'a Connection, store: &'static str) -> FederationResult<Self> {
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(FederationError::from_write)?;
        debug!(store, "transaction begun");
        Ok(Self {
            conn,
            store,
            committed: false,
        })
    }

    pub fn conn(&self) -> &'a Connection {
        self.conn
    }

    pub fn commit(mut self) -> FederationResult<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(FederationError::from_write)?;
        self.committed = true;
        debug!(store = self.store, "transaction committed");
        Ok(())
    }

    /// Runs `f` inside the transaction, committing on success. Any error
    /// leaves the guard uncommitted so `Drop` rolls everything back.
    pub fn run<F, R>(self, f: F) -> FederationResult<R>
    where
        F: FnOnce(&'a Connection) -> FederationResult<R>,
    {
        let result = f(self.conn).map_err(FederationError::into_transactional)?;
        self.commit()?;
        Ok(result)
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            match self.conn.execute_batch("ROLLBACK") {
                Ok(()) => debug!(store = self.store, "transaction rolled back"),
                // SQLite already rolled back (e.g. after an interrupt).
                Err(_) if self.conn.is_autocommit() => {
                    debug!(store = self.store, "transaction already rolled back")
                }
                Err(err) => warn!(store = self.store, error = %err, "rollback failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().expect("conn");
        conn.execute_batch("CREATE TABLE t(x INTEGER)").expect("schema");
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .expect("count")
    }

    #[test]
    fn failed_closure_rolls_back() {
        let conn = conn();
        let tx = TransactionGuard::begin(&conn, "test").expect("begin");
        let result: FederationResult<()> = tx.run(|c| {
            c.execute("INSERT INTO t VALUES (1)", [])
                .map_err(FederationError::from_write)?;
            Err(FederationError::query("boom"))
        });
        assert!(matches!(result, Err(FederationError::TransactionError(_))));
        assert_eq!(count(&conn), 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn successful_closure_commits() {
        let conn = conn();
        TransactionGuard::begin(&conn, "test")
            .expect("begin")
            .run(|c| {
                c.execute("INSERT INTO t VALUES (1)", [])
                    .map_err(FederationError::from_write)?;
                Ok(())
            })
            .expect("commit");
        assert_eq!(count(&conn), 1);
    }
}
