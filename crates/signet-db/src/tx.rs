//! Transactional execution around pooled connections.
//!
//! [`DbPool::with_transaction`] brackets a unit of work in
//! `BEGIN IMMEDIATE` / `COMMIT` / `ROLLBACK`, and the connection guard's
//! Drop returns the connection to the pool on every exit path, including a
//! failed commit or rollback. The unit of work receives only a
//! `&Connection`, never the pool, so transactions cannot be nested by code
//! running underneath it.

use rusqlite::Connection;
use signet_core::{Error, Result};

use crate::pool::DbPool;

impl DbPool {
    /// Run `work` inside a transaction on a pooled connection.
    ///
    /// The transaction is opened with `BEGIN IMMEDIATE` so the write lock is
    /// taken up front; lock contention surfaces here rather than at the
    /// first write deep inside `work`. On `Ok` the transaction commits, a
    /// commit failure being reported as [`Error::Transaction`]. On `Err` the
    /// transaction rolls back and the original error propagates unchanged; a
    /// rollback failure is logged but never replaces it.
    pub fn with_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.acquire()?;

        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| Error::transaction("begin", e))?;

        match work(&*conn) {
            Ok(value) => match conn.execute_batch("COMMIT") {
                Ok(()) => Ok(value),
                Err(e) => {
                    tracing::error!("transaction commit failed: {e}");
                    Err(Error::transaction("commit", e))
                }
            },
            Err(err) => {
                if let Err(e) = conn.execute_batch("ROLLBACK") {
                    // More severe than the work's own failure, but the
                    // original error still propagates unchanged.
                    tracing::error!("transaction rollback failed after `{err}`: {e}");
                }
                Err(err)
            }
        }
        // `conn` drops here on every path, releasing back to the pool.
    }

    /// Run `work` on a pooled connection without transaction framing.
    ///
    /// For read-only or non-atomic multi-statement use, where paying the
    /// immediate write lock of [`Self::with_transaction`] would be waste.
    pub fn with_connection<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.acquire()?;
        work(&*conn)
    }
}
