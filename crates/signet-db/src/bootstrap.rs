//! Embedded schema script applied to every newly created connection.
//!
//! The script is a static, `;`-terminated sequence of DDL statements,
//! executed in file order. Idempotency comes from `IF NOT EXISTS` in the SQL
//! itself, so re-running the script against an already-bootstrapped database
//! is safe.

use rusqlite::Connection;
use signet_core::{Error, Result};

/// The full schema script, embedded at compile time.
pub const SCHEMA: &str = include_str!("schema.sql");

/// Apply the schema script to `conn`.
///
/// Statements are split on `;`, trimmed, and empty fragments skipped. The
/// first failing statement aborts with [`Error::Bootstrap`] so the pool can
/// destroy the half-initialized connection instead of handing it out.
pub fn apply(conn: &Connection) -> Result<()> {
    apply_script(conn, SCHEMA)
}

fn apply_script(conn: &Connection, script: &str) -> Result<()> {
    for statement in script.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        conn.execute_batch(statement).map_err(|e| {
            let head = statement.lines().find(|l| !l.trim_start().starts_with("--"));
            Error::bootstrap(format!(
                "statement starting `{}` failed: {e}",
                head.unwrap_or("").trim()
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_creates_users_table() {
        let conn = Connection::open_in_memory().unwrap();
        apply(&conn).unwrap();

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
    fn apply_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply(&conn).unwrap();
        // second run against the already-bootstrapped database is a no-op
        apply(&conn).unwrap();
    }

    #[test]
    fn empty_fragments_are_skipped() {
        let conn = Connection::open_in_memory().unwrap();
        apply_script(&conn, ";;  \n ; CREATE TABLE t (x INTEGER); ;").unwrap();
    }

    #[test]
    fn failing_statement_is_bootstrap_error() {
        let conn = Connection::open_in_memory().unwrap();
        let err = apply_script(&conn, "CREATE TABLE broken (").unwrap_err();
        assert!(matches!(err, Error::Bootstrap(_)));
    }

    #[test]
    fn later_statements_see_earlier_tables() {
        let conn = Connection::open_in_memory().unwrap();
        apply_script(
            &conn,
            "CREATE TABLE a (x INTEGER); CREATE INDEX idx_a ON a(x);",
        )
        .unwrap();
    }
}
