//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`. Malformed rows (e.g. a non-UUID id column) are rejected
//! at this boundary instead of leaking into business logic.

use serde::Serialize;
use signet_core::UserId;
use uuid::Uuid;

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(T::from(uuid))
}

/// A registered user.
///
/// Immutable after creation except for `refresh_token`, which the auth flow
/// rotates.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub scopes: String,
    pub platform: Option<String>,
    /// Never serialized into API responses.
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_ms: i64,
}

impl User {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            scopes: row.get(3)?,
            platform: row.get(4)?,
            refresh_token: row.get(5)?,
            created_ms: row.get(6)?,
        })
    }
}
