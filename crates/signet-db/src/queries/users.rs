//! User CRUD operations.
//!
//! `create_or_get_user` must run under `with_transaction`: the immediate
//! write lock taken at `BEGIN` serializes concurrent find-or-create calls
//! for the same email, so exactly one row is ever created per natural key.

use chrono::Utc;
use rusqlite::Connection;
use signet_core::{Error, Result, UserId};

use crate::models::User;

const USER_COLUMNS: &str = "id, email, name, scopes, platform, refresh_token, created_ms";

/// Find a user by email, creating one if absent. Returns the row either way.
pub fn create_or_get_user(
    conn: &Connection,
    email: &str,
    refresh_token: Option<&str>,
) -> Result<User> {
    let email = normalize_email(email)?;

    if let Some(user) = get_user_by_email(conn, &email)? {
        return Ok(user);
    }

    let id = UserId::new();
    let created_ms = Utc::now().timestamp_millis();

    conn.execute(
        "INSERT INTO users (id, email, refresh_token, created_ms) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id.to_string(), email, refresh_token, created_ms],
    )
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            Error::Conflict(format!("user '{email}' already exists"))
        } else {
            Error::database(e.to_string())
        }
    })?;

    tracing::debug!(%id, "created user");

    Ok(User {
        id,
        email,
        name: None,
        scopes: String::new(),
        platform: None,
        refresh_token: refresh_token.map(str::to_string),
        created_ms,
    })
}

/// Get a user by primary key, failing with `NotFound` when no row matches.
pub fn select_user(conn: &Connection, id: UserId) -> Result<User> {
    let result = conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id.to_string()],
        User::from_row,
    );
    match result {
        Ok(u) => Ok(u),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::not_found("user", id)),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get a user by email (the natural key).
pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let result = conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
        [email],
        User::from_row,
    );
    match result {
        Ok(u) => Ok(Some(u)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Update a user's refresh token. Returns true if a row was updated.
pub fn update_refresh_token(conn: &Connection, id: UserId, refresh_token: &str) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE users SET refresh_token = ?1 WHERE id = ?2",
            rusqlite::params![refresh_token, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Lowercase and shape-check an email address.
///
/// Full deliverability checks belong to the magic-link flow; this only
/// rejects input that can never be an address.
fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_ascii_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    };
    if !valid {
        return Err(Error::Validation(format!("invalid email address: {email}")));
    }
    Ok(email)
}
