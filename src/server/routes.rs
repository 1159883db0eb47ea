//! Route handlers.
//!
//! The blocking data layer runs under `spawn_blocking`; handlers hand it a
//! connection-scoped unit of work and map the result (or its original
//! error, unchanged) onto an HTTP response.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use signet_core::{Error, UserId};
use signet_db::models::User;
use signet_db::queries::users;

use super::error::AppError;
use super::AppContext;

/// Health check endpoint.
pub async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

/// Find-or-create the user for a verified magic-link email.
///
/// Runs inside a transaction: the immediate write lock serializes two
/// concurrent logins for the same address, so both get the same user row.
pub async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<User>, AppError> {
    let db = ctx.db.clone();
    let user = tokio::task::spawn_blocking(move || {
        db.with_transaction(|conn| users::create_or_get_user(conn, &req.email, None))
    })
    .await
    .map_err(|e| Error::Internal(format!("spawn_blocking join error: {e}")))??;

    Ok(Json(user))
}

/// Look up a user by id. Missing users surface as 404, never an empty body.
pub async fn get_user(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let id: UserId = id
        .parse()
        .map_err(|_| Error::Validation(format!("invalid user id: {id}")))?;

    let db = ctx.db.clone();
    let user = tokio::task::spawn_blocking(move || {
        // Read-only lookup; no need for transaction framing.
        db.with_connection(|conn| users::select_user(conn, id))
    })
    .await
    .map_err(|e| Error::Internal(format!("spawn_blocking join error: {e}")))??;

    Ok(Json(user))
}
