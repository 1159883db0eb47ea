//! signet-db: SQLite persistence layer for signet.
//!
//! This crate provides a bounded connection pool with per-connection schema
//! bootstrap, a transactional execution wrapper, typed models, and query
//! functions for the user table.

pub mod bootstrap;
pub mod models;
pub mod pool;
pub mod queries;
pub mod tx;

pub use pool::{init_memory_pool, init_pool, DbPool, PoolConfig, PooledConnection};
