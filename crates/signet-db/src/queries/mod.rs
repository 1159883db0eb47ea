//! Query modules, one per entity.
//!
//! Every function here takes an already-acquired `&Connection` and never
//! touches the pool, so a single connection serves an entire
//! `with_transaction` / `with_connection` call even when operations compose.

pub mod users;
