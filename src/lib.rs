//! Signet - email magic-link authentication backend
//!
//! This library crate exposes the HTTP server for integration testing.

pub mod server;
