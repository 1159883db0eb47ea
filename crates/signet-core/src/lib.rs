//! signet-core: shared foundation for the signet auth backend.
//!
//! Provides the unified [`Error`] type, typed entity IDs, and application
//! configuration used by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod ids;

pub use config::Config;
pub use error::{Error, Result};
pub use ids::UserId;
