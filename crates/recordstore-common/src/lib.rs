//! recordstore-common: shared types for the recordstore workspace.
//!
//! Provides the unified error type, typed string keys for the demo
//! entities, and the store configuration loaded by the CLI.

pub mod config;
pub mod error;
pub mod ids;

pub use config::{DatabaseConfig, LoggingConfig, PoolConfig, StoreConfig};
pub use error::{ConstraintKind, Error, Result};
pub use ids::*;
