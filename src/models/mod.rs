//! Data models for the connection locator.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod log;
pub mod query;

// Re-export commonly used types
pub use connection::{
    ConnectionConfig, ConnectionConfigError, DEFAULT_CONNECT_TIMEOUT_SECS, DatabaseType, Role,
};
pub use log::QueryLogEntry;
pub use query::{
    BindValue, BoundValues, ColumnMetadata, ExecOutcome, ParamType, ParamValue, Placeholder,
    ResultSet, Row,
};
