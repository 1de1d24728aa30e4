//! Connection Locator Library
//!
//! This library wraps SQL database connections (SQLite, PostgreSQL, MySQL)
//! with query logging, and routes them through default, read and write roles.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::{Connection, ConnectionFactory, ConnectionLocator, Statement};
pub use error::{DbError, DbResult};
pub use models::{BindValue, BoundValues, ParamType, Placeholder, QueryLogEntry, Role};
