//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Driver capability set and its sqlx implementation
//! - Logging-aware connections and prepared statements
//! - Role-based connection locator
//! - Parameter resolution and type mappings
//! - Backend dispatch macros for reducing code duplication

pub mod connection;
pub mod driver;
pub mod locator;
pub mod log;
#[macro_use]
pub mod macros;
pub mod params;
pub mod statement;
pub mod types;

pub use connection::Connection;
pub use driver::{DbConnection, Driver, SqlxDriver};
pub use locator::{ConnectionFactory, ConnectionLocator};
pub use log::{QueryLogger, QuerySink};
pub use statement::Statement;
