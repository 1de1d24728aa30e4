//! Prepared statements bound to a [`Connection`].

use crate::db::connection::Connection;
use crate::error::DbResult;
use crate::models::{BindValue, BoundValues, Placeholder, ResultSet};

/// A statement with its bound values, executed through the owning connection.
///
/// Executing does not consume the statement, so it can be run again, with or
/// without rebinding. Every execution is logged by the connection.
#[derive(Debug, Clone)]
pub struct Statement<'c> {
    conn: &'c Connection,
    sql: String,
    values: BoundValues,
}

impl<'c> Statement<'c> {
    pub(crate) fn new(conn: &'c Connection, sql: impl Into<String>) -> Self {
        Self {
            conn,
            sql: sql.into(),
            values: BoundValues::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn values(&self) -> &BoundValues {
        &self.values
    }

    /// Append a positional value.
    pub fn bind(&mut self, value: impl Into<BindValue>) -> &mut Self {
        self.values.push(value);
        self
    }

    /// Bind a value to a `:name` placeholder.
    pub fn bind_named(&mut self, name: impl Into<String>, value: impl Into<BindValue>) -> &mut Self {
        self.values
            .insert(Placeholder::Name(name.into()), value.into());
        self
    }

    /// Bind a value to an explicit placeholder, replacing any earlier binding.
    pub fn bind_value(&mut self, placeholder: Placeholder, value: BindValue) -> &mut Self {
        self.values.insert(placeholder, value);
        self
    }

    pub fn bind_values(&mut self, values: &BoundValues) -> &mut Self {
        self.values.extend(values);
        self
    }

    pub fn clear_bindings(&mut self) -> &mut Self {
        self.values = BoundValues::new();
        self
    }

    /// Execute and return the rows.
    pub async fn execute(&self) -> DbResult<ResultSet> {
        self.conn.perform(&self.sql, &self.values).await
    }

    /// Execute and return the affected row count.
    pub async fn execute_affected(&self) -> DbResult<u64> {
        self.conn.fetch_affected(&self.sql, &self.values).await
    }
}
