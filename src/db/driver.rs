//! Driver capability set and its sqlx implementation.
//!
//! A [`Connection`](crate::db::Connection) runs every statement through a
//! [`Driver`]. The crate ships [`SqlxDriver`], which holds one live sqlx
//! connection for MySQL, PostgreSQL or SQLite.
//!
//! # Architecture
//!
//! Backend-specific code lives in the `mysql`, `postgres` and `sqlite`
//! submodules. Each provides the same interface adapted to its database type.

use crate::db::params::{bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::types::into_result_set;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, DatabaseType, ExecOutcome, ParamValue, ResultSet};
use crate::{impl_db_dispatch, impl_db_raw_execute};
use futures_util::future::BoxFuture;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::ConnectOptions;
use std::str::FromStr;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

/// Operations a connection needs from the underlying database driver.
///
/// Arguments are already resolved: placeholders are in the backend's native
/// syntax and `params` are in bind order.
pub trait Driver: Send + Sync {
    fn database_type(&self) -> DatabaseType;

    /// Run a statement and collect its rows.
    fn fetch<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [ParamValue],
    ) -> BoxFuture<'a, DbResult<ResultSet>>;

    /// Run a statement for its side effects.
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [ParamValue],
    ) -> BoxFuture<'a, DbResult<ExecOutcome>>;

    fn begin(&self) -> BoxFuture<'_, DbResult<()>>;
    fn commit(&self) -> BoxFuture<'_, DbResult<()>>;
    fn rollback(&self) -> BoxFuture<'_, DbResult<()>>;
}

/// A live sqlx connection for one of the supported backends.
pub enum DbConnection {
    MySql(MySqlConnection),
    Postgres(PgConnection),
    SQLite(SqliteConnection),
}

impl DbConnection {
    pub fn db_type(&self) -> DatabaseType {
        match self {
            Self::MySql(_) => DatabaseType::MySQL,
            Self::Postgres(_) => DatabaseType::PostgreSQL,
            Self::SQLite(_) => DatabaseType::SQLite,
        }
    }
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DbConnection::{}", self.db_type())
    }
}

/// [`Driver`] backed by a single sqlx connection.
///
/// Statements are serialized through an async mutex, so a transaction opened
/// with [`Driver::begin`] covers every statement until commit or rollback.
pub struct SqlxDriver {
    db_type: DatabaseType,
    conn: Mutex<DbConnection>,
}

impl SqlxDriver {
    /// Wrap an already-open sqlx connection.
    pub fn new(conn: DbConnection) -> Self {
        Self {
            db_type: conn.db_type(),
            conn: Mutex::new(conn),
        }
    }

    /// Open a connection described by `config`, bounded by its connect timeout.
    pub async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        debug!(
            name = %config.name,
            db_type = %config.db_type,
            url = %config.masked_connection_string(),
            "Opening connection"
        );

        let url = config.connection_string.as_str();
        let connect = async {
            let conn = match config.db_type {
                DatabaseType::MySQL => {
                    DbConnection::MySql(MySqlConnectOptions::from_str(url)?.connect().await?)
                }
                DatabaseType::PostgreSQL => {
                    DbConnection::Postgres(PgConnectOptions::from_str(url)?.connect().await?)
                }
                DatabaseType::SQLite => {
                    DbConnection::SQLite(SqliteConnectOptions::from_str(url)?.connect().await?)
                }
            };
            Ok::<_, sqlx::Error>(conn)
        };

        match timeout(config.connect_timeout, connect).await {
            Ok(Ok(conn)) => Ok(Self::new(conn)),
            Ok(Err(e)) => Err(DbError::from(e)),
            Err(_) => Err(DbError::timeout(
                format!("connect to '{}'", config.name),
                config.connect_timeout.as_secs(),
            )),
        }
    }

    async fn run_raw(&self, sql: &'static str) -> DbResult<()> {
        let mut conn = self.conn.lock().await;
        impl_db_raw_execute!(&mut *conn, sql)?;
        Ok(())
    }
}

impl std::fmt::Debug for SqlxDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlxDriver")
            .field("db_type", &self.db_type)
            .finish_non_exhaustive()
    }
}

impl Driver for SqlxDriver {
    fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    fn fetch<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [ParamValue],
    ) -> BoxFuture<'a, DbResult<ResultSet>> {
        Box::pin(async move {
            let mut conn = self.conn.lock().await;
            impl_db_dispatch!(&mut *conn, {
                MySql(c) => mysql::fetch_rows(c, sql, params).await.map(into_result_set),
                Postgres(c) => postgres::fetch_rows(c, sql, params).await.map(into_result_set),
                SQLite(c) => sqlite::fetch_rows(c, sql, params).await.map(into_result_set),
            })
        })
    }

    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [ParamValue],
    ) -> BoxFuture<'a, DbResult<ExecOutcome>> {
        Box::pin(async move {
            let mut conn = self.conn.lock().await;
            impl_db_dispatch!(&mut *conn, {
                MySql(c) => mysql::execute(c, sql, params).await,
                Postgres(c) => postgres::execute(c, sql, params).await,
                SQLite(c) => sqlite::execute(c, sql, params).await,
            })
        })
    }

    fn begin(&self) -> BoxFuture<'_, DbResult<()>> {
        Box::pin(self.run_raw("BEGIN"))
    }

    fn commit(&self) -> BoxFuture<'_, DbResult<()>> {
        Box::pin(self.run_raw("COMMIT"))
    }

    fn rollback(&self) -> BoxFuture<'_, DbResult<()>> {
        Box::pin(self.run_raw("ROLLBACK"))
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// When params is empty the SQL is sent unprepared, so statements that cannot be
// prepared (DDL, multi-statement scripts) still run.

mod mysql {
    use super::*;
    use sqlx::mysql::MySqlRow;

    pub async fn fetch_rows(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[ParamValue],
    ) -> DbResult<Vec<MySqlRow>> {
        let rows = if params.is_empty() {
            use sqlx::Executor;
            conn.fetch_all(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            query.fetch_all(&mut *conn).await?
        };
        Ok(rows)
    }

    pub async fn execute(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[ParamValue],
    ) -> DbResult<ExecOutcome> {
        let result = if params.is_empty() {
            use sqlx::Executor;
            conn.execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            query.execute(&mut *conn).await?
        };
        // MySQL reports 0 when no AUTO_INCREMENT value was generated
        let last_insert_id = match result.last_insert_id() {
            0 => None,
            id => i64::try_from(id).ok(),
        };
        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id,
        })
    }
}

mod postgres {
    use super::*;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        conn: &mut PgConnection,
        sql: &str,
        params: &[ParamValue],
    ) -> DbResult<Vec<PgRow>> {
        let rows = if params.is_empty() {
            use sqlx::Executor;
            conn.fetch_all(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_postgres_param(query, param);
            }
            query.fetch_all(&mut *conn).await?
        };
        Ok(rows)
    }

    pub async fn execute(
        conn: &mut PgConnection,
        sql: &str,
        params: &[ParamValue],
    ) -> DbResult<ExecOutcome> {
        let result = if params.is_empty() {
            use sqlx::Executor;
            conn.execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_postgres_param(query, param);
            }
            query.execute(&mut *conn).await?
        };
        // PostgreSQL has no last insert id; callers use RETURNING
        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        })
    }
}

mod sqlite {
    use super::*;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[ParamValue],
    ) -> DbResult<Vec<SqliteRow>> {
        let rows = if params.is_empty() {
            use sqlx::Executor;
            conn.fetch_all(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            query.fetch_all(&mut *conn).await?
        };
        Ok(rows)
    }

    pub async fn execute(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[ParamValue],
    ) -> DbResult<ExecOutcome> {
        let result = if params.is_empty() {
            use sqlx::Executor;
            conn.execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            query.execute(&mut *conn).await?
        };
        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }
}
