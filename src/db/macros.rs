//! Backend dispatch macros for reducing code duplication.
//!
//! The driver keeps one sqlx connection per backend type. These macros
//! generate the match over [`DbConnection`](crate::db::driver::DbConnection)
//! variants so each operation reads as one line per backend.

/// Macro for generating backend dispatch match arms.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(&mut *conn, {
///     MySql(c) => mysql::fetch_rows(c, sql, params).await,
///     Postgres(c) => postgres::fetch_rows(c, sql, params).await,
///     SQLite(c) => sqlite::fetch_rows(c, sql, params).await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($conn:expr, { $($variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $crate::db::driver::DbConnection::$variant($c) => $body,
            )+
        }
    };
}

/// Run a raw statement on whichever backend connection is held.
#[macro_export]
macro_rules! impl_db_raw_execute {
    ($conn:expr, $sql:expr) => {{
        use sqlx::Executor as _;
        $crate::impl_db_dispatch!($conn, {
            MySql(c) => c.execute($sql).await.map(|r| r.rows_affected()),
            Postgres(c) => c.execute($sql).await.map(|r| r.rows_affected()),
            SQLite(c) => c.execute($sql).await.map(|r| r.rows_affected()),
        })
    }};
}

pub use impl_db_dispatch;
pub use impl_db_raw_execute;
