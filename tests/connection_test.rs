//! Integration tests for Connection against in-memory SQLite.

use conn_locator::db::Connection;
use conn_locator::error::DbError;
use conn_locator::models::{BindValue, BoundValues, Placeholder};
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::json;

const NAMES: [&str; 10] = [
    "Anna", "Betty", "Clara", "Donna", "Fiona", "Gertrude", "Hanna", "Ione", "Julia", "Kara",
];

/// Helper to set up a connection with the `pdotest` table filled
async fn setup_connection() -> Connection {
    let conn = Connection::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    conn.exec(
        "CREATE TABLE pdotest (
            id   INTEGER PRIMARY KEY AUTOINCREMENT,
            name VARCHAR(10) NOT NULL
        )",
    )
    .await
    .expect("Failed to create test table");

    for name in NAMES {
        conn.perform(
            "INSERT INTO pdotest (name) VALUES (:name)",
            &BoundValues::new().bind_named("name", name),
        )
        .await
        .expect("Failed to insert test row");
    }

    conn
}

fn none() -> BoundValues {
    BoundValues::new()
}

#[derive(Debug, Deserialize, PartialEq)]
struct Person {
    id: i64,
    name: String,
}

#[tokio::test]
async fn test_factory_opens_connection() {
    let factory = Connection::factory("sqlite::memory:").unwrap();
    let conn = factory.create().await.unwrap();
    assert_eq!(conn.driver_name(), "sqlite");
}

#[tokio::test]
async fn test_driver_name() {
    let conn = setup_connection().await;
    assert_eq!(conn.driver_name(), "sqlite");
}

#[tokio::test]
async fn test_perform_with_positional_value() {
    let conn = setup_connection().await;
    let result = conn
        .perform("SELECT * FROM pdotest WHERE id = ?", &BoundValues::from([1]))
        .await
        .unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.rows[0], vec![json!(1), json!("Anna")]);
}

#[tokio::test]
async fn test_fetch_affected() {
    let conn = setup_connection().await;
    let affected = conn
        .fetch_affected("DELETE FROM pdotest", &none())
        .await
        .unwrap();
    assert_eq!(affected, 10);
}

#[tokio::test]
async fn test_exec_records_last_insert_id() {
    let conn = setup_connection().await;
    let affected = conn
        .exec("INSERT INTO pdotest (name) VALUES ('Lena')")
        .await
        .unwrap();
    assert_eq!(affected, 1);
    assert_eq!(conn.last_insert_id(), Some(11));
}

#[tokio::test]
async fn test_fetch_all() {
    let conn = setup_connection().await;
    let rows = conn.fetch_all("SELECT * FROM pdotest", &none()).await.unwrap();
    assert_eq!(rows.len(), 10);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row["id"], json!(i + 1));
        assert_eq!(row["name"], json!(NAMES[i]));
    }
}

#[tokio::test]
async fn test_fetch_unique_keys_by_first_column() {
    let conn = setup_connection().await;
    let result = conn
        .fetch_unique("SELECT * FROM pdotest ORDER BY id", &none())
        .await
        .unwrap();
    assert_eq!(result.len(), 10);

    // 1-based ids, not 0-based sequential values
    let keys: Vec<&str> = result.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"]
    );
    assert_eq!(result["2"]["name"], json!("Betty"));
    assert!(!result["2"].contains_key("id"));
}

#[tokio::test]
async fn test_fetch_column() {
    let conn = setup_connection().await;
    let result = conn
        .fetch_column("SELECT id, name FROM pdotest ORDER BY id", &none(), 0)
        .await
        .unwrap();
    let expected: Vec<_> = (1..=10).map(|id| json!(id)).collect();
    assert_eq!(result, expected);

    let names = conn
        .fetch_column("SELECT id, name FROM pdotest ORDER BY id", &none(), 1)
        .await
        .unwrap();
    assert_eq!(names[9], json!("Kara"));
}

#[tokio::test]
async fn test_fetch_column_out_of_range() {
    let conn = setup_connection().await;
    let err = conn
        .fetch_column("SELECT id FROM pdotest", &none(), 3)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_fetch_object() {
    let conn = setup_connection().await;
    let person: Option<Person> = conn
        .fetch_object(
            "SELECT id, name FROM pdotest WHERE id = :id",
            &BoundValues::new().bind_named("id", 1),
        )
        .await
        .unwrap();
    assert_eq!(
        person,
        Some(Person {
            id: 1,
            name: "Anna".to_string()
        })
    );
}

#[tokio::test]
async fn test_fetch_objects() {
    let conn = setup_connection().await;
    let people: Vec<Person> = conn
        .fetch_objects("SELECT * FROM pdotest", &none())
        .await
        .unwrap();
    assert_eq!(people.len(), 10);
    assert_eq!(people[4].name, "Fiona");
    assert_eq!(people[4].id, 5);
}

#[tokio::test]
async fn test_fetch_object_type_mismatch() {
    let conn = setup_connection().await;
    let result = conn
        .fetch_object::<Person>("SELECT name AS id, name FROM pdotest WHERE id = 1", &none())
        .await;
    assert!(matches!(result, Err(DbError::InvalidInput { .. })));
}

#[tokio::test]
async fn test_fetch_one() {
    let conn = setup_connection().await;
    let row = conn
        .fetch_one("SELECT id, name FROM pdotest WHERE id = 1", &none())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row["id"], json!(1));
    assert_eq!(row["name"], json!("Anna"));

    let missing = conn
        .fetch_one("SELECT id, name FROM pdotest WHERE id = -99", &none())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_fetch_group() {
    let conn = setup_connection().await;
    conn.exec("INSERT INTO pdotest (name) VALUES ('Anna')")
        .await
        .unwrap();

    let groups = conn
        .fetch_group("SELECT name, id FROM pdotest ORDER BY id", &none())
        .await
        .unwrap();
    assert_eq!(groups.len(), 10);
    let annas: Vec<_> = groups["Anna"].iter().map(|row| row["id"].clone()).collect();
    assert_eq!(annas, vec![json!(1), json!(11)]);
}

#[tokio::test]
async fn test_fetch_key_pair() {
    let conn = setup_connection().await;
    let pairs = conn
        .fetch_key_pair("SELECT id, name FROM pdotest ORDER BY id", &none())
        .await
        .unwrap();
    assert_eq!(pairs.len(), 10);
    for (i, name) in NAMES.iter().enumerate() {
        assert_eq!(pairs[&(i + 1).to_string()], json!(name));
    }
}

#[tokio::test]
async fn test_fetch_key_pair_requires_two_columns() {
    let conn = setup_connection().await;
    let err = conn
        .fetch_key_pair("SELECT id FROM pdotest", &none())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_fetch_value() {
    let conn = setup_connection().await;
    let value = conn
        .fetch_value("SELECT id FROM pdotest WHERE id = 1", &none())
        .await
        .unwrap();
    assert_eq!(value, Some(json!(1)));

    let count = conn
        .fetch_value("SELECT COUNT(*) FROM pdotest", &none())
        .await
        .unwrap();
    assert_eq!(count, Some(json!(10)));
}

#[tokio::test]
async fn test_stream_all() {
    let conn = setup_connection().await;
    let values = none();
    let rows: Vec<_> = conn
        .stream_all("SELECT * FROM pdotest ORDER BY id", &values)
        .try_collect()
        .await
        .unwrap();
    let names: Vec<_> = rows.iter().map(|row| row["name"].clone()).collect();
    let expected: Vec<_> = NAMES.iter().map(|n| json!(n)).collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn test_stream_all_surfaces_errors() {
    let conn = setup_connection().await;
    let values = none();
    let result: Result<Vec<_>, _> = conn
        .stream_all("SELECT * FROM no_such_table", &values)
        .try_collect()
        .await;
    assert!(matches!(result, Err(DbError::Driver(_))));
}

#[tokio::test]
async fn test_stream_column() {
    let conn = setup_connection().await;
    let values = none();
    let names: Vec<_> = conn
        .stream_column("SELECT id, name FROM pdotest ORDER BY id LIMIT 3", &values, 1)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(names, vec![json!("Anna"), json!("Betty"), json!("Clara")]);

    let result: Result<Vec<_>, _> = conn
        .stream_column("SELECT id FROM pdotest", &values, 3)
        .try_collect()
        .await;
    assert!(matches!(result, Err(DbError::InvalidInput { .. })));
}

#[tokio::test]
async fn test_stream_key_pair() {
    let conn = setup_connection().await;
    let values = none();
    let pairs: Vec<_> = conn
        .stream_key_pair("SELECT id, name FROM pdotest ORDER BY id LIMIT 2", &values)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(
        pairs,
        vec![
            ("1".to_string(), json!("Anna")),
            ("2".to_string(), json!("Betty"))
        ]
    );

    let result: Result<Vec<_>, _> = conn
        .stream_key_pair("SELECT id FROM pdotest", &values)
        .try_collect()
        .await;
    assert!(matches!(result, Err(DbError::InvalidInput { .. })));
}

#[tokio::test]
async fn test_stream_unique() {
    let conn = setup_connection().await;
    let values = none();
    let rows: Vec<_> = conn
        .stream_unique("SELECT name, id FROM pdotest ORDER BY id LIMIT 2", &values)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].0, "Betty");
    assert_eq!(rows[1].1["id"], json!(2));
    assert!(!rows[1].1.contains_key("name"));
}

#[tokio::test]
async fn test_named_value_after_backslash_literal() {
    let conn = setup_connection().await;
    let rows = conn
        .fetch_all(
            "SELECT 'C:\\' AS p, :a AS v",
            &BoundValues::new().bind_named("a", 42),
        )
        .await
        .unwrap();
    assert_eq!(rows[0]["p"], json!("C:\\"));
    assert_eq!(rows[0]["v"], json!(42));
}

#[tokio::test]
async fn test_position_gap_fails_before_running() {
    let conn = setup_connection().await;
    let mut values = BoundValues::new();
    values.insert(Placeholder::Position(1), BindValue::from("first"));
    values.insert(Placeholder::Position(3), BindValue::from("third"));
    let err = conn
        .fetch_all("SELECT ? AS a, ? AS b, ? AS c", &values)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_query() {
    let conn = setup_connection().await;
    let result = conn
        .query("SELECT id, name FROM pdotest WHERE id = 1")
        .await
        .unwrap();
    assert_eq!(result.column_names().collect::<Vec<_>>(), vec!["id", "name"]);
    assert_eq!(result.row_count(), 1);
}

#[tokio::test]
async fn test_repeated_named_placeholder() {
    let conn = setup_connection().await;
    let rows = conn
        .fetch_all(
            "SELECT id FROM pdotest WHERE id = :id OR id = :id + 1 ORDER BY id",
            &BoundValues::new().bind_named("id", 3),
        )
        .await
        .unwrap();
    let ids: Vec<_> = rows.iter().map(|row| row["id"].clone()).collect();
    assert_eq!(ids, vec![json!(3), json!(4)]);
}

#[tokio::test]
async fn test_unbound_named_placeholder_is_rejected() {
    let conn = setup_connection().await;
    let err = conn
        .perform(
            "SELECT * FROM pdotest WHERE id = :id AND name = :name",
            &BoundValues::new().bind_named("id", 1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_prepared_statement_is_reexecutable() {
    let conn = setup_connection().await;
    let mut stmt = conn.prepare("SELECT name FROM pdotest WHERE id = :id");

    stmt.bind_named("id", 2);
    let first = stmt.execute().await.unwrap();
    assert_eq!(first.rows[0][0], json!("Betty"));

    // Re-running without rebinding gives the same result
    let again = stmt.execute().await.unwrap();
    assert_eq!(again, first);

    stmt.bind_value(Placeholder::Name("id".to_string()), BindValue::from(3i64));
    let third = stmt.execute().await.unwrap();
    assert_eq!(third.rows[0][0], json!("Clara"));
}

#[tokio::test]
async fn test_prepared_statement_execute_affected() {
    let conn = setup_connection().await;
    let mut stmt = conn.prepare("UPDATE pdotest SET name = ? WHERE id <= ?");
    stmt.bind("Zed").bind(3);
    assert_eq!(stmt.execute_affected().await.unwrap(), 3);

    let value = conn
        .fetch_value("SELECT name FROM pdotest WHERE id = 2", &none())
        .await
        .unwrap();
    assert_eq!(value, Some(json!("Zed")));
}

#[tokio::test]
async fn test_transaction_commit() {
    let conn = setup_connection().await;
    conn.begin_transaction().await.unwrap();
    assert!(conn.in_transaction());
    conn.exec("DELETE FROM pdotest WHERE id = 1").await.unwrap();
    conn.commit().await.unwrap();
    assert!(!conn.in_transaction());

    let count = conn
        .fetch_value("SELECT COUNT(*) FROM pdotest", &none())
        .await
        .unwrap();
    assert_eq!(count, Some(json!(9)));
}

#[tokio::test]
async fn test_transaction_rollback() {
    let conn = setup_connection().await;
    conn.begin_transaction().await.unwrap();
    conn.exec("DELETE FROM pdotest").await.unwrap();
    conn.rollback().await.unwrap();
    assert!(!conn.in_transaction());

    let count = conn
        .fetch_value("SELECT COUNT(*) FROM pdotest", &none())
        .await
        .unwrap();
    assert_eq!(count, Some(json!(10)));
}

#[tokio::test]
async fn test_driver_error_is_passed_through() {
    let conn = setup_connection().await;
    let err = conn.query("SELECT * FROM no_such_table").await.unwrap_err();
    let driver_err = err.as_driver().expect("expected a driver error");
    assert!(matches!(driver_err, sqlx::Error::Database(_)));
}

#[tokio::test]
async fn test_file_backed_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.db");
    let url = format!("sqlite://{}?mode=rwc", path.display());

    let conn = Connection::connect(&url).await.unwrap();
    conn.exec("CREATE TABLE people (name TEXT)").await.unwrap();
    conn.exec("INSERT INTO people VALUES ('Anna')").await.unwrap();
    drop(conn);

    let reopened = Connection::connect(&url).await.unwrap();
    let value = reopened
        .fetch_value("SELECT name FROM people", &none())
        .await
        .unwrap();
    assert_eq!(value, Some(json!("Anna")));
}
