//! Integration tests for database adapters
//!
//! Tests requiring a running PostgreSQL or SQL Server are marked with `#[ignore]` and
//! can be run with `cargo test -- --ignored`.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all non-ignored tests (no server required)
//! cargo test -p naturalquery-catalog --test integration_tests
//!
//! # Include the SQLite adapter
//! cargo test -p naturalquery-catalog --features sqlite --test integration_tests
//!
//! # Run PostgreSQL integration tests
//! NATURALQUERY_PG_URL="host=localhost dbname=shop user=app password=secret" \
//! cargo test -p naturalquery-catalog --features postgres --test integration_tests -- --ignored
//!
//! # Run SQL Server integration tests
//! NATURALQUERY_MSSQL_URL="server=tcp:localhost,1433;database=shop;user=sa;password=secret;TrustServerCertificate=true" \
//! cargo test -p naturalquery-catalog --features sqlserver --test integration_tests -- --ignored
//! ```

mod fixtures;

use fixtures::{orders_table, users_table};
use naturalquery_catalog::{
    Database, ExecuteError, FetchError, MockDatabase, QueryExecutor, QueryResult, SchemaProvider,
};
use std::sync::Arc;

// =============================================================================
// Mock Database Tests
// =============================================================================

#[tokio::test]
async fn test_mock_snapshot_preserves_table_order() {
    let db = MockDatabase::builder()
        .with_table(users_table())
        .with_table(orders_table())
        .build();

    let snapshot = db.snapshot().await.unwrap();

    assert_eq!(snapshot.table_names(), vec!["users", "orders"]);
    let orders = snapshot.find_table("orders").unwrap();
    assert_eq!(orders.foreign_keys().len(), 1);
    assert_eq!(orders.foreign_keys()[0].references_table, "users");
}

#[tokio::test]
async fn test_mock_snapshot_propagates_table_errors() {
    let db = MockDatabase::builder()
        .with_table(users_table())
        .with_error("users", FetchError::PermissionDenied("users".to_string()))
        .build();

    assert!(matches!(
        db.snapshot().await,
        Err(FetchError::PermissionDenied(_))
    ));
}

#[tokio::test]
async fn test_mock_as_trait_object() {
    let db: Arc<dyn Database> = Arc::new(
        MockDatabase::builder()
            .with_table(users_table())
            .with_result(QueryResult::scalar("count", 2))
            .with_name("PostgreSQL")
            .build(),
    );

    assert_eq!(db.dialect(), "PostgreSQL");
    assert_eq!(db.list_tables().await.unwrap(), vec!["users"]);
    let result = db.execute_as_table("SELECT COUNT(*) FROM users").await.unwrap();
    assert_eq!(result.to_string(), "count\n2");
}

#[tokio::test]
async fn test_mock_error_then_success_script() {
    let db = MockDatabase::builder()
        .with_execution_error(ExecuteError::Database(
            "column \"nme\" does not exist".to_string(),
        ))
        .with_result(QueryResult::scalar("name", "Ada"))
        .build();

    let first = db.execute_as_table("SELECT nme FROM users").await;
    assert!(matches!(&first, Err(e) if e.is_retryable()));

    let second = db.execute_as_table("SELECT name FROM users").await.unwrap();
    assert_eq!(second.first_value().and_then(|v| v.as_str()), Some("Ada"));

    assert_eq!(db.execution_count().await, 2);
}

#[tokio::test]
async fn test_concurrent_mock_access() {
    let db = MockDatabase::builder()
        .with_table(users_table())
        .with_table(orders_table())
        .build();

    let mut handles = Vec::new();
    for i in 0..10 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let name = if i % 2 == 0 { "users" } else { "orders" };
            db.get_table_schema(name).await.unwrap();
            db.execute_as_table(&format!("SELECT {}", i)).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(db.execution_count().await, 10);
}

// =============================================================================
// SQLite Tests
// =============================================================================

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::fixtures::SHOP_SQLITE;
    use naturalquery_catalog::{QueryExecutor, SchemaProvider, SqliteAdapter};
    use serde_json::json;

    async fn shop() -> SqliteAdapter {
        let db = SqliteAdapter::open_in_memory().unwrap();
        db.execute_batch(SHOP_SQLITE).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_sqlite_snapshot() {
        let db = shop().await;
        let snapshot = db.snapshot().await.unwrap();

        assert_eq!(snapshot.table_names(), vec!["orders", "users"]);
        let users = snapshot.find_table("users").unwrap();
        assert_eq!(users.primary_keys()[0].name, "id");
    }

    #[tokio::test]
    async fn test_sqlite_aggregate() {
        let db = shop().await;
        let result = db
            .execute_as_table("SELECT user_id, SUM(total) AS spent FROM orders GROUP BY user_id ORDER BY user_id")
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["user_id", "spent"]);
        assert_eq!(result.rows[0], vec![json!(1), json!(20.0)]);
        assert_eq!(result.rows[1], vec![json!(2), json!(30.0)]);
    }

    #[tokio::test]
    async fn test_sqlite_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");

        {
            let db = SqliteAdapter::open(&path).unwrap();
            db.execute_batch(SHOP_SQLITE).await.unwrap();
        }

        let reopened = SqliteAdapter::open(&path).unwrap();
        assert_eq!(reopened.list_tables().await.unwrap().len(), 2);
    }
}

// =============================================================================
// PostgreSQL Tests
// =============================================================================

/// Check if a PostgreSQL connection string is available
fn postgres_url() -> Option<String> {
    std::env::var("NATURALQUERY_PG_URL").ok()
}

#[tokio::test]
#[ignore] // Run with: cargo test --features postgres -- --ignored
async fn test_postgres_round_trip() {
    let Some(url) = postgres_url() else {
        eprintln!("Skipping PostgreSQL test: set NATURALQUERY_PG_URL");
        return;
    };

    #[cfg(feature = "postgres")]
    {
        use naturalquery_catalog::PostgresAdapter;

        let db = PostgresAdapter::from_connection_string(&url)
            .await
            .expect("Failed to connect to PostgreSQL");

        db.test_connection().await.expect("Connection test failed");

        for table in db.list_tables().await.expect("Failed to list tables") {
            let schema = db.get_table_schema(&table).await.expect("Failed to describe table");
            assert!(!schema.columns.is_empty());
        }

        let err = db.execute_as_table("SELEC 1").await.unwrap_err();
        assert!(err.is_retryable());

        let one = db.execute_as_table("SELECT 1 AS one").await.unwrap();
        assert_eq!(one.to_string(), "one\n1");
    }

    #[cfg(not(feature = "postgres"))]
    {
        let _ = url;
        eprintln!("PostgreSQL feature not enabled. Rebuild with --features postgres");
    }
}

// =============================================================================
// SQL Server Tests
// =============================================================================

/// Check if a SQL Server connection string is available
fn sqlserver_url() -> Option<String> {
    std::env::var("NATURALQUERY_MSSQL_URL").ok()
}

#[tokio::test]
#[ignore] // Run with: cargo test --features sqlserver -- --ignored
async fn test_sqlserver_round_trip() {
    let Some(url) = sqlserver_url() else {
        eprintln!("Skipping SQL Server test: set NATURALQUERY_MSSQL_URL");
        return;
    };

    #[cfg(feature = "sqlserver")]
    {
        use naturalquery_catalog::SqlServerAdapter;

        let db = SqlServerAdapter::from_connection_string(&url)
            .await
            .expect("Failed to connect to SQL Server");

        db.test_connection().await.expect("Connection test failed");
        assert_eq!(db.dialect(), "SQLServer");

        for table in db.list_tables().await.expect("Failed to list tables") {
            let schema = db.get_table_schema(&table).await.expect("Failed to describe table");
            assert!(!schema.columns.is_empty());
            assert!(schema.foreign_keys().iter().all(|fk| !fk.references_column.is_empty()));
        }

        let err = db.execute_as_table("SELEC 1").await.unwrap_err();
        assert!(err.is_retryable());

        let one = db.execute_as_table("SELECT 1 AS one").await.unwrap();
        assert_eq!(one.to_string(), "one\n1");
    }

    #[cfg(not(feature = "sqlserver"))]
    {
        let _ = url;
        eprintln!("SQL Server feature not enabled. Rebuild with --features sqlserver");
    }
}
