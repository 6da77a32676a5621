//! Database capabilities for schema extraction and query execution
//!
//! A database is consumed through two narrow capabilities:
//! [`SchemaProvider`] lists tables and describes each one, and
//! [`QueryExecutor`] runs a statement and returns a [`QueryResult`].
//! Each engine gets one adapter implementing both, chosen at construction.
//!
//! ## Features
//!
//! Enable engine support via Cargo features:
//! - `postgres` - PostgreSQL (and compatible) support
//! - `sqlite` - SQLite support
//! - `sqlserver` - Microsoft SQL Server support
//! - `all-databases` - All adapters
//!
//! ## Example
//!
//! ```rust,ignore
//! use naturalquery_catalog::{PostgresAdapter, SchemaProvider, QueryExecutor};
//!
//! let db = PostgresAdapter::from_connection_string("host=localhost dbname=shop user=app").await?;
//! for name in db.list_tables().await? {
//!     let table = db.get_table_schema(&name).await?;
//! }
//! let result = db.execute_as_table("SELECT COUNT(*) FROM users").await?;
//! ```

pub mod adapter;
pub mod result;
pub mod mock;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "sqlserver")]
pub mod sqlserver;

pub use adapter::{Database, ExecuteError, FetchError, QueryExecutor, SchemaProvider};
pub use result::QueryResult;
pub use mock::{MockDatabase, MockDatabaseBuilder};
#[cfg(feature = "postgres")]
pub use postgres::PostgresAdapter;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAdapter;
#[cfg(feature = "sqlserver")]
pub use sqlserver::SqlServerAdapter;
