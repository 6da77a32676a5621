//! Database capability traits

use crate::result::QueryResult;
use naturalquery_core::{SchemaSnapshot, Table};
use std::time::Duration;

/// Errors that can occur when fetching schemas
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors that can occur when executing a statement
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecuteError {
    /// The database rejected the statement (syntax, unknown column, type
    /// mismatch). The message is fit to show a model for correction.
    #[error("{0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl ExecuteError {
    /// Only statement-level rejections are worth a correction attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Lists tables and describes their structure
#[async_trait::async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Get the adapter name (e.g., "PostgreSQL", "SQLite")
    fn name(&self) -> &'static str;

    /// Names of the user tables, in a stable order
    async fn list_tables(&self) -> Result<Vec<String>, FetchError>;

    /// Columns, defaults, nullability and keys of one table
    async fn get_table_schema(&self, table: &str) -> Result<Table, FetchError>;

    /// Test the connection to the database
    ///
    /// This is useful for validating credentials before asking questions.
    async fn test_connection(&self) -> Result<(), FetchError>;

    /// Describe every table
    async fn snapshot(&self) -> Result<SchemaSnapshot, FetchError> {
        let mut tables = Vec::new();
        for name in self.list_tables().await? {
            tables.push(self.get_table_schema(&name).await?);
        }
        Ok(SchemaSnapshot::from_tables(tables))
    }
}

/// Runs SQL and returns rows
#[async_trait::async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Dialect name shown to the model (e.g., "PostgreSQL")
    fn dialect(&self) -> &str;

    /// Execute one statement and collect its rows
    async fn execute_as_table(&self, sql: &str) -> Result<QueryResult, ExecuteError>;
}

/// An engine adapter providing both capabilities
pub trait Database: SchemaProvider + QueryExecutor {}

impl<T: SchemaProvider + QueryExecutor + ?Sized> Database for T {}
