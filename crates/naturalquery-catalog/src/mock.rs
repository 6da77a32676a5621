//! Mock database for testing
//!
//! This adapter serves predefined tables and scripted query results without
//! connecting to any engine. It's useful for:
//! - Unit testing the question-answering pipeline
//! - Simulating rejected statements to exercise the correction path
//! - Simulating connection failures and latency
//!
//! ## Usage
//!
//! ```rust,ignore
//! use naturalquery_catalog::{MockDatabase, QueryResult, ExecuteError};
//!
//! let db = MockDatabase::builder()
//!     .with_table(Table::new("users", vec![Column::new("id", "integer").primary()]))
//!     .with_execution_error(ExecuteError::Database("column \"nme\" does not exist".into()))
//!     .with_result(QueryResult::scalar("count", 42))
//!     .build();
//!
//! // first statement fails, second returns 42
//! ```

use crate::adapter::{ExecuteError, FetchError, QueryExecutor, SchemaProvider};
use crate::result::QueryResult;
use naturalquery_core::Table;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

type Outcome = Result<QueryResult, ExecuteError>;

/// Mock database for testing
///
/// Tables are kept in insertion order. Execution outcomes are consumed from a
/// script in order; once the script is empty every statement returns the
/// fallback result. Every executed statement is recorded.
pub struct MockDatabase {
    /// Predefined tables, in listing order
    tables: Arc<RwLock<Vec<Table>>>,

    /// Errors to return for specific tables
    errors: Arc<RwLock<HashMap<String, FetchError>>>,

    /// Outcomes handed out by successive executions
    script: Arc<RwLock<VecDeque<Outcome>>>,

    /// Result once the script is exhausted
    fallback: Arc<RwLock<QueryResult>>,

    /// Statements received so far
    executed: Arc<RwLock<Vec<String>>>,

    /// Simulate connection failure
    fail_connection: bool,

    /// Simulate query latency (milliseconds)
    latency_ms: u64,

    /// Name to return from name() and dialect()
    adapter_name: &'static str,
}

impl MockDatabase {
    /// Create a mock with no tables and an empty fallback result
    pub fn new() -> Self {
        MockDatabaseBuilder::new().build()
    }

    /// Start a builder
    pub fn builder() -> MockDatabaseBuilder {
        MockDatabaseBuilder::new()
    }

    /// Add a table, replacing any table with the same name
    pub async fn add_table(&self, table: Table) {
        let mut tables = self.tables.write().await;
        match tables.iter_mut().find(|t| t.name == table.name) {
            Some(existing) => *existing = table,
            None => tables.push(table),
        }
    }

    /// Configure an error to be returned for a specific table
    pub async fn add_error_for_table(&self, table: &str, error: FetchError) {
        self.errors.write().await.insert(table.to_string(), error);
    }

    /// Queue the outcome of the next unscripted execution
    pub async fn push_outcome(&self, outcome: Result<QueryResult, ExecuteError>) {
        self.script.write().await.push_back(outcome);
    }

    /// Replace the result returned once the script is exhausted
    pub async fn set_fallback(&self, result: QueryResult) {
        *self.fallback.write().await = result;
    }

    /// Statements executed so far, in order
    pub async fn executed(&self) -> Vec<String> {
        self.executed.read().await.clone()
    }

    /// Number of statements executed so far
    pub async fn execution_count(&self) -> usize {
        self.executed.read().await.len()
    }

    /// Get the number of tables stored in the mock
    pub async fn table_count(&self) -> usize {
        self.tables.read().await.len()
    }

    /// Configure to fail all connection tests
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure simulated latency for all operations
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set a custom adapter name
    ///
    /// This is useful when mocking a specific engine's dialect.
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.adapter_name = name;
        self
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockDatabase {
    fn clone(&self) -> Self {
        Self {
            tables: Arc::clone(&self.tables),
            errors: Arc::clone(&self.errors),
            script: Arc::clone(&self.script),
            fallback: Arc::clone(&self.fallback),
            executed: Arc::clone(&self.executed),
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
            adapter_name: self.adapter_name,
        }
    }
}

#[async_trait::async_trait]
impl SchemaProvider for MockDatabase {
    fn name(&self) -> &'static str {
        self.adapter_name
    }

    async fn list_tables(&self) -> Result<Vec<String>, FetchError> {
        self.simulate_latency().await;

        if self.fail_connection {
            return Err(FetchError::NetworkError(
                "Simulated connection failure".to_string(),
            ));
        }

        Ok(self.tables.read().await.iter().map(|t| t.name.clone()).collect())
    }

    async fn get_table_schema(&self, table: &str) -> Result<Table, FetchError> {
        self.simulate_latency().await;

        // Check for configured errors first
        if let Some(error) = self.errors.read().await.get(table) {
            return Err(error.clone());
        }

        self.tables
            .read()
            .await
            .iter()
            .find(|t| t.name == table)
            .cloned()
            .ok_or_else(|| FetchError::TableNotFound(table.to_string()))
    }

    async fn test_connection(&self) -> Result<(), FetchError> {
        self.simulate_latency().await;

        if self.fail_connection {
            Err(FetchError::NetworkError(
                "Simulated connection failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl QueryExecutor for MockDatabase {
    fn dialect(&self) -> &str {
        self.adapter_name
    }

    async fn execute_as_table(&self, sql: &str) -> Result<QueryResult, ExecuteError> {
        self.simulate_latency().await;
        self.executed.write().await.push(sql.to_string());

        if self.fail_connection {
            return Err(ExecuteError::Connection(
                "Simulated connection failure".to_string(),
            ));
        }

        let next = self.script.write().await.pop_front();
        match next {
            Some(outcome) => outcome,
            None => Ok(self.fallback.read().await.clone()),
        }
    }
}

/// Builder for creating MockDatabase with tables and scripted outcomes
///
/// # Example
///
/// ```rust,ignore
/// let db = MockDatabaseBuilder::new()
///     .with_table(users)
///     .with_table(orders)
///     .with_result(QueryResult::scalar("count", 42))
///     .with_name("PostgreSQL")
///     .build();
/// ```
pub struct MockDatabaseBuilder {
    tables: Vec<Table>,
    errors: HashMap<String, FetchError>,
    script: VecDeque<Outcome>,
    fallback: QueryResult,
    fail_connection: bool,
    latency_ms: u64,
    adapter_name: &'static str,
}

impl MockDatabaseBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            errors: HashMap::new(),
            script: VecDeque::new(),
            fallback: QueryResult::default(),
            fail_connection: false,
            latency_ms: 0,
            adapter_name: "Mock",
        }
    }

    /// Add a table
    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Add an error for a specific table
    pub fn with_error(mut self, table: &str, error: FetchError) -> Self {
        self.errors.insert(table.to_string(), error);
        self
    }

    /// Script a successful execution
    pub fn with_result(mut self, result: QueryResult) -> Self {
        self.script.push_back(Ok(result));
        self
    }

    /// Script a failed execution
    pub fn with_execution_error(mut self, error: ExecuteError) -> Self {
        self.script.push_back(Err(error));
        self
    }

    /// Result returned once the script is exhausted
    pub fn with_fallback(mut self, result: QueryResult) -> Self {
        self.fallback = result;
        self
    }

    /// Configure connection failure
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure latency
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set adapter name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.adapter_name = name;
        self
    }

    /// Build the MockDatabase
    pub fn build(self) -> MockDatabase {
        MockDatabase {
            tables: Arc::new(RwLock::new(self.tables)),
            errors: Arc::new(RwLock::new(self.errors)),
            script: Arc::new(RwLock::new(self.script)),
            fallback: Arc::new(RwLock::new(self.fallback)),
            executed: Arc::new(RwLock::new(Vec::new())),
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
            adapter_name: self.adapter_name,
        }
    }
}

impl Default for MockDatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
