//! PostgreSQL adapter using information_schema
//!
//! Tables, columns and key constraints come from the `information_schema`
//! views of one schema (`public` by default). Statements produced by the model
//! are run with the simple-query protocol so every cell comes back as text and
//! no type mapping is needed. It works with:
//! - PostgreSQL 9.4+
//! - Amazon Redshift
//! - Other PostgreSQL-compatible databases
//!
//! ## Usage
//!
//! ```rust,ignore
//! let db = PostgresAdapter::from_connection_string(
//!     "host=localhost port=5432 dbname=shop user=app password=secret"
//! ).await?;
//!
//! // Using connection string with SSL
//! let db = PostgresAdapter::from_connection_string_with_tls(
//!     "host=db.example.com port=5432 dbname=shop user=app password=secret"
//! ).await?
//! .with_schema("sales");
//! ```
//!
//! Reference: https://www.postgresql.org/docs/current/information-schema.html

use crate::adapter::{ExecuteError, FetchError, QueryExecutor, SchemaProvider};
use crate::result::QueryResult;
use naturalquery_core::{Column, ForeignKey, Nullability, Table};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use serde_json::Value;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, Config as PgConfig, NoTls, SimpleQueryMessage};
use tracing::{debug, error};

const DEFAULT_SCHEMA: &str = "public";

const TABLES_QUERY: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = $1
    ORDER BY table_name
"#;

const COLUMNS_QUERY: &str = r#"
    SELECT
        column_name::text,
        data_type::text,
        character_maximum_length::int4,
        column_default::text,
        is_nullable::text
    FROM information_schema.columns
    WHERE table_schema = $1
      AND table_name = $2
    ORDER BY ordinal_position
"#;

const PRIMARY_KEY_QUERY: &str = r#"
    SELECT kcu.column_name::text
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON tc.constraint_name = kcu.constraint_name
     AND tc.table_schema = kcu.table_schema
    WHERE tc.table_schema = $1
      AND tc.table_name = $2
      AND tc.constraint_type = 'PRIMARY KEY'
    ORDER BY kcu.ordinal_position
"#;

const FOREIGN_KEY_QUERY: &str = r#"
    SELECT
        kcu.column_name::text,
        ccu.table_name::text AS foreign_table_name,
        ccu.column_name::text AS foreign_column_name
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON tc.constraint_name = kcu.constraint_name
     AND tc.table_schema = kcu.table_schema
    JOIN information_schema.constraint_column_usage ccu
      ON ccu.constraint_name = tc.constraint_name
     AND ccu.table_schema = tc.table_schema
    WHERE tc.table_schema = $1
      AND tc.table_name = $2
      AND tc.constraint_type = 'FOREIGN KEY'
"#;

/// PostgreSQL adapter
///
/// Holds one client connection; the connection driver runs on a spawned
/// task for the lifetime of the client.
pub struct PostgresAdapter {
    client: Client,

    /// Database name, for logging
    database: String,

    /// Schema whose tables are described
    schema: String,
}

impl PostgresAdapter {
    /// Create adapter from a PostgreSQL connection string
    ///
    /// Supports both `host=... dbname=...` and `postgres://` URL formats.
    pub async fn from_connection_string(conn_str: &str) -> Result<Self, FetchError> {
        let database = Self::parse_database(conn_str)?;

        let (client, connection) = tokio_postgres::connect(conn_str, NoTls)
            .await
            .map_err(|e| FetchError::AuthenticationError(format!("Failed to connect: {}", e)))?;

        let db = database.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(database = %db, error = %e, "PostgreSQL connection error");
            }
        });

        Ok(Self {
            client,
            database,
            schema: DEFAULT_SCHEMA.to_string(),
        })
    }

    /// Create adapter from a PostgreSQL connection string with TLS
    ///
    /// The `sslmode` setting is ignored, TLS is always used.
    pub async fn from_connection_string_with_tls(conn_str: &str) -> Result<Self, FetchError> {
        let database = Self::parse_database(conn_str)?;

        let connector = TlsConnector::builder().build().map_err(|e| {
            FetchError::ConfigError(format!("Failed to create TLS connector: {}", e))
        })?;
        let tls = MakeTlsConnector::new(connector);

        let (client, connection) = tokio_postgres::connect(conn_str, tls)
            .await
            .map_err(|e| {
                FetchError::AuthenticationError(format!("Failed to connect with TLS: {}", e))
            })?;

        let db = database.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(database = %db, error = %e, "PostgreSQL TLS connection error");
            }
        });

        Ok(Self {
            client,
            database,
            schema: DEFAULT_SCHEMA.to_string(),
        })
    }

    /// Describe tables of another schema than `public`
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Get the database name
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Get the described schema
    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn parse_database(conn_str: &str) -> Result<String, FetchError> {
        let config: PgConfig = conn_str
            .parse()
            .map_err(|e| FetchError::ConfigError(format!("Invalid connection string: {}", e)))?;
        Ok(config.get_dbname().unwrap_or("postgres").to_string())
    }

    fn fetch_error(&self, context: &str, e: tokio_postgres::Error) -> FetchError {
        match e.as_db_error() {
            Some(db) if *db.code() == SqlState::INSUFFICIENT_PRIVILEGE => {
                FetchError::PermissionDenied(format!("{}: {}", context, db.message()))
            }
            Some(db) => FetchError::QueryError(format!("{}: {}", context, db.message())),
            None => FetchError::NetworkError(format!("{}: {}", context, e)),
        }
    }
}

/// Classify a driver error for the correction loop
fn execute_error(e: tokio_postgres::Error) -> ExecuteError {
    match e.as_db_error() {
        Some(db) if *db.code() == SqlState::INSUFFICIENT_PRIVILEGE => {
            ExecuteError::PermissionDenied(db.message().to_string())
        }
        Some(db) => {
            let mut message = db.message().to_string();
            if let Some(hint) = db.hint() {
                message.push_str("\nHINT: ");
                message.push_str(hint);
            }
            ExecuteError::Database(message)
        }
        None => ExecuteError::Connection(e.to_string()),
    }
}

#[async_trait::async_trait]
impl SchemaProvider for PostgresAdapter {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    async fn list_tables(&self) -> Result<Vec<String>, FetchError> {
        let rows = self
            .client
            .query(TABLES_QUERY, &[&self.schema])
            .await
            .map_err(|e| self.fetch_error("Failed to list tables", e))?;

        let tables: Vec<String> = rows.iter().map(|row| row.get(0)).collect();
        debug!(database = %self.database, schema = %self.schema, count = tables.len(), "listed tables");
        Ok(tables)
    }

    async fn get_table_schema(&self, table: &str) -> Result<Table, FetchError> {
        let column_rows = self
            .client
            .query(COLUMNS_QUERY, &[&self.schema, &table])
            .await
            .map_err(|e| self.fetch_error(table, e))?;

        if column_rows.is_empty() {
            return Err(FetchError::TableNotFound(format!("{}.{}", self.schema, table)));
        }

        let columns = column_rows
            .iter()
            .map(|row| {
                let name: String = row.get(0);
                let data_type: String = row.get(1);
                let max_length: Option<i32> = row.get(2);
                let default_value: Option<String> = row.get(3);
                let is_nullable: String = row.get(4);

                let mut column = Column::new(name, data_type)
                    .with_nullability(Nullability::from_information_schema(&is_nullable));
                if let Some(len) = max_length.and_then(|n| u32::try_from(n).ok()) {
                    column = column.with_max_length(len);
                }
                if let Some(default) = default_value {
                    column = column.with_default(default);
                }
                column
            })
            .collect();

        let primary_keys = self
            .client
            .query(PRIMARY_KEY_QUERY, &[&self.schema, &table])
            .await
            .map_err(|e| self.fetch_error(table, e))?
            .iter()
            .map(|row| row.get::<_, String>(0))
            .collect();

        let foreign_keys = self
            .client
            .query(FOREIGN_KEY_QUERY, &[&self.schema, &table])
            .await
            .map_err(|e| self.fetch_error(table, e))?
            .iter()
            .map(|row| {
                ForeignKey::new(
                    row.get::<_, String>(0),
                    row.get::<_, String>(1),
                    row.get::<_, String>(2),
                )
            })
            .collect();

        Ok(Table::from_parts(
            table,
            columns,
            Some(primary_keys),
            Some(foreign_keys),
        ))
    }

    async fn test_connection(&self) -> Result<(), FetchError> {
        self.client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| self.fetch_error("Connection test failed", e))
    }
}

#[async_trait::async_trait]
impl QueryExecutor for PostgresAdapter {
    fn dialect(&self) -> &str {
        "PostgreSQL"
    }

    async fn execute_as_table(&self, sql: &str) -> Result<QueryResult, ExecuteError> {
        let messages = self.client.simple_query(sql).await.map_err(execute_error)?;

        let mut result = QueryResult::default();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                if result.columns.is_empty() {
                    result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                }
                let cells = (0..row.len())
                    .map(|i| match row.get(i) {
                        Some(text) => Value::String(text.to_string()),
                        None => Value::Null,
                    })
                    .collect();
                result.rows.push(cells);
            }
        }

        debug!(database = %self.database, rows = result.row_count(), "statement executed");
        Ok(result)
    }
}
