//! SQL Server adapter using INFORMATION_SCHEMA and the sys catalog views
//!
//! Columns and primary keys come from `INFORMATION_SCHEMA`, relations from
//! `sys.foreign_keys` joined to their columns. One TDS connection is shared
//! behind an async mutex since the client needs exclusive access per query.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let db = SqlServerAdapter::from_connection_string(
//!     "server=tcp:localhost,1433;database=shop;user=sa;password=secret;TrustServerCertificate=true"
//! ).await?
//! .with_schema("sales");
//! ```
//!
//! Encryption follows the `encrypt` setting of the ADO connection string.

use crate::adapter::{ExecuteError, FetchError, QueryExecutor, SchemaProvider};
use crate::result::QueryResult;
use naturalquery_core::{Column, ForeignKey, Nullability, Table};
use serde_json::Value;
use tiberius::error::Error as TdsError;
use tiberius::{Client, ColumnData, Config as TdsConfig, FromSql, Query, Row};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

const DEFAULT_SCHEMA: &str = "dbo";

const TABLES_QUERY: &str = r#"
    SELECT CAST(TABLE_NAME AS NVARCHAR(128))
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_TYPE = 'BASE TABLE'
      AND TABLE_SCHEMA = @P1
    ORDER BY TABLE_NAME
"#;

const COLUMNS_QUERY: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS NVARCHAR(128)),
        CAST(DATA_TYPE AS NVARCHAR(128)),
        CAST(CHARACTER_MAXIMUM_LENGTH AS INT),
        CAST(COLUMN_DEFAULT AS NVARCHAR(4000)),
        CAST(IS_NULLABLE AS NVARCHAR(3))
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = @P1
      AND TABLE_NAME = @P2
    ORDER BY ORDINAL_POSITION
"#;

const PRIMARY_KEY_QUERY: &str = r#"
    SELECT CAST(COLUMN_NAME AS NVARCHAR(128))
    FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
    WHERE OBJECTPROPERTY(
            OBJECT_ID(QUOTENAME(CONSTRAINT_SCHEMA) + '.' + QUOTENAME(CONSTRAINT_NAME)),
            'IsPrimaryKey') = 1
      AND TABLE_SCHEMA = @P1
      AND TABLE_NAME = @P2
    ORDER BY ORDINAL_POSITION
"#;

const FOREIGN_KEY_QUERY: &str = r#"
    SELECT
        CAST(cp.name AS NVARCHAR(128)) AS parent_column,
        CAST(tr.name AS NVARCHAR(128)) AS referenced_table,
        CAST(cr.name AS NVARCHAR(128)) AS referenced_column
    FROM sys.foreign_keys AS fk
    INNER JOIN sys.tables AS tp ON fk.parent_object_id = tp.object_id
    INNER JOIN sys.tables AS tr ON fk.referenced_object_id = tr.object_id
    INNER JOIN sys.foreign_key_columns AS fkc ON fkc.constraint_object_id = fk.object_id
    INNER JOIN sys.columns AS cp
        ON fkc.parent_column_id = cp.column_id AND fkc.parent_object_id = cp.object_id
    INNER JOIN sys.columns AS cr
        ON fkc.referenced_column_id = cr.column_id AND fkc.referenced_object_id = cr.object_id
    WHERE SCHEMA_NAME(tp.schema_id) = @P1
      AND tp.name = @P2
"#;

/// Server error numbers reported for missing permissions
const PERMISSION_ERRORS: [u32; 5] = [229, 230, 262, 297, 300];

/// Login failed, cannot open database
const LOGIN_ERRORS: [u32; 2] = [18456, 4060];

/// SQL Server adapter
pub struct SqlServerAdapter {
    client: Mutex<Client<Compat<TcpStream>>>,

    /// Database name, for logging
    database: String,

    /// Schema whose tables are described
    schema: String,
}

impl SqlServerAdapter {
    /// Connect with an ADO.NET style connection string
    pub async fn from_connection_string(conn_str: &str) -> Result<Self, FetchError> {
        let config = TdsConfig::from_ado_string(conn_str)
            .map_err(|e| FetchError::ConfigError(format!("Invalid connection string: {}", e)))?;
        let database = ado_setting(conn_str, &["database", "initial catalog"])
            .unwrap_or_else(|| "master".to_string());

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| FetchError::NetworkError(format!("Failed to reach server: {}", e)))?;
        tcp.set_nodelay(true)
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| FetchError::AuthenticationError(format!("Failed to connect: {}", e)))?;

        Ok(Self {
            client: Mutex::new(client),
            database,
            schema: DEFAULT_SCHEMA.to_string(),
        })
    }

    /// Describe tables of another schema than `dbo`
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

    async fn fetch_rows(&self, sql: &'static str, binds: &[&str]) -> Result<Vec<Row>, TdsError> {
        let mut query = Query::new(sql);
        for value in binds {
            query.bind(*value);
        }
        let mut client = self.client.lock().await;
        let rows = query.query(&mut *client).await?.into_first_result().await;
        rows
    }
}

/// Case-insensitive lookup of the first matching `key=value` pair
fn ado_setting(conn_str: &str, keys: &[&str]) -> Option<String> {
    conn_str.split(';').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        let key = key.trim().to_lowercase();
        keys.contains(&key.as_str())
            .then(|| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn text(row: &Row, idx: usize) -> Result<Option<String>, TdsError> {
    Ok(row.try_get::<&str, _>(idx)?.map(str::to_string))
}

fn required_text(row: &Row, idx: usize) -> Result<String, TdsError> {
    Ok(text(row, idx)?.unwrap_or_default())
}

fn fetch_error(context: &str, e: TdsError) -> FetchError {
    match &e {
        TdsError::Server(token) if PERMISSION_ERRORS.contains(&token.code()) => {
            FetchError::PermissionDenied(format!("{}: {}", context, token.message()))
        }
        TdsError::Server(token) => FetchError::QueryError(format!("{}: {}", context, token.message())),
        _ => FetchError::NetworkError(format!("{}: {}", context, e)),
    }
}

/// Classify a server error number for the correction loop
fn server_error(code: u32, message: &str) -> ExecuteError {
    if PERMISSION_ERRORS.contains(&code) {
        ExecuteError::PermissionDenied(message.to_string())
    } else if LOGIN_ERRORS.contains(&code) {
        ExecuteError::Connection(message.to_string())
    } else {
        ExecuteError::Database(message.to_string())
    }
}

fn execute_error(e: TdsError) -> ExecuteError {
    match &e {
        TdsError::Server(token) => server_error(token.code(), token.message()),
        TdsError::Io { .. } | TdsError::Routing { .. } => ExecuteError::Connection(e.to_string()),
        _ => ExecuteError::Database(e.to_string()),
    }
}

fn number(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn cell_value(data: &ColumnData<'static>) -> Value {
    match data {
        ColumnData::U8(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I16(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I32(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I64(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::F32(v) => number(v.map(f64::from)),
        ColumnData::F64(v) => number(*v),
        ColumnData::Bit(v) => v.map(Value::Bool).unwrap_or(Value::Null),
        ColumnData::String(v) => v
            .as_ref()
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Numeric(v) => v
            .as_ref()
            .map(|n| Value::String(n.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Guid(v) => v
            .as_ref()
            .map(|g| Value::String(g.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| Value::String(format!("<binary {} bytes>", b.len())))
            .unwrap_or(Value::Null),
        other => temporal_value(other),
    }
}

/// Date and time cells, rendered through chrono
fn temporal_value(data: &ColumnData<'static>) -> Value {
    let rendered = chrono::NaiveDateTime::from_sql(data)
        .map(|v| v.map(|d| d.to_string()))
        .or_else(|_| chrono::NaiveDate::from_sql(data).map(|v| v.map(|d| d.to_string())))
        .or_else(|_| chrono::NaiveTime::from_sql(data).map(|v| v.map(|t| t.to_string())));

    match rendered {
        Ok(Some(text)) => Value::String(text),
        Ok(None) => Value::Null,
        Err(_) => Value::String(format!("{:?}", data)),
    }
}

#[async_trait::async_trait]
impl SchemaProvider for SqlServerAdapter {
    fn name(&self) -> &'static str {
        "SQL Server"
    }

    async fn list_tables(&self) -> Result<Vec<String>, FetchError> {
        let rows = self
            .fetch_rows(TABLES_QUERY, &[self.schema.as_str()])
            .await
            .map_err(|e| fetch_error("Failed to list tables", e))?;

        let tables = rows
            .iter()
            .map(|row| required_text(row, 0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| fetch_error("Failed to list tables", e))?;
        debug!(database = %self.database, schema = %self.schema, count = tables.len(), "listed tables");
        Ok(tables)
    }

    async fn get_table_schema(&self, table: &str) -> Result<Table, FetchError> {
        let binds = [self.schema.as_str(), table];

        let column_rows = self
            .fetch_rows(COLUMNS_QUERY, &binds)
            .await
            .map_err(|e| fetch_error(table, e))?;
        if column_rows.is_empty() {
            return Err(FetchError::TableNotFound(format!("{}.{}", self.schema, table)));
        }

        let mut columns = Vec::with_capacity(column_rows.len());
        for row in &column_rows {
            let read = || -> Result<Column, TdsError> {
                let mut column = Column::new(required_text(row, 0)?, required_text(row, 1)?)
                    .with_nullability(Nullability::from_information_schema(
                        &required_text(row, 4)?,
                    ));
                if let Some(len) = row
                    .try_get::<i32, _>(2)?
                    .and_then(|n| u32::try_from(n).ok())
                {
                    column = column.with_max_length(len);
                }
                if let Some(default) = text(row, 3)? {
                    column = column.with_default(default);
                }
                Ok(column)
            };
            columns.push(read().map_err(|e| fetch_error(table, e))?);
        }

        let primary_keys = self
            .fetch_rows(PRIMARY_KEY_QUERY, &binds)
            .await
            .map_err(|e| fetch_error(table, e))?
            .iter()
            .map(|row| required_text(row, 0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| fetch_error(table, e))?;

        let foreign_keys = self
            .fetch_rows(FOREIGN_KEY_QUERY, &binds)
            .await
            .map_err(|e| fetch_error(table, e))?
            .iter()
            .map(|row| {
                Ok(ForeignKey::new(
                    required_text(row, 0)?,
                    required_text(row, 1)?,
                    required_text(row, 2)?,
                ))
            })
            .collect::<Result<Vec<_>, TdsError>>()
            .map_err(|e| fetch_error(table, e))?;

        Ok(Table::from_parts(
            table,
            columns,
            Some(primary_keys),
            Some(foreign_keys),
        ))
    }

    async fn test_connection(&self) -> Result<(), FetchError> {
        let mut client = self.client.lock().await;
        let result = client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| fetch_error("Connection test failed", e))?
            .into_results()
            .await
            .map(|_| ())
            .map_err(|e| fetch_error("Connection test failed", e));
        result
    }
}

#[async_trait::async_trait]
impl QueryExecutor for SqlServerAdapter {
    fn dialect(&self) -> &str {
        "SQLServer"
    }

    async fn execute_as_table(&self, sql: &str) -> Result<QueryResult, ExecuteError> {
        let rows = {
            let mut client = self.client.lock().await;
            let rows = client
                .simple_query(sql)
                .await
                .map_err(execute_error)?
                .into_first_result()
                .await
                .map_err(execute_error)?;
            rows
        };

        let mut result = QueryResult::default();
        for row in rows {
            if result.columns.is_empty() {
                result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
            }
            result.rows.push(row.into_iter().map(|cell| cell_value(&cell)).collect());
        }

        debug!(database = %self.database, rows = result.row_count(), "statement executed");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::borrow::Cow;

    #[test]
    fn reads_database_from_ado_string() {
        let conn = "server=tcp:db,1433;Database=shop;user=sa;password=x";
        assert_eq!(ado_setting(conn, &["database", "initial catalog"]).as_deref(), Some("shop"));

        let conn = "Server=db;Initial Catalog=sales;User Id=sa";
        assert_eq!(ado_setting(conn, &["database", "initial catalog"]).as_deref(), Some("sales"));

        assert_eq!(ado_setting("server=db", &["database"]), None);
    }

    #[test]
    fn classifies_server_errors() {
        // Invalid column name
        let err = server_error(207, "Invalid column name 'nme'.");
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Invalid column name 'nme'.");

        assert!(matches!(
            server_error(229, "The SELECT permission was denied"),
            ExecuteError::PermissionDenied(_)
        ));
        assert!(matches!(
            server_error(18456, "Login failed for user 'sa'."),
            ExecuteError::Connection(_)
        ));
    }

    #[test]
    fn converts_cells() {
        assert_eq!(cell_value(&ColumnData::I32(Some(42))), json!(42));
        assert_eq!(cell_value(&ColumnData::I64(None)), Value::Null);
        assert_eq!(cell_value(&ColumnData::F64(Some(9.5))), json!(9.5));
        assert_eq!(cell_value(&ColumnData::Bit(Some(true))), json!(true));
        assert_eq!(
            cell_value(&ColumnData::String(Some(Cow::Borrowed("Ada")))),
            json!("Ada")
        );
        assert_eq!(
            cell_value(&ColumnData::Binary(Some(Cow::Owned(vec![1, 2, 3])))),
            json!("<binary 3 bytes>")
        );
    }
}
