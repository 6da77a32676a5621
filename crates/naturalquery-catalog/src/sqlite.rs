//! SQLite adapter using the table_info pragmas
//!
//! Tables come from `sqlite_master`, columns from `pragma_table_info` and
//! relations from `pragma_foreign_key_list`. The connection is blocking, so
//! every call runs on the blocking pool.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let db = SqliteAdapter::open("shop.db")?;
//! let tables = db.list_tables().await?;
//! ```

use crate::adapter::{ExecuteError, FetchError, QueryExecutor, SchemaProvider};
use crate::result::QueryResult;
use naturalquery_core::{Column, ForeignKey, Nullability, Table};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, ErrorCode};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const TABLES_QUERY: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
     ORDER BY name";

const COLUMNS_QUERY: &str =
    "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid";

const FOREIGN_KEY_QUERY: &str =
    "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq";

/// SQLite adapter
#[derive(Clone)]
pub struct SqliteAdapter {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAdapter {
    /// Open (creating if needed) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FetchError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            FetchError::ConfigError(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, FetchError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            FetchError::ConfigError(format!("Failed to open in-memory database: {}", e))
        })?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already opened connection
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a batch of statements, used to seed schemas and fixtures
    pub async fn execute_batch(&self, sql: &str) -> Result<(), ExecuteError> {
        let sql = sql.to_string();
        self.with_conn(move |conn| conn.execute_batch(&sql).map_err(execute_error))
            .await
            .map_err(ExecuteError::Connection)?
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, String>
    where
        F: FnOnce(&Connection) -> T + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<T, String> {
            let guard = conn.lock().map_err(|_| "connection mutex poisoned".to_string())?;
            Ok(f(&guard))
        })
        .await
        .map_err(|e| format!("blocking task failed: {}", e))?
    }
}

/// Classify a driver error for the correction loop
fn execute_error(e: rusqlite::Error) -> ExecuteError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::CannotOpen | ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                ExecuteError::Connection(e.to_string())
            }
            ErrorCode::PermissionDenied | ErrorCode::ReadOnly => {
                ExecuteError::PermissionDenied(e.to_string())
            }
            _ => ExecuteError::Database(e.to_string()),
        },
        _ => ExecuteError::Database(e.to_string()),
    }
}

fn fetch_error(context: &str, e: rusqlite::Error) -> FetchError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::PermissionDenied | ErrorCode::AuthorizationForStatementDenied
            ) =>
        {
            FetchError::PermissionDenied(format!("{}: {}", context, e))
        }
        _ => FetchError::QueryError(format!("{}: {}", context, e)),
    }
}

fn cell_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

fn read_table(conn: &Connection, table: &str) -> Result<Table, FetchError> {
    let mut stmt = conn
        .prepare(COLUMNS_QUERY)
        .map_err(|e| fetch_error(table, e))?;

    // (column, pk position); position 0 means not part of the key
    let mut primary: Vec<(String, i64)> = Vec::new();
    let mut columns = Vec::new();

    let rows = stmt
        .query_map(params![table], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })
        .map_err(|e| fetch_error(table, e))?;

    for row in rows {
        let (name, data_type, not_null, default_value, pk) = row.map_err(|e| fetch_error(table, e))?;
        let mut column = Column::new(name.clone(), data_type.unwrap_or_default())
            .with_nullability(Nullability::from_flag(Some(not_null == 0)));
        if let Some(default) = default_value {
            column = column.with_default(default);
        }
        if pk > 0 {
            primary.push((name, pk));
        }
        columns.push(column);
    }

    if columns.is_empty() {
        return Err(FetchError::TableNotFound(table.to_string()));
    }

    primary.sort_by_key(|(_, position)| *position);
    let primary_keys = primary.into_iter().map(|(name, _)| name).collect();

    let mut stmt = conn
        .prepare(FOREIGN_KEY_QUERY)
        .map_err(|e| fetch_error(table, e))?;
    let relations = stmt
        .query_map(params![table], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })
        .map_err(|e| fetch_error(table, e))?;

    let mut foreign_keys = Vec::new();
    for relation in relations {
        let (column, parent, target) = relation.map_err(|e| fetch_error(table, e))?;
        // a bare REFERENCES parent targets the parent's primary key
        let target = match target {
            Some(target) => target,
            None => match parent_primary_key(conn, &parent)? {
                Some(key) => key,
                None => {
                    warn!(
                        table,
                        column = %column,
                        parent = %parent,
                        "reference without a target column, skipped"
                    );
                    continue;
                }
            },
        };
        foreign_keys.push(ForeignKey::new(column, parent, target));
    }

    Ok(Table::from_parts(
        table,
        columns,
        Some(primary_keys),
        Some(foreign_keys),
    ))
}

fn parent_primary_key(conn: &Connection, parent: &str) -> Result<Option<String>, FetchError> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info(?1) WHERE pk = 1")
        .map_err(|e| fetch_error(parent, e))?;
    let mut rows = stmt.query(params![parent]).map_err(|e| fetch_error(parent, e))?;
    match rows.next().map_err(|e| fetch_error(parent, e))? {
        Some(row) => Ok(Some(row.get(0).map_err(|e| fetch_error(parent, e))?)),
        None => Ok(None),
    }
}

fn run_statement(conn: &Connection, sql: &str) -> Result<QueryResult, ExecuteError> {
    let mut stmt = conn.prepare(sql).map_err(execute_error)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let mut result = QueryResult::new(columns);
    let mut rows = stmt.query([]).map_err(execute_error)?;
    while let Some(row) = rows.next().map_err(execute_error)? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(cell_value(row.get_ref(i).map_err(execute_error)?));
        }
        result.rows.push(cells);
    }
    Ok(result)
}

#[async_trait::async_trait]
impl SchemaProvider for SqliteAdapter {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    async fn list_tables(&self) -> Result<Vec<String>, FetchError> {
        let tables = self
            .with_conn(|conn| -> Result<Vec<String>, FetchError> {
                let mut stmt = conn
                    .prepare(TABLES_QUERY)
                    .map_err(|e| fetch_error("Failed to list tables", e))?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))
                    .map_err(|e| fetch_error("Failed to list tables", e))?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| fetch_error("Failed to list tables", e))?;
                Ok(names)
            })
            .await
            .map_err(FetchError::NetworkError)??;

        debug!(count = tables.len(), "listed tables");
        Ok(tables)
    }

    async fn get_table_schema(&self, table: &str) -> Result<Table, FetchError> {
        let table = table.to_string();
        self.with_conn(move |conn| read_table(conn, &table))
            .await
            .map_err(FetchError::NetworkError)?
    }

    async fn test_connection(&self) -> Result<(), FetchError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| fetch_error("Connection test failed", e))
        })
        .await
        .map_err(FetchError::NetworkError)?
    }
}

#[async_trait::async_trait]
impl QueryExecutor for SqliteAdapter {
    fn dialect(&self) -> &str {
        "SQLite"
    }

    async fn execute_as_table(&self, sql: &str) -> Result<QueryResult, ExecuteError> {
        let sql = sql.to_string();
        let result = self
            .with_conn(move |conn| run_statement(conn, &sql))
            .await
            .map_err(ExecuteError::Connection)??;

        debug!(rows = result.row_count(), "statement executed");
        Ok(result)
    }
}
