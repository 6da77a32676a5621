//! Schema types shared by every formatter and database adapter
//!
//! Primary and foreign keys arrive from databases in two shapes: as flags on
//! individual columns, or as table-level key lists. Both shapes are folded
//! into the column flags when a [`Table`] is built, and the table-level lists
//! are always derived from those flags, so every consumer sees one answer.

use serde::{Deserialize, Serialize};

/// Nullability state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nullability {
    /// Definitely nullable
    Yes,

    /// Definitely not nullable
    No,

    /// Cannot determine nullability
    #[default]
    Unknown,
}

impl Nullability {
    /// Map an optional boolean flag ("is nullable") to a tri-state
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Self::Yes,
            Some(false) => Self::No,
            None => Self::Unknown,
        }
    }

    /// Parse the `YES` / `NO` strings used by `information_schema.columns`
    pub fn from_information_schema(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "YES" => Self::Yes,
            "NO" => Self::No,
            _ => Self::Unknown,
        }
    }
}

/// Target of a foreign-key column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignRef {
    /// Referenced table name
    pub table: String,

    /// Referenced column name
    pub column: String,
}

/// A column of a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unique within its table
    pub name: String,

    /// Declared type exactly as the database reports it
    pub data_type: String,

    /// Maximum character length, when the type carries one
    pub max_length: Option<u32>,

    /// Default expression, as reported by the database
    pub default_value: Option<String>,

    /// Nullability
    pub nullable: Nullability,

    /// Part of the table's primary key
    pub primary_key: bool,

    /// Referenced column when this column is a foreign key
    pub foreign_key: Option<ForeignRef>,
}

impl Column {
    /// Create a column with only a name and a declared type
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            max_length: None,
            default_value: None,
            nullable: Nullability::Unknown,
            primary_key: false,
            foreign_key: None,
        }
    }

    /// Set the maximum character length
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Set the default expression
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    /// Set nullability
    pub fn with_nullability(mut self, nullable: Nullability) -> Self {
        self.nullable = nullable;
        self
    }

    /// Mark as part of the primary key
    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark as a foreign key referencing `table.column`
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignRef {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    /// Whether this column references another table
    pub fn is_foreign(&self) -> bool {
        self.foreign_key.is_some()
    }
}

/// A table-level foreign-key relation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referencing column in the owning table
    pub column: String,

    /// Referenced table name
    pub references_table: String,

    /// Referenced column name
    pub references_column: String,
}

impl ForeignKey {
    pub fn new(
        column: impl Into<String>,
        references_table: impl Into<String>,
        references_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            references_table: references_table.into(),
            references_column: references_column.into(),
        }
    }
}

/// A table with its ordered columns
///
/// Column order drives rendering order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name, unique within a snapshot
    pub name: String,

    /// Ordered columns; key flags live here
    pub columns: Vec<Column>,
}

impl Table {
    /// Create a table whose keys are expressed as column flags
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Create a table from both key representations at once
    ///
    /// Explicit primary-key names and foreign-key relations are merged into
    /// the column flags. Entries naming a column the table does not have are
    /// ignored.
    pub fn from_parts(
        name: impl Into<String>,
        columns: Vec<Column>,
        primary_keys: Option<Vec<String>>,
        foreign_keys: Option<Vec<ForeignKey>>,
    ) -> Self {
        let mut table = Self::new(name, columns);
        if let Some(pks) = primary_keys {
            table = table.with_primary_key(pks);
        }
        for fk in foreign_keys.unwrap_or_default() {
            table = table.with_foreign_key(fk);
        }
        table
    }

    /// Flag the named columns as primary key
    pub fn with_primary_key<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            if let Some(col) = self.column_mut(name.as_ref()) {
                col.primary_key = true;
            }
        }
        self
    }

    /// Attach a table-level foreign key to its column
    pub fn with_foreign_key(mut self, fk: ForeignKey) -> Self {
        if let Some(col) = self.column_mut(&fk.column) {
            col.foreign_key = Some(ForeignRef {
                table: fk.references_table,
                column: fk.references_column,
            });
        }
        self
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Primary-key columns in column order
    pub fn primary_keys(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    /// Foreign-key relations in column order
    pub fn foreign_keys(&self) -> Vec<ForeignKey> {
        self.columns
            .iter()
            .filter_map(|c| {
                c.foreign_key.as_ref().map(|target| ForeignKey {
                    column: c.name.clone(),
                    references_table: target.table.clone(),
                    references_column: target.column.clone(),
                })
            })
            .collect()
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Every table of a database at one point in time
///
/// Built fresh for each request and never stored; only its rendering is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<Table>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: Vec<Table>) -> Self {
        Self { tables }
    }

    pub fn find_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders_columns() -> Vec<Column> {
        vec![
            Column::new("id", "integer"),
            Column::new("user_id", "integer"),
            Column::new("total", "numeric"),
        ]
    }

    #[test]
    fn flags_produce_list_views() {
        let table = Table::new(
            "orders",
            vec![
                Column::new("id", "integer").primary(),
                Column::new("user_id", "integer").references("users", "id"),
            ],
        );

        let pks: Vec<&str> = table.primary_keys().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(pks, vec!["id"]);
        assert_eq!(
            table.foreign_keys(),
            vec![ForeignKey::new("user_id", "users", "id")]
        );
    }

    #[test]
    fn explicit_lists_set_column_flags() {
        let table = Table::from_parts(
            "orders",
            orders_columns(),
            Some(vec!["id".to_string()]),
            Some(vec![ForeignKey::new("user_id", "users", "id")]),
        );

        assert!(table.find_column("id").unwrap().primary_key);
        assert!(!table.find_column("total").unwrap().primary_key);

        let user_id = table.find_column("user_id").unwrap();
        assert_eq!(
            user_id.foreign_key,
            Some(ForeignRef {
                table: "users".to_string(),
                column: "id".to_string()
            })
        );
    }

    #[test]
    fn both_representations_agree_after_merge() {
        let mut columns = orders_columns();
        columns[1] = columns[1].clone().primary();

        let table = Table::from_parts("orders", columns, Some(vec!["id".to_string()]), None);

        let pks: Vec<&str> = table.primary_keys().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(pks, vec!["id", "user_id"]);
    }

    #[test]
    fn unknown_key_columns_are_ignored() {
        let table = Table::from_parts(
            "orders",
            orders_columns(),
            Some(vec!["missing".to_string()]),
            Some(vec![ForeignKey::new("ghost", "users", "id")]),
        );

        assert!(table.primary_keys().is_empty());
        assert!(table.foreign_keys().is_empty());
    }

    #[test]
    fn nullability_parsing() {
        assert_eq!(Nullability::from_information_schema("YES"), Nullability::Yes);
        assert_eq!(Nullability::from_information_schema("no"), Nullability::No);
        assert_eq!(Nullability::from_information_schema(""), Nullability::Unknown);
        assert_eq!(Nullability::from_flag(Some(false)), Nullability::No);
        assert_eq!(Nullability::from_flag(None), Nullability::Unknown);
    }

    #[test]
    fn snapshot_lookup() {
        let snapshot = SchemaSnapshot::from_tables(vec![
            Table::new("users", vec![Column::new("id", "integer")]),
            Table::new("orders", orders_columns()),
        ]);

        assert_eq!(snapshot.table_names(), vec!["users", "orders"]);
        assert!(snapshot.find_table("orders").is_some());
        assert!(snapshot.find_table("missing").is_none());
        assert_eq!(snapshot.len(), 2);
    }
}
