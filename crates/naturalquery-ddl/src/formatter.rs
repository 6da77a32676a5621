//! Schema snapshot to DDL text
//!
//! Two interchangeable renderers are provided. [`CommentedDdlFormatter`] maps
//! types, writes constraints inline on each column and lists foreign keys as
//! trailing `--` comments. [`InlineKeyDdlFormatter`] keeps declared types and
//! writes `primary key (...)` / `foreign key (...) references ...` lines inside
//! each table block, a layout SQL-specialized models are trained on.

use naturalquery_core::{Column, DdlStyle, Nullability, SchemaSnapshot, Table};

/// Separator placed between rendered tables
pub const TABLE_SEPARATOR: &str = "\n\n";

/// Default-expression prefix that marks an auto-incrementing column
pub const AUTO_INCREMENT_MARKER: &str = "nextval";

/// Renders a schema snapshot as DDL text
pub trait DdlFormatter: Send + Sync {
    /// Short strategy name for logs
    fn name(&self) -> &'static str;

    /// Render one table
    fn format_table(&self, table: &Table) -> String;

    /// Render the whole snapshot
    fn format(&self, snapshot: &SchemaSnapshot) -> String {
        snapshot
            .tables
            .iter()
            .map(|table| self.format_table(table))
            .collect::<Vec<_>>()
            .join(TABLE_SEPARATOR)
    }
}

/// Pick the renderer for a configured style
pub fn formatter_for(style: DdlStyle) -> Box<dyn DdlFormatter> {
    match style {
        DdlStyle::Commented => Box::new(CommentedDdlFormatter),
        DdlStyle::InlineKeys => Box::new(InlineKeyDdlFormatter),
    }
}

fn is_auto_increment(column: &Column) -> bool {
    column
        .default_value
        .as_deref()
        .is_some_and(|default| default.starts_with(AUTO_INCREMENT_MARKER))
}

/// Collapse a declared type to the short form used in prompts
///
/// An auto-increment default wins over every other mapping.
pub fn map_data_type(column: &Column) -> String {
    if is_auto_increment(column) {
        return "SERIAL".to_string();
    }

    match column.data_type.trim().to_lowercase().as_str() {
        "character varying" | "varchar" => match column.max_length {
            Some(len) => format!("VARCHAR({})", len),
            None => "VARCHAR".to_string(),
        },
        "timestamp without time zone" => "TIMESTAMP".to_string(),
        _ => column.data_type.clone(),
    }
}

fn create_table(name: &str, lines: &[String]) -> String {
    if lines.is_empty() {
        format!("CREATE TABLE {}", name)
    } else {
        format!("CREATE TABLE {} (\n{}\n)", name, lines.join(",\n"))
    }
}

/// Mapped types, inline constraints, foreign keys as trailing comments
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentedDdlFormatter;

impl CommentedDdlFormatter {
    fn format_column(column: &Column) -> String {
        let mut def = format!("{} {}", column.name, map_data_type(column));

        if let Some(default) = &column.default_value {
            if !is_auto_increment(column) {
                def.push_str(" DEFAULT ");
                def.push_str(default);
            }
        }
        if column.nullable == Nullability::No {
            def.push_str(" NOT NULL");
        }
        if column.primary_key {
            def.push_str(" PRIMARY KEY");
        }

        def
    }

    fn join_comments(snapshot: &SchemaSnapshot) -> Vec<String> {
        snapshot
            .tables
            .iter()
            .flat_map(|table| {
                table.columns.iter().filter_map(move |col| {
                    col.foreign_key.as_ref().map(|target| {
                        format!(
                            "-- {}.{} can be joined with {}.{}",
                            table.name, col.name, target.table, target.column
                        )
                    })
                })
            })
            .collect()
    }
}

impl DdlFormatter for CommentedDdlFormatter {
    fn name(&self) -> &'static str {
        "commented"
    }

    fn format_table(&self, table: &Table) -> String {
        let lines: Vec<String> = table.columns.iter().map(Self::format_column).collect();
        create_table(&table.name, &lines)
    }

    fn format(&self, snapshot: &SchemaSnapshot) -> String {
        let mut blocks: Vec<String> = snapshot
            .tables
            .iter()
            .map(|table| self.format_table(table))
            .collect();

        let comments = Self::join_comments(snapshot);
        if !comments.is_empty() {
            blocks.push(comments.join("\n"));
        }

        blocks.join(TABLE_SEPARATOR)
    }
}

/// Declared types with key lines inside each table block
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineKeyDdlFormatter;

impl DdlFormatter for InlineKeyDdlFormatter {
    fn name(&self) -> &'static str {
        "inline_keys"
    }

    fn format_table(&self, table: &Table) -> String {
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|col| {
                // "any" is not a real type but reads as a catch-all to the model
                let data_type = if col.data_type.trim().is_empty() {
                    "any"
                } else {
                    col.data_type.as_str()
                };
                format!("    {} {}", col.name, data_type)
            })
            .collect();

        let pks = table.primary_keys();
        if !pks.is_empty() {
            let names: Vec<&str> = pks.iter().map(|c| c.name.as_str()).collect();
            lines.push(format!("    primary key ({})", names.join(", ")));
        }

        for fk in table.foreign_keys() {
            lines.push(format!(
                "    foreign key ({}) references {}({})",
                fk.column, fk.references_table, fk.references_column
            ));
        }

        create_table(&table.name, &lines)
    }
}
