//! DDL rendering and SQL extraction
//!
//! Turns a [`SchemaSnapshot`](naturalquery_core::SchemaSnapshot) into the
//! `CREATE TABLE` text used for prompting, and pulls the SQL statement back
//! out of free-form model replies.
//!
//! ## Example
//!
//! ```rust,ignore
//! use naturalquery_core::DdlStyle;
//! use naturalquery_ddl::{formatter_for, extract_sql};
//!
//! let ddl = formatter_for(DdlStyle::Commented).format(&snapshot);
//! let sql = extract_sql(&reply)?;
//! ```

pub mod formatter;
pub mod extract;

pub use formatter::{
    formatter_for, map_data_type, CommentedDdlFormatter, DdlFormatter, InlineKeyDdlFormatter,
    AUTO_INCREMENT_MARKER, TABLE_SEPARATOR,
};
pub use extract::{extract_sql, ExtractError};
