//! Shared fixtures for pipeline tests
//!
//! Needles match the system prompt of each stage, see `naturalquery_engine::prompts`.

#![allow(dead_code)]

use naturalquery_catalog::{MockDatabase, QueryResult};
use naturalquery_core::{Column, Nullability, Table};

pub const ENRICH: &str = "Add comments";
pub const GENERATE: &str = "exactly one SQL code snippet";
pub const CORRECT: &str = "Look at the error";
pub const TO_ENGLISH: &str = "translating to English";
pub const TO_FRENCH: &str = "translating to French";
/// Also matches the translation prompts; register those first
pub const INTERPRET: &str = "You are a helpful assistant";

pub const ENRICHED_USERS: &str = "CREATE TABLE users (\n\
id SERIAL PRIMARY KEY, -- unique user identifier\n\
name VARCHAR(50) -- full name of the user\n\
)";

/// `users(id SERIAL PRIMARY KEY, name VARCHAR(50))`
pub fn users_table() -> Table {
    Table::new(
        "users",
        vec![
            Column::new("id", "integer")
                .with_default("nextval('users_id_seq'::regclass)")
                .with_nullability(Nullability::No)
                .primary(),
            Column::new("name", "character varying").with_max_length(50),
        ],
    )
}

/// Mock PostgreSQL holding the users table
pub fn users_database() -> MockDatabase {
    MockDatabase::builder()
        .with_table(users_table())
        .with_name("PostgreSQL")
        .build()
}

pub fn count_result() -> QueryResult {
    QueryResult::scalar("count", 42)
}

/// Model reply wrapping `sql` in a fenced block
pub fn sql_reply(sql: &str) -> String {
    format!("Here you go:\n```sql\n{}\n```", sql)
}
