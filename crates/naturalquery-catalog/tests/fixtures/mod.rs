//! Test fixtures for database adapter integration tests
//!
//! Reusable table definitions for a small shop database. The same shapes are
//! used for the mock and for seeding real engines.

#![allow(dead_code)]

use naturalquery_core::{Column, Nullability, Table};

/// Users table with an auto-increment primary key
pub fn users_table() -> Table {
    Table::new(
        "users",
        vec![
            Column::new("id", "integer")
                .with_default("nextval('users_id_seq'::regclass)")
                .with_nullability(Nullability::No)
                .primary(),
            Column::new("name", "character varying")
                .with_max_length(100)
                .with_nullability(Nullability::No),
            Column::new("email", "character varying").with_nullability(Nullability::Yes),
            Column::new("created_at", "timestamp without time zone")
                .with_default("now()")
                .with_nullability(Nullability::No),
        ],
    )
}

/// Orders table referencing users
pub fn orders_table() -> Table {
    Table::new(
        "orders",
        vec![
            Column::new("id", "integer")
                .with_nullability(Nullability::No)
                .primary(),
            Column::new("user_id", "integer")
                .with_nullability(Nullability::No)
                .references("users", "id"),
            Column::new("total", "numeric").with_nullability(Nullability::Yes),
        ],
    )
}

/// SQLite script creating and filling the shop tables
pub const SHOP_SQLITE: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        email TEXT
    );
    CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        total REAL
    );
    INSERT INTO users (id, name, email) VALUES
        (1, 'Ada', 'ada@example.com'),
        (2, 'Linus', NULL);
    INSERT INTO orders (user_id, total) VALUES (1, 12.5), (1, 7.5), (2, 30.0);
";
