//! NaturalQuery Core
//!
//! Shared domain model: the canonical schema representation, the
//! role-tagged conversation handed to language models, supported languages
//! and the TOML configuration.

pub mod schema;
pub mod conversation;
pub mod language;
pub mod config;

pub use schema::{Column, ForeignKey, ForeignRef, Nullability, SchemaSnapshot, Table};
pub use conversation::{Conversation, Message, Role};
pub use language::{Language, UnsupportedLanguage};
pub use config::{
    CacheBackend, CacheConfig, Config, ConfigError, DatabaseConfig, DdlStyle, LanguageStrategy,
    LlmConfig, LlmProvider,
};
