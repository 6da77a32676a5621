//! Natural-language question answering over a relational database
//!
//! [`QueryTranslator`] drives the whole pipeline for one question: render the
//! live schema as DDL, enrich it with column comments (cached by content
//! fingerprint), ask the model for SQL, execute it, correct it once if the
//! database rejects it, and interpret the rows in the asker's language.
//!
//! ## Example
//!
//! ```rust,ignore
//! use naturalquery_core::{Config, Language};
//! use naturalquery_engine::QueryTranslator;
//!
//! let config = Config::from_file(Path::new("naturalquery.toml"))?;
//! let translator = QueryTranslator::from_config(&config).await?;
//! let answer = translator.answer("Combien d'utilisateurs ?", Language::French).await?;
//! ```

pub mod error;
pub mod factory;
pub mod language;
pub mod prompts;
pub mod translator;

pub use error::QueryError;
pub use language::LanguageTranslator;
pub use translator::{QueryTranslator, QueryTranslatorBuilder, Stage};
