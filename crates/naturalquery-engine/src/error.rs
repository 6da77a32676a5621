//! Orchestrator error taxonomy

use naturalquery_cache::CacheError;
use naturalquery_catalog::{ExecuteError, FetchError};
use naturalquery_core::ConfigError;
use naturalquery_ddl::ExtractError;
use naturalquery_llm::PromptFailure;

/// Errors surfaced by [`QueryTranslator`](crate::QueryTranslator)
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Failed to read the database schema: {0}")]
    Schema(#[from] FetchError),

    #[error("Query execution failed: {0}")]
    Execute(#[from] ExecuteError),

    #[error("Language model call failed: {0}")]
    Prompt(#[from] PromptFailure),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The model reply held no ```sql or ```vbnet block
    #[error("No SQL code block found in the model reply")]
    NoSqlExtracted,

    /// Terminal error of `answer`; the underlying cause is logged, not kept
    #[error("could not find a valid SQL query")]
    NoValidQuery,

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Missing collaborator or unsupported backend at construction
    #[error("Setup error: {0}")]
    Setup(String),
}

impl From<ExtractError> for QueryError {
    fn from(_: ExtractError) -> Self {
        Self::NoSqlExtracted
    }
}
