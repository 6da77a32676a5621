//! Config-driven construction
//!
//! The prompt client, the cache backend and the database adapter are all
//! selected from [`Config`]; database engines are available behind the
//! `postgres`, `sqlite` and `sqlserver` cargo features.

use crate::error::QueryError;
use crate::translator::{QueryTranslator, QueryTranslatorBuilder};
use naturalquery_cache::{ContentCache, FileCache, KeyValueCache};
use naturalquery_core::{CacheBackend, Config, DatabaseConfig};
use naturalquery_llm::client_from_config;
use std::sync::Arc;
use tracing::info;

impl QueryTranslator {
    /// Build the whole pipeline from configuration
    ///
    /// Connects to the configured database, so this fails early on bad
    /// credentials or an unreachable server.
    pub async fn from_config(config: &Config) -> Result<Self, QueryError> {
        config.validate()?;

        let database = config
            .database
            .as_ref()
            .ok_or_else(|| QueryError::Setup("missing [database] section".to_string()))?;

        let llm = client_from_config(&config.llm)?;

        let cache: Arc<dyn KeyValueCache> = match config.cache.backend {
            CacheBackend::File => Arc::new(FileCache::new(
                config.cache_dir(),
                config.cache.validity(),
            )?),
            CacheBackend::Memory => Arc::new(ContentCache::new(config.cache.validity())),
        };

        let builder = QueryTranslator::builder()
            .llm(llm)
            .cache(cache)
            .ddl_style(config.ddl_style)
            .language(config.language)
            .language_strategy(config.language_strategy)
            .call_timeout(config.call_timeout());

        let translator = connect_database(builder, database).await?.build()?;
        info!(
            database = %database.provider,
            language = translator.language().code(),
            "query translator ready"
        );
        Ok(translator)
    }
}

/// Attach the adapter named by `[database].provider`
async fn connect_database(
    builder: QueryTranslatorBuilder,
    config: &DatabaseConfig,
) -> Result<QueryTranslatorBuilder, QueryError> {
    match config.provider.to_lowercase().as_str() {
        #[cfg(feature = "postgres")]
        "postgres" | "postgresql" => {
            use naturalquery_catalog::PostgresAdapter;

            let url = required(config, "url")?;
            let mut adapter = if config.setting("tls") == Some("true") {
                PostgresAdapter::from_connection_string_with_tls(url).await?
            } else {
                PostgresAdapter::from_connection_string(url).await?
            };
            if let Some(schema) = config.setting("schema") {
                adapter = adapter.with_schema(schema);
            }
            Ok(builder.database(Arc::new(adapter)))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use naturalquery_catalog::SqliteAdapter;

            let path = config
                .setting("path")
                .or_else(|| config.setting("url"))
                .ok_or_else(|| QueryError::Setup("sqlite needs `path`".to_string()))?;
            let adapter = SqliteAdapter::open(path)?;
            Ok(builder.database(Arc::new(adapter)))
        }
        #[cfg(feature = "sqlserver")]
        "sqlserver" | "mssql" => {
            use naturalquery_catalog::SqlServerAdapter;

            let url = required(config, "url")?;
            let mut adapter = SqlServerAdapter::from_connection_string(url).await?;
            if let Some(schema) = config.setting("schema") {
                adapter = adapter.with_schema(schema);
            }
            Ok(builder.database(Arc::new(adapter)))
        }
        other => Err(QueryError::Setup(format!(
            "unsupported database provider `{}` (is its cargo feature enabled?)",
            other
        ))),
    }
}

#[cfg(any(feature = "postgres", feature = "sqlserver"))]
fn required<'a>(config: &'a DatabaseConfig, key: &str) -> Result<&'a str, QueryError> {
    config
        .setting(key)
        .ok_or_else(|| QueryError::Setup(format!("{} needs `{}`", config.provider, key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use naturalquery_core::{CacheConfig, LlmConfig, LlmProvider};

    fn config(database: Option<DatabaseConfig>) -> Config {
        Config {
            llm: LlmConfig {
                provider: LlmProvider::Custom,
                url: Some("http://127.0.0.1:9/v1/chat/completions".to_string()),
                ..LlmConfig::default()
            },
            database,
            cache: CacheConfig {
                backend: CacheBackend::Memory,
                ..CacheConfig::default()
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn missing_database_section() {
        assert!(matches!(
            QueryTranslator::from_config(&config(None)).await,
            Err(QueryError::Setup(_))
        ));
    }

    #[tokio::test]
    async fn unknown_database_provider() {
        let cfg = config(Some(DatabaseConfig::new("oracle")));
        match QueryTranslator::from_config(&cfg).await {
            Err(QueryError::Setup(message)) => assert!(message.contains("oracle")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a setup error"),
        }
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn builds_over_sqlite_with_file_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(Some(
            DatabaseConfig::new("sqlite")
                .with_setting("path", dir.path().join("shop.db").display().to_string()),
        ));
        cfg.project_root = dir.path().to_path_buf();
        cfg.cache.backend = CacheBackend::File;

        let translator = QueryTranslator::from_config(&cfg).await.unwrap();
        assert!(dir.path().join("cache_data").is_dir());
        assert_eq!(translator.database_ddl().await.unwrap(), "");
    }
}
