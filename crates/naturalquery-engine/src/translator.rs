//! Query orchestrator
//!
//! One question runs as a strict sequence of suspending calls:
//!
//! ```text
//! TranslatingLanguage? -> GeneratingSql -> Executing
//!     -> [CorrectingSql -> ReExecuting]   (once, on a database rejection)
//!     -> InterpretingResult -> TranslatingLanguageBack? -> Done
//! ```
//!
//! The enriched DDL embedded in generation and correction prompts comes from
//! the content cache, keyed by the fingerprint of the raw DDL.

use crate::error::QueryError;
use crate::language::LanguageTranslator;
use crate::prompts;
use naturalquery_cache::{fingerprint, ContentCache, KeyValueCache};
use naturalquery_catalog::{
    Database, ExecuteError, FetchError, QueryExecutor, QueryResult, SchemaProvider,
};
use naturalquery_core::{Conversation, DdlStyle, Language, LanguageStrategy, SchemaSnapshot};
use naturalquery_ddl::{extract_sql, formatter_for, DdlFormatter};
use naturalquery_llm::{PromptClient, PromptFailure};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Pipeline stage, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    TranslatingLanguage,
    GeneratingSql,
    Executing,
    CorrectingSql,
    ReExecuting,
    InterpretingResult,
    TranslatingLanguageBack,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TranslatingLanguage => "translating_language",
            Self::GeneratingSql => "generating_sql",
            Self::Executing => "executing",
            Self::CorrectingSql => "correcting_sql",
            Self::ReExecuting => "re_executing",
            Self::InterpretingResult => "interpreting_result",
            Self::TranslatingLanguageBack => "translating_language_back",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers natural-language questions against one database
///
/// Cheap to share behind an `Arc`; concurrent questions only share the
/// content cache.
pub struct QueryTranslator {
    schema: Arc<dyn SchemaProvider>,
    executor: Arc<dyn QueryExecutor>,
    llm: Arc<dyn PromptClient>,
    cache: Arc<dyn KeyValueCache>,
    formatter: Box<dyn DdlFormatter>,
    translator: LanguageTranslator,
    language: Language,
    language_strategy: LanguageStrategy,
    call_timeout: Option<Duration>,
}

impl QueryTranslator {
    pub fn builder() -> QueryTranslatorBuilder {
        QueryTranslatorBuilder::default()
    }

    /// Language used by [`QueryTranslator::ask_question`]
    pub fn language(&self) -> Language {
        self.language
    }

    pub fn language_strategy(&self) -> LanguageStrategy {
        self.language_strategy
    }

    /// Describe every table of the database
    pub async fn schema_snapshot(&self) -> Result<SchemaSnapshot, QueryError> {
        let snapshot = with_timeout(self.call_timeout, self.schema.snapshot())
            .await
            .map_err(FetchError::Timeout)??;
        debug!(tables = snapshot.len(), "schema snapshot fetched");
        Ok(snapshot)
    }

    /// Raw DDL of the live schema, as rendered for prompting
    pub async fn database_ddl(&self) -> Result<String, QueryError> {
        let snapshot = self.schema_snapshot().await?;
        Ok(self.formatter.format(&snapshot))
    }

    /// Commented version of `ddl`, served from the cache when fresh
    ///
    /// With `force` the cached entry is dropped first and the model is always
    /// asked. Cache failures are logged and degrade to a miss.
    #[instrument(skip_all, fields(force = force))]
    pub async fn enrich_ddl(&self, ddl: &str, force: bool) -> Result<String, QueryError> {
        let key = fingerprint(ddl);

        if force {
            if let Err(e) = self.cache.invalidate(&key).await {
                warn!(fingerprint = %key, error = %e, "cache invalidation failed");
            }
        } else {
            match self.cache.get(&key).await {
                Ok(Some(enriched)) => {
                    debug!(fingerprint = %key, backend = self.cache.name(), "enriched DDL cache hit");
                    return Ok(enriched);
                }
                Ok(None) => {
                    debug!(fingerprint = %key, backend = self.cache.name(), "enriched DDL cache miss")
                }
                Err(e) => warn!(fingerprint = %key, error = %e, "cache read failed"),
            }
        }

        let enriched = self.ask(prompts::enrich(ddl)).await?;

        if let Err(e) = self.cache.put(&key, &enriched).await {
            warn!(fingerprint = %key, error = %e, "cache write failed");
        }
        info!(fingerprint = %key, bytes = enriched.len(), "DDL enriched");
        Ok(enriched)
    }

    /// Enriched DDL of the live schema
    pub async fn enriched_database_ddl(&self) -> Result<String, QueryError> {
        let ddl = self.database_ddl().await?;
        self.enrich_ddl(&ddl, false).await
    }

    /// Ask the model for SQL answering `question` (in English)
    pub async fn translate_to_sql(&self, question: &str) -> Result<String, QueryError> {
        let ddl = self.enriched_database_ddl().await?;
        let reply = self
            .ask(prompts::generate(&ddl, self.executor.dialect(), question))
            .await?;
        Ok(extract_sql(&reply)?)
    }

    /// Ask the model to fix a statement given the failure description
    pub async fn correct_sql(&self, error: &str) -> Result<String, QueryError> {
        let ddl = self.enriched_database_ddl().await?;
        let reply = self.ask(prompts::correct(error, &ddl)).await?;
        Ok(extract_sql(&reply)?)
    }

    /// Run `sql` on the database
    pub async fn execute(&self, sql: &str) -> Result<QueryResult, ExecuteError> {
        with_timeout(self.call_timeout, self.executor.execute_as_table(sql))
            .await
            .unwrap_or_else(|limit| Err(ExecuteError::Timeout(limit)))
    }

    /// Turn the rows of `sql` into a terse answer to `question`
    pub async fn interpret(
        &self,
        sql: &str,
        result: &QueryResult,
        question: &str,
        language: Language,
    ) -> Result<String, QueryError> {
        let conversation = prompts::interpret(sql, &result.to_string(), question, language);
        Ok(self.ask(conversation).await?)
    }

    /// Answer in the configured language
    pub async fn ask_question(&self, question: &str) -> Result<String, QueryError> {
        self.answer(question, self.language).await
    }

    /// Answer `question`, asked and answered in `language`
    ///
    /// Any failure while producing a working query (enrichment, generation,
    /// execution, correction) ends in [`QueryError::NoValidQuery`]; the cause
    /// is logged. Translation and interpretation failures keep their own
    /// variants.
    #[instrument(skip_all, fields(language = language.code(), strategy = ?self.language_strategy))]
    pub async fn answer(&self, question: &str, language: Language) -> Result<String, QueryError> {
        let question = if language.is_english() {
            question.to_string()
        } else {
            info!(stage = %Stage::TranslatingLanguage, "translating question");
            self.translator.to_english(question, language).await?
        };

        let (sql, result) = match self.find_working_query(&question).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "no valid SQL query for question");
                return Err(QueryError::NoValidQuery);
            }
        };

        info!(stage = %Stage::InterpretingResult, rows = result.row_count(), "interpreting result");
        let answer = match self.language_strategy {
            LanguageStrategy::InlineInstruction => {
                self.interpret(&sql, &result, &question, language).await?
            }
            LanguageStrategy::ExplicitBackTranslation => {
                let english = self
                    .interpret(&sql, &result, &question, Language::English)
                    .await?;
                if language.is_english() {
                    english
                } else {
                    info!(stage = %Stage::TranslatingLanguageBack, "translating answer");
                    self.translator.from_english(&english, language).await?
                }
            }
        };

        info!(stage = %Stage::Done, "question answered");
        Ok(answer)
    }

    /// Generate and execute, with exactly one correction on a retryable failure
    async fn find_working_query(&self, question: &str) -> Result<(String, QueryResult), QueryError> {
        info!(stage = %Stage::GeneratingSql, "generating SQL");
        let failure = match self.translate_to_sql(question).await {
            Ok(sql) => {
                info!(stage = %Stage::Executing, "executing SQL");
                match self.execute(&sql).await {
                    Ok(result) => return Ok((sql, result)),
                    Err(e) if e.is_retryable() => {
                        format!("Execution failed on sql '{}': {}", sql.trim(), e)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(QueryError::NoSqlExtracted) => {
                "The previous reply did not contain a ```sql code block".to_string()
            }
            Err(e) => return Err(e),
        };

        info!(stage = %Stage::CorrectingSql, error = %failure, "correcting SQL");
        let corrected = self.correct_sql(&failure).await?;

        info!(stage = %Stage::ReExecuting, "re-executing corrected SQL");
        let result = self.execute(&corrected).await?;
        Ok((corrected, result))
    }

    async fn ask(&self, conversation: Conversation) -> Result<String, PromptFailure> {
        debug!(provider = self.llm.name(), "asking language model");
        with_timeout(self.call_timeout, self.llm.ask(&conversation))
            .await
            .unwrap_or_else(|limit| Err(PromptFailure::Timeout(limit)))
    }
}

/// Run `future` under an optional time limit; `Err` carries the limit
pub(crate) async fn with_timeout<F: Future>(
    limit: Option<Duration>,
    future: F,
) -> Result<F::Output, Duration> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future).await.map_err(|_| limit),
        None => Ok(future.await),
    }
}

/// Builder for [`QueryTranslator`]
///
/// A prompt client and a database (or a schema provider plus an executor)
/// are required. The cache defaults to an in-memory [`ContentCache`] with a
/// 24 hour validity.
#[derive(Default)]
pub struct QueryTranslatorBuilder {
    schema: Option<Arc<dyn SchemaProvider>>,
    executor: Option<Arc<dyn QueryExecutor>>,
    llm: Option<Arc<dyn PromptClient>>,
    cache: Option<Arc<dyn KeyValueCache>>,
    ddl_style: DdlStyle,
    language: Language,
    language_strategy: LanguageStrategy,
    call_timeout: Option<Duration>,
}

impl QueryTranslatorBuilder {
    /// Use one adapter for both schema and execution
    pub fn database<D: Database + 'static>(mut self, database: Arc<D>) -> Self {
        let schema: Arc<dyn SchemaProvider> = database.clone();
        let executor: Arc<dyn QueryExecutor> = database;
        self.schema = Some(schema);
        self.executor = Some(executor);
        self
    }

    pub fn schema_provider(mut self, schema: Arc<dyn SchemaProvider>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn PromptClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn KeyValueCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn ddl_style(mut self, style: DdlStyle) -> Self {
        self.ddl_style = style;
        self
    }

    /// Default language for [`QueryTranslator::ask_question`]
    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn language_strategy(mut self, strategy: LanguageStrategy) -> Self {
        self.language_strategy = strategy;
        self
    }

    /// Upper bound on each model and database call
    pub fn call_timeout(mut self, limit: Option<Duration>) -> Self {
        self.call_timeout = limit;
        self
    }

    pub fn build(self) -> Result<QueryTranslator, QueryError> {
        let llm = self
            .llm
            .ok_or_else(|| QueryError::Setup("a prompt client is required".to_string()))?;
        let schema = self
            .schema
            .ok_or_else(|| QueryError::Setup("a schema provider is required".to_string()))?;
        let executor = self
            .executor
            .ok_or_else(|| QueryError::Setup("a query executor is required".to_string()))?;
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(ContentCache::default()));

        Ok(QueryTranslator {
            translator: LanguageTranslator::new(Arc::clone(&llm)).with_timeout(self.call_timeout),
            schema,
            executor,
            llm,
            cache,
            formatter: formatter_for(self.ddl_style),
            language: self.language,
            language_strategy: self.language_strategy,
            call_timeout: self.call_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naturalquery_catalog::MockDatabase;
    use naturalquery_core::{Column, Table};
    use naturalquery_llm::MockPromptClient;

    fn translator(llm: &MockPromptClient, db: MockDatabase) -> QueryTranslator {
        QueryTranslator::builder()
            .database(Arc::new(db))
            .llm(Arc::new(llm.clone()))
            .build()
            .unwrap()
    }

    #[test]
    fn build_requires_collaborators() {
        assert!(matches!(
            QueryTranslator::builder().build(),
            Err(QueryError::Setup(_))
        ));
        assert!(matches!(
            QueryTranslator::builder()
                .llm(Arc::new(MockPromptClient::new()))
                .build(),
            Err(QueryError::Setup(_))
        ));
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::GeneratingSql.to_string(), "generating_sql");
        assert_eq!(Stage::TranslatingLanguageBack.as_str(), "translating_language_back");
    }

    #[tokio::test]
    async fn database_ddl_uses_configured_style() {
        let db = MockDatabase::builder()
            .with_table(Table::new(
                "t",
                vec![Column::new("id", "integer").primary()],
            ))
            .build();

        let commented = translator(&MockPromptClient::new(), db.clone());
        assert_eq!(
            commented.database_ddl().await.unwrap(),
            "CREATE TABLE t (\nid integer PRIMARY KEY\n)"
        );

        let inline = QueryTranslator::builder()
            .database(Arc::new(db))
            .llm(Arc::new(MockPromptClient::new()))
            .ddl_style(DdlStyle::InlineKeys)
            .build()
            .unwrap();
        assert!(inline
            .database_ddl()
            .await
            .unwrap()
            .contains("    primary key (id)"));
    }

    #[tokio::test]
    async fn generation_reply_without_block_is_no_sql() {
        let llm = MockPromptClient::new()
            .respond_to("Add comments", "CREATE TABLE t (id integer) -- ids")
            .respond_to("exactly one SQL code snippet", "I cannot help with that.");
        let db = MockDatabase::builder()
            .with_table(Table::new("t", vec![Column::new("id", "integer")]))
            .build();

        assert!(matches!(
            translator(&llm, db).translate_to_sql("anything").await,
            Err(QueryError::NoSqlExtracted)
        ));
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        struct Stalled;

        #[async_trait::async_trait]
        impl PromptClient for Stalled {
            fn name(&self) -> &str {
                "stalled"
            }

            async fn ask(&self, _: &Conversation) -> Result<String, PromptFailure> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(String::new())
            }
        }

        let limit = Duration::from_millis(50);
        let translator = QueryTranslator::builder()
            .database(Arc::new(MockDatabase::new()))
            .llm(Arc::new(Stalled))
            .call_timeout(Some(limit))
            .build()
            .unwrap();

        assert!(matches!(
            translator.enrich_ddl("CREATE TABLE t", false).await,
            Err(QueryError::Prompt(PromptFailure::Timeout(l))) if l == limit
        ));
    }

    #[tokio::test]
    async fn slow_database_times_out() {
        let limit = Duration::from_millis(50);
        let translator = QueryTranslator::builder()
            .database(Arc::new(MockDatabase::new().with_latency(500)))
            .llm(Arc::new(MockPromptClient::new()))
            .call_timeout(Some(limit))
            .build()
            .unwrap();

        assert_eq!(
            translator.execute("SELECT 1").await,
            Err(ExecuteError::Timeout(limit))
        );
    }
}
