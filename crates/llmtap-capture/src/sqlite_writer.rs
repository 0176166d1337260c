//! SQLite call row writer
//!
//! One `calls` table holds every persisted row. Writes are serialized through
//! an internal lock; reads (listing, single-call lookup, aggregates) go
//! straight to the pool.

#[cfg(feature = "sqlite-writer")]
use crate::config::SqliteConfig;
#[cfg(feature = "sqlite-writer")]
use crate::query::{CallAggregates, CallFilter, CallSummary, JsonColumn, SearchResults, StoredCall};
#[cfg(feature = "sqlite-writer")]
use crate::writer::{RowSink, WriterError, WriterResult};
#[cfg(feature = "sqlite-writer")]
use async_trait::async_trait;
#[cfg(feature = "sqlite-writer")]
use llmtap_core::{CallRow, ColumnValue, row::CALL_COLUMNS};
#[cfg(feature = "sqlite-writer")]
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
#[cfg(feature = "sqlite-writer")]
use sqlx::{Row, Sqlite};
#[cfg(feature = "sqlite-writer")]
use std::collections::HashMap;
#[cfg(feature = "sqlite-writer")]
use std::path::Path;
#[cfg(feature = "sqlite-writer")]
use tokio::sync::Mutex;

#[cfg(feature = "sqlite-writer")]
const SCHEMA_VERSION: i32 = 1;

#[cfg(feature = "sqlite-writer")]
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[cfg(feature = "sqlite-writer")]
pub struct SqliteWriter {
    pool: SqlitePool,
    insert_sql: String,
    write_lock: Mutex<()>,
}

#[cfg(feature = "sqlite-writer")]
impl SqliteWriter {
    pub async fn new(db_path: &Path) -> WriterResult<Self> {
        Self::with_max_connections(db_path, DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn from_config(config: &SqliteConfig) -> WriterResult<Self> {
        Self::with_max_connections(&config.path, config.max_connections).await
    }

    /// Open a database that must already exist
    pub async fn open_existing(db_path: &Path) -> WriterResult<Self> {
        if !tokio::fs::try_exists(db_path).await? {
            return Err(WriterError::NotInitialized);
        }
        Self::new(db_path).await
    }

    pub async fn with_max_connections(db_path: &Path, max_connections: u32) -> WriterResult<Self> {
        // Create directory if needed
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(WriterError::Io)?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(db_path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal),
            )
            .await
            .map_err(|e| WriterError::Database(e.to_string()))?;

        // Initialize schema
        Self::initialize_schema(&pool).await?;

        // Verify schema version
        let version: i32 = sqlx::query_scalar("SELECT version FROM schema_version")
            .fetch_one(&pool)
            .await
            .map_err(|e| WriterError::Database(e.to_string()))?;

        if version != SCHEMA_VERSION {
            return Err(WriterError::Database(format!(
                "Unsupported schema version: {}",
                version
            )));
        }

        tracing::debug!(path = %db_path.display(), "Opened SQLite call store");

        Ok(Self {
            pool,
            insert_sql: insert_statement(),
            write_lock: Mutex::new(()),
        })
    }

    async fn initialize_schema(pool: &SqlitePool) -> WriterResult<()> {
        // Schema version table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| WriterError::Database(e.to_string()))?;

        sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
            .bind(SCHEMA_VERSION)
            .execute(pool)
            .await
            .map_err(|e| WriterError::Database(e.to_string()))?;

        // Calls table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS calls (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                model_id TEXT NOT NULL,
                tags TEXT,
                input_text TEXT,
                input_json TEXT,
                prompt_json TEXT,
                output_text TEXT,
                output_json TEXT,
                content_json TEXT,
                reasoning_text TEXT,
                reasoning_json TEXT,
                input_tokens INTEGER,
                output_tokens INTEGER,
                total_tokens INTEGER,
                cached_input_tokens INTEGER,
                reasoning_tokens INTEGER,
                output_reasoning_tokens INTEGER,
                request_tools_json TEXT,
                response_tools_json TEXT,
                tool_count INTEGER,
                tool_names_json TEXT,
                parallel_tool_calls INTEGER,
                temperature REAL,
                top_p REAL,
                max_output_tokens INTEGER,
                finish_reason TEXT,
                latency_ms INTEGER,
                warnings_json TEXT,
                request_id TEXT,
                response_id TEXT,
                headers_json TEXT,
                meta_json TEXT,
                error_json TEXT
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| WriterError::Database(e.to_string()))?;

        // Indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_calls_timestamp ON calls(timestamp DESC)")
            .execute(pool)
            .await
            .map_err(|e| WriterError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_calls_model ON calls(model_id, timestamp DESC)")
            .execute(pool)
            .await
            .map_err(|e| WriterError::Database(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_calls_finish_reason ON calls(finish_reason, timestamp DESC)",
        )
        .execute(pool)
        .await
        .map_err(|e| WriterError::Database(e.to_string()))?;

        Ok(())
    }

    /// List calls matching `filter`, newest first
    pub async fn list_calls(&self, filter: &CallFilter) -> WriterResult<SearchResults<CallSummary>> {
        filter.validate().map_err(WriterError::InvalidData)?;

        let (where_sql, binds) = where_clause(filter);

        let count_sql = format!("SELECT COUNT(*) FROM calls{}", where_sql);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for value in &binds {
            count_query = count_query.bind(value.as_str());
        }
        let total_count = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| WriterError::Database(e.to_string()))?;

        let list_sql = format!(
            r#"
            SELECT id, timestamp, model_id, finish_reason, input_tokens, output_tokens,
                   total_tokens, latency_ms, tool_count, error_json IS NOT NULL AS is_error
            FROM calls{}
            ORDER BY timestamp DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            where_sql
        );
        let mut list_query = sqlx::query(&list_sql);
        for value in &binds {
            list_query = list_query.bind(value.as_str());
        }
        let rows = list_query
            .bind(i64::try_from(filter.page_size).unwrap_or(i64::MAX))
            .bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| WriterError::Database(e.to_string()))?;

        let items = rows
            .iter()
            .map(|row| {
                Ok(CallSummary {
                    id: column(row, "id")?,
                    timestamp: column(row, "timestamp")?,
                    model_id: column(row, "model_id")?,
                    finish_reason: column(row, "finish_reason")?,
                    input_tokens: column(row, "input_tokens")?,
                    output_tokens: column(row, "output_tokens")?,
                    total_tokens: column(row, "total_tokens")?,
                    latency_ms: column(row, "latency_ms")?,
                    tool_count: column(row, "tool_count")?,
                    is_error: column::<i64>(row, "is_error")? != 0,
                })
            })
            .collect::<WriterResult<Vec<_>>>()?;

        Ok(SearchResults::new(
            items,
            total_count.max(0) as u64,
            filter.page,
            filter.page_size,
        ))
    }

    /// Fetch one call by id
    pub async fn get_call(&self, id: &str) -> WriterResult<Option<StoredCall>> {
        let row = sqlx::query("SELECT * FROM calls WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| WriterError::Database(e.to_string()))?;

        row.as_ref().map(stored_call).transpose()
    }

    /// Totals across every persisted call
    pub async fn aggregate_stats(&self) -> WriterResult<CallAggregates> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_calls,
                COALESCE(SUM(CASE WHEN error_json IS NOT NULL THEN 1 ELSE 0 END), 0) AS error_calls,
                COALESCE(SUM(input_tokens), 0) AS total_input_tokens,
                COALESCE(SUM(output_tokens), 0) AS total_output_tokens,
                COALESCE(SUM(total_tokens), 0) AS total_tokens,
                COALESCE(AVG(latency_ms), 0.0) AS avg_latency_ms
            FROM calls
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| WriterError::Database(e.to_string()))?;

        let by_model = sqlx::query(
            "SELECT model_id, COUNT(*) AS calls FROM calls GROUP BY model_id ORDER BY calls DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| WriterError::Database(e.to_string()))?;

        let mut calls_by_model = HashMap::new();
        for model in &by_model {
            let model_id: String = column(model, "model_id")?;
            let calls: i64 = column(model, "calls")?;
            calls_by_model.insert(model_id, calls.max(0) as u64);
        }

        Ok(CallAggregates {
            total_calls: column::<i64>(&row, "total_calls")?.max(0) as u64,
            error_calls: column::<i64>(&row, "error_calls")?.max(0) as u64,
            total_input_tokens: column::<i64>(&row, "total_input_tokens")?.max(0) as u64,
            total_output_tokens: column::<i64>(&row, "total_output_tokens")?.max(0) as u64,
            total_tokens: column::<i64>(&row, "total_tokens")?.max(0) as u64,
            avg_latency_ms: column(&row, "avg_latency_ms")?,
            calls_by_model,
        })
    }
}

#[cfg(feature = "sqlite-writer")]
#[async_trait]
impl RowSink for SqliteWriter {
    async fn save(&self, row: &CallRow) -> WriterResult<()> {
        let mut query = sqlx::query(&self.insert_sql);
        for (_, value) in row.columns() {
            query = match value {
                ColumnValue::Null => query.bind(None::<String>),
                ColumnValue::Integer(v) => query.bind(v),
                ColumnValue::Real(v) => query.bind(v),
                ColumnValue::Text(v) => query.bind(v),
            };
        }

        let _guard = self.write_lock.lock().await;
        query
            .execute(&self.pool)
            .await
            .map_err(|e| WriterError::Database(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(feature = "sqlite-writer")]
fn insert_statement() -> String {
    let placeholders = vec!["?"; CALL_COLUMNS.len()].join(", ");
    format!(
        "INSERT INTO calls ({}) VALUES ({})",
        CALL_COLUMNS.join(", "),
        placeholders
    )
}

/// Build the WHERE clause for `filter` and the values to bind, in order
#[cfg(feature = "sqlite-writer")]
fn where_clause(filter: &CallFilter) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    if !filter.model_ids.is_empty() {
        conditions.push(format!(
            "model_id IN ({})",
            vec!["?"; filter.model_ids.len()].join(", ")
        ));
        binds.extend(filter.model_ids.iter().cloned());
    }

    if !filter.finish_reasons.is_empty() {
        conditions.push(format!(
            "finish_reason IN ({})",
            vec!["?"; filter.finish_reasons.len()].join(", ")
        ));
        binds.extend(filter.finish_reasons.iter().cloned());
    }

    if filter.errors_only {
        conditions.push("error_json IS NOT NULL".to_string());
    }

    if let Some(tag) = &filter.tag {
        conditions.push(
            "EXISTS (SELECT 1 FROM json_each(calls.tags) WHERE json_each.value = ?)".to_string(),
        );
        binds.push(tag.clone());
    }

    if conditions.is_empty() {
        (String::new(), binds)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), binds)
    }
}

#[cfg(feature = "sqlite-writer")]
fn column<'r, T>(row: &'r SqliteRow, name: &str) -> WriterResult<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| WriterError::Database(e.to_string()))
}

#[cfg(feature = "sqlite-writer")]
fn json_column(row: &SqliteRow, name: &str) -> WriterResult<Option<JsonColumn>> {
    Ok(JsonColumn::decode(column(row, name)?))
}

#[cfg(feature = "sqlite-writer")]
fn stored_call(row: &SqliteRow) -> WriterResult<StoredCall> {
    Ok(StoredCall {
        id: column(row, "id")?,
        timestamp: column(row, "timestamp")?,
        model_id: column(row, "model_id")?,
        tags: json_column(row, "tags")?,
        input_text: column(row, "input_text")?,
        input_json: json_column(row, "input_json")?,
        prompt_json: json_column(row, "prompt_json")?,
        output_text: column(row, "output_text")?,
        output_json: json_column(row, "output_json")?,
        content_json: json_column(row, "content_json")?,
        reasoning_text: column(row, "reasoning_text")?,
        reasoning_json: json_column(row, "reasoning_json")?,
        input_tokens: column(row, "input_tokens")?,
        output_tokens: column(row, "output_tokens")?,
        total_tokens: column(row, "total_tokens")?,
        cached_input_tokens: column(row, "cached_input_tokens")?,
        reasoning_tokens: column(row, "reasoning_tokens")?,
        output_reasoning_tokens: column(row, "output_reasoning_tokens")?,
        request_tools_json: json_column(row, "request_tools_json")?,
        response_tools_json: json_column(row, "response_tools_json")?,
        tool_count: column(row, "tool_count")?,
        tool_names_json: json_column(row, "tool_names_json")?,
        parallel_tool_calls: column::<Option<i64>>(row, "parallel_tool_calls")?.map(|v| v != 0),
        temperature: column(row, "temperature")?,
        top_p: column(row, "top_p")?,
        max_output_tokens: column(row, "max_output_tokens")?,
        finish_reason: column(row, "finish_reason")?,
        latency_ms: column(row, "latency_ms")?,
        warnings_json: json_column(row, "warnings_json")?,
        request_id: column(row, "request_id")?,
        response_id: column(row, "response_id")?,
        headers_json: json_column(row, "headers_json")?,
        meta_json: json_column(row, "meta_json")?,
        error_json: json_column(row, "error_json")?,
    })
}

#[cfg(test)]
#[cfg(feature = "sqlite-writer")]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use llmtap_core::{ErrorPayload, row::FINISH_REASON_ERROR};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn row(id: &str, minute: i64, model_id: &str) -> CallRow {
        let started = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap() + Duration::minutes(minute);
        let mut row = CallRow::new(id, started, model_id);
        row.output_text = Some("hi".to_string());
        row.finish_reason = Some("stop".to_string());
        row.usage.input_tokens = Some(10);
        row.usage.output_tokens = Some(5);
        row.usage.total_tokens = Some(15);
        row.tool_count = Some(0);
        row.latency_ms = 100;
        row
    }

    fn error_row(id: &str, minute: i64) -> CallRow {
        let mut row = CallRow::new(
            id,
            Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap() + Duration::minutes(minute),
            "gpt-4o",
        );
        row.finish_reason = Some(FINISH_REASON_ERROR.to_string());
        row.error_json = Some(ErrorPayload::new("rate limited"));
        row.latency_ms = 300;
        row
    }

    #[tokio::test]
    async fn test_sqlite_writer_schema_creation() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("calls.db");

        let writer = SqliteWriter::new(&db_path).await.unwrap();
        assert!(db_path.exists());

        // Verify schema version
        let version: i32 = sqlx::query_scalar("SELECT version FROM schema_version")
            .fetch_one(&writer.pool)
            .await
            .unwrap();
        assert_eq!(version, 1);

        let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('calls')")
            .fetch_all(&writer.pool)
            .await
            .unwrap();
        assert_eq!(columns, CALL_COLUMNS.to_vec());

        // Reopening an existing store keeps the schema
        drop(writer);
        assert!(SqliteWriter::open_existing(&db_path).await.is_ok());
    }

    #[tokio::test]
    async fn test_open_existing_missing_database() {
        let dir = tempdir().unwrap();
        let result = SqliteWriter::open_existing(&dir.path().join("absent.db")).await;
        assert!(matches!(result, Err(WriterError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_save_and_get_call() {
        let dir = tempdir().unwrap();
        let writer = SqliteWriter::new(&dir.path().join("calls.db")).await.unwrap();

        let mut call = row("call-1", 0, "gpt-4o");
        call.tags = Some(vec!["eval".to_string()]);
        call.temperature = Some(0.5);
        call.parallel_tool_calls = Some(true);
        call.tool_names_json = Some(vec!["get_weather".to_string()]);
        call.meta_json = Some(json!({"provider": "openai"}));
        writer.save(&call).await.unwrap();

        let stored = writer.get_call("call-1").await.unwrap().unwrap();
        assert_eq!(stored.model_id, "gpt-4o");
        assert_eq!(stored.timestamp, call.timestamp.to_rfc3339());
        assert_eq!(stored.output_text.as_deref(), Some("hi"));
        assert_eq!(stored.total_tokens, Some(15));
        assert_eq!(stored.cached_input_tokens, None);
        assert_eq!(stored.temperature, Some(0.5));
        assert_eq!(stored.parallel_tool_calls, Some(true));
        assert_eq!(stored.tags, Some(JsonColumn::Parsed(json!(["eval"]))));
        assert_eq!(
            stored.tool_names_json,
            Some(JsonColumn::Parsed(json!(["get_weather"])))
        );
        assert_eq!(
            stored.meta_json,
            Some(JsonColumn::Parsed(json!({"provider": "openai"})))
        );
        assert!(!stored.is_error());

        assert!(writer.get_call("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unparseable_json_column_reads_back_raw() {
        let dir = tempdir().unwrap();
        let writer = SqliteWriter::new(&dir.path().join("calls.db")).await.unwrap();

        writer.save(&row("raw", 0, "gpt-4o")).await.unwrap();
        sqlx::query("UPDATE calls SET input_json = ? WHERE id = ?")
            .bind("{\"messages\": [truncated")
            .bind("raw")
            .execute(&writer.pool)
            .await
            .unwrap();

        let stored = writer.get_call("raw").await.unwrap().unwrap();
        assert_eq!(
            stored.input_json,
            Some(JsonColumn::Raw("{\"messages\": [truncated".to_string()))
        );
    }

    #[tokio::test]
    async fn test_string_prompts_keep_their_type() {
        use crate::builder::{CallStart, RowBuilder};
        use llmtap_core::{CallParams, ModelInfo, ModelResponse};

        let dir = tempdir().unwrap();
        let writer = SqliteWriter::new(&dir.path().join("calls.db")).await.unwrap();
        let builder = RowBuilder::default();
        let response = ModelResponse::new(json!({"text": "ok"}));

        for prompt in ["true", "[1, 2]", "{\"a\": 1}", "Say hello"] {
            let call = CallStart::begin(ModelInfo::new("openai", "gpt-4o"), false);
            let params = CallParams::new(json!({"prompt": prompt}));
            let built = builder.build(&call, &params, &response);
            writer.save(&built).await.unwrap();

            let stored = writer.get_call(&built.id).await.unwrap().unwrap();
            assert_eq!(stored.prompt_json, Some(JsonColumn::Parsed(json!(prompt))));
        }
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let dir = tempdir().unwrap();
        let writer = SqliteWriter::new(&dir.path().join("calls.db")).await.unwrap();

        writer.save(&row("same", 0, "gpt-4o")).await.unwrap();
        let err = writer.save(&row("same", 1, "gpt-4o")).await.unwrap_err();
        assert!(matches!(err, WriterError::Database(_)));
    }

    #[tokio::test]
    async fn test_list_calls_filters_and_order() {
        let dir = tempdir().unwrap();
        let writer = SqliteWriter::new(&dir.path().join("calls.db")).await.unwrap();

        let mut tagged = row("a", 0, "gpt-4o");
        tagged.tags = Some(vec!["eval".to_string(), "nightly".to_string()]);
        writer.save(&tagged).await.unwrap();
        writer.save(&row("b", 1, "claude-3-5-sonnet")).await.unwrap();
        writer.save(&error_row("c", 2)).await.unwrap();

        let all = writer.list_calls(&CallFilter::default()).await.unwrap();
        assert_eq!(all.total_count, 3);
        let ids: Vec<&str> = all.items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert!(all.items[0].is_error);

        let by_model = writer
            .list_calls(&CallFilter::builder().model_id("gpt-4o").build())
            .await
            .unwrap();
        assert_eq!(by_model.total_count, 2);

        let errors = writer
            .list_calls(&CallFilter::builder().errors_only(true).build())
            .await
            .unwrap();
        assert_eq!(errors.items.len(), 1);
        assert_eq!(errors.items[0].finish_reason.as_deref(), Some("error"));

        let by_reason = writer
            .list_calls(&CallFilter::builder().finish_reason("stop").build())
            .await
            .unwrap();
        assert_eq!(by_reason.total_count, 2);

        let by_tag = writer
            .list_calls(&CallFilter::builder().tag("nightly").build())
            .await
            .unwrap();
        assert_eq!(by_tag.items.len(), 1);
        assert_eq!(by_tag.items[0].id, "a");

        let no_match = writer
            .list_calls(&CallFilter::builder().tag("night").build())
            .await
            .unwrap();
        assert_eq!(no_match.total_count, 0);
    }

    #[tokio::test]
    async fn test_list_calls_pagination() {
        let dir = tempdir().unwrap();
        let writer = SqliteWriter::new(&dir.path().join("calls.db")).await.unwrap();

        for i in 0..5 {
            writer.save(&row(&format!("call-{i}"), i, "gpt-4o")).await.unwrap();
        }

        let page = writer
            .list_calls(&CallFilter::builder().page(1).page_size(2).build())
            .await
            .unwrap();
        assert_eq!(page.total_count, 5);
        assert_eq!(page.total_pages, 3);
        let ids: Vec<&str> = page.items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["call-2", "call-1"]);
        assert!(page.has_next_page());

        let invalid = writer
            .list_calls(&CallFilter::builder().page_size(0).build())
            .await;
        assert!(matches!(invalid, Err(WriterError::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_aggregate_stats() {
        let dir = tempdir().unwrap();
        let writer = SqliteWriter::new(&dir.path().join("calls.db")).await.unwrap();

        let empty = writer.aggregate_stats().await.unwrap();
        assert_eq!(empty.total_calls, 0);
        assert_eq!(empty.avg_latency_ms, 0.0);

        writer.save(&row("a", 0, "gpt-4o")).await.unwrap();
        writer.save(&row("b", 1, "claude-3-5-sonnet")).await.unwrap();
        writer.save(&error_row("c", 2)).await.unwrap();

        let stats = writer.aggregate_stats().await.unwrap();
        assert_eq!(stats.total_calls, 3);
        assert_eq!(stats.error_calls, 1);
        assert_eq!(stats.total_input_tokens, 20);
        assert_eq!(stats.total_output_tokens, 10);
        assert_eq!(stats.total_tokens, 30);
        assert!((stats.avg_latency_ms - 500.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.calls_by_model.get("gpt-4o"), Some(&2));
        assert_eq!(stats.calls_by_model.get("claude-3-5-sonnet"), Some(&1));
    }

    #[tokio::test]
    async fn test_concurrent_saves() {
        let dir = tempdir().unwrap();
        let writer = Arc::new(SqliteWriter::new(&dir.path().join("calls.db")).await.unwrap());

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let writer = writer.clone();
                tokio::spawn(async move { writer.save(&row(&format!("c{i}"), i, "gpt-4o")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stats = writer.aggregate_stats().await.unwrap();
        assert_eq!(stats.total_calls, 20);
    }
}
