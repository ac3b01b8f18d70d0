use super::{ReportRecord, ReportStore, StoreError, StoredReport};
use crate::metrics::Metrics;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA_SQL: &str = include_str!("../../migrations/001_rca_reports.sql");

/// SQLite-backed report store over the `rca_reports` table.
#[derive(Clone)]
pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl SqliteReportStore {
    /// Open (creating if missing) a database file and ensure the schema.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        info!("Opening report database: {}", path.display());
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Connect using a `sqlite:` URL such as `DATABASE_URL`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database. A single connection, since every
    /// `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.create_schema().await?;
        Ok(store)
    }

    async fn create_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA_SQL
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n")
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            debug!("Executing: {}", &statement[..statement.len().min(80)]);
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl ReportStore for SqliteReportStore {
    async fn append(&self, record: &ReportRecord) -> Result<(), StoreError> {
        let raw_logs = serde_json::to_string(&record.raw_logs)?;
        let metrics = serde_json::to_string(&record.metrics)?;

        let result = sqlx::query(
            "INSERT INTO rca_reports
                (likely_cause, confidence, next_steps, raw_logs, metrics, report_path,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.cause)
        .bind(record.confidence)
        .bind(&record.next_steps)
        .bind(raw_logs)
        .bind(metrics)
        .bind(&record.report_path)
        .bind(record.created_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!("Stored report {}", result.last_insert_rowid());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredReport>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, likely_cause, confidence, next_steps, raw_logs, metrics, report_path,
                    created_at
             FROM rca_reports ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<StoredReport, StoreError> {
                let raw_logs: Option<String> = row.try_get("raw_logs")?;
                let metrics: Option<String> = row.try_get("metrics")?;
                let next_steps: Option<String> = row.try_get("next_steps")?;
                let created_at: DateTime<Utc> = row.try_get("created_at")?;

                Ok(StoredReport {
                    id: row.try_get("id")?,
                    record: ReportRecord {
                        cause: row.try_get("likely_cause")?,
                        confidence: row.try_get("confidence")?,
                        next_steps: next_steps.unwrap_or_default(),
                        raw_logs: match raw_logs {
                            Some(json) => serde_json::from_str(&json)?,
                            None => Vec::new(),
                        },
                        metrics: match metrics {
                            Some(json) => serde_json::from_str(&json)?,
                            None => Metrics::new(),
                        },
                        report_path: row.try_get("report_path")?,
                        created_at,
                    },
                })
            })
            .collect()
    }
}
