#[cfg(feature = "persistence")]
pub mod sqlite;

#[cfg(feature = "persistence")]
pub use sqlite::SqliteReportStore;

use crate::decision::AnalysisVerdict;
use crate::metrics::Metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(feature = "persistence")]
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// One persisted analysis: the verdict headline plus the inputs it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub cause: String,
    pub confidence: f64,
    pub next_steps: String,
    pub raw_logs: Vec<String>,
    pub metrics: Metrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReportRecord {
    pub fn from_verdict(verdict: &AnalysisVerdict, raw_logs: &[String], metrics: &Metrics) -> Self {
        Self {
            cause: verdict.likely_cause.clone(),
            confidence: verdict.confidence,
            next_steps: verdict.next_steps.clone(),
            raw_logs: raw_logs.to_vec(),
            metrics: metrics.clone(),
            report_path: None,
            created_at: verdict.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReport {
    pub id: i64,
    #[serde(flatten)]
    pub record: ReportRecord,
}

/// Append-only sink for finished analyses.
#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    async fn append(&self, record: &ReportRecord) -> Result<(), StoreError>;

    /// Most recent reports, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<StoredReport>, StoreError>;
}

/// Process-local store, used by tests and when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: Mutex<Vec<ReportRecord>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.reports.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ReportStore for MemoryReportStore {
    async fn append(&self, record: &ReportRecord) -> Result<(), StoreError> {
        self.reports.lock().await.push(record.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredReport>, StoreError> {
        let reports = self.reports.lock().await;
        Ok(reports
            .iter()
            .enumerate()
            .rev()
            .take(limit)
            .map(|(i, record)| StoredReport {
                id: i as i64 + 1,
                record: record.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cause: &str) -> ReportRecord {
        ReportRecord {
            cause: cause.to_string(),
            confidence: 0.7,
            next_steps: "Check system logs.".to_string(),
            raw_logs: vec!["[2024-01-01 10:00:00] ERROR boom".to_string()],
            metrics: Metrics::new().with("latency", 12),
            report_path: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_recent_is_newest_first() {
        let store = MemoryReportStore::new();
        for cause in ["a", "b", "c"] {
            store.append(&record(cause)).await.unwrap();
        }

        let recent = store.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].record.cause, "c");
        assert_eq!(recent[0].id, 3);
        assert_eq!(recent[1].record.cause, "b");
        assert_eq!(store.len().await, 3);
    }
}
