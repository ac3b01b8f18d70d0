pub mod analyze;

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use triage_core::StoredReport;

use crate::{error_handling::AppResult, AppState};

pub use analyze::{analyze_get, analyze_post};

#[derive(Debug, Deserialize)]
pub struct ReportsQuery {
    pub limit: Option<usize>,
}

/// Most recent stored reports, newest first.
pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportsQuery>,
) -> AppResult<Json<Vec<StoredReport>>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 500);
    Ok(Json(state.store.recent(limit).await?))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.orchestrator.provider_name(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
