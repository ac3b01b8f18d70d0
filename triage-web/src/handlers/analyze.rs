use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use triage_core::input::split_lines;
use triage_core::{read_tail_lines, AnalysisOutcome, Metrics, OutputKind, RenderedReport};

use crate::{error_handling::AppError, AppState};

const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    pub format: Option<String>,
    pub lines: Option<usize>,
}

/// Logs may be posted as one blob of text or as individual lines.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LogsInput {
    Text(String),
    Lines(Vec<String>),
}

impl LogsInput {
    fn into_lines(self) -> Vec<String> {
        match self {
            LogsInput::Text(text) => split_lines(&text),
            LogsInput::Lines(lines) => lines,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeBody {
    #[serde(default)]
    pub logs: Option<LogsInput>,
    #[serde(default)]
    pub metrics: Option<Metrics>,
}

pub async fn analyze_get(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<Response, AppError> {
    analyze(state, query, AnalyzeBody::default()).await
}

pub async fn analyze_post(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeQuery>,
    body: Bytes,
) -> Result<Response, AppError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        AnalyzeBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::bad_request(format!("Invalid request body: {}", e)))?
    };
    analyze(state, query, body).await
}

async fn analyze(
    state: AppState,
    query: AnalyzeQuery,
    body: AnalyzeBody,
) -> Result<Response, AppError> {
    let kind = output_kind(query.format.as_deref());

    let (lines, metrics) = match body.logs {
        Some(logs) => (logs.into_lines(), body.metrics.unwrap_or_default()),
        None => {
            let path = state.config.log_path.clone();
            let count = state.config.lines_to_read(query.lines);
            tracing::debug!("Reading last {} lines of {}", count, path.display());
            let read = tokio::task::spawn_blocking(move || read_tail_lines(path, count)).await;
            let lines = match read {
                Ok(Ok(lines)) => lines,
                Ok(Err(e)) => {
                    return Ok(analysis_failed(format!("Failed to read application log: {}", e)))
                }
                Err(e) => return Ok(analysis_failed(format!("Log reader task failed: {}", e))),
            };
            (lines, body.metrics.unwrap_or_else(Metrics::last_logs_defaults))
        }
    };

    tracing::info!("Analyzing {} log lines (format: {})", lines.len(), kind);
    let rendered = match state.orchestrator.run_rendered(&lines, &metrics, kind).await {
        Ok(rendered) => rendered,
        Err(e) => return Ok(analysis_failed(e.to_string())),
    };

    let status = match rendered.outcome {
        AnalysisOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };

    let response = match rendered.report {
        RenderedReport::Inline { content_type, body } => {
            (status, [(header::CONTENT_TYPE, content_type.to_string())], body).into_response()
        }
        RenderedReport::Document { file_name, bytes } => (
            status,
            [
                (header::CONTENT_TYPE, DOCX_CONTENT_TYPE.to_string()),
                (header::CONTENT_DISPOSITION, format!("attachment; filename={}", file_name)),
            ],
            bytes,
        )
            .into_response(),
    };
    Ok(response)
}

/// Unknown formats are answered as JSON.
fn output_kind(format: Option<&str>) -> OutputKind {
    match format.map(str::parse::<OutputKind>) {
        Some(Ok(kind)) => kind,
        Some(Err(e)) => {
            tracing::warn!("{}; answering with json", e);
            OutputKind::Json
        }
        None => OutputKind::Json,
    }
}

fn analysis_failed(error: String) -> Response {
    tracing::error!("Analysis failed: {}", error);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(AnalysisOutcome::failed(error)),
    )
        .into_response()
}
