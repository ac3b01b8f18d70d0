// Triage web adapter: exposes root cause analysis over HTTP.

pub mod config;
pub mod error_handling;
pub mod handlers;

pub use config::WebConfig;
pub use error_handling::{AppError, AppResult};

use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use triage_core::{AnalysisOrchestrator, DefaultRenderer, ReportStore, SqliteReportStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WebConfig>,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub store: Arc<dyn ReportStore>,
}

impl AppState {
    /// State backed by the configured SQLite database and reasoning provider.
    pub async fn new(config: WebConfig) -> anyhow::Result<Self> {
        if let Some(db_path) = config.database_url.strip_prefix("sqlite://") {
            if let Some(parent) = std::path::Path::new(db_path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store: Arc<dyn ReportStore> =
            Arc::new(SqliteReportStore::connect(&config.database_url).await?);
        let orchestrator = AnalysisOrchestrator::from_config(&config.analysis)
            .with_renderer(Arc::new(DefaultRenderer::new(&config.pandoc)))
            .with_store(store.clone());

        Ok(Self::from_parts(config, orchestrator, store))
    }

    pub fn from_parts(
        config: WebConfig,
        orchestrator: AnalysisOrchestrator,
        store: Arc<dyn ReportStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            store,
        }
    }
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/rca/analyze",
            get(handlers::analyze_get).post(handlers::analyze_post),
        )
        .route("/rca/reports", get(handlers::list_reports))
}

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

/// Bind the configured port and serve until the process stops.
pub async fn serve(config: WebConfig) -> anyhow::Result<()> {
    let port = config.port;
    let state = AppState::new(config).await?;
    tracing::info!(
        "Reasoning provider: {}",
        state.orchestrator.provider_name()
    );

    let app = create_app(state);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("Triage web server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
