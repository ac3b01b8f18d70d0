use crate::ai_provider::{create_provider, PromptBuilder, ReasoningProvider, ReasoningReply};
use crate::cluster::{ClusterAggregator, ClusterSummary};
use crate::config::AppConfig;
use crate::decision::{AnalysisVerdict, DecisionRanker};
use crate::metrics::Metrics;
use crate::output::{DefaultRenderer, OutputKind, RenderError, RenderedReport, ReportRenderer};
use crate::parser::parse_entries;
use crate::storage::{ReportRecord, ReportStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const NO_LOGS_MESSAGE: &str = "No logs found to analyze.";
pub const FAILED_MESSAGE: &str = "An error occurred during analysis.";

/// Caller-visible result of one analysis, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Success(AnalysisVerdict),
    NoLogs {
        message: String,
    },
    #[serde(rename = "error")]
    Failed {
        message: String,
        error: String,
    },
}

impl AnalysisOutcome {
    pub fn no_logs() -> Self {
        AnalysisOutcome::NoLogs {
            message: NO_LOGS_MESSAGE.to_string(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        AnalysisOutcome::Failed {
            message: FAILED_MESSAGE.to_string(),
            error: error.into(),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            AnalysisOutcome::Success(_) => "success",
            AnalysisOutcome::NoLogs { .. } => "no_logs",
            AnalysisOutcome::Failed { .. } => "error",
        }
    }

    pub fn verdict(&self) -> Option<&AnalysisVerdict> {
        match self {
            AnalysisOutcome::Success(verdict) => Some(verdict),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success(_))
    }
}

/// A rendered report and the outcome it was rendered from.
#[derive(Debug)]
pub struct RenderedAnalysis {
    pub outcome: AnalysisOutcome,
    pub report: RenderedReport,
}

/// Runs clustering, prompting, reasoning and ranking for one log batch, then
/// hands the verdict to the renderer and the report store.
///
/// Holds no per-request state, so one instance can serve concurrent calls.
pub struct AnalysisOrchestrator {
    aggregator: ClusterAggregator,
    prompts: PromptBuilder,
    provider: Arc<dyn ReasoningProvider>,
    ranker: DecisionRanker,
    renderer: Arc<dyn ReportRenderer>,
    store: Option<Arc<dyn ReportStore>>,
}

impl AnalysisOrchestrator {
    pub fn new(config: &AppConfig, provider: Arc<dyn ReasoningProvider>) -> Self {
        Self {
            aggregator: ClusterAggregator::new(&config.analysis),
            prompts: PromptBuilder::new(config.analysis.max_prompt_clusters),
            provider,
            ranker: DecisionRanker::default(),
            renderer: Arc::new(DefaultRenderer::default()),
            store: None,
        }
    }

    /// Orchestrator with the provider the configuration selects.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config, create_provider(&config.reasoning, config.fallback_on_error))
    }

    pub fn with_store(mut self, store: Arc<dyn ReportStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_ranker(mut self, ranker: DecisionRanker) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.get_provider_name()
    }

    pub async fn run(&self, lines: &[String], metrics: &Metrics) -> AnalysisOutcome {
        let (outcome, record) = self.evaluate(lines, metrics).await;
        if let Some(record) = record {
            self.persist(&record).await;
        }
        outcome
    }

    /// Run an analysis and render it. Only a render failure is an error; the
    /// analysis itself always yields an outcome, and a successful one is
    /// stored whether or not rendering succeeds.
    ///
    /// A failed analysis is always rendered as JSON.
    pub async fn run_rendered(
        &self,
        lines: &[String],
        metrics: &Metrics,
        kind: OutputKind,
    ) -> Result<RenderedAnalysis, RenderError> {
        let (outcome, record) = self.evaluate(lines, metrics).await;
        let kind = match outcome {
            AnalysisOutcome::Failed { .. } => OutputKind::Json,
            _ => kind,
        };
        let rendered = self.renderer.render(&outcome, kind).await;

        if let Some(mut record) = record {
            if let Ok(RenderedReport::Document { file_name, .. }) = &rendered {
                record.report_path = Some(file_name.clone());
            }
            self.persist(&record).await;
        }

        match rendered {
            Ok(report) => Ok(RenderedAnalysis { outcome, report }),
            Err(e) => {
                error!("Failed to render {} report: {}", kind, e);
                Err(e)
            }
        }
    }

    /// The outcome, plus the record to store when there is a verdict.
    async fn evaluate(
        &self,
        lines: &[String],
        metrics: &Metrics,
    ) -> (AnalysisOutcome, Option<ReportRecord>) {
        if lines.iter().all(|line| line.trim().is_empty()) {
            info!("No log lines supplied, skipping analysis");
            return (AnalysisOutcome::no_logs(), None);
        }

        let text = lines.join("\n");
        let entries: Vec<_> = parse_entries(&text).collect();
        if entries.is_empty() {
            info!("No timestamped entries among {} lines, skipping analysis", lines.len());
            return (AnalysisOutcome::no_logs(), None);
        }

        let clusters = self.aggregator.aggregate(entries);
        let summary = ClusterSummary::from_clusters(lines.len(), &clusters);
        info!(
            "Clustered {} entries from {} lines into {} clusters",
            summary.total_entries, summary.total_lines, summary.unique_clusters
        );

        let prompt = self.prompts.build(&clusters, metrics);
        debug!(
            "Prompt built ({} chars) for provider {}",
            prompt.len(),
            self.provider_name()
        );

        let reply = self.provider.analyze(&prompt).await;
        let verdict = match &reply {
            ReasoningReply::Unavailable { error } => {
                error!("Reasoning service unavailable and fallback disabled: {}", error);
                return (AnalysisOutcome::failed(error.clone()), None);
            }
            ReasoningReply::Malformed { error, .. } => {
                warn!("Reasoning reply could not be parsed: {}", error);
                self.ranker.decide_reply(&reply, metrics)
            }
            _ => self.ranker.decide_reply(&reply, metrics),
        }
        .with_cluster_summary(summary);

        info!(
            "Verdict: '{}' (confidence {:.2}, source {:?})",
            verdict.likely_cause, verdict.confidence, verdict.reply_source
        );

        let record = ReportRecord::from_verdict(&verdict, lines, metrics);
        (AnalysisOutcome::Success(verdict), Some(record))
    }

    // Store failures are logged and never reach the caller.
    async fn persist(&self, record: &ReportRecord) {
        let Some(store) = &self.store else {
            return;
        };
        match store.append(record).await {
            Ok(()) => debug!("Report stored"),
            Err(e) => error!("Failed to store report: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_provider::{OfflineProvider, ProposalSet};
    use crate::decision::ReplySource;
    use crate::output::DOCUMENT_FILE_NAME;
    use crate::storage::{MemoryReportStore, StoreError, StoredReport};
    use assert_matches::assert_matches;
    use std::sync::Mutex;

    /// Returns a canned reply and records the prompt it was given.
    struct ScriptedProvider {
        reply: ReasoningReply,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(reply: ReasoningReply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl ReasoningProvider for ScriptedProvider {
        async fn analyze(&self, prompt: &str) -> ReasoningReply {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }

        fn get_provider_name(&self) -> &str {
            "scripted"
        }
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl ReportStore for FailingStore {
        async fn append(&self, _record: &ReportRecord) -> Result<(), StoreError> {
            Err(StoreError::Database("disk I/O error".to_string()))
        }

        async fn recent(&self, _limit: usize) -> Result<Vec<StoredReport>, StoreError> {
            Err(StoreError::Database("disk I/O error".to_string()))
        }
    }

    /// Answers documents with a fixed file, or fails every render.
    struct FixedRenderer {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ReportRenderer for FixedRenderer {
        async fn render(
            &self,
            outcome: &AnalysisOutcome,
            kind: OutputKind,
        ) -> Result<RenderedReport, RenderError> {
            if self.fail {
                return Err(RenderError::Converter("converter exited with 1".to_string()));
            }
            match kind {
                OutputKind::Document => Ok(RenderedReport::Document {
                    file_name: DOCUMENT_FILE_NAME.to_string(),
                    bytes: b"PK".to_vec(),
                }),
                _ => Ok(RenderedReport::Inline {
                    content_type: "application/json",
                    body: serde_json::to_string(outcome)?,
                }),
            }
        }
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn db_lines() -> Vec<String> {
        lines(&[
            "[2024-01-01 10:00:00] ERROR Connection refused to db:5432",
            "[2024-01-01 10:01:00] ERROR Connection refused to db:5433",
        ])
    }

    #[tokio::test]
    async fn test_empty_input_is_no_logs() {
        let orchestrator =
            AnalysisOrchestrator::new(&AppConfig::default(), Arc::new(OfflineProvider));
        assert_eq!(orchestrator.run(&[], &Metrics::new()).await, AnalysisOutcome::no_logs());
        assert_eq!(
            orchestrator.run(&lines(&["", "   "]), &Metrics::new()).await.status(),
            "no_logs"
        );
        assert_eq!(
            orchestrator.run(&lines(&["no header here"]), &Metrics::new()).await.status(),
            "no_logs"
        );
    }

    #[tokio::test]
    async fn test_end_to_end_with_service_reply() {
        let provider = ScriptedProvider::new(ReasoningReply::from_text(
            r#"{"root_causes":[{"cause":"Database connection timeout","description":"db down","confidence":0.85,"severity":"Critical"}],
                "recommendations":["Restart the database"]}"#,
        ));
        let store = Arc::new(MemoryReportStore::new());
        let orchestrator = AnalysisOrchestrator::new(&AppConfig::default(), provider.clone())
            .with_store(store.clone());

        let outcome = orchestrator
            .run(&db_lines(), &Metrics::new().with("latency", 1500))
            .await;

        let verdict = assert_matches!(outcome, AnalysisOutcome::Success(v) => v);
        assert_eq!(verdict.likely_cause, "Database connection timeout");
        assert_eq!(verdict.confidence, 1.0);
        assert_eq!(verdict.next_steps, "URGENT: Restart the database");
        assert_eq!(verdict.reply_source, ReplySource::Service);
        assert_eq!(verdict.cluster_summary.total_lines, 2);
        assert_eq!(verdict.cluster_summary.total_entries, 2);
        assert_eq!(verdict.cluster_summary.unique_clusters, 1);

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("- [Count: 2, Severity: High]"));
        assert!(prompts[0].contains("\"latency\": 1500"));

        let stored = store.recent(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].record.cause, "Database connection timeout");
        assert_eq!(stored[0].record.raw_logs, db_lines());
    }

    #[tokio::test]
    async fn test_offline_provider_yields_marked_fallback() {
        let orchestrator = AnalysisOrchestrator::from_config(&AppConfig::default());
        assert_eq!(orchestrator.provider_name(), "offline");

        let outcome = orchestrator.run(&db_lines(), &Metrics::new()).await;
        let verdict = assert_matches!(outcome, AnalysisOutcome::Success(v) => v);
        assert!(verdict.is_fallback());
        assert_eq!(verdict.candidates.len(), 2);
        assert_eq!(verdict.likely_cause, "Missing Bugsnag Driver");
    }

    #[tokio::test]
    async fn test_store_failure_does_not_change_verdict() {
        let reply = ReasoningReply::Valid(ProposalSet::fallback());
        let with_failing =
            AnalysisOrchestrator::new(&AppConfig::default(), ScriptedProvider::new(reply.clone()))
                .with_store(Arc::new(FailingStore));
        let without_store =
            AnalysisOrchestrator::new(&AppConfig::default(), ScriptedProvider::new(reply));

        let a = with_failing.run(&db_lines(), &Metrics::new()).await;
        let b = without_store.run(&db_lines(), &Metrics::new()).await;

        let (a, b) = (a.verdict().unwrap(), b.verdict().unwrap());
        assert_eq!(a.likely_cause, b.likely_cause);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.next_steps, b.next_steps);
        assert_eq!(a.candidates, b.candidates);
    }

    #[tokio::test]
    async fn test_unavailable_service_fails_outcome() {
        let provider = ScriptedProvider::new(ReasoningReply::Unavailable {
            error: "AI Service unavailable: HTTP 503: down".to_string(),
        });
        let store = Arc::new(MemoryReportStore::new());
        let orchestrator =
            AnalysisOrchestrator::new(&AppConfig::default(), provider).with_store(store.clone());

        let outcome = orchestrator.run(&db_lines(), &Metrics::new()).await;
        assert_matches!(outcome, AnalysisOutcome::Failed { ref message, ref error } => {
            assert_eq!(message, FAILED_MESSAGE);
            assert!(error.contains("503"));
        });
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_surfaced() {
        let provider =
            ScriptedProvider::new(ReasoningReply::from_text("I think it is the database"));
        let orchestrator = AnalysisOrchestrator::new(&AppConfig::default(), provider);

        let outcome = orchestrator.run(&db_lines(), &Metrics::new()).await;
        let verdict = assert_matches!(outcome, AnalysisOutcome::Success(v) => v);
        assert_eq!(verdict.reply_source, ReplySource::Malformed);
        assert_eq!(verdict.likely_cause, "Unknown");
        assert_eq!(
            verdict.diagnostic.and_then(|d| d.raw_text).as_deref(),
            Some("I think it is the database")
        );
    }

    #[tokio::test]
    async fn test_document_export_records_report_path() {
        let store = Arc::new(MemoryReportStore::new());
        let orchestrator =
            AnalysisOrchestrator::new(&AppConfig::default(), Arc::new(OfflineProvider))
                .with_renderer(Arc::new(FixedRenderer { fail: false }))
            .with_store(store.clone());

        let rendered = orchestrator
            .run_rendered(&db_lines(), &Metrics::new(), OutputKind::Document)
            .await
            .unwrap();
        assert!(rendered.outcome.is_success());
        assert_matches!(rendered.report, RenderedReport::Document { .. });

        orchestrator.run(&db_lines(), &Metrics::new()).await;

        let stored = store.recent(10).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].record.report_path, None);
        assert_eq!(stored[1].record.report_path.as_deref(), Some(DOCUMENT_FILE_NAME));
    }

    #[tokio::test]
    async fn test_failed_outcome_renders_as_json() {
        let provider = ScriptedProvider::new(ReasoningReply::Unavailable {
            error: "AI Service unavailable: HTTP 503: down".to_string(),
        });
        let orchestrator = AnalysisOrchestrator::new(&AppConfig::default(), provider)
            .with_renderer(Arc::new(FixedRenderer { fail: false }));

        let rendered = orchestrator
            .run_rendered(&db_lines(), &Metrics::new(), OutputKind::Document)
            .await
            .unwrap();
        assert_eq!(rendered.outcome.status(), "error");
        assert_matches!(
            rendered.report,
            RenderedReport::Inline { content_type: "application/json", .. }
        );
    }

    #[tokio::test]
    async fn test_render_failure_still_stores_verdict() {
        let store = Arc::new(MemoryReportStore::new());
        let orchestrator =
            AnalysisOrchestrator::new(&AppConfig::default(), Arc::new(OfflineProvider))
                .with_renderer(Arc::new(FixedRenderer { fail: true }))
            .with_store(store.clone());

        let result = orchestrator
            .run_rendered(&db_lines(), &Metrics::new(), OutputKind::Html)
            .await;
        assert_matches!(result, Err(RenderError::Converter(_)));
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn test_outcome_status_tags() {
        let json = serde_json::to_value(AnalysisOutcome::no_logs()).unwrap();
        assert_eq!(json["status"], "no_logs");
        assert_eq!(json["message"], NO_LOGS_MESSAGE);

        let json = serde_json::to_value(AnalysisOutcome::failed("boom")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");
    }
}
