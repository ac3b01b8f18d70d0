pub mod ai_provider;
pub mod classification;
pub mod cluster;
pub mod config;
pub mod db_path;
pub mod decision;
pub mod input;
pub mod metrics;
pub mod normalizer;
pub mod orchestrator;
pub mod output;
pub mod parser;
pub mod storage;

pub use ai_provider::{
    create_provider, AIError, FallbackReason, OfflineProvider, PromptBuilder, ProposalSet,
    ReasoningProvider, ReasoningReply, RootCauseCandidate,
};
#[cfg(feature = "ai-providers")]
pub use ai_provider::GeminiProvider;
pub use classification::{classify, Severity};
pub use cluster::{Cluster, ClusterAggregator, ClusterKey, ClusterSummary};
pub use config::{AnalysisConfig, AppConfig, ConfigError, ReasoningConfig};
pub use decision::{AnalysisVerdict, CorrelationRule, DecisionRanker, MetricCondition, ReplySource};
pub use input::read_tail_lines;
pub use metrics::Metrics;
pub use normalizer::PatternNormalizer;
pub use orchestrator::{AnalysisOrchestrator, AnalysisOutcome, RenderedAnalysis};
pub use output::{DefaultRenderer, OutputKind, RenderError, RenderedReport, ReportRenderer};
pub use parser::{parse_entries, LogEntry};
pub use storage::{MemoryReportStore, ReportRecord, ReportStore, StoreError, StoredReport};
#[cfg(feature = "persistence")]
pub use storage::SqliteReportStore;
