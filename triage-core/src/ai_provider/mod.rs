use crate::config::ReasoningConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(feature = "ai-providers")]
pub mod gemini;
pub mod prompts;

#[cfg(feature = "ai-providers")]
pub use gemini::GeminiProvider;
pub use prompts::PromptBuilder;

pub const DEFAULT_SEVERITY: &str = "Low";
pub const UNSPECIFIED_CAUSE: &str = "Unspecified cause";

/// Transport-level failures talking to the reasoning service.
///
/// Messages never contain the request URL or the credential.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AIError {
    #[error("API request failed: {0}")]
    Request(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl AIError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AIError::Request(_) => true,
            AIError::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// One proposed root cause, validated and normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseCandidate {
    pub cause: String,
    pub description: String,
    pub confidence: f64,
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl RootCauseCandidate {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let cause = obj
            .get("cause")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNSPECIFIED_CAUSE)
            .to_string();
        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let confidence = obj
            .get("confidence")
            .and_then(value_as_f64)
            .map(clamp_confidence)
            .unwrap_or(0.0);
        let severity = obj
            .get("severity")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SEVERITY)
            .to_string();
        let correlation_id = obj.get("correlation_id").and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        Some(Self {
            cause,
            description,
            confidence,
            severity,
            correlation_id,
        })
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Structured proposals returned by the reasoning service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalSet {
    pub root_causes: Vec<RootCauseCandidate>,
    pub recommendations: Vec<String>,
}

impl ProposalSet {
    /// Defensive decode of an untrusted reply object. Missing fields default,
    /// unusable items are dropped, confidence is clamped to [0, 1].
    pub fn from_value(value: &Value) -> Self {
        let root_causes = value
            .get("root_causes")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let candidate = RootCauseCandidate::from_value(item);
                        if candidate.is_none() {
                            debug!("Dropping non-object root cause entry: {}", item);
                        }
                        candidate
                    })
                    .collect()
            })
            .unwrap_or_default();

        let recommendations = value
            .get("recommendations")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.trim().to_string()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            root_causes,
            recommendations,
        }
    }

    /// Fixed demonstration reply used when the service is unavailable.
    pub fn fallback() -> Self {
        Self {
            root_causes: vec![
                RootCauseCandidate {
                    cause: "Database connection timeout".to_string(),
                    description: "The application failed to connect to the MySQL database because the connection was refused or timed out.".to_string(),
                    confidence: 0.85,
                    severity: "Critical".to_string(),
                    correlation_id: Some("err_db_001".to_string()),
                },
                RootCauseCandidate {
                    cause: "Missing Bugsnag Driver".to_string(),
                    description: "The logging configuration specifies \"bugsnag\" but the necessary driver or package seems to be missing or misconfigured in the current environment.".to_string(),
                    confidence: 0.95,
                    severity: "Medium".to_string(),
                    correlation_id: Some("err_log_002".to_string()),
                },
            ],
            recommendations: vec![
                "Verify database credentials in .env".to_string(),
                "Check if Bugsnag package is installed via composer".to_string(),
                "Ensure the database server is running and accessible from the app".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    /// No credential configured.
    NotConfigured,
    /// Every attempt failed; carries the last error.
    Transport(String),
}

/// Outcome of one reasoning call. Never an `Err`: the caller decides how to
/// surface each case.
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningReply {
    Valid(ProposalSet),
    Malformed { raw_text: String, error: String },
    Fallback { proposals: ProposalSet, reason: FallbackReason },
    Unavailable { error: String },
}

impl ReasoningReply {
    /// Decode the service's reply text into proposals.
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str::<Value>(strip_code_fences(text)) {
            Ok(value) if value.is_object() => {
                ReasoningReply::Valid(ProposalSet::from_value(&value))
            }
            Ok(_) => ReasoningReply::Malformed {
                raw_text: text.to_string(),
                error: "Invalid JSON from AI: expected an object".to_string(),
            },
            Err(e) => ReasoningReply::Malformed {
                raw_text: text.to_string(),
                error: format!("Invalid JSON from AI: {}", e),
            },
        }
    }

    /// Reply after the service could not be reached.
    pub fn after_transport_failure(error: &AIError, fallback_on_error: bool) -> Self {
        if fallback_on_error {
            ReasoningReply::Fallback {
                proposals: ProposalSet::fallback(),
                reason: FallbackReason::Transport(error.to_string()),
            }
        } else {
            ReasoningReply::Unavailable {
                error: format!("AI Service unavailable: {}", error),
            }
        }
    }

    pub fn not_configured() -> Self {
        ReasoningReply::Fallback {
            proposals: ProposalSet::fallback(),
            reason: FallbackReason::NotConfigured,
        }
    }

    pub fn proposals(&self) -> Option<&ProposalSet> {
        match self {
            ReasoningReply::Valid(p) => Some(p),
            ReasoningReply::Fallback { proposals, .. } => Some(proposals),
            _ => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ReasoningReply::Fallback { .. })
    }
}

/// Models often wrap JSON in a markdown fence despite being told not to.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    match rest.trim_end().strip_suffix("```") {
        Some(inner) => inner.trim(),
        None => trimmed,
    }
}

#[async_trait::async_trait]
pub trait ReasoningProvider: Send + Sync {
    async fn analyze(&self, prompt: &str) -> ReasoningReply;
    fn get_provider_name(&self) -> &str;
}

/// Provider used when no credential is configured: always answers with the
/// fixed fallback reply.
#[derive(Debug, Default, Clone)]
pub struct OfflineProvider;

#[async_trait::async_trait]
impl ReasoningProvider for OfflineProvider {
    async fn analyze(&self, _prompt: &str) -> ReasoningReply {
        info!("No reasoning service configured, using fallback response");
        ReasoningReply::not_configured()
    }

    fn get_provider_name(&self) -> &str {
        "offline"
    }
}

pub fn create_provider(
    config: &ReasoningConfig,
    fallback_on_error: bool,
) -> Arc<dyn ReasoningProvider> {
    if !config.is_configured() {
        info!("GEMINI_API_KEY not set, reasoning runs offline");
        return Arc::new(OfflineProvider);
    }
    create_remote_provider(config, fallback_on_error)
}

#[cfg(feature = "ai-providers")]
fn create_remote_provider(
    config: &ReasoningConfig,
    fallback_on_error: bool,
) -> Arc<dyn ReasoningProvider> {
    debug!("Initializing Gemini provider with model: {}", config.model);
    match GeminiProvider::new(config.clone(), fallback_on_error) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            warn!("Failed to build Gemini client, reasoning runs offline: {}", e);
            Arc::new(OfflineProvider)
        }
    }
}

#[cfg(not(feature = "ai-providers"))]
fn create_remote_provider(
    _config: &ReasoningConfig,
    _fallback_on_error: bool,
) -> Arc<dyn ReasoningProvider> {
    warn!("Built without the ai-providers feature, reasoning runs offline");
    Arc::new(OfflineProvider)
}
