use crate::ai_provider::{
    clamp_confidence, FallbackReason, ProposalSet, ReasoningReply, RootCauseCandidate,
};
use crate::cluster::ClusterSummary;
use crate::metrics::Metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const UNKNOWN_CAUSE: &str = "Unknown";
pub const UNKNOWN_CONFIDENCE: f64 = 0.5;
pub const MANUAL_INVESTIGATION: &str = "Manual investigation required.";
pub const GENERIC_NEXT_STEP: &str = "Check system logs.";
pub const URGENT_PREFIX: &str = "URGENT: ";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    GreaterThan,
    LessThan,
}

/// A threshold test on one numeric metric. Missing or non-numeric metrics
/// never satisfy it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCondition {
    pub metric: String,
    pub comparison: Comparison,
    pub threshold: f64,
}

impl MetricCondition {
    pub fn above(metric: impl Into<String>, threshold: f64) -> Self {
        Self {
            metric: metric.into(),
            comparison: Comparison::GreaterThan,
            threshold,
        }
    }

    pub fn below(metric: impl Into<String>, threshold: f64) -> Self {
        Self {
            metric: metric.into(),
            comparison: Comparison::LessThan,
            threshold,
        }
    }

    pub fn holds(&self, metrics: &Metrics) -> bool {
        match metrics.get_f64(&self.metric) {
            Some(value) => match self.comparison {
                Comparison::GreaterThan => value > self.threshold,
                Comparison::LessThan => value < self.threshold,
            },
            None => false,
        }
    }
}

/// Metric conditions plus a keyword in the leading cause. Rules are
/// independent and additive; confidence is clamped after each one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRule {
    pub name: String,
    pub conditions: Vec<MetricCondition>,
    pub keyword: String,
    pub boost: f64,
    pub next_steps_prefix: Option<String>,
}

impl CorrelationRule {
    /// High latency while the model blames the database.
    pub fn database_latency() -> Self {
        Self {
            name: "database_latency".to_string(),
            conditions: vec![MetricCondition::above("latency", 1000.0)],
            keyword: "database".to_string(),
            boost: 0.15,
            next_steps_prefix: Some(URGENT_PREFIX.to_string()),
        }
    }

    pub fn applies(&self, cause: &str, metrics: &Metrics) -> bool {
        !self.conditions.is_empty()
            && self.conditions.iter().all(|c| c.holds(metrics))
            && cause.to_lowercase().contains(&self.keyword.to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Service,
    Fallback,
    Malformed,
    Unavailable,
}

/// Why the verdict is not backed by a genuine service reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyDiagnostic {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisVerdict {
    pub likely_cause: String,
    pub confidence: f64,
    pub next_steps: String,
    pub candidates: Vec<RootCauseCandidate>,
    pub recommendations: Vec<String>,
    #[serde(rename = "log_summary")]
    pub cluster_summary: ClusterSummary,
    pub reply_source: ReplySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<ReplyDiagnostic>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_rules: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisVerdict {
    fn unknown(recommendations: Vec<String>) -> Self {
        Self {
            likely_cause: UNKNOWN_CAUSE.to_string(),
            confidence: UNKNOWN_CONFIDENCE,
            next_steps: MANUAL_INVESTIGATION.to_string(),
            candidates: Vec::new(),
            recommendations,
            cluster_summary: ClusterSummary::default(),
            reply_source: ReplySource::Service,
            diagnostic: None,
            applied_rules: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_cluster_summary(mut self, summary: ClusterSummary) -> Self {
        self.cluster_summary = summary;
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.reply_source == ReplySource::Fallback
    }
}

/// Picks the best-supported cause and applies metric correlation rules.
#[derive(Debug, Clone)]
pub struct DecisionRanker {
    rules: Vec<CorrelationRule>,
}

impl Default for DecisionRanker {
    fn default() -> Self {
        Self {
            rules: vec![CorrelationRule::database_latency()],
        }
    }
}

impl DecisionRanker {
    pub fn new(rules: Vec<CorrelationRule>) -> Self {
        Self { rules }
    }

    pub fn with_rule(mut self, rule: CorrelationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[CorrelationRule] {
        &self.rules
    }

    pub fn decide(&self, proposals: &ProposalSet, metrics: &Metrics) -> AnalysisVerdict {
        if proposals.root_causes.is_empty() {
            debug!("No root causes proposed, returning unknown verdict");
            return AnalysisVerdict::unknown(proposals.recommendations.clone());
        }

        // sort_by is stable: equal confidences keep reply order.
        let mut candidates = proposals.root_causes.clone();
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let best = &candidates[0];
        let likely_cause = best.cause.clone();
        let mut confidence = clamp_confidence(best.confidence);
        let mut next_steps = proposals
            .recommendations
            .first()
            .cloned()
            .unwrap_or_else(|| GENERIC_NEXT_STEP.to_string());
        let mut applied_rules = Vec::new();

        for rule in &self.rules {
            if !rule.applies(&likely_cause, metrics) {
                continue;
            }
            info!("Correlation rule '{}' matched cause '{}'", rule.name, likely_cause);
            confidence = clamp_confidence(confidence + rule.boost);
            if let Some(prefix) = &rule.next_steps_prefix {
                if !next_steps.starts_with(prefix.as_str()) {
                    next_steps = format!("{}{}", prefix, next_steps);
                }
            }
            applied_rules.push(rule.name.clone());
        }

        AnalysisVerdict {
            likely_cause,
            confidence,
            next_steps,
            candidates,
            recommendations: proposals.recommendations.clone(),
            cluster_summary: ClusterSummary::default(),
            reply_source: ReplySource::Service,
            diagnostic: None,
            applied_rules,
            timestamp: Utc::now(),
        }
    }

    /// Decide from a full reasoning reply, recording where the proposals came from.
    pub fn decide_reply(&self, reply: &ReasoningReply, metrics: &Metrics) -> AnalysisVerdict {
        match reply {
            ReasoningReply::Valid(proposals) => self.decide(proposals, metrics),
            ReasoningReply::Fallback { proposals, reason } => {
                let mut verdict = self.decide(proposals, metrics);
                verdict.reply_source = ReplySource::Fallback;
                verdict.diagnostic = Some(ReplyDiagnostic {
                    message: match reason {
                        FallbackReason::NotConfigured => {
                            "Reasoning service not configured; showing fallback analysis"
                                .to_string()
                        }
                        FallbackReason::Transport(error) => format!(
                            "Reasoning service unreachable ({}); showing fallback analysis",
                            error
                        ),
                    },
                    raw_text: None,
                });
                verdict
            }
            ReasoningReply::Malformed { raw_text, error } => {
                let mut verdict = self.decide(&ProposalSet::default(), metrics);
                verdict.reply_source = ReplySource::Malformed;
                verdict.diagnostic = Some(ReplyDiagnostic {
                    message: error.clone(),
                    raw_text: Some(raw_text.clone()),
                });
                verdict
            }
            ReasoningReply::Unavailable { error } => {
                let mut verdict = self.decide(&ProposalSet::default(), metrics);
                verdict.reply_source = ReplySource::Unavailable;
                verdict.diagnostic = Some(ReplyDiagnostic {
                    message: error.clone(),
                    raw_text: None,
                });
                verdict
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn candidate(cause: &str, confidence: f64) -> RootCauseCandidate {
        RootCauseCandidate {
            cause: cause.to_string(),
            description: String::new(),
            confidence,
            severity: "High".to_string(),
            correlation_id: None,
        }
    }

    fn proposals(causes: Vec<RootCauseCandidate>, recs: &[&str]) -> ProposalSet {
        ProposalSet {
            root_causes: causes,
            recommendations: recs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_empty_candidates_yield_unknown() {
        let verdict = DecisionRanker::default().decide(&ProposalSet::default(), &Metrics::new());
        assert_eq!(verdict.likely_cause, "Unknown");
        assert_eq!(verdict.confidence, 0.5);
        assert_eq!(verdict.next_steps, "Manual investigation required.");
        assert!(verdict.candidates.is_empty());
    }

    #[test]
    fn test_highest_confidence_wins() {
        let verdict = DecisionRanker::default().decide(
            &proposals(
                vec![candidate("Cache stampede", 0.4), candidate("Disk full", 0.9)],
                &["Free disk space"],
            ),
            &Metrics::new(),
        );
        assert_eq!(verdict.likely_cause, "Disk full");
        assert_eq!(verdict.confidence, 0.9);
        assert_eq!(verdict.next_steps, "Free disk space");
        assert_eq!(verdict.candidates[1].cause, "Cache stampede");
    }

    #[test]
    fn test_ties_keep_reply_order() {
        let verdict = DecisionRanker::default().decide(
            &proposals(
                vec![
                    candidate("first", 0.7),
                    candidate("second", 0.7),
                    candidate("third", 0.2),
                ],
                &[],
            ),
            &Metrics::new(),
        );
        let order: Vec<_> = verdict.candidates.iter().map(|c| c.cause.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
        assert_eq!(verdict.next_steps, GENERIC_NEXT_STEP);
    }

    #[test]
    fn test_database_latency_boost() {
        let metrics = Metrics::new().with("latency", 1500);
        let verdict = DecisionRanker::default().decide(
            &proposals(vec![candidate("Database connection timeout", 0.85)], &["Restart the pool"]),
            &metrics,
        );
        assert_eq!(verdict.confidence, 1.0);
        assert_eq!(verdict.next_steps, "URGENT: Restart the pool");
        assert_eq!(verdict.applied_rules, vec!["database_latency"]);
    }

    #[test]
    fn test_boost_requires_metric_and_keyword() {
        let ranker = DecisionRanker::default();

        let low_latency = ranker.decide(
            &proposals(vec![candidate("Database connection timeout", 0.5)], &["x"]),
            &Metrics::new().with("latency", 1000),
        );
        assert_eq!(low_latency.confidence, 0.5);
        assert_eq!(low_latency.next_steps, "x");

        let other_cause = ranker.decide(
            &proposals(vec![candidate("Disk full", 0.5)], &["x"]),
            &Metrics::new().with("latency", 5000),
        );
        assert_eq!(other_cause.confidence, 0.5);
        assert!(other_cause.applied_rules.is_empty());
    }

    #[test]
    fn test_rules_are_additive_and_clamped() {
        let ranker = DecisionRanker::default().with_rule(CorrelationRule {
            name: "load_database".to_string(),
            conditions: vec![MetricCondition::above("system_load", 0.8)],
            keyword: "DATABASE".to_string(),
            boost: 0.1,
            next_steps_prefix: Some(URGENT_PREFIX.to_string()),
        });
        let metrics = Metrics::new().with("latency", 2000).with("system_load", 0.95);

        let verdict = ranker.decide(
            &proposals(vec![candidate("database deadlock", 0.6)], &["Kill the query"]),
            &metrics,
        );
        assert!((verdict.confidence - 0.85).abs() < 1e-9);
        assert_eq!(verdict.next_steps, "URGENT: Kill the query");
        assert_eq!(verdict.applied_rules.len(), 2);

        let verdict = ranker.decide(
            &proposals(vec![candidate("database deadlock", 0.95)], &[]),
            &metrics,
        );
        assert_eq!(verdict.confidence, 1.0);
    }

    #[test]
    fn test_decide_reply_marks_fallback() {
        let reply = ReasoningReply::not_configured();
        let verdict = DecisionRanker::default().decide_reply(&reply, &Metrics::new());

        assert!(verdict.is_fallback());
        assert_eq!(verdict.likely_cause, "Missing Bugsnag Driver");
        assert_eq!(verdict.confidence, 0.95);
        assert_matches!(verdict.diagnostic, Some(ReplyDiagnostic { raw_text: None, .. }));
    }

    #[test]
    fn test_decide_reply_surfaces_malformed_text() {
        let reply = ReasoningReply::from_text("not json at all");
        let verdict = DecisionRanker::default().decide_reply(&reply, &Metrics::new());

        assert_eq!(verdict.reply_source, ReplySource::Malformed);
        assert_eq!(verdict.likely_cause, UNKNOWN_CAUSE);
        let diagnostic = verdict.diagnostic.unwrap();
        assert_eq!(diagnostic.raw_text.as_deref(), Some("not json at all"));
    }
}
