use super::{OutputGenerator, RenderError};
use crate::decision::AnalysisVerdict;
use crate::orchestrator::AnalysisOutcome;
use askama::Template;
use chrono::{DateTime, Utc};

const SEVERITY_CLASSES: [&str; 4] = ["Critical", "High", "Medium", "Low"];

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate {
    generated_at: String,
    total_lines: usize,
    unique_clusters: usize,
    notice: Option<String>,
    raw_text: Option<String>,
    has_verdict: bool,
    likely_cause: String,
    confidence_pct: String,
    next_steps: String,
    candidates: Vec<DisplayCandidate>,
    recommendations: Vec<String>,
}

struct DisplayCandidate {
    cause: String,
    description: String,
    severity_class: &'static str,
    severity_label: String,
    confidence_pct: String,
}

fn percent(confidence: f64) -> String {
    format!("{:.1}", confidence * 100.0)
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

// The model's severity string ends up in a class attribute; only known
// tiers get through.
fn severity_class(severity: &str) -> &'static str {
    SEVERITY_CLASSES
        .iter()
        .find(|class| class.eq_ignore_ascii_case(severity.trim()))
        .copied()
        .unwrap_or("Low")
}

impl ReportTemplate {
    fn from_verdict(verdict: &AnalysisVerdict) -> Self {
        let candidates = verdict
            .candidates
            .iter()
            .map(|c| DisplayCandidate {
                cause: c.cause.clone(),
                description: c.description.clone(),
                severity_class: severity_class(&c.severity),
                severity_label: c.severity.to_uppercase(),
                confidence_pct: percent(c.confidence),
            })
            .collect();

        let diagnostic = verdict.diagnostic.as_ref();
        Self {
            generated_at: timestamp(verdict.timestamp),
            total_lines: verdict.cluster_summary.total_lines,
            unique_clusters: verdict.cluster_summary.unique_clusters,
            notice: diagnostic.map(|d| d.message.clone()),
            raw_text: diagnostic.and_then(|d| d.raw_text.clone()),
            has_verdict: true,
            likely_cause: verdict.likely_cause.clone(),
            confidence_pct: percent(verdict.confidence),
            next_steps: verdict.next_steps.clone(),
            candidates,
            recommendations: verdict.recommendations.clone(),
        }
    }

    fn from_notice(notice: String) -> Self {
        Self {
            generated_at: timestamp(Utc::now()),
            total_lines: 0,
            unique_clusters: 0,
            notice: Some(notice),
            raw_text: None,
            has_verdict: false,
            likely_cause: String::new(),
            confidence_pct: String::new(),
            next_steps: String::new(),
            candidates: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

pub struct HtmlOutput;

impl OutputGenerator for HtmlOutput {
    fn generate(&self, outcome: &AnalysisOutcome) -> Result<String, RenderError> {
        let template = match outcome {
            AnalysisOutcome::Success(verdict) => ReportTemplate::from_verdict(verdict),
            AnalysisOutcome::NoLogs { message } => ReportTemplate::from_notice(message.clone()),
            AnalysisOutcome::Failed { message, error } => {
                ReportTemplate::from_notice(format!("{} {}", message, error))
            }
        };

        template.render().map_err(|e| RenderError::Template(e.to_string()))
    }

    fn content_type(&self) -> &'static str {
        "text/html; charset=utf-8"
    }

    fn file_extension(&self) -> &str {
        "html"
    }
}
