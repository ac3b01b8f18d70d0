pub mod docx;
#[cfg(feature = "templating")]
pub mod html;
pub mod json;

use crate::orchestrator::AnalysisOutcome;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub use docx::{DocxOutput, DOCUMENT_FILE_NAME};
#[cfg(feature = "templating")]
pub use html::HtmlOutput;
pub use json::JsonOutput;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template rendering failed: {0}")]
    Template(String),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Document converter failed: {0}")]
    Converter(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Output format '{0}' is not available in this build")]
    Unsupported(OutputKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    #[default]
    Json,
    Html,
    Document,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Json => "json",
            OutputKind::Html => "html",
            OutputKind::Document => "docx",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(OutputKind::Json),
            "html" => Ok(OutputKind::Html),
            "docx" | "document" => Ok(OutputKind::Document),
            other => Err(format!("Unknown output format '{}': expected json, html or docx", other)),
        }
    }
}

/// A rendered analysis: inline text, or a file meant for one-shot download.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedReport {
    Inline {
        content_type: &'static str,
        body: String,
    },
    Document {
        file_name: String,
        bytes: Vec<u8>,
    },
}

/// Text formats rendered synchronously from an outcome.
pub trait OutputGenerator {
    fn generate(&self, outcome: &AnalysisOutcome) -> Result<String, RenderError>;
    fn content_type(&self) -> &'static str;
    fn file_extension(&self) -> &str;
}

#[async_trait::async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(
        &self,
        outcome: &AnalysisOutcome,
        kind: OutputKind,
    ) -> Result<RenderedReport, RenderError>;
}

/// Renders every supported format; documents go through an external converter.
#[derive(Debug, Clone)]
pub struct DefaultRenderer {
    converter: PathBuf,
}

impl Default for DefaultRenderer {
    fn default() -> Self {
        Self::new("pandoc")
    }
}

impl DefaultRenderer {
    pub fn new(converter: impl Into<PathBuf>) -> Self {
        Self {
            converter: converter.into(),
        }
    }

    fn inline<G: OutputGenerator>(
        generator: &G,
        outcome: &AnalysisOutcome,
    ) -> Result<RenderedReport, RenderError> {
        Ok(RenderedReport::Inline {
            content_type: generator.content_type(),
            body: generator.generate(outcome)?,
        })
    }
}

#[async_trait::async_trait]
impl ReportRenderer for DefaultRenderer {
    async fn render(
        &self,
        outcome: &AnalysisOutcome,
        kind: OutputKind,
    ) -> Result<RenderedReport, RenderError> {
        match kind {
            OutputKind::Json => Self::inline(&JsonOutput, outcome),
            #[cfg(feature = "templating")]
            OutputKind::Html => Self::inline(&HtmlOutput, outcome),
            #[cfg(feature = "templating")]
            OutputKind::Document => {
                let html = HtmlOutput.generate(outcome)?;
                DocxOutput::new(&self.converter).convert(&html).await
            }
            #[cfg(not(feature = "templating"))]
            other => Err(RenderError::Unsupported(other)),
        }
    }
}
