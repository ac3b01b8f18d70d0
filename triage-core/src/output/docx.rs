use super::{RenderError, RenderedReport};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, error};

pub const DOCUMENT_FILE_NAME: &str = "Root_Cause_Analysis.docx";

/// Converts a rendered HTML report to DOCX through an external converter
/// invoked as `<converter> <in.html> -o <out.docx>`.
///
/// Intermediate files live in a temporary directory that is removed on
/// every return path.
#[derive(Debug, Clone)]
pub struct DocxOutput {
    converter: PathBuf,
}

impl DocxOutput {
    pub fn new(converter: impl AsRef<Path>) -> Self {
        Self {
            converter: converter.as_ref().to_path_buf(),
        }
    }

    pub async fn convert(&self, html: &str) -> Result<RenderedReport, RenderError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("report.html");
        let output = workdir.path().join("report.docx");
        tokio::fs::write(&input, html).await?;

        debug!("Running {} to build document", self.converter.display());
        let result = Command::new(&self.converter)
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .output()
            .await
            .map_err(|e| {
                RenderError::Converter(format!("Failed to run {}: {}", self.converter.display(), e))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let stdout = String::from_utf8_lossy(&result.stdout);
            error!("Document converter exited with {}: {}", result.status, stderr.trim());
            return Err(RenderError::Converter(format!(
                "{} exited with {}: {}{}",
                self.converter.display(),
                result.status,
                stderr.trim(),
                stdout.trim()
            )));
        }

        let bytes = tokio::fs::read(&output).await.map_err(|e| {
            RenderError::Converter(format!("Converter produced no document: {}", e))
        })?;

        Ok(RenderedReport::Document {
            file_name: DOCUMENT_FILE_NAME.to_string(),
            bytes,
        })
    }
}
