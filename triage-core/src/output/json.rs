use super::{OutputGenerator, RenderError};
use crate::orchestrator::AnalysisOutcome;

pub struct JsonOutput;

impl OutputGenerator for JsonOutput {
    fn generate(&self, outcome: &AnalysisOutcome) -> Result<String, RenderError> {
        Ok(serde_json::to_string_pretty(outcome)?)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn file_extension(&self) -> &str {
        "json"
    }
}
