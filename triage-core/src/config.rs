use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ENDPOINT_TEMPLATE: &str =
    "https://generativelanguage.googleapis.com/v1/models/{MODEL}:generateContent";
pub const MODEL_PLACEHOLDER: &str = "{MODEL}";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Tunables for the clustering and prompt stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub window_secs: u64,
    pub max_prompt_clusters: usize,
    pub snippet_lines: usize,
    pub snippet_max_chars: usize,
    pub pattern_max_len: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_secs: 300, // 5 minutes
            max_prompt_clusters: 10,
            snippet_lines: 3,
            snippet_max_chars: 500,
            pattern_max_len: 100,
        }
    }
}

/// Connection settings for the reasoning service.
#[derive(Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint_template: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            endpoint_template: DEFAULT_ENDPOINT_TEMPLATE.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_secs: 5,
        }
    }
}

impl fmt::Debug for ReasoningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReasoningConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint_template", &self.endpoint_template)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .finish()
    }
}

impl ReasoningConfig {
    /// True when a non-empty credential is present.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Endpoint with the model placeholder substituted. Never contains the credential.
    pub fn endpoint(&self) -> String {
        self.endpoint_template.replace(MODEL_PLACEHOLDER, &self.model)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Total number of attempts, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub reasoning: ReasoningConfig,
    /// Degrade to the fixed fallback reply when the service cannot be reached.
    pub fallback_on_error: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            reasoning: ReasoningConfig::default(),
            fallback_on_error: true,
        }
    }
}

impl AppConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                config.reasoning.api_key = Some(key);
            }
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            config.reasoning.model = model;
        }
        if let Some(endpoint) = lookup("GEMINI_API_ENDPOINT") {
            config.reasoning.endpoint_template = endpoint;
        }
        if let Some(value) = lookup("GEMINI_TIMEOUT") {
            config.reasoning.timeout_secs = parse_value("GEMINI_TIMEOUT", &value)?;
        }
        if let Some(value) = lookup("GEMINI_MAX_RETRIES") {
            config.reasoning.max_retries = parse_value("GEMINI_MAX_RETRIES", &value)?;
        }
        if let Some(value) = lookup("GEMINI_RETRY_DELAY") {
            config.reasoning.retry_delay_secs = parse_value("GEMINI_RETRY_DELAY", &value)?;
        }

        if let Some(value) = lookup("TRIAGE_WINDOW_SECS") {
            let window: u64 = parse_value("TRIAGE_WINDOW_SECS", &value)?;
            if window == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "TRIAGE_WINDOW_SECS".to_string(),
                    value,
                    reason: "window must be at least one second".to_string(),
                });
            }
            config.analysis.window_secs = window;
        }
        if let Some(value) = lookup("TRIAGE_MAX_PROMPT_CLUSTERS") {
            config.analysis.max_prompt_clusters =
                parse_value("TRIAGE_MAX_PROMPT_CLUSTERS", &value)?;
        }
        if let Some(value) = lookup("TRIAGE_SNIPPET_LINES") {
            config.analysis.snippet_lines = parse_value("TRIAGE_SNIPPET_LINES", &value)?;
        }
        if let Some(value) = lookup("TRIAGE_SNIPPET_MAX_CHARS") {
            config.analysis.snippet_max_chars = parse_value("TRIAGE_SNIPPET_MAX_CHARS", &value)?;
        }
        if let Some(value) = lookup("TRIAGE_PATTERN_MAX_LEN") {
            config.analysis.pattern_max_len = parse_value("TRIAGE_PATTERN_MAX_LEN", &value)?;
        }
        if let Some(value) = lookup("TRIAGE_AI_FALLBACK") {
            config.fallback_on_error = parse_bool("TRIAGE_AI_FALLBACK", &value)?;
        }

        Ok(config)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.analysis.window_secs, 300);
        assert_eq!(config.analysis.max_prompt_clusters, 10);
        assert_eq!(config.reasoning.model, "gemini-2.5-flash");
        assert_eq!(config.reasoning.attempts(), 3);
        assert!(!config.reasoning.is_configured());
        assert!(config.fallback_on_error);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "secret-key"),
            ("GEMINI_MODEL", "gemini-2.5-pro"),
            ("GEMINI_TIMEOUT", "12"),
            ("GEMINI_MAX_RETRIES", "0"),
            ("TRIAGE_WINDOW_SECS", "60"),
            ("TRIAGE_AI_FALLBACK", "false"),
        ]))
        .unwrap();

        assert!(config.reasoning.is_configured());
        assert_eq!(config.reasoning.timeout(), Duration::from_secs(12));
        assert_eq!(config.reasoning.attempts(), 1);
        assert_eq!(config.analysis.window_secs, 60);
        assert!(!config.fallback_on_error);
        assert_eq!(
            config.reasoning.endpoint(),
            "https://generativelanguage.googleapis.com/v1/models/gemini-2.5-pro:generateContent"
        );
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("GEMINI_TIMEOUT", "soon")])).unwrap_err();
        assert!(err.to_string().contains("GEMINI_TIMEOUT"));

        let err = AppConfig::from_lookup(lookup_from(&[("TRIAGE_WINDOW_SECS", "0")])).unwrap_err();
        assert!(err.to_string().contains("TRIAGE_WINDOW_SECS"));
    }

    #[test]
    fn test_debug_output_redacts_api_key() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "super-secret")])).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
