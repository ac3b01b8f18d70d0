use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use triage_core::AppConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub port: u16,
    pub database_url: String,
    /// Application log read when a request carries no logs.
    pub log_path: PathBuf,
    pub default_lines: usize,
    pub max_lines: usize,
    /// Document converter binary.
    pub pandoc: PathBuf,
    pub cors_origins: Vec<String>,
    pub analysis: AppConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        let db_path = triage_core::db_path::get_database_path();

        Self {
            port: 3000,
            database_url: format!("sqlite://{}", db_path.to_string_lossy()),
            log_path: PathBuf::from("storage/logs/app.log"),
            default_lines: 200,
            max_lines: 10_000,
            pandoc: PathBuf::from("pandoc"),
            cors_origins: vec!["http://localhost:3000".to_string()],
            analysis: AppConfig::default(),
        }
    }
}

impl WebConfig {
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = env::var("TRIAGE_PORT").or_else(|_| env::var("PORT")) {
            config.port = port.parse()?;
        }

        if let Ok(database_url) = env::var("DATABASE_URL") {
            config.database_url = database_url;
        } else if let Ok(db_path) = env::var("TRIAGE_DATABASE_PATH") {
            config.database_url = format!("sqlite://{}", db_path);
        }

        if let Ok(log_path) = env::var("TRIAGE_LOG_PATH") {
            config.log_path = PathBuf::from(log_path);
        }

        if let Ok(lines) = env::var("TRIAGE_DEFAULT_LINES") {
            config.default_lines = lines.parse()?;
        }

        if let Ok(pandoc) = env::var("TRIAGE_PANDOC") {
            config.pandoc = PathBuf::from(pandoc);
        }

        if let Ok(origins) = env::var("TRIAGE_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config.analysis = AppConfig::from_env()?;

        Ok(config)
    }

    /// Number of tail lines to read, bounded by `max_lines`.
    pub fn lines_to_read(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_lines).clamp(1, self.max_lines)
    }
}
