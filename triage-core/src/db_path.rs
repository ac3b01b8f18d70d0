use std::env;
use std::path::PathBuf;

/// Global Triage data directory (~/.triage/data), or the working directory
/// when no home directory can be resolved.
fn get_global_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".triage")
        .join("data")
}

/// Report database location shared by the web server and the CLI.
///
/// Priority:
/// 1. TRIAGE_DATABASE_PATH env var (absolute path override)
/// 2. Global: ~/.triage/data/triage.db
pub fn get_database_path() -> PathBuf {
    if let Ok(db_path) = env::var("TRIAGE_DATABASE_PATH") {
        return PathBuf::from(db_path);
    }

    get_global_data_dir().join("triage.db")
}
