//! Startup preflight checks.
//!
//! Verifies the environment before the server binds: API key shape, data
//! directory, database and knowledge corpus. A failed database check does not
//! abort startup; the server falls back to in-memory session storage.

use std::str::FromStr;

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{info, warn};

use crate::config::{Settings, PLACEHOLDER_API_KEY};

/// Anything shorter than this cannot be a real Gemini key.
const MIN_API_KEY_LENGTH: usize = 30;

/// Result of a single check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Complete preflight report.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub all_passed: bool,
    pub checks: Vec<CheckResult>,
    /// True when the database is unreachable and interactions will only live
    /// in memory.
    pub degraded: bool,
}

/// Runs every check and logs a summary. Never aborts startup on its own.
pub async fn run_preflight_checks(settings: &Settings) -> PreflightReport {
    info!("╔══════════════════════════════════════════════════════╗");
    info!("║  🔍 RUNNING PREFLIGHT CHECKS                         ║");
    info!("╚══════════════════════════════════════════════════════╝");

    let mut checks = Vec::new();

    checks.push(check_api_key(settings));
    checks.push(check_data_dir(settings));

    let database_check = check_database(settings).await;
    let degraded = !database_check.passed;
    checks.push(database_check);

    checks.push(check_knowledge_dir(settings));

    let all_passed = checks.iter().all(|c| c.passed);

    for check in &checks {
        if check.passed {
            info!("  ✅ {}: {}", check.name, check.message);
        } else {
            warn!("  ❌ {}: {}", check.name, check.message);
            if let Some(details) = &check.details {
                warn!("      Details: {}", details);
            }
        }
    }

    if degraded {
        warn!("Database unreachable - falling back to in-memory session storage");
    } else if all_passed {
        info!("All preflight checks passed");
    }

    PreflightReport {
        all_passed,
        checks,
        degraded,
    }
}

fn check_api_key(settings: &Settings) -> CheckResult {
    let key = settings.gemini_api_key.trim();
    if key.is_empty() || key == PLACEHOLDER_API_KEY {
        return CheckResult::fail(
            "gemini_api_key",
            "Gemini API key not configured",
            Some("Set GEMINI_API_KEY in the environment or a .env file".to_string()),
        );
    }

    if key.len() < MIN_API_KEY_LENGTH {
        return CheckResult::fail(
            "gemini_api_key",
            "API key looks malformed (too short)",
            Some(format!(
                "Length: {}, expected at least {}",
                key.len(),
                MIN_API_KEY_LENGTH
            )),
        );
    }

    CheckResult::pass("gemini_api_key", "API key present")
}

fn check_data_dir(settings: &Settings) -> CheckResult {
    if let Err(e) = std::fs::create_dir_all(&settings.data_dir) {
        return CheckResult::fail(
            "data_dir",
            "Cannot create data directory",
            Some(format!("{:?}: {}", settings.data_dir, e)),
        );
    }

    let probe = settings.data_dir.join(".write-probe");
    match std::fs::write(&probe, b"ok") {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            CheckResult::pass("data_dir", "Data directory writable")
        }
        Err(e) => CheckResult::fail(
            "data_dir",
            "Data directory not writable",
            Some(format!("{:?}: {}", settings.data_dir, e)),
        ),
    }
}

async fn check_database(settings: &Settings) -> CheckResult {
    let options = match SqliteConnectOptions::from_str(&settings.database_url) {
        Ok(options) => options.create_if_missing(true),
        Err(e) => {
            return CheckResult::fail(
                "database",
                "Invalid database URL",
                Some(e.to_string()),
            );
        }
    };

    match SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
    {
        Ok(pool) => {
            let probe = sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&pool).await;
            pool.close().await;
            match probe {
                Ok(_) => CheckResult::pass("database", "Database reachable"),
                Err(e) => CheckResult::fail(
                    "database",
                    "Cannot query database",
                    Some(e.to_string()),
                ),
            }
        }
        Err(e) => CheckResult::fail(
            "database",
            "Cannot connect to database",
            Some(e.to_string()),
        ),
    }
}

fn check_knowledge_dir(settings: &Settings) -> CheckResult {
    if !settings.knowledge_dir.exists() {
        // Not fatal: the bot answers from internal knowledge without a corpus.
        return CheckResult::pass(
            "knowledge_dir",
            "Knowledge directory missing (no corpus to seed)",
        );
    }

    let corpus_files = std::fs::read_dir(&settings.knowledge_dir)
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.path().extension().map(|ext| ext == "txt").unwrap_or(false))
                .count()
        })
        .unwrap_or(0);

    if corpus_files > 0 {
        CheckResult::pass(
            "knowledge_dir",
            &format!("{} corpus file(s) found", corpus_files),
        )
    } else {
        CheckResult::pass("knowledge_dir", "Knowledge directory empty (seeding skipped)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings_with_key(key: &str) -> Settings {
        Settings {
            gemini_api_key: key.to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            database_url: "sqlite://ignored.db".to_string(),
            data_dir: PathBuf::from("data"),
            knowledge_dir: PathBuf::from("data/knowledge"),
            lancedb_dir: PathBuf::from("data/lancedb"),
            max_file_size: 10 * 1024 * 1024,
            port: 8000,
            environment: "test".to_string(),
        }
    }

    #[test]
    fn placeholder_api_key_fails_the_check() {
        let settings = settings_with_key("your_gemini_api_key_here");
        let check = check_api_key(&settings);
        assert!(!check.passed);
        assert_eq!(check.message, "Gemini API key not configured");
    }

    #[test]
    fn short_api_key_is_flagged_as_malformed() {
        let settings = settings_with_key("AIza-short");
        let check = check_api_key(&settings);
        assert!(!check.passed);
        assert!(check.message.contains("malformed"));
    }

    #[test]
    fn plausible_api_key_passes() {
        let settings = settings_with_key("AIzaSyA-plausible-looking-key-0123456789");
        let check = check_api_key(&settings);
        assert!(check.passed);
    }

    #[test]
    fn writable_data_dir_passes_the_probe() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_with_key("AIzaSyA-plausible-looking-key-0123456789");
        settings.data_dir = dir.path().to_path_buf();
        let check = check_data_dir(&settings);
        assert!(check.passed, "{:?}", check);
        assert!(!dir.path().join(".write-probe").exists());
    }

    #[test]
    fn missing_knowledge_dir_is_not_fatal() {
        let mut settings = settings_with_key("AIzaSyA-plausible-looking-key-0123456789");
        settings.knowledge_dir = PathBuf::from("/nonexistent/knowledge");
        let check = check_knowledge_dir(&settings);
        assert!(check.passed);
        assert!(check.message.contains("missing"));
    }

    #[tokio::test]
    async fn database_check_reaches_a_scratch_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_with_key("AIzaSyA-plausible-looking-key-0123456789");
        settings.database_url = format!(
            "sqlite://{}/preflight.db",
            dir.path().to_string_lossy()
        );
        let check = check_database(&settings).await;
        assert!(check.passed, "{:?}", check);
    }
}
