use std::env;
use std::fs;
use std::path::PathBuf;

use crate::error::AppError;

/// Maximum chat message length, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 5000;
/// Maximum image caption length, in characters.
pub const MAX_CAPTION_LENGTH: usize = 1000;
/// Default cap on uploaded image size, in bytes (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
/// Image media types accepted by the image endpoint.
pub const ALLOWED_IMAGE_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/gif", "image/webp"];
/// Requests allowed per rate-limit window.
pub const RATE_LIMIT_MAX_REQUESTS: usize = 30;
/// Rate-limit window length, in seconds.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;
/// Model identifier sent to the upstream generation API.
pub const GENERATION_MODEL: &str = "gemini-flash-latest";
/// Key value shipped in env templates; treated as not configured.
pub const PLACEHOLDER_API_KEY: &str = "your_gemini_api_key_here";

/// Runtime settings, read once from the environment at startup.
///
/// A missing or placeholder API key is not an error here: the service must
/// still start and answer its probe endpoints, so key quality is checked by
/// the preflight report instead.
#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub database_url: String,
    pub data_dir: PathBuf,
    pub knowledge_dir: PathBuf,
    pub lancedb_dir: PathBuf,
    pub max_file_size: usize,
    pub port: u16,
    pub environment: String,
}

impl Settings {
    /// Reads settings from the environment. `dotenv` is expected to have been
    /// loaded by the caller.
    pub fn from_env() -> Result<Self, AppError> {
        let data_dir =
            PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}", data_dir.join("gurubot.db").display()));
        let knowledge_dir = env::var("KNOWLEDGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("knowledge"));
        let lancedb_dir = env::var("LANCEDB_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("lancedb"));

        let max_file_size = match env::var("MAX_FILE_SIZE") {
            Ok(raw) => raw.parse::<usize>().map_err(|_| {
                AppError::Config(format!("MAX_FILE_SIZE is not a number: {}", raw))
            })?,
            Err(_) => DEFAULT_MAX_FILE_SIZE,
        };
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("PORT is not a valid port: {}", raw)))?,
            Err(_) => 8000,
        };

        Ok(Self {
            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            database_url,
            data_dir,
            knowledge_dir,
            lancedb_dir,
            max_file_size,
            port,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        })
    }

    /// True when the key is present, not the template placeholder and long
    /// enough to be a real key.
    pub fn api_key_configured(&self) -> bool {
        !self.gemini_api_key.is_empty()
            && self.gemini_api_key != PLACEHOLDER_API_KEY
            && self.gemini_api_key.len() >= 30
    }

    /// Creates the data directories when missing.
    pub fn ensure_data_dirs(&self) -> Result<(), AppError> {
        for dir in [&self.data_dir, &self.knowledge_dir, &self.lancedb_dir] {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_KEYS: [&str; 9] = [
        "GEMINI_API_KEY",
        "GEMINI_BASE_URL",
        "DATABASE_URL",
        "DATA_DIR",
        "KNOWLEDGE_DIR",
        "LANCEDB_DIR",
        "MAX_FILE_SIZE",
        "PORT",
        "ENVIRONMENT",
    ];

    #[test]
    fn defaults_apply_when_env_is_empty() {
        temp_env::with_vars_unset(ENV_KEYS, || {
            let settings = Settings::from_env().unwrap();
            assert_eq!(settings.port, 8000);
            assert_eq!(settings.max_file_size, DEFAULT_MAX_FILE_SIZE);
            assert_eq!(settings.environment, "development");
            assert_eq!(settings.data_dir, PathBuf::from("data"));
            assert_eq!(settings.knowledge_dir, PathBuf::from("data/knowledge"));
            assert!(settings.database_url.starts_with("sqlite://"));
            assert!(!settings.api_key_configured());
        });
    }

    #[test]
    fn explicit_values_override_defaults() {
        temp_env::with_vars(
            [
                ("PORT", Some("9100")),
                ("MAX_FILE_SIZE", Some("1024")),
                ("DATA_DIR", Some("/tmp/gurubot-test")),
                ("ENVIRONMENT", Some("production")),
            ],
            || {
                let settings = Settings::from_env().unwrap();
                assert_eq!(settings.port, 9100);
                assert_eq!(settings.max_file_size, 1024);
                assert_eq!(settings.environment, "production");
                assert_eq!(settings.lancedb_dir, PathBuf::from("/tmp/gurubot-test/lancedb"));
            },
        );
    }

    #[test]
    fn bad_numeric_values_are_rejected() {
        temp_env::with_vars([("MAX_FILE_SIZE", Some("ten megabytes"))], || {
            assert!(Settings::from_env().is_err());
        });
    }

    #[test]
    fn placeholder_key_is_not_configured() {
        temp_env::with_vars([("GEMINI_API_KEY", Some(PLACEHOLDER_API_KEY))], || {
            let settings = Settings::from_env().unwrap();
            assert!(!settings.api_key_configured());
        });
    }

    #[test]
    fn long_key_is_configured() {
        temp_env::with_vars(
            [("GEMINI_API_KEY", Some("AIzaSyA-0123456789abcdefghijklmnopqrstuv"))],
            || {
                let settings = Settings::from_env().unwrap();
                assert!(settings.api_key_configured());
            },
        );
    }
}
