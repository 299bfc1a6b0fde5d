use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::compaction::DEFAULT_KEEP_RECENT;
use crate::context_window::{ContextAccountant, DEFAULT_MEMORY_BLOCK_OVERHEAD};
use crate::error::ConfigurationError;
use crate::models::resolve_model_alias;
use crate::rate_limit::{SessionRateLimiter, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECONDS};
use crate::tokens::TokenCounter;
use crate::types::Settings;

/// Model used when neither the request nor settings name one.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Resolved locations of Clawmeter's files
#[derive(Debug, Clone)]
pub struct Paths {
    /// Data directory ($CLAWMETER_HOME, local .clawmeter/, or ~/.clawmeter)
    pub clawmeter_home: PathBuf,
    pub settings_file: PathBuf,
    pub log_file: PathBuf,
}

impl Paths {
    /// Resolve the home directory:
    /// 1. CLAWMETER_HOME env var
    /// 2. local .clawmeter/ if it has settings.json
    /// 3. ~/.clawmeter/
    pub fn resolve(working_dir: &Path) -> Self {
        let home = match std::env::var("CLAWMETER_HOME") {
            Ok(env_home) => PathBuf::from(env_home),
            Err(_) => Self::fallback_home(working_dir),
        };
        Self::at(home)
    }

    fn fallback_home(working_dir: &Path) -> PathBuf {
        let local = working_dir.join(".clawmeter");
        if local.join("settings.json").exists() {
            local
        } else {
            dirs_home().join(".clawmeter")
        }
    }

    /// Paths rooted at an explicit home directory.
    pub fn at(clawmeter_home: PathBuf) -> Self {
        Self {
            settings_file: clawmeter_home.join("settings.json"),
            log_file: clawmeter_home.join("logs/clawmeter.log"),
            clawmeter_home,
        }
    }
}

/// Get user home directory
fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Load and parse settings.json. A missing file yields defaults; so does a
/// file that isn't valid JSON, with a warning.
pub fn get_settings(settings_file: &Path) -> Result<Settings> {
    if !settings_file.exists() {
        return Ok(Settings::default());
    }

    let data = std::fs::read_to_string(settings_file)
        .with_context(|| format!("Failed to read {}", settings_file.display()))?;

    match serde_json::from_str(&data) {
        Ok(settings) => Ok(settings),
        Err(e) => {
            warn!(
                file = %settings_file.display(),
                error = %e,
                "settings.json contains invalid JSON, using defaults"
            );
            Ok(Settings::default())
        }
    }
}

/// Model ID for a request: explicit choice, then settings, then [`DEFAULT_MODEL`].
/// Shortnames are expanded.
pub fn resolve_model(requested: Option<&str>, settings: &Settings) -> String {
    let model = requested
        .map(str::to_string)
        .or_else(|| settings.model.as_ref().and_then(|m| m.default_model.clone()))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    resolve_model_alias(&model)
}

/// Build the accountant for `model` from the `context` section.
pub fn build_accountant(
    settings: &Settings,
    model: &str,
) -> Result<ContextAccountant, ConfigurationError> {
    let context = settings.context.clone().unwrap_or_default();
    let mut accountant = ContextAccountant::new(TokenCounter::for_model(model))
        .with_memory_block_overhead(
            context
                .memory_block_overhead
                .unwrap_or(DEFAULT_MEMORY_BLOCK_OVERHEAD),
        );
    if let Some(threshold) = context.summarization_threshold {
        accountant = accountant.with_threshold(threshold)?;
    }
    Ok(accountant)
}

/// Build the session limiter from the `rate_limit` section.
pub fn build_rate_limiter(settings: &Settings) -> Result<SessionRateLimiter, ConfigurationError> {
    let limits = settings.rate_limit.clone().unwrap_or_default();
    SessionRateLimiter::new(
        limits.max_requests.unwrap_or(DEFAULT_MAX_REQUESTS),
        limits.window_seconds.unwrap_or(DEFAULT_WINDOW_SECONDS),
    )
}

pub fn get_keep_recent(settings: &Settings) -> usize {
    settings
        .context
        .as_ref()
        .and_then(|c| c.keep_recent)
        .unwrap_or(DEFAULT_KEEP_RECENT)
}

/// Every configuration problem in the settings, empty when they're usable.
pub fn validate_settings(settings: &Settings) -> Vec<ConfigurationError> {
    let mut problems = Vec::new();
    if let Err(e) = build_accountant(settings, DEFAULT_MODEL) {
        problems.push(e);
    }
    if let Err(e) = build_rate_limiter(settings) {
        problems.push(e);
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context_window::DEFAULT_SUMMARIZATION_THRESHOLD;
    use crate::types::{ContextSettings, ModelSettings, RateLimitSettings};
    use std::io::Write;
    use tempfile::TempDir;

    fn write_settings(dir: &Path, content: &str) -> PathBuf {
        let file = dir.join("settings.json");
        let mut f = std::fs::File::create(&file).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_get_settings_missing_file() {
        let settings = get_settings(Path::new("/nonexistent/settings.json")).unwrap();
        assert!(settings.model.is_none());
        assert!(settings.rate_limit.is_none());
    }

    #[test]
    fn test_get_settings_empty_json() {
        let tmp = TempDir::new().unwrap();
        let file = write_settings(tmp.path(), "{}");
        let settings = get_settings(&file).unwrap();
        assert!(settings.context.is_none());
    }

    #[test]
    fn test_get_settings_invalid_json_falls_back() {
        let tmp = TempDir::new().unwrap();
        let file = write_settings(tmp.path(), "{ not json");
        let settings = get_settings(&file).unwrap();
        assert!(settings.model.is_none());
    }

    #[test]
    fn test_get_settings_full() {
        let tmp = TempDir::new().unwrap();
        let file = write_settings(
            tmp.path(),
            r#"{
                "model": {
                    "default_model": "sonnet",
                    "context_windows": { "anthropic/claude-3.5-sonnet": 100000 }
                },
                "context": { "summarization_threshold": 0.7, "memory_block_overhead": 6 },
                "rate_limit": { "max_requests": 3, "window_seconds": 30 }
            }"#,
        );
        let settings = get_settings(&file).unwrap();
        assert_eq!(resolve_model(None, &settings), "anthropic/claude-3.5-sonnet");

        let accountant = build_accountant(&settings, "anthropic/claude-3.5-sonnet").unwrap();
        assert_eq!(accountant.summarization_threshold(), 0.7);
        assert_eq!(accountant.memory_block_overhead(), 6);

        let limiter = build_rate_limiter(&settings).unwrap();
        assert_eq!(limiter.max_requests(), 3);
        assert_eq!(limiter.window_seconds(), 30);
        assert!(validate_settings(&settings).is_empty());
    }

    #[test]
    fn test_settings_round_trip_through_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("settings.json");
        let settings = Settings {
            rate_limit: Some(RateLimitSettings {
                max_requests: Some(4),
                window_seconds: Some(20),
            }),
            ..Default::default()
        };
        std::fs::write(&file, serde_json::to_string_pretty(&settings).unwrap()).unwrap();
        let loaded = get_settings(&file).unwrap();
        assert_eq!(loaded.rate_limit.unwrap().max_requests, Some(4));
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(resolve_model(None, &settings), DEFAULT_MODEL);
        assert_eq!(resolve_model(Some("4o"), &settings), "openai/gpt-4o");
        assert_eq!(get_keep_recent(&settings), DEFAULT_KEEP_RECENT);

        let accountant = build_accountant(&settings, DEFAULT_MODEL).unwrap();
        assert_eq!(accountant.summarization_threshold(), DEFAULT_SUMMARIZATION_THRESHOLD);
        assert_eq!(accountant.memory_block_overhead(), DEFAULT_MEMORY_BLOCK_OVERHEAD);

        let limiter = build_rate_limiter(&settings).unwrap();
        assert_eq!(limiter.max_requests(), DEFAULT_MAX_REQUESTS);
        assert_eq!(limiter.window_seconds(), DEFAULT_WINDOW_SECONDS);
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let settings = Settings {
            model: Some(ModelSettings::default()),
            context: Some(ContextSettings {
                summarization_threshold: Some(1.5),
                ..Default::default()
            }),
            rate_limit: Some(RateLimitSettings {
                max_requests: Some(0),
                window_seconds: Some(10),
            }),
        };
        let problems = validate_settings(&settings);
        assert_eq!(
            problems,
            vec![
                ConfigurationError::ThresholdOutOfRange(1.5),
                ConfigurationError::ZeroMaxRequests,
            ]
        );
    }

    #[test]
    fn test_paths_at() {
        let paths = Paths::at(PathBuf::from("/srv/clawmeter"));
        assert_eq!(paths.settings_file, PathBuf::from("/srv/clawmeter/settings.json"));
        assert_eq!(paths.log_file, PathBuf::from("/srv/clawmeter/logs/clawmeter.log"));
    }

    #[test]
    fn test_fallback_home_prefers_local_settings() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join(".clawmeter");
        std::fs::create_dir_all(&local).unwrap();
        write_settings(&local, "{}");
        assert_eq!(Paths::fallback_home(tmp.path()), local);
    }
}
