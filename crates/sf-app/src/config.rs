//! Runtime configuration.
//!
//! Loaded from YAML; every field has a default so a partial file (or none at
//! all) is valid. A few environment variables override the file:
//!
//! - `SIMFLOW_SERVICE_URL`
//! - `SIMFLOW_POLL_INTERVAL_MS`
//! - `SIMFLOW_POLL_MAX_ATTEMPTS`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sf_exec::PollConfig;

use crate::error::{AppError, AppResult};

pub const ENV_SERVICE_URL: &str = "SIMFLOW_SERVICE_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "SIMFLOW_POLL_INTERVAL_MS";
pub const ENV_POLL_MAX_ATTEMPTS: &str = "SIMFLOW_POLL_MAX_ATTEMPTS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimflowConfig {
    pub service: ServiceConfig,
    pub polling: PollConfig,
    pub session: SessionConfig,
    pub repository: RepositoryConfig,
}

impl Default for SimflowConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            polling: PollConfig::default(),
            session: SessionConfig::default(),
            repository: RepositoryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    /// Let the service answer with a background job instead of a result.
    pub background_allowed: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_ms: 30_000,
            background_allowed: true,
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub history_capacity: usize,
    pub undo_capacity: usize,
    pub undo_notice_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: sf_results::HISTORY_CAPACITY,
            undo_capacity: crate::undo::UNDO_CAPACITY,
            undo_notice_ms: crate::undo::UNDO_NOTICE_MS,
        }
    }
}

impl SessionConfig {
    pub fn undo_notice(&self) -> Duration {
        Duration::from_millis(self.undo_notice_ms)
    }
}

/// Where simulations are persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepositoryConfig {
    File { root_dir: PathBuf },
    Http { base_url: String },
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self::File {
            root_dir: PathBuf::from(".simflow").join("simulations"),
        }
    }
}

impl SimflowConfig {
    /// Load a YAML config file, then apply environment overrides.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::from_yaml_str(&content)?;
        config.with_env_overrides()
    }

    /// Load `path` if given, otherwise defaults; environment overrides apply either way.
    pub fn load_or_default(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::default().with_env_overrides(),
        }
    }

    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_env_overrides(self) -> AppResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup` (the environment in production).
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> AppResult<Self> {
        if let Some(url) = lookup(ENV_SERVICE_URL) {
            self.service.base_url = url;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            self.polling.interval_ms = parse_env(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_POLL_MAX_ATTEMPTS) {
            self.polling.max_attempts = parse_env(ENV_POLL_MAX_ATTEMPTS, &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.service.base_url.trim().is_empty() {
            return Err(AppError::Config("service.base_url must not be empty".to_string()));
        }
        if self.polling.max_attempts == 0 {
            return Err(AppError::Config(
                "polling.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.session.undo_capacity == 0 || self.session.history_capacity == 0 {
            return Err(AppError::Config(
                "session capacities must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} has an invalid value: {:?}", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = SimflowConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, SimflowConfig::default());
        assert_eq!(config.polling.max_attempts, 60);
        assert_eq!(config.polling.interval_ms, 2000);
        assert_eq!(config.session.history_capacity, 50);
        assert_eq!(config.session.undo_capacity, 10);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = SimflowConfig::from_yaml_str(
            "service:\n  base_url: http://exec:9000\npolling:\n  interval_ms: 500\nrepository:\n  kind: http\n  base_url: http://api\n",
        )
        .unwrap();
        assert_eq!(config.service.base_url, "http://exec:9000");
        assert!(config.service.background_allowed);
        assert_eq!(config.polling.interval_ms, 500);
        assert_eq!(config.polling.max_attempts, 60);
        assert_eq!(
            config.repository,
            RepositoryConfig::Http {
                base_url: "http://api".to_string()
            }
        );
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = SimflowConfig::default()
            .with_overrides_from(|key| match key {
                ENV_SERVICE_URL => Some("http://override".to_string()),
                ENV_POLL_MAX_ATTEMPTS => Some("5".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.service.base_url, "http://override");
        assert_eq!(config.polling.max_attempts, 5);
    }

    #[test]
    fn bad_override_is_a_config_error() {
        let err = SimflowConfig::default()
            .with_overrides_from(|key| (key == ENV_POLL_INTERVAL_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn zero_attempts_rejected() {
        assert!(SimflowConfig::from_yaml_str("polling:\n  max_attempts: 0\n").is_err());
    }
}
