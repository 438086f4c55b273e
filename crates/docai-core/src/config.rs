use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DocAiError, Result};

/// Environment variable overriding [`ApiConfig::endpoint`].
pub const ENV_SERVER_URL: &str = "DOCAI_SERVER_URL";
/// Environment variable overriding [`RetryConfig::retry_ceiling`].
pub const ENV_RETRY_CEILING: &str = "DOCAI_RETRY_CEILING";
/// Environment variable overriding [`RetryConfig::backoff_unit_ms`].
pub const ENV_BACKOFF_UNIT_MS: &str = "DOCAI_BACKOFF_UNIT_MS";

/// Top-level configuration for the DocAI client.
///
/// Loaded from `~/.docai/config.toml` by default. Every section falls back
/// to its defaults when missing, so an empty file is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocAiConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl DocAiConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DocAiConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DocAiError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply `DOCAI_*` environment overrides on top of the loaded values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unset keys leave the current value alone; a set but unparsable
    /// numeric value is a configuration error.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SERVER_URL) {
            self.api.endpoint = url;
        }
        if let Some(raw) = lookup(ENV_RETRY_CEILING) {
            self.retry.retry_ceiling = raw.trim().parse().map_err(|_| {
                DocAiError::Config(format!("{} must be an integer, got '{}'", ENV_RETRY_CEILING, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_BACKOFF_UNIT_MS) {
            self.retry.backoff_unit_ms = raw.trim().parse().map_err(|_| {
                DocAiError::Config(format!(
                    "{} must be an integer, got '{}'",
                    ENV_BACKOFF_UNIT_MS, raw
                ))
            })?;
        }
        self.validate()
    }

    /// Check values that would make the client unusable.
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.api.endpoint.trim();
        if endpoint.is_empty() {
            return Err(DocAiError::Config("api.endpoint must not be empty".to_string()));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(DocAiError::Config(format!(
                "api.endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }
        if self.retry.retry_ceiling == 0 {
            return Err(DocAiError::Config(
                "retry.retry_ceiling must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Where and how queries are sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the query backend.
    pub endpoint: String,
    /// Relative path appended to `endpoint` for each query.
    pub query_path: String,
    /// Per-request timeout in seconds. A timeout counts as a transport failure.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/".to_string(),
            query_path: "query".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Retry ceiling and backoff for rate-limited or failed calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of network attempts per user turn.
    pub retry_ceiling: u32,
    /// Backoff unit in milliseconds; the k-th wait is `k * backoff_unit_ms`.
    pub backoff_unit_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_ceiling: 10,
            backoff_unit_ms: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = DocAiConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.api.endpoint, "http://127.0.0.1:8000/");
        assert_eq!(config.api.query_path, "query");
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.retry.retry_ceiling, 10);
        assert_eq!(config.retry.backoff_unit_ms, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[api]
endpoint = "http://10.0.0.5:9000/"
query_path = "v1/query"
request_timeout_secs = 5

[retry]
retry_ceiling = 3
backoff_unit_ms = 500
"#;
        let file = create_temp_config(content);
        let config = DocAiConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.api.endpoint, "http://10.0.0.5:9000/");
        assert_eq!(config.api.query_path, "v1/query");
        assert_eq!(config.api.request_timeout_secs, 5);
        assert_eq!(config.retry.retry_ceiling, 3);
        assert_eq!(config.retry.backoff_unit_ms, 500);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[retry]
retry_ceiling = 4
"#;
        let file = create_temp_config(content);
        let config = DocAiConfig::load(file.path()).unwrap();
        assert_eq!(config.retry.retry_ceiling, 4);
        // Remaining fields use defaults
        assert_eq!(config.retry.backoff_unit_ms, 2000);
        assert_eq!(config.api.query_path, "query");
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = DocAiConfig::load(file.path()).unwrap();
        assert_eq!(config.api.endpoint, "http://127.0.0.1:8000/");
        assert_eq!(config.retry.retry_ceiling, 10);
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = DocAiConfig::load(file.path());
        assert!(matches!(result, Err(DocAiError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = DocAiConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.retry.retry_ceiling, 10);
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("dir").join("config.toml");

        let mut config = DocAiConfig::default();
        config.retry.backoff_unit_ms = 750;
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = DocAiConfig::load(&path).unwrap();
        assert_eq!(reloaded.retry.backoff_unit_ms, 750);
        assert_eq!(reloaded.api.endpoint, config.api.endpoint);
    }

    // ---- Overrides ----

    #[test]
    fn test_overrides_replace_values() {
        let mut config = DocAiConfig::default();
        config
            .apply_overrides_from(lookup_from(&[
                (ENV_SERVER_URL, "https://docai.example.org/"),
                (ENV_RETRY_CEILING, "5"),
                (ENV_BACKOFF_UNIT_MS, " 100 "),
            ]))
            .unwrap();
        assert_eq!(config.api.endpoint, "https://docai.example.org/");
        assert_eq!(config.retry.retry_ceiling, 5);
        assert_eq!(config.retry.backoff_unit_ms, 100);
    }

    #[test]
    fn test_overrides_absent_keys_keep_values() {
        let mut config = DocAiConfig::default();
        config.apply_overrides_from(lookup_from(&[])).unwrap();
        assert_eq!(config.api.endpoint, "http://127.0.0.1:8000/");
        assert_eq!(config.retry.retry_ceiling, 10);
    }

    #[test]
    fn test_overrides_reject_non_numeric_ceiling() {
        let mut config = DocAiConfig::default();
        let err = config
            .apply_overrides_from(lookup_from(&[(ENV_RETRY_CEILING, "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_RETRY_CEILING));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = DocAiConfig::default();
        config.api.endpoint = "ftp://nowhere".to_string();
        assert!(config.validate().is_err());

        let mut config = DocAiConfig::default();
        config.api.endpoint = "   ".to_string();
        assert!(config.validate().is_err());

        let mut config = DocAiConfig::default();
        config.retry.retry_ceiling = 0;
        assert!(config.validate().is_err());
    }
}
