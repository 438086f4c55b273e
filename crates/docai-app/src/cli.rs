//! CLI argument definitions for the DocAI client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::Parser;
use docai_core::config::DocAiConfig;
use docai_core::Result;

/// DocAI: chat with the medical query backend from a terminal.
#[derive(Parser, Debug)]
#[command(name = "docai", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Base URL of the query backend.
    #[arg(short = 'e', long = "endpoint")]
    pub endpoint: Option<String>,

    /// Maximum network attempts per question.
    #[arg(long = "retry-ceiling")]
    pub retry_ceiling: Option<u32>,

    /// Backoff unit in milliseconds.
    #[arg(long = "backoff-ms")]
    pub backoff_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Ask a single question and exit instead of reading from stdin.
    #[arg(short = 'q', long = "query")]
    pub query: Option<String>,

    /// Print the conversation as JSON on exit.
    #[arg(long = "transcript")]
    pub transcript: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > DOCAI_CONFIG env var > ~/.docai/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("DOCAI_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Load the config file, then apply env overrides and flags and validate.
    ///
    /// A file named with `--config` must load. The implicit path falls
    /// back to defaults with a warning.
    pub fn load_config(&self) -> Result<DocAiConfig> {
        let path = self.resolve_config_path();
        let mut config = if self.config.is_some() {
            DocAiConfig::load(&path)?
        } else {
            DocAiConfig::load_or_default(&path)
        };
        config.apply_env_overrides()?;
        self.apply_to(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Overwrite config values with any flags that were given.
    pub fn apply_to(&self, config: &mut DocAiConfig) {
        if let Some(ref endpoint) = self.endpoint {
            config.api.endpoint = endpoint.clone();
        }
        if let Some(ceiling) = self.retry_ceiling {
            config.retry.retry_ceiling = ceiling;
        }
        if let Some(ms) = self.backoff_ms {
            config.retry.backoff_unit_ms = ms;
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".docai").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".docai").join("config.toml");
    }
    PathBuf::from("config.toml")
}
