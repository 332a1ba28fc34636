use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use dq_core::model_client::{
    DEFAULT_BACKOFF, DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_OUTPUT_TOKENS,
    DEFAULT_TEMPERATURE,
};
use dq_core::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderSection,

    #[serde(default)]
    pub query: QuerySection,

    #[serde(default)]
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSection {
    /// `gemini` or `openai`. Inferred when unset.
    #[serde(rename = "type", default)]
    pub provider_type: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySection {
    pub max_attempts: u32,
    pub backoff_secs: f64,
    /// Per-call deadline. Zero or negative disables it.
    pub timeout_secs: f64,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub batch_concurrency: usize,
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_secs: DEFAULT_BACKOFF.as_secs_f64(),
            timeout_secs: DEFAULT_CALL_TIMEOUT.as_secs_f64(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            batch_concurrency: 1,
        }
    }
}

impl QuerySection {
    /// Build the retry policy, rejecting durations that do not fit (`inf`, huge values).
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let backoff = Duration::try_from_secs_f64(self.backoff_secs.max(0.0))
            .with_context(|| format!("Invalid [query] backoff_secs: {}", self.backoff_secs))?;
        let call_timeout = if self.timeout_secs > 0.0 {
            Some(
                Duration::try_from_secs_f64(self.timeout_secs)
                    .with_context(|| format!("Invalid [query] timeout_secs: {}", self.timeout_secs))?,
            )
        } else {
            None
        };

        Ok(RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            backoff,
            call_timeout,
        })
    }
}

/// Storage locations (support $VAR, ${VAR}, ~)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    /// Directory of `<id>.txt` files. Defaults to `<config dir>/documents`.
    #[serde(default)]
    pub documents_dir: Option<String>,

    /// JSON-lines history file. Defaults to `<config dir>/history.jsonl`.
    #[serde(default)]
    pub history_file: Option<String>,
}

/// Expand environment variables in a path string
/// Supports: $VAR, ${VAR}, ~
pub fn expand_path(path: &str) -> PathBuf {
    let mut result = path.to_string();

    if result.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            result = format!("{}{}", home.display(), &result[1..]);
        }
    } else if result == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    let Ok(re) = regex::Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?") else {
        return PathBuf::from(result);
    };
    let expanded = re.replace_all(&result, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    });

    PathBuf::from(expanded.to_string())
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicitly named file must exist; a missing default file yields
    /// the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::config_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("dq"))
    }

    pub fn documents_dir(&self) -> Result<PathBuf> {
        match &self.storage.documents_dir {
            Some(dir) => Ok(expand_path(dir)),
            None => Ok(Self::config_dir()?.join("documents")),
        }
    }

    pub fn history_file(&self) -> Result<PathBuf> {
        match &self.storage.history_file {
            Some(file) => Ok(expand_path(file)),
            None => Ok(Self::config_dir()?.join("history.jsonl")),
        }
    }
}
