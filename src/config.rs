//! Configuration with XDG paths
//!
//! ~/.config/ollabench/config.json - base URL, default model
//!
//! The OLLAMA_BASE_URL environment variable always wins over the file.
//! The base URL is resolved once when a client is constructed and never
//! re-read during a run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "ollabench";

/// Default Ollama endpoint when neither env nor config specify one
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Get config directory (~/.config/ollabench/)
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .context("Could not determine config directory")?;
    Ok(base.join(APP_NAME))
}

/// Get config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ollama base URL (e.g. http://localhost:11434)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Default model for CLI runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl Config {
    /// Load config from disk, or return defaults
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(config_dir()?)?;
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, &content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Resolve the Ollama base URL: environment variable first, then config
/// file, then the documented default. Trailing slashes are stripped so
/// path concatenation stays uniform.
pub fn base_url() -> String {
    let env = std::env::var("OLLAMA_BASE_URL").ok();
    let file = Config::load().ok().and_then(|c| c.base_url);
    resolve_base_url(env.as_deref(), file.as_deref())
}

/// Resolution rule, separated from the process environment so it can be
/// exercised directly. Empty strings count as absent.
pub fn resolve_base_url(env: Option<&str>, file: Option<&str>) -> String {
    let raw = env
        .filter(|v| !v.is_empty())
        .or_else(|| file.filter(|v| !v.is_empty()))
        .unwrap_or(DEFAULT_BASE_URL);
    raw.trim_end_matches('/').to_string()
}
