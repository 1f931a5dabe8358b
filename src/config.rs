//! Pipeline configuration
//!
//! Configuration is built once by the caller (normally the CLI) and passed
//! into every stage. Values come from, in increasing priority:
//!
//! 1. built-in defaults,
//! 2. a TOML file (`--config` or `~/.rusty-fx/config.toml`),
//! 3. the process environment, after loading a `.env` file if present.

use crate::error::{FxError, Result};
use crate::schema::ReportSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_CURRENCY: &str = "BRL";
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_LLM_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Rate-quote API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            base_currency: default_base_currency(),
        }
    }
}

/// Text-generation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_llm_model(),
            endpoint: default_llm_endpoint(),
        }
    }
}

/// Top-level configuration threaded through every stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    /// Overrides the schema derived from the base currency
    #[serde(default)]
    pub schema: Option<ReportSchema>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data_layers")
}

fn default_report_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_base_currency() -> String {
    DEFAULT_BASE_CURRENCY.to_string()
}

fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

fn default_llm_endpoint() -> String {
    DEFAULT_LLM_ENDPOINT.to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            report_dir: default_report_dir(),
            api: ApiConfig::default(),
            llm: LlmConfig::default(),
            schema: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from file (if any) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(config_path) => Self::from_file(config_path)?,
            None => match Self::default_path() {
                Some(default_path) if default_path.exists() => Self::from_file(&default_path)?,
                _ => Self::default(),
            },
        };

        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Failed to load .env file: {}", e);
            }
        }
        config.apply_env(|key| std::env::var(key).ok());

        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            FxError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| FxError::Config(format!("Failed to parse config: {}", e)))
    }

    /// `~/.rusty-fx/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".rusty-fx").join("config.toml"))
    }

    /// Apply environment overrides using the given lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty("FX_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = non_empty("API_BASE_URL") {
            self.api.base_url = Some(url);
        }
        if let Some(key) = non_empty("API_KEY") {
            self.api.api_key = Some(key);
        }
        if let Some(base) = non_empty("BASE_CURRENCY").or_else(|| non_empty("MOEDA_BASE")) {
            self.api.base_currency = base.trim().to_uppercase();
        }
        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = non_empty("LLM_MODEL") {
            self.llm.model = model;
        }
    }

    pub fn bronze_dir(&self) -> PathBuf {
        self.data_dir.join("bronze")
    }

    pub fn silver_dir(&self) -> PathBuf {
        self.data_dir.join("silver")
    }

    pub fn gold_dir(&self) -> PathBuf {
        self.data_dir.join("gold")
    }

    /// Create the layer directories and the report directory
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(self.bronze_dir())?;
        fs::create_dir_all(self.silver_dir())?;
        fs::create_dir_all(self.gold_dir())?;
        fs::create_dir_all(&self.report_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data_layers"));
        assert_eq!(config.api.base_currency, "BRL");
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.gold_dir(), PathBuf::from("data_layers").join("gold"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            data_dir = "/tmp/layers"

            [api]
            base_url = "https://v6.exchangerate-api.com/v6"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/layers"));
        assert_eq!(config.api.base_currency, "BRL");
        assert!(config.api.api_key.is_none());
        assert!(config.schema.is_none());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = PipelineConfig::from_toml("data_dir = [").unwrap_err();
        assert!(matches!(err, FxError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("API_KEY", "secret"),
            ("API_BASE_URL", "https://rates.example.com/v6/"),
            ("MOEDA_BASE", "usd"),
            ("GEMINI_API_KEY", ""),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.base_currency, "USD");
        assert_eq!(config.api.api_key.as_deref(), Some("secret"));
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_schema_override_from_toml() {
        let config = PipelineConfig::from_toml(
            r#"
            [schema]
            renames = [{ source = "JPY", output = "BRL_to_JPY" }]
            cross_rates = []
            "#,
        )
        .unwrap();

        let schema = config.schema.unwrap();
        assert_eq!(schema.renames.len(), 1);
        assert_eq!(schema.renames[0].output, "BRL_to_JPY");
    }
}
