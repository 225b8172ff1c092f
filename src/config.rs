use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

// Config file layout
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub processing: ProcessingConfig,
    pub database: DatabaseConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProcessingConfig {
    pub max_retries: u32,
    pub request_delay_ms: u64,
    pub request_timeout_seconds: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        ProcessingConfig {
            max_retries: 0,
            request_delay_ms: 500,
            request_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub db_file: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            db_file: "flashcards.db".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub export_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            export_file: "flashcards.csv".to_string(),
        }
    }
}

impl Config {
    // Missing file means defaults; a present but broken file is an error
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("cannot read config file {}: {}", path.display(), e))?;
            Config::parse(&content)?
        } else {
            tracing::debug!("no config file at {}, using defaults", path.display());
            Config::default()
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.api.api_key = Some(key.trim().to_string());
            }
        }

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Config> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("failed to parse config file: {}", e))
    }
}
