//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.iqreport.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cli::{Args, OutputFormat};

pub const CONFIG_FILE: &str = ".iqreport.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Client behaviour.
    #[serde(default)]
    pub client: ClientConfig,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Policy server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the server.
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: default_username(),
            password: default_password(),
        }
    }
}

fn default_url() -> String {
    "http://localhost:8070".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "admin123".to_string()
}

/// Request and fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Overall deadline for one command in seconds. 0 disables it.
    #[serde(default)]
    pub deadline_seconds: u64,

    /// Number of concurrent report retrievals during aggregations.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            deadline_seconds: 0,
            concurrency: default_concurrency(),
        }
    }
}

fn default_timeout() -> u64 {
    60
}

fn default_concurrency() -> usize {
    4
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// `markdown` or `json`.
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "markdown".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from `dir/.iqreport.toml`.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings. Only values
    /// given explicitly (or through the environment) override the file.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref url) = args.url {
            self.server.url = url.clone();
        }
        if let Some(ref username) = args.username {
            self.server.username = username.clone();
        }
        if let Some(ref password) = args.password {
            self.server.password = password.clone();
        }

        if let Some(timeout) = args.timeout {
            self.client.timeout_seconds = timeout;
        }
        if let Some(deadline) = args.deadline {
            self.client.deadline_seconds = deadline;
        }
        if let Some(concurrency) = args.concurrency {
            self.client.concurrency = concurrency;
        }

        if let Some(format) = args.format {
            self.output.format = format.as_str().to_string();
        }
    }

    /// Effective output format; unknown values fall back to Markdown.
    pub fn output_format(&self) -> OutputFormat {
        match self.output.format.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Markdown,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
