//! Application configuration, persisted as TOML in the XDG config dir.
//!
//! Every field has a default; a missing config file means defaults, a
//! malformed one is a diagnosed error rather than a silent fallback.

use std::path::PathBuf;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assistant::AssistantConfig;
use crate::reader::DEFAULT_COLUMN_WIDTH;

/// Errors from configuration handling.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(quire::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(quire::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(quire::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Overrides the XDG data directory when set.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub assistant: AssistantSection,
    #[serde(default)]
    pub reader: ReaderSection,
}

/// `[assistant]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantSection {
    /// Base URL for the Ollama API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name to use.
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// `[reader]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderSection {
    /// Wrapped-text column width the reader starts with.
    #[serde(default = "default_column_width")]
    pub column_width: u16,
    /// Whether chat questions attach the current page's text as context.
    #[serde(default = "default_attach_page_context")]
    pub attach_page_context: bool,
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "llama3.2".into()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_column_width() -> u16 {
    DEFAULT_COLUMN_WIDTH
}
fn default_attach_page_context() -> bool {
    true
}

impl Default for AssistantSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            column_width: default_column_width(),
            attach_page_context: default_attach_page_context(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file.
    pub fn load(path: &std::path::Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from a TOML file, falling back to defaults when the file does
    /// not exist. A present-but-malformed file is still an error.
    pub fn load_or_default(path: &std::path::Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &std::path::Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// The assistant client configuration this config describes.
    pub fn assistant_config(&self) -> AssistantConfig {
        AssistantConfig {
            base_url: self.assistant.base_url.clone(),
            model: self.assistant.model.clone(),
            timeout_secs: self.assistant.timeout_secs,
        }
    }
}
