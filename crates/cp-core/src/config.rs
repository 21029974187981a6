use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::origin::{default_allowed_origins, is_allowed_origin};

/// Environment variable that supplies the primary extension id, ahead of
/// the built-in fallback list.
pub const EXTENSION_ID_ENV: &str = "CODEPRESS_EXTENSION_ID";

/// Top-level configuration loaded from `~/.codepress/config.toml`.
///
/// Every section is optional; missing keys take the built-in defaults so a
/// partial file (or no file at all) yields a working bridge.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub extension: ExtensionConfig,
}

impl Config {
    /// Load config from `~/.codepress/config.toml`, falling back to
    /// defaults when the file does not exist.
    ///
    /// Environment overrides are applied before validation.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(Self::default_path(), |key| std::env::var(key).ok())
    }

    /// Load from a specific path, with environment overrides applied before
    /// validation.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let mut cfg = Self::read_from(&path)?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Like [`Config::load`] for an arbitrary path and an injectable
    /// environment lookup. A missing file yields the defaults.
    pub fn load_with<F>(path: impl Into<PathBuf>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.into();
        let mut cfg = if path.exists() {
            Self::read_from(&path)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Config::default()
        };
        cfg.apply_overrides_from(lookup);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a file without applying overrides or validating.
    fn read_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Overlay values that come from the process environment.
    ///
    /// Only `CODEPRESS_EXTENSION_ID` is read; an empty value is ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Same as [`Config::apply_env_overrides`] with an injectable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup(EXTENSION_ID_ENV) {
            let id = id.trim();
            if !id.is_empty() {
                self.extension.extension_id = Some(id.to_string());
            }
        }
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general.validate()?;
        self.extension.validate()?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".codepress")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `human` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl GeneralConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.log_format.as_str() {
            "human" | "json" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "general.log_format must be 'human' or 'json', got '{}'",
                other
            ))),
        }
    }
}

fn default_project_name() -> String {
    "codepress".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "human".into()
}

/// Settings for discovering and talking to the companion browser extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionConfig {
    /// Primary extension id, tried before `fallback_ids`. Usually supplied
    /// through [`EXTENSION_ID_ENV`].
    #[serde(default)]
    pub extension_id: Option<String>,
    /// Reported as the extension id while no candidate has been validated.
    #[serde(default = "default_extension_id")]
    pub default_extension_id: String,
    #[serde(default = "default_fallback_ids")]
    pub fallback_ids: Vec<String>,
    /// Shared static tag attached to every envelope. Not a secret.
    #[serde(default = "default_auth_key")]
    pub auth_key: String,
    /// Name the extension must report in its handshake acknowledgment.
    #[serde(default = "default_extension_name")]
    pub extension_name: String,
    /// Origin of the page sending messages.
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            extension_id: None,
            default_extension_id: default_extension_id(),
            fallback_ids: default_fallback_ids(),
            auth_key: default_auth_key(),
            extension_name: default_extension_name(),
            origin: default_origin(),
            allowed_origins: default_allowed_origins(),
            probe_timeout_ms: default_probe_timeout_ms(),
            message_timeout_ms: default_message_timeout_ms(),
        }
    }
}

impl ExtensionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "extension.probe_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.message_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "extension.message_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.auth_key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "extension.auth_key must not be empty".to_string(),
            ));
        }
        if self.extension_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "extension.extension_name must not be empty".to_string(),
            ));
        }
        let has_candidate = self
            .extension_id
            .iter()
            .chain(self.fallback_ids.iter())
            .any(|id| !id.trim().is_empty());
        if !has_candidate {
            return Err(ConfigError::Validation(
                "extension: no candidate extension ids configured (set extension_id or fallback_ids)"
                    .to_string(),
            ));
        }
        if !self.allowed_origins.is_empty()
            && !is_allowed_origin(&self.origin, &self.allowed_origins)
        {
            return Err(ConfigError::Validation(format!(
                "extension.origin '{}' is not in extension.allowed_origins",
                self.origin
            )));
        }
        Ok(())
    }
}

fn default_extension_id() -> String {
    "hmhhoflnihobaldenandeddhmdenafjb".into()
}
fn default_fallback_ids() -> Vec<String> {
    vec![
        "dmjmpdhjbbggepdpbcjckohfkflckicn".into(),
        "hmhhoflnihobaldenandeddhmdenafjb".into(),
    ]
}
fn default_auth_key() -> String {
    "codepress-secure-messaging-v1".into()
}
fn default_extension_name() -> String {
    "CodePress".into()
}
fn default_origin() -> String {
    "http://localhost:3000".into()
}
fn default_probe_timeout_ms() -> u64 {
    3000
}
fn default_message_timeout_ms() -> u64 {
    5000
}
