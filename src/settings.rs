//! File-backed settings.
//!
//! Settings are read from an optional TOML file and act as the defaults that
//! environment variables override during config resolution.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub gateway: GatewaySettings,
    pub upstream: UpstreamSettings,
    pub assistant: AssistantSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: String,
    pub seed_sample_data: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub host: String,
    pub port: u16,
    pub chat_rate_limit: u64,
    pub chat_rate_window_secs: u64,
    /// Email of the user returned by `/api/user` when no one is signed in.
    pub demo_user_email: String,
    /// Mark the sign-in cookie `Secure` (HTTPS deployments).
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    pub documents_url: Option<String>,
    pub chat_url: Option<String>,
    pub chat_model: String,
    pub news_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    pub firm_name: String,
    pub session_ttl_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            gateway: GatewaySettings::default(),
            upstream: UpstreamSettings::default(),
            assistant: AssistantSettings::default(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "data/nolivos_law.db".to_string(),
            seed_sample_data: false,
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            chat_rate_limit: 30,
            chat_rate_window_secs: 60,
            demo_user_email: "cliente1@example.com".to_string(),
            secure_cookies: false,
        }
    }
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            documents_url: None,
            chat_url: None,
            chat_model: "gpt-4o-mini".to_string(),
            news_url: None,
            timeout_secs: 30,
        }
    }
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            firm_name: "Nolivos Law".to_string(),
            session_ttl_secs: 60 * 60,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(ConfigError::ParseError(format!(
                    "cannot read {}: {}",
                    path.display(),
                    err
                )));
            }
        };
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
