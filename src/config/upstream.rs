use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::config::helpers::{optional_env, parse_env, parse_string_env};
use crate::error::ConfigError;
use crate::settings::Settings;

/// Endpoints of the third-party services the assistant and news feed proxy.
///
/// Each service is optional; routes backed by an unconfigured service answer
/// with an upstream error instead of failing startup.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// IA Migrante document API (questions + generation).
    pub documents_url: Option<Url>,
    /// OpenAI-compatible chat completion API base.
    pub chat_url: Option<Url>,
    pub chat_model: String,
    pub chat_api_key: Option<SecretString>,
    /// Immigration news aggregator.
    pub news_url: Option<Url>,
    pub timeout: Duration,
}

impl UpstreamConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let upstream = &settings.upstream;
        let documents_url = parse_service_url(
            "NOLIVOS_DOCUMENTS_URL",
            optional_env("NOLIVOS_DOCUMENTS_URL")?.or_else(|| upstream.documents_url.clone()),
        )?;
        let chat_url = parse_service_url(
            "NOLIVOS_CHAT_URL",
            optional_env("NOLIVOS_CHAT_URL")?.or_else(|| upstream.chat_url.clone()),
        )?;
        let news_url = parse_service_url(
            "NOLIVOS_NEWS_URL",
            optional_env("NOLIVOS_NEWS_URL")?.or_else(|| upstream.news_url.clone()),
        )?;
        let chat_api_key = optional_env("NOLIVOS_CHAT_API_KEY")?
            .or(optional_env("OPENAI_API_KEY")?)
            .map(SecretString::from);
        let timeout_secs = parse_env("NOLIVOS_UPSTREAM_TIMEOUT_SECS", upstream.timeout_secs)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "NOLIVOS_UPSTREAM_TIMEOUT_SECS".to_string(),
                message: "timeout must be at least one second".to_string(),
            });
        }

        Ok(Self {
            documents_url,
            chat_url,
            chat_model: parse_string_env("NOLIVOS_CHAT_MODEL", upstream.chat_model.clone())?,
            chat_api_key,
            news_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_service_url(key: &str, raw: Option<String>) -> Result<Option<Url>, ConfigError> {
    let Some(raw) = raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("invalid URL '{raw}': {e}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(Some(url)),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("unsupported scheme '{other}'"),
        }),
    }
}
