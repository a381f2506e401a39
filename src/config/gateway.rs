use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::config::helpers::{parse_bool_env, parse_env, parse_string_env};
use crate::error::ConfigError;
use crate::settings::Settings;

/// HTTP listener and request-shaping settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub addr: SocketAddr,
    pub chat_rate_limit: u64,
    pub chat_rate_window_secs: u64,
    pub demo_user_email: String,
    pub secure_cookies: bool,
}

impl GatewayConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let gateway = &settings.gateway;
        let host = parse_string_env("NOLIVOS_HOST", gateway.host.clone())?;
        let ip: IpAddr = host.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: "NOLIVOS_HOST".to_string(),
            message: format!("'{host}' is not an IP address"),
        })?;
        let port = parse_env("NOLIVOS_PORT", gateway.port)?;
        let chat_rate_limit = parse_env("NOLIVOS_CHAT_RATE_LIMIT", gateway.chat_rate_limit)?;
        if chat_rate_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "NOLIVOS_CHAT_RATE_LIMIT".to_string(),
                message: "rate limit must allow at least one request".to_string(),
            });
        }

        Ok(Self {
            addr: SocketAddr::new(ip, port),
            chat_rate_limit,
            chat_rate_window_secs: parse_env(
                "NOLIVOS_CHAT_RATE_WINDOW_SECS",
                gateway.chat_rate_window_secs,
            )?
            .max(1),
            demo_user_email: parse_string_env(
                "NOLIVOS_DEMO_USER_EMAIL",
                gateway.demo_user_email.clone(),
            )?,
            secure_cookies: parse_bool_env("NOLIVOS_SECURE_COOKIES", gateway.secure_cookies)?,
        })
    }
}

/// Assistant session behaviour.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub firm_name: String,
    pub session_ttl: Duration,
}

impl AssistantConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let ttl_secs = parse_env(
            "NOLIVOS_SESSION_TTL_SECS",
            settings.assistant.session_ttl_secs,
        )?;
        Ok(Self {
            firm_name: parse_string_env(
                "NOLIVOS_FIRM_NAME",
                settings.assistant.firm_name.clone(),
            )?,
            session_ttl: Duration::from_secs(ttl_secs.max(60)),
        })
    }
}
