//! Runtime configuration.
//!
//! Values come from three layers, lowest precedence first: built-in defaults,
//! the TOML settings file, and environment variables (optionally seeded from a
//! `.env` file by the binary).

mod database;
mod gateway;
pub(crate) mod helpers;
mod upstream;

pub use database::DatabaseConfig;
pub use gateway::{AssistantConfig, GatewayConfig};
pub use upstream::UpstreamConfig;

use crate::error::ConfigError;
use crate::settings::Settings;

/// Fully resolved portal configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub upstream: UpstreamConfig,
    pub assistant: AssistantConfig,
}

impl Config {
    pub fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            database: DatabaseConfig::resolve(settings)?,
            gateway: GatewayConfig::resolve(settings)?,
            upstream: UpstreamConfig::resolve(settings)?,
            assistant: AssistantConfig::resolve(settings)?,
        })
    }
}
