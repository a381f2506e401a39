use std::path::{Component, PathBuf};

use crate::config::helpers::{parse_bool_env, parse_string_env};
use crate::error::ConfigError;
use crate::settings::Settings;

/// Location of the portal's embedded database file.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Insert the sample firm on `serve` when the database has no users.
    pub seed_sample_data: bool,
}

impl DatabaseConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let raw = parse_string_env("NOLIVOS_DB_PATH", settings.database.path.clone())?;
        Ok(Self {
            path: validate_database_path(&raw)?,
            seed_sample_data: parse_bool_env(
                "NOLIVOS_SEED_SAMPLE_DATA",
                settings.database.seed_sample_data,
            )?,
        })
    }
}

/// Normalize the database path. Relative paths are resolved against the
/// working directory and may not climb out of it; absolute paths are kept.
fn validate_database_path(raw: &str) -> Result<PathBuf, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "NOLIVOS_DB_PATH".to_string(),
            message: "database path must not be empty".to_string(),
        });
    }

    let raw_path = PathBuf::from(trimmed);
    if raw_path.is_absolute() {
        return Ok(raw_path);
    }

    let mut normalized = PathBuf::new();
    for component in raw_path.components() {
        match component {
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(ConfigError::InvalidValue {
                    key: "NOLIVOS_DB_PATH".to_string(),
                    message: "relative database path must not contain '..' components"
                        .to_string(),
                });
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ConfigError::InvalidValue {
                    key: "NOLIVOS_DB_PATH".to_string(),
                    message: "unexpected root component in relative path".to_string(),
                });
            }
        }
    }

    if normalized.file_name().is_none() {
        return Err(ConfigError::InvalidValue {
            key: "NOLIVOS_DB_PATH".to_string(),
            message: "database path must name a file".to_string(),
        });
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::error::ConfigError;

    #[test]
    fn validate_database_path_normalizes_cur_dir() {
        let path = super::validate_database_path("./data/./nolivos_law.db").expect("valid");
        assert_eq!(path, PathBuf::from("data/nolivos_law.db"));
    }

    #[test]
    fn validate_database_path_keeps_absolute_paths() {
        let absolute = if cfg!(windows) {
            r"C:\srv\nolivos.db"
        } else {
            "/srv/nolivos.db"
        };
        let path = super::validate_database_path(absolute).expect("valid");
        assert_eq!(path, PathBuf::from(absolute));
    }

    #[test]
    fn validate_database_path_rejects_parent_dir_traversal() {
        let err = super::validate_database_path("../outside.db").expect_err("must reject '..'");
        let ConfigError::InvalidValue { key, message } = err else {
            panic!("expected InvalidValue");
        };
        assert_eq!(key, "NOLIVOS_DB_PATH");
        assert!(message.contains(".."), "unexpected message: {message}");
    }

    #[test]
    fn validate_database_path_rejects_empty() {
        let err = super::validate_database_path("   ").expect_err("empty must be rejected");
        let ConfigError::InvalidValue { message, .. } = err else {
            panic!("expected InvalidValue");
        };
        assert!(message.contains("empty"), "unexpected message: {message}");
    }
}
