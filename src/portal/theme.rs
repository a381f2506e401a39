use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stored theme choice. `System` follows `prefers-color-scheme`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemePreference {
    /// Concrete theme given whether the system prefers dark.
    pub fn resolve(self, system_dark: bool) -> ThemePreference {
        match self {
            Self::System if system_dark => Self::Dark,
            Self::System => Self::Light,
            concrete => concrete,
        }
    }

    /// Flip the resolved theme. The result is always concrete.
    pub fn toggle(self, system_dark: bool) -> ThemePreference {
        match self.resolve(system_dark) {
            Self::Dark => Self::Light,
            _ => Self::Dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

impl FromStr for ThemePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" | "" => Ok(Self::System),
            other => Err(format!("unknown theme '{other}'")),
        }
    }
}
