//! Server configuration
//!
//! Loaded from `cutbrain.toml` with compiled-in defaults; the file is
//! optional. Validation happens once at startup and bad values fail fast.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8085".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: "./cutbrain_data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Control-panel owner emails allowed on the algorithm routes.
    pub owner_emails: Vec<String>,
    /// Shared dev password expected in the password header.
    pub dev_password: String,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            owner_emails: vec!["ops@cutbrain.local".to_string()],
            dev_password: "dev-only-password".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub window_ms: u64,
    pub max: u32,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSection {
    /// Minutes between scheduled feedback-loop runs (0 disables).
    pub interval_minutes: u64,
}

impl Default for FeedbackSection {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub auth: AuthSection,
    pub rate_limit: RateLimitSection,
    pub feedback: FeedbackSection,
}

impl AppConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = if path.as_ref().exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "server.addr '{}' is not a valid socket address",
                self.server.addr
            )));
        }
        if self.auth.owner_emails.is_empty() {
            return Err(ConfigError::Validation(
                "auth.owner_emails must not be empty".to_string(),
            ));
        }
        if self.auth.dev_password.trim().is_empty() {
            return Err(ConfigError::Validation(
                "auth.dev_password must not be empty".to_string(),
            ));
        }
        if self.rate_limit.max == 0 {
            return Err(ConfigError::Validation(
                "rate_limit.max must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
