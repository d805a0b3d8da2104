//! Runtime configuration.
//!
//! ```json
//! { "retry": { "max_attempts": 100 }, "backend": { "kind": "memory" } }
//! ```
//!
//! Every field is optional; missing ones take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::storage::BackendConfig;
use crate::tx::RetryPolicy;
use crate::{Error, Result};

/// Environment variable overriding `retry.max_attempts`.
pub const ENV_MAX_ATTEMPTS: &str = "WALLACE_MAX_ATTEMPTS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retry: RetryPolicy,
    pub backend: BackendConfig,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Defaults, overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (an environment accessor).
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(ENV_MAX_ATTEMPTS) {
            self.retry.max_attempts = raw.trim().parse().map_err(|e| {
                Error::Config(format!("{ENV_MAX_ATTEMPTS}={raw:?}: {e}"))
            })?;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        Ok(self)
    }
}
