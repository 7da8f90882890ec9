//! Engine configuration
//!
//! Loaded from a JSON settings file, with the API token overridable through
//! the `DO_API_TOKEN` environment variable. Poll intervals and timeouts all
//! have defaults matching production behavior; tests shrink them to zero.

use crate::client::DEFAULT_API_BASE;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding the configured API token
pub const TOKEN_ENV_VAR: &str = "DO_API_TOKEN";

/// Lifecycle engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Remote API bearer token
    #[serde(default)]
    pub api_token: String,

    /// Size class for droplets created from snapshots
    #[serde(default = "default_droplet_size")]
    pub droplet_size: String,

    /// API endpoint; override for tests or proxies
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Interval between polls while waiting for a started droplet's address
    #[serde(default = "default_start_poll_secs")]
    pub start_poll_secs: u64,

    /// Bound on the wait for a started droplet's address
    #[serde(default = "default_start_timeout_secs")]
    pub start_timeout_secs: u64,

    /// Interval between polls while waiting for power-off
    #[serde(default = "default_power_off_poll_secs")]
    pub power_off_poll_secs: u64,

    /// Bound on the wait for power-off
    #[serde(default = "default_power_off_timeout_secs")]
    pub power_off_timeout_secs: u64,

    /// Interval between polls while waiting for snapshot confirmation
    #[serde(default = "default_snapshot_poll_secs")]
    pub snapshot_poll_secs: u64,

    /// Maximum snapshot-confirmation polls before the droplet is preserved
    /// and the operation fails
    #[serde(default = "default_snapshot_confirm_attempts")]
    pub snapshot_confirm_attempts: u32,

    /// Interval between polls while waiting for droplet deletion
    #[serde(default = "default_delete_poll_secs")]
    pub delete_poll_secs: u64,

    /// Bound on the wait for droplet deletion
    #[serde(default = "default_delete_timeout_secs")]
    pub delete_timeout_secs: u64,

    /// Pause between snapshot deletions during cleanup, for API rate limits
    #[serde(default = "default_cleanup_pacing_secs")]
    pub cleanup_pacing_secs: u64,
}

fn default_droplet_size() -> String {
    "s-2vcpu-4gb".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_start_poll_secs() -> u64 {
    2
}

fn default_start_timeout_secs() -> u64 {
    600
}

fn default_power_off_poll_secs() -> u64 {
    3
}

fn default_power_off_timeout_secs() -> u64 {
    300
}

fn default_snapshot_poll_secs() -> u64 {
    5
}

fn default_snapshot_confirm_attempts() -> u32 {
    60
}

fn default_delete_poll_secs() -> u64 {
    5
}

fn default_delete_timeout_secs() -> u64 {
    600
}

fn default_cleanup_pacing_secs() -> u64 {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            droplet_size: default_droplet_size(),
            api_base: default_api_base(),
            start_poll_secs: default_start_poll_secs(),
            start_timeout_secs: default_start_timeout_secs(),
            power_off_poll_secs: default_power_off_poll_secs(),
            power_off_timeout_secs: default_power_off_timeout_secs(),
            snapshot_poll_secs: default_snapshot_poll_secs(),
            snapshot_confirm_attempts: default_snapshot_confirm_attempts(),
            delete_poll_secs: default_delete_poll_secs(),
            delete_timeout_secs: default_delete_timeout_secs(),
            cleanup_pacing_secs: default_cleanup_pacing_secs(),
        }
    }
}

impl EngineConfig {
    /// Create a config with defaults and the given token
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            ..Default::default()
        }
    }

    /// Load from a JSON settings file, applying the env-var token override
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_token_override(path, std::env::var(TOKEN_ENV_VAR).ok())
    }

    fn load_with_token_override(
        path: impl AsRef<Path>,
        token_override: Option<String>,
    ) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_json::from_str(&raw)?;
        if let Some(token) = token_override {
            config.api_token = token;
        }
        if config.api_token.is_empty() {
            return Err(EngineError::config(format!(
                "no API token in {} and {TOKEN_ENV_VAR} is unset",
                path.as_ref().display()
            )));
        }
        Ok(config)
    }

    /// Set the droplet size class
    pub fn with_droplet_size(mut self, size: impl Into<String>) -> Self {
        self.droplet_size = size.into();
        self
    }

    /// Set the API endpoint
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Poll interval for the start address wait
    pub fn start_poll(&self) -> Duration {
        Duration::from_secs(self.start_poll_secs)
    }

    /// Timeout for the start address wait
    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    /// Poll interval for the power-off wait
    pub fn power_off_poll(&self) -> Duration {
        Duration::from_secs(self.power_off_poll_secs)
    }

    /// Timeout for the power-off wait
    pub fn power_off_timeout(&self) -> Duration {
        Duration::from_secs(self.power_off_timeout_secs)
    }

    /// Poll interval for snapshot confirmation
    pub fn snapshot_poll(&self) -> Duration {
        Duration::from_secs(self.snapshot_poll_secs)
    }

    /// Poll interval for the droplet-gone wait
    pub fn delete_poll(&self) -> Duration {
        Duration::from_secs(self.delete_poll_secs)
    }

    /// Timeout for the droplet-gone wait
    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }

    /// Pacing delay between cleanup deletions
    pub fn cleanup_pacing(&self) -> Duration {
        Duration::from_secs(self.cleanup_pacing_secs)
    }

    /// Config with all waits collapsed, for deterministic tests
    #[cfg(test)]
    pub(crate) fn instant() -> Self {
        Self {
            api_token: "test-token".to_string(),
            start_poll_secs: 0,
            start_timeout_secs: 0,
            power_off_poll_secs: 0,
            power_off_timeout_secs: 0,
            snapshot_poll_secs: 0,
            snapshot_confirm_attempts: 3,
            delete_poll_secs: 0,
            delete_timeout_secs: 0,
            cleanup_pacing_secs: 0,
            ..Default::default()
        }
    }
}
