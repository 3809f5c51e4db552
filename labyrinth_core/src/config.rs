//! Tuning knobs for an exploration run.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pathfinding::DEFAULT_FRONTIER_CAP;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings shared by every explorer of a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    /// Number of crawlers launched together.
    pub crawlers: usize,
    /// Ticks each explorer may spend before giving up.
    pub max_actions: u32,
    /// Start delay between consecutive explorers, in milliseconds.
    pub stagger_ms: u64,
    /// Unmoved ticks tolerated before an explorer turns around.
    pub stuck_threshold: u32,
    /// Pending-cell limit of the door pathfinder.
    pub frontier_cap: usize,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            crawlers: 3,
            max_actions: 1000,
            stagger_ms: 200,
            stuck_threshold: 10,
            frontier_cap: DEFAULT_FRONTIER_CAP,
        }
    }
}

impl TeamConfig {
    /// Loads a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: TeamConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crawlers == 0 {
            return Err(ConfigError::Invalid("crawlers must be at least 1".into()));
        }
        if self.max_actions == 0 {
            return Err(ConfigError::Invalid("max_actions must be at least 1".into()));
        }
        if self.frontier_cap == 0 {
            return Err(ConfigError::Invalid("frontier_cap must be at least 1".into()));
        }
        Ok(())
    }

    /// Start delay of the explorer with the given index.
    pub fn stagger_for(&self, index: usize) -> Duration {
        Duration::from_millis(self.stagger_ms.saturating_mul(index as u64))
    }
}
