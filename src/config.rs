use crate::bus::{MAX_PIPE_DEPTH, MAX_PIPE_NAME_LEN};
use crate::clock::MASTER_TIME_BASE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_PIPE_DEPTH: u16 = 32;
pub const DEFAULT_PIPE_NAME: &str = "HUFF_APP_CMD_PIPE";
pub const DEFAULT_WORK_PERIOD_MS: u64 = 1000;
pub const DEFAULT_HK_PERIOD_MS: u64 = 4000;
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8090";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("pipe depth {0} out of range")]
    InvalidPipeDepth(u16),
    #[error("pipe name '{0}' is empty or too long")]
    InvalidPipeName(String),
    #[error("{0} period must be non-zero")]
    ZeroPeriod(&'static str),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),
}

/// Init parameters for the application and its host runtime. Missing keys take the
/// flight defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipe_depth: u16,
    pub pipe_name: String,
    pub time_base_name: String,
    pub work_period_ms: u64,
    pub hk_period_ms: u64,
    pub listen_addr: String,
    pub initial_seeds: [u16; 3],
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pipe_depth: DEFAULT_PIPE_DEPTH,
            pipe_name: DEFAULT_PIPE_NAME.to_string(),
            time_base_name: MASTER_TIME_BASE.to_string(),
            work_period_ms: DEFAULT_WORK_PERIOD_MS,
            hk_period_ms: DEFAULT_HK_PERIOD_MS,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            initial_seeds: [0; 3],
        }
    }
}

impl AppConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipe_depth == 0 || usize::from(self.pipe_depth) > MAX_PIPE_DEPTH {
            return Err(ConfigError::InvalidPipeDepth(self.pipe_depth));
        }
        if self.pipe_name.is_empty() || self.pipe_name.len() > MAX_PIPE_NAME_LEN {
            return Err(ConfigError::InvalidPipeName(self.pipe_name.clone()));
        }
        if self.work_period_ms == 0 {
            return Err(ConfigError::ZeroPeriod("work"));
        }
        if self.hk_period_ms == 0 {
            return Err(ConfigError::ZeroPeriod("housekeeping"));
        }
        Ok(())
    }
}
