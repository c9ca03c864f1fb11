use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::rewards::RewardParams;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read params file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse params: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid params: {0}")]
    Invalid(&'static str),
}

impl RewardParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.annual_blocks == 0 {
            return Err(ConfigError::Invalid("annual_blocks must be > 0"));
        }
        if self.blocks_per_month == 0 {
            return Err(ConfigError::Invalid("blocks_per_month must be > 0"));
        }
        if self.min_lock_months > self.max_lock_months {
            return Err(ConfigError::Invalid("min_lock_months exceeds max_lock_months"));
        }
        Ok(())
    }
}

/// Parse params from JSON; absent fields keep their defaults.
pub fn parse_params(json: &str) -> Result<RewardParams, ConfigError> {
    let params: RewardParams = serde_json::from_str(json)?;
    params.validate()?;
    Ok(params)
}

pub fn load_params(path: &Path) -> Result<RewardParams, ConfigError> {
    parse_params(&fs::read_to_string(path)?)
}
