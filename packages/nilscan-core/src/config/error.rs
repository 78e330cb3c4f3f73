//! Configuration errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("stable round limit must be at least 1, got {0}")]
    StableRoundLimit(usize),

    #[error("stable round limit {limit} exceeds max rounds {max}")]
    RoundLimitOrder { limit: usize, max: usize },

    #[error("backprop timeout must be positive")]
    ZeroTimeout,

    #[error("block state cap must be at least 2, got {0}")]
    BlockStateCap(usize),

    #[error("package prefix {0:?} is both included and excluded")]
    ConflictingPrefix(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
