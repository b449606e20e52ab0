//! Tunables of the withdrawal engine.
//!
//! Every value has a default matching the protocol and public RPC limits, so a
//! config file only needs to name what it changes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for individual RPC operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per operation, including the first one.
    pub max_attempts: u32,
    /// Linear backoff unit: the wait after attempt `n` is `n * base_delay_ms`.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl RetryConfig {
    /// Linear backoff unit as a [`Duration`].
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Configuration of the withdrawal finalization engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds a proven withdrawal must wait before it can be finalized.
    pub challenge_period_secs: u64,
    /// How many recent L1 blocks are searched for the `WithdrawalProven` event.
    /// Widened to cover the challenge period, see [`EngineConfig::proof_event_scan_window`].
    pub proof_event_window: u64,
    /// Block range of a single `eth_getLogs` call while searching proof events.
    pub proof_event_chunk_size: u64,
    /// How many of the newest dispute games are inspected when looking for an anchor.
    pub game_scan_batch: u64,
    /// Accept unresolved (in-progress) games as anchors. Only meant for test networks.
    pub allow_in_progress_games: bool,
    /// How many recent blocks are scanned when assembling transfer history.
    pub history_window: u64,
    /// Block range of a single `eth_getLogs` call while assembling history.
    pub history_chunk_size: u64,
    /// Maximum concurrent `eth_getLogs` calls per batch.
    pub log_concurrency: usize,
    /// Expected L1 block time in seconds.
    pub l1_block_time_secs: u64,
    /// Countdown refresh interval in seconds.
    pub countdown_tick_secs: u64,
    /// RPC retry policy.
    pub retry: RetryConfig,
    /// Fixed gas limit for prove transactions. Estimated when unset.
    pub prove_gas_limit: Option<u64>,
    /// Fixed gas limit for finalize transactions. Estimated when unset.
    pub finalize_gas_limit: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            challenge_period_secs: 7 * 24 * 60 * 60,
            proof_event_window: 50_000,
            proof_event_chunk_size: 10_000,
            game_scan_batch: 50,
            allow_in_progress_games: false,
            history_window: 30_000,
            history_chunk_size: 2_000,
            log_concurrency: 3,
            l1_block_time_secs: 12,
            countdown_tick_secs: 60,
            retry: RetryConfig::default(),
            prove_gas_limit: None,
            finalize_gas_limit: None,
        }
    }
}

impl EngineConfig {
    /// Defaults for test networks, where unresolved games are accepted as anchors.
    pub fn testnet() -> Self {
        Self {
            allow_in_progress_games: true,
            ..Self::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game_scan_batch == 0 {
            return Err(ConfigError::Invalid("game_scan_batch must be positive"));
        }
        if self.proof_event_chunk_size == 0 || self.history_chunk_size == 0 {
            return Err(ConfigError::Invalid("log chunk sizes must be positive"));
        }
        if self.log_concurrency == 0 {
            return Err(ConfigError::Invalid("log_concurrency must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be positive"));
        }
        if self.l1_block_time_secs == 0 {
            return Err(ConfigError::Invalid("l1_block_time_secs must be positive"));
        }
        if self.countdown_tick_secs == 0 {
            return Err(ConfigError::Invalid("countdown_tick_secs must be positive"));
        }
        Ok(())
    }

    /// L1 blocks searched for the proof event.
    ///
    /// At least the challenge period plus one day of blocks, so the event of a
    /// withdrawal that just became finalizable is still in range.
    pub const fn proof_event_scan_window(&self) -> u64 {
        let block_time = if self.l1_block_time_secs == 0 {
            1
        } else {
            self.l1_block_time_secs
        };
        let covering = self.challenge_period_secs.saturating_add(86_400) / block_time;
        if covering > self.proof_event_window {
            covering
        } else {
            self.proof_event_window
        }
    }

    /// Countdown refresh interval as a [`Duration`].
    pub const fn countdown_tick(&self) -> Duration {
        Duration::from_secs(self.countdown_tick_secs)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value is out of range
    #[error("invalid engine config: {0}")]
    Invalid(&'static str),

    /// The config file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for the expected shape
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
