//! Configuration types for the withdrawal engine.
//!
//! This crate provides:
//! - Network configurations (OP Mainnet, OP Sepolia)
//! - Contract addresses on both sides of the bridge
//! - Engine tunables (challenge period, search windows, retry policy)

pub mod engine;
pub mod network;

pub use engine::{ConfigError, EngineConfig, RetryConfig};
pub use network::{L1Contracts, L2Contracts, NetworkConfig, NetworkConfigBuilder, NetworkType};
