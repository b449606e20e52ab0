//! Common test setup utilities shared across integration tests.
#![allow(dead_code)] // used in ignored tests

use alloy_primitives::TxHash;
use serde::Deserialize;
use withdrawer::{config::Config, metrics::Metrics, Withdrawer};

/// Local configuration with private key (git-ignored file)
#[derive(Debug, Deserialize)]
struct LocalConfig {
    private_key: String,
}

/// Load test configuration. Panics if not found or invalid.
pub fn load_test_config() -> Config {
    Config::from_file("tests/test-config.toml").expect("Failed to load tests/test-config.toml.")
}

/// Connect the engine to the test network.
pub async fn setup_withdrawer() -> Withdrawer {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let config = load_test_config();
    println!("L1 RPC: {}", config.l1_rpc_url);
    println!("L2 RPC: {}", config.l2_rpc_url);

    Withdrawer::connect(&config, Metrics::new())
        .await
        .expect("Failed to connect")
}

/// L2 transaction that initiated the withdrawal under test, from `WITHDRAWAL_TX`.
pub fn withdrawal_tx() -> TxHash {
    std::env::var("WITHDRAWAL_TX")
        .expect("Set WITHDRAWAL_TX to the L2 transaction that initiated a withdrawal")
        .parse()
        .expect("WITHDRAWAL_TX is not a transaction hash")
}

/// Load private key for signing transactions.
///
/// Tries multiple sources in order:
/// 1. PRIVATE_KEY environment variable
/// 2. tests/test-config.local.toml file (git-ignored)
pub fn load_private_key() -> String {
    if let Ok(pk) = std::env::var("PRIVATE_KEY") {
        eprintln!("✓ Loaded private key from PRIVATE_KEY environment variable");
        return pk;
    }

    let local_config_path = "tests/test-config.local.toml";
    if let Ok(contents) = std::fs::read_to_string(local_config_path) {
        if let Ok(config) = toml::from_str::<LocalConfig>(&contents) {
            eprintln!("✓ Loaded private key from {}", local_config_path);
            return config.private_key;
        }
    }

    panic!(
        "Private key required for transaction signing.\n\
         Set PRIVATE_KEY environment variable or create tests/test-config.local.toml"
    );
}
