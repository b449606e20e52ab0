use alloy_primitives::Address;
use config::{ConfigError, EngineConfig, NetworkConfig, NetworkConfigBuilder, NetworkType};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level withdrawer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// L1 RPC endpoint url
    pub l1_rpc_url: String,

    /// L2 RPC endpoint url
    pub l2_rpc_url: String,

    /// Network preset the contract addresses come from
    pub network: NetworkType,

    /// OptimismPortal2 override
    #[serde(default)]
    pub portal: Option<Address>,

    /// DisputeGameFactory override
    #[serde(default)]
    pub dispute_game_factory: Option<Address>,

    /// Ask the portal for its factory instead of using a fixed address
    #[serde(default)]
    pub factory_from_portal: bool,

    /// L1StandardBridge override
    #[serde(default)]
    pub l1_standard_bridge: Option<Address>,

    /// Engine tunables. Missing means the network's defaults.
    #[serde(default)]
    pub engine: Option<EngineConfig>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.engine_config().validate()?;
        Ok(config)
    }

    /// Contract addresses with overrides applied.
    pub fn network_config(&self) -> NetworkConfig {
        let mut builder = NetworkConfigBuilder::new(self.network);
        if let Some(portal) = self.portal {
            builder = builder.portal(portal);
        }
        if let Some(factory) = self.dispute_game_factory {
            builder = builder.dispute_game_factory(factory);
        }
        if self.factory_from_portal {
            builder = builder.factory_from_portal();
        }
        if let Some(bridge) = self.l1_standard_bridge {
            builder = builder.l1_standard_bridge(bridge);
        }
        builder.build()
    }

    /// Engine configuration. Test networks accept unresolved games by default.
    pub fn engine_config(&self) -> EngineConfig {
        self.engine.clone().unwrap_or_else(|| match self.network {
            NetworkType::Mainnet => EngineConfig::default(),
            NetworkType::Testnet => EngineConfig::testnet(),
        })
    }
}
