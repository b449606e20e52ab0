//! Network configuration for the withdrawal engine.
//!
//! Provides the contract addresses the engine needs on each side of the bridge
//! for the supported OP Stack networks.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};

/// Network type (mainnet or testnet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Testnet,
}

/// L1 (settlement chain) contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L1Contracts {
    /// Chain ID
    pub chain_id: u64,
    /// OptimismPortal2 proxy
    pub portal: Address,
    /// DisputeGameFactory proxy. When unset it is read from the portal.
    pub dispute_game_factory: Option<Address>,
    /// L1StandardBridge proxy (deposit history)
    pub standard_bridge: Address,
}

impl L1Contracts {
    /// Ethereum mainnet contracts for OP Mainnet.
    pub const fn mainnet() -> Self {
        Self {
            chain_id: 1,
            // https://etherscan.io/address/0xbEb5Fc579115071764c7423A4f12eDde41f8DF3a
            portal: address!("0xbEb5Fc579115071764c7423A4f12eDde41f8DF3a"),
            dispute_game_factory: Some(address!("0xe5965Ab5962eDc7477C8520243A95517CD252fA9")),
            standard_bridge: address!("0x99C9fc46f92E8a1c0deC1b1747d010903E884bE1"),
        }
    }

    /// Sepolia contracts for OP Sepolia.
    pub const fn sepolia() -> Self {
        Self {
            chain_id: 11155111,
            // https://sepolia.etherscan.io/address/0x16Fc5058F25648194471939df75CF27A2fdC48BC
            portal: address!("0x16Fc5058F25648194471939df75CF27A2fdC48BC"),
            dispute_game_factory: Some(address!("0x05F9613aDB30026FFd634f38e5C4dFd30a197Fa1")),
            standard_bridge: address!("0xFBb0621E0B23b5478B630BD55a5f21f67730B0F1"),
        }
    }
}

/// L2 (rollup) contracts. These are predeploys and identical on every OP Stack chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L2Contracts {
    /// Chain ID
    pub chain_id: u64,
    /// L2ToL1MessagePasser predeploy
    pub message_passer: Address,
    /// L2StandardBridge predeploy
    pub standard_bridge: Address,
}

impl L2Contracts {
    const MESSAGE_PASSER: Address = address!("0x4200000000000000000000000000000000000016");
    const STANDARD_BRIDGE: Address = address!("0x4200000000000000000000000000000000000010");

    /// OP Mainnet.
    pub const fn mainnet() -> Self {
        Self {
            chain_id: 10,
            message_passer: Self::MESSAGE_PASSER,
            standard_bridge: Self::STANDARD_BRIDGE,
        }
    }

    /// OP Sepolia.
    pub const fn sepolia() -> Self {
        Self {
            chain_id: 11155420,
            message_passer: Self::MESSAGE_PASSER,
            standard_bridge: Self::STANDARD_BRIDGE,
        }
    }
}

/// Complete network configuration for both sides of the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network type (mainnet or testnet)
    pub network_type: NetworkType,
    /// L1 configuration
    pub l1: L1Contracts,
    /// L2 configuration
    pub l2: L2Contracts,
}

impl NetworkConfig {
    /// OP Mainnet on Ethereum.
    pub const fn op_mainnet() -> Self {
        Self {
            network_type: NetworkType::Mainnet,
            l1: L1Contracts::mainnet(),
            l2: L2Contracts::mainnet(),
        }
    }

    /// OP Sepolia on Sepolia.
    pub const fn op_sepolia() -> Self {
        Self {
            network_type: NetworkType::Testnet,
            l1: L1Contracts::sepolia(),
            l2: L2Contracts::sepolia(),
        }
    }

    /// Create configuration from network type.
    pub const fn from_network_type(network_type: NetworkType) -> Self {
        match network_type {
            NetworkType::Mainnet => Self::op_mainnet(),
            NetworkType::Testnet => Self::op_sepolia(),
        }
    }
}

/// Builder for custom network configurations (devnets, forks).
#[derive(Debug, Clone)]
pub struct NetworkConfigBuilder {
    config: NetworkConfig,
}

impl NetworkConfigBuilder {
    /// Start from the defaults of a known network.
    pub const fn new(network_type: NetworkType) -> Self {
        Self {
            config: NetworkConfig::from_network_type(network_type),
        }
    }

    /// Override the OptimismPortal2 address.
    pub const fn portal(mut self, address: Address) -> Self {
        self.config.l1.portal = address;
        self
    }

    /// Override the DisputeGameFactory address.
    pub const fn dispute_game_factory(mut self, address: Address) -> Self {
        self.config.l1.dispute_game_factory = Some(address);
        self
    }

    /// Resolve the DisputeGameFactory through the portal instead of a fixed address.
    pub const fn factory_from_portal(mut self) -> Self {
        self.config.l1.dispute_game_factory = None;
        self
    }

    /// Override the L1StandardBridge address.
    pub const fn l1_standard_bridge(mut self, address: Address) -> Self {
        self.config.l1.standard_bridge = address;
        self
    }

    /// Override both chain IDs.
    pub const fn chain_ids(mut self, l1: u64, l2: u64) -> Self {
        self.config.l1.chain_id = l1;
        self.config.l2.chain_id = l2;
        self
    }

    /// Build the network configuration.
    pub const fn build(self) -> NetworkConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_config() {
        let config = NetworkConfig::op_mainnet();
        assert_eq!(config.l1.chain_id, 1);
        assert_eq!(config.l2.chain_id, 10);
        assert_eq!(config.network_type, NetworkType::Mainnet);
    }

    #[test]
    fn test_sepolia_config() {
        let config = NetworkConfig::op_sepolia();
        assert_eq!(config.l1.chain_id, 11155111);
        assert_eq!(config.network_type, NetworkType::Testnet);
        assert_eq!(
            config.l2.message_passer,
            address!("4200000000000000000000000000000000000016")
        );
    }

    #[test]
    fn test_custom_config_builder() {
        let portal = address!("1111111111111111111111111111111111111111");

        let config = NetworkConfigBuilder::new(NetworkType::Testnet)
            .portal(portal)
            .factory_from_portal()
            .chain_ids(900, 901)
            .build();

        assert_eq!(config.l1.portal, portal);
        assert_eq!(config.l1.dispute_game_factory, None);
        assert_eq!(config.l2.chain_id, 901);
    }

    #[test]
    fn test_network_type_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            network: NetworkType,
        }

        let parsed: Wrapper = toml::from_str("network = \"testnet\"").unwrap();
        assert_eq!(parsed.network, NetworkType::Testnet);
    }
}
