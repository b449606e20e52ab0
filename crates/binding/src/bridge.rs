//! Standard bridge event bindings used to assemble an account's transfer history.

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;

/// L2StandardBridge predeploy address.
pub const L2_STANDARD_BRIDGE_ADDRESS: Address = address!("4200000000000000000000000000000000000010");

sol! {
    /// L1StandardBridge - emits one event per ETH deposit
    #[sol(rpc)]
    interface IL1StandardBridge {
        event ETHBridgeInitiated(
            address indexed from,
            address indexed to,
            uint256 amount,
            bytes extraData
        );
    }

    /// L2StandardBridge - emits one event per withdrawal started through the bridge
    #[sol(rpc)]
    interface IL2StandardBridge {
        event WithdrawalInitiated(
            address indexed l1Token,
            address indexed l2Token,
            address indexed from,
            address to,
            uint256 amount,
            bytes extraData
        );
    }
}
