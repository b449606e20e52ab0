//! OP Stack contract bindings.
//!
//! Includes contracts for L2→L1 withdrawals:
//! - L2ToL1MessagePasser (L2 predeploy)
//! - OptimismPortal2 (L1 contract)
//! - DisputeGameFactory (L1 contract)
//! - FaultDisputeGame (L1 game instances)

use alloy_primitives::{address, Address, B256};
use alloy_sol_types::sol;

/// L2ToL1MessagePasser predeploy address (same on all OP Stack chains).
pub const MESSAGE_PASSER_ADDRESS: Address = address!("4200000000000000000000000000000000000016");

/// Output root version used by `OutputRootProof`.
pub const OUTPUT_VERSION_V0: B256 = B256::ZERO;

sol! {
    /// L2ToL1MessagePasser - L2 predeploy contract for initiating withdrawals
    #[sol(rpc)]
    interface IL2ToL1MessagePasser {
        /// Emitted when a withdrawal is initiated on L2
        event MessagePassed(
            uint256 indexed nonce,
            address indexed sender,
            address indexed target,
            uint256 value,
            uint256 gasLimit,
            bytes data,
            bytes32 withdrawalHash
        );
    }

    /// OptimismPortal2 - L1 contract for withdrawal proving and finalization
    #[sol(rpc)]
    interface IOptimismPortal2 {
        /// Emitted when a withdrawal is proven on L1
        event WithdrawalProven(
            bytes32 indexed withdrawalHash,
            address indexed from,
            address indexed to
        );

        /// Query proven withdrawals by hash and proof submitter
        function provenWithdrawals(bytes32 withdrawalHash, address proofSubmitter)
            external view returns (address disputeGameProxy, uint64 timestamp);

        /// Address that submitted the proof at `index` for this withdrawal
        function proofSubmitters(bytes32 withdrawalHash, uint256 index)
            external view returns (address);

        /// Query if a withdrawal has been finalized
        function finalizedWithdrawals(bytes32 withdrawalHash)
            external view returns (bool);

        /// Number of addresses that submitted a proof for this withdrawal
        function numProofSubmitters(bytes32 withdrawalHash)
            external view returns (uint256);

        /// Get the respected game type for filtering dispute games
        function respectedGameType()
            external view returns (uint32);

        /// Address of the DisputeGameFactory this portal trusts
        function disputeGameFactory()
            external view returns (address);

        /// Prove a withdrawal transaction against a dispute game
        function proveWithdrawalTransaction(
            WithdrawalTransaction calldata _tx,
            uint256 _disputeGameIndex,
            OutputRootProof calldata _outputRootProof,
            bytes[] calldata _withdrawalProof
        ) external;

        /// Finalize a proven withdrawal transaction
        function finalizeWithdrawalTransaction(WithdrawalTransaction calldata _tx) external;

        /// Finalization attempted before the proof outlived the challenge period
        error OptimismPortal_ProofNotOldEnough();
    }

    /// DisputeGameFactory - registry of dispute games posted to L1
    #[sol(rpc)]
    interface IDisputeGameFactory {
        /// Get the total number of dispute games created
        function gameCount() external view returns (uint256 gameCount_);

        /// Get a dispute game by index
        function gameAtIndex(uint256 _index)
            external view returns (uint32 gameType_, uint64 timestamp_, address proxy_);
    }

    /// IFaultDisputeGame - Standard interface for fault dispute games
    #[sol(rpc)]
    interface IFaultDisputeGame {
        /// Get the L2 block number this game is disputing
        function l2BlockNumber() external view returns (uint256);

        /// Get the game status
        function status() external view returns (uint8);
    }

    /// Output root proof structure (used in proving withdrawals)
    #[derive(Debug, PartialEq, Eq)]
    struct OutputRootProof {
        bytes32 version;
        bytes32 stateRoot;
        bytes32 messagePasserStorageRoot;
        bytes32 latestBlockhash;
    }

    /// Withdrawal transaction structure (shared across contracts)
    #[derive(Debug, Default, PartialEq, Eq)]
    struct WithdrawalTransaction {
        uint256 nonce;
        address sender;
        address target;
        uint256 value;
        uint256 gasLimit;
        bytes data;
    }
}
