//! Read surface of both chains, as consumed by the engine.
//!
//! The engine only sees these traits. [`provider`] implements them on top of
//! alloy providers and the `sol!` bindings; tests mock them.

pub mod provider;

pub use provider::{AlloyL1Reader, AlloyL2Reader};

use crate::{
    error::RpcError,
    types::{GameEntry, GameStatus, ProvenWithdrawal, WithdrawalHash},
};
use alloy_primitives::{Address, Bytes, Log, TxHash, B256, U256};
use async_trait::async_trait;

/// The parts of an L2 receipt the extractor needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L2Receipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub logs: Vec<Log>,
}

/// The parts of an L2 block header an output root commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2BlockHeader {
    pub number: u64,
    pub hash: B256,
    pub state_root: B256,
    pub timestamp: u64,
}

impl L2BlockHeader {
    /// Validate a raw header. Both roots an output commits to must be present.
    pub fn new(number: u64, hash: B256, state_root: B256, timestamp: u64) -> Result<Self, String> {
        if hash == B256::ZERO {
            return Err(format!("block {number} has no hash"));
        }
        if state_root == B256::ZERO {
            return Err(format!("block {number} has no state root"));
        }
        Ok(Self {
            number,
            hash,
            state_root,
            timestamp,
        })
    }
}

/// `eth_getProof` result for one account, with one proof per requested slot in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountStorageProof {
    pub storage_hash: B256,
    pub slots: Vec<SlotProof>,
}

impl AccountStorageProof {
    /// Proof nodes for `slot`. `None` when the response does not cover it.
    pub fn slot_proof(&self, slot: B256) -> Option<&[Bytes]> {
        self.slots
            .iter()
            .find(|proof| proof.slot == slot)
            .map(|proof| proof.proof.as_slice())
    }
}

/// Merkle proof of one storage slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotProof {
    pub slot: B256,
    pub proof: Vec<Bytes>,
}

/// A `WithdrawalProven` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvenEvent {
    pub withdrawal_hash: WithdrawalHash,
    pub submitter: Address,
    pub block_number: u64,
}

/// A standard bridge transfer event (deposit on L1, withdrawal on L2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeLog {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub amount: U256,
}

/// Reads against the L2 (rollup) chain.
#[async_trait]
pub trait L2Reader: Send + Sync {
    /// `eth_getTransactionReceipt`. `None` when the transaction is unknown or pending.
    async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<Option<L2Receipt>, RpcError>;

    /// `eth_getBlockByNumber`. `None` when the provider does not have the block yet.
    async fn block_header(&self, number: u64) -> Result<Option<L2BlockHeader>, RpcError>;

    /// `eth_getProof` for `address` at `block`.
    async fn storage_proof(
        &self,
        address: Address,
        slots: Vec<B256>,
        block: u64,
    ) -> Result<AccountStorageProof, RpcError>;

    /// `eth_blockNumber`.
    async fn block_number(&self) -> Result<u64, RpcError>;

    /// L2StandardBridge `WithdrawalInitiated` events sent by `account` in `[from, to]`.
    async fn bridge_withdrawals(
        &self,
        account: Address,
        from: u64,
        to: u64,
    ) -> Result<Vec<BridgeLog>, RpcError>;
}

/// Reads against the L1 (settlement) chain: portal, dispute game factory and games.
#[async_trait]
pub trait L1Reader: Send + Sync {
    /// `portal.finalizedWithdrawals(hash)`.
    async fn finalized_withdrawal(&self, hash: WithdrawalHash) -> Result<bool, RpcError>;

    /// `portal.numProofSubmitters(hash)`.
    async fn num_proof_submitters(&self, hash: WithdrawalHash) -> Result<U256, RpcError>;

    /// `portal.provenWithdrawals(hash, submitter)`. `None` when that submitter has no proof.
    async fn proven_withdrawal(
        &self,
        hash: WithdrawalHash,
        submitter: Address,
    ) -> Result<Option<ProvenWithdrawal>, RpcError>;

    /// `portal.proofSubmitters(hash, index)`. Only valid for `index < numProofSubmitters(hash)`.
    async fn proof_submitter(&self, hash: WithdrawalHash, index: U256) -> Result<Address, RpcError>;

    /// `portal.respectedGameType()`.
    async fn respected_game_type(&self) -> Result<u32, RpcError>;

    /// `factory.gameCount()`.
    async fn game_count(&self) -> Result<U256, RpcError>;

    /// `factory.gameAtIndex(index)`, validated.
    async fn game_at_index(&self, index: U256) -> Result<GameEntry, RpcError>;

    /// `game.l2BlockNumber()`.
    async fn game_l2_block_number(&self, game: Address) -> Result<u64, RpcError>;

    /// `game.status()`, validated.
    async fn game_status(&self, game: Address) -> Result<GameStatus, RpcError>;

    /// `WithdrawalProven` events for `hash` in `[from, to]`, filtered by the indexed topic.
    async fn proven_events(
        &self,
        hash: WithdrawalHash,
        from: u64,
        to: u64,
    ) -> Result<Vec<ProvenEvent>, RpcError>;

    /// Timestamp of block `number`. `None` when the block is unknown.
    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>, RpcError>;

    /// `eth_blockNumber`.
    async fn block_number(&self) -> Result<u64, RpcError>;

    /// L1StandardBridge `ETHBridgeInitiated` events sent by `account` in `[from, to]`.
    async fn bridge_deposits(
        &self,
        account: Address,
        from: u64,
        to: u64,
    ) -> Result<Vec<BridgeLog>, RpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_header_requires_roots() {
        assert!(L2BlockHeader::new(7, B256::ZERO, B256::repeat_byte(1), 0).is_err());
        assert!(L2BlockHeader::new(7, B256::repeat_byte(1), B256::ZERO, 0).is_err());
        assert!(L2BlockHeader::new(7, B256::repeat_byte(1), B256::repeat_byte(2), 0).is_ok());
    }

    #[test]
    fn test_slot_proof_lookup() {
        let slot = B256::repeat_byte(0xaa);
        let proof = AccountStorageProof {
            storage_hash: B256::repeat_byte(1),
            slots: vec![SlotProof {
                slot,
                proof: vec![Bytes::from_static(&[0xde, 0xad])],
            }],
        };

        assert_eq!(proof.slot_proof(slot).map(<[Bytes]>::len), Some(1));
        assert!(proof.slot_proof(B256::repeat_byte(0xbb)).is_none());
    }
}
