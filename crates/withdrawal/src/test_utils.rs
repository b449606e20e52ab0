//! Mocks of the chain seams and fixtures shared by engine and action tests.

use crate::{
    chain::{AccountStorageProof, BridgeLog, L1Reader, L2BlockHeader, L2Receipt, L2Reader, ProvenEvent},
    error::RpcError,
    hash::compute_withdrawal_hash,
    rpc::RetryPolicy,
    types::{GameEntry, GameStatus, ProvenWithdrawal, WithdrawalHash},
};
use alloy_primitives::{Address, Bytes, Log, TxHash, B256, U256};
use alloy_sol_types::SolEvent;
use binding::opstack::{IL2ToL1MessagePasser, WithdrawalTransaction, MESSAGE_PASSER_ADDRESS};
use mockall::mock;
use std::time::Duration;

mock! {
    #[derive(Debug)]
    pub L1 {}

    #[async_trait::async_trait]
    impl L1Reader for L1 {
        async fn finalized_withdrawal(&self, hash: WithdrawalHash) -> Result<bool, RpcError>;
        async fn num_proof_submitters(&self, hash: WithdrawalHash) -> Result<U256, RpcError>;
        async fn proven_withdrawal(&self, hash: WithdrawalHash, submitter: Address) -> Result<Option<ProvenWithdrawal>, RpcError>;
        async fn proof_submitter(&self, hash: WithdrawalHash, index: U256) -> Result<Address, RpcError>;
        async fn respected_game_type(&self) -> Result<u32, RpcError>;
        async fn game_count(&self) -> Result<U256, RpcError>;
        async fn game_at_index(&self, index: U256) -> Result<GameEntry, RpcError>;
        async fn game_l2_block_number(&self, game: Address) -> Result<u64, RpcError>;
        async fn game_status(&self, game: Address) -> Result<GameStatus, RpcError>;
        async fn proven_events(&self, hash: WithdrawalHash, from: u64, to: u64) -> Result<Vec<ProvenEvent>, RpcError>;
        async fn block_timestamp(&self, number: u64) -> Result<Option<u64>, RpcError>;
        async fn block_number(&self) -> Result<u64, RpcError>;
        async fn bridge_deposits(&self, account: Address, from: u64, to: u64) -> Result<Vec<BridgeLog>, RpcError>;
    }
}

mock! {
    #[derive(Debug)]
    pub L2 {}

    #[async_trait::async_trait]
    impl L2Reader for L2 {
        async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<Option<L2Receipt>, RpcError>;
        async fn block_header(&self, number: u64) -> Result<Option<L2BlockHeader>, RpcError>;
        async fn storage_proof(&self, address: Address, slots: Vec<B256>, block: u64) -> Result<AccountStorageProof, RpcError>;
        async fn block_number(&self) -> Result<u64, RpcError>;
        async fn bridge_withdrawals(&self, account: Address, from: u64, to: u64) -> Result<Vec<BridgeLog>, RpcError>;
    }
}

/// Retry policy without waits.
pub const fn instant_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::ZERO)
}

/// `nonce=5, sender=0x..01, target=0x..02, value=1000, gasLimit=200000, data=0x`.
pub fn sample_transaction() -> WithdrawalTransaction {
    WithdrawalTransaction {
        nonce: U256::from(5),
        sender: Address::with_last_byte(1),
        target: Address::with_last_byte(2),
        value: U256::from(1000),
        gasLimit: U256::from(200_000),
        data: Bytes::new(),
    }
}

/// `MessagePassed` log for `tx`, emitted by the message passer, with the given embedded hash.
pub fn message_passed_log(tx: &WithdrawalTransaction, withdrawal_hash: WithdrawalHash) -> Log {
    let event = IL2ToL1MessagePasser::MessagePassed {
        nonce: tx.nonce,
        sender: tx.sender,
        target: tx.target,
        value: tx.value,
        gasLimit: tx.gasLimit,
        data: tx.data.clone(),
        withdrawalHash: withdrawal_hash,
    };
    Log {
        address: MESSAGE_PASSER_ADDRESS,
        data: event.encode_log_data(),
    }
}

/// Receipt of an L2 transaction that initiated `tx` with a correct hash.
pub fn withdrawal_receipt(tx_hash: TxHash, block_number: u64, tx: &WithdrawalTransaction) -> L2Receipt {
    L2Receipt {
        transaction_hash: tx_hash,
        block_number,
        logs: vec![message_passed_log(tx, compute_withdrawal_hash(tx))],
    }
}
