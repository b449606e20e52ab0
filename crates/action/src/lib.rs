//! State-changing withdrawal steps on L1.
//!
//! Reads go through the engine in the `withdrawal` crate. This crate only adds
//! the two transactions a user pays for: prove and finalize.

pub mod finalize;
pub mod portal;
pub mod prove;
pub mod submission;

use alloy_primitives::TxHash;
pub use client::SignerFn;
use std::future::Future;
use withdrawal::WithdrawalError;

/// Trait for executable onchain actions.
pub trait Action: Send + Sync {
    /// Check to see if the action can be executed now.
    fn is_ready(&self) -> impl Future<Output = Result<bool, WithdrawalError>> + Send;

    /// Check if the action's effect is already recorded on chain.
    fn is_completed(&self) -> impl Future<Output = Result<bool, WithdrawalError>> + Send;

    /// Execute the action.
    ///
    /// Re-reads chain state first, so calling it again after success is refused
    /// without sending anything.
    fn execute(&mut self) -> impl Future<Output = Result<Outcome, WithdrawalError>> + Send;

    /// Get a human-readable description of this action.
    fn description(&self) -> String;
}

/// Result of an executed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Block number where transaction was included
    pub block_number: Option<u64>,
    /// Gas used
    pub gas_used: u64,
}

impl From<portal::PortalReceipt> for Outcome {
    fn from(receipt: portal::PortalReceipt) -> Self {
        Self {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        }
    }
}
