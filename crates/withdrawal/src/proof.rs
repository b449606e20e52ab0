//! Proof generation for L2→L1 withdrawals.
//!
//! Both proofs are built at the dispute game's anchored L2 block, not the
//! withdrawal's block: the portal verifies them against the output root the
//! game claims, and that root only exists for the anchor block.

use crate::{
    chain::L2Reader,
    error::WithdrawalError,
    hash::compute_storage_slot,
    rpc::RetryPolicy,
    types::{DisputeGameRef, Withdrawal, WithdrawalHash},
};
use alloy_primitives::{Address, Bytes, U256};
use binding::opstack::{OutputRootProof, WithdrawalTransaction, OUTPUT_VERSION_V0};
use std::sync::Arc;
use tracing::debug;

/// Parameters required to prove a withdrawal on L1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProveWithdrawalParams {
    pub withdrawal: WithdrawalTransaction,
    pub dispute_game_index: U256,
    pub output_root_proof: OutputRootProof,
    pub withdrawal_proof: Vec<Bytes>,
}

/// Builds output root and storage proofs against the L2 message passer.
#[derive(Clone)]
pub struct ProofBuilder {
    l2: Arc<dyn L2Reader>,
    message_passer: Address,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ProofBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofBuilder")
            .field("message_passer", &self.message_passer)
            .finish_non_exhaustive()
    }
}

impl ProofBuilder {
    pub fn new(l2: Arc<dyn L2Reader>, message_passer: Address, policy: RetryPolicy) -> Self {
        Self {
            l2,
            message_passer,
            policy,
        }
    }

    /// Output root preimage at `l2_block`.
    ///
    /// Fails with [`WithdrawalError::DataIntegrity`] while the provider does not
    /// serve the block yet.
    pub async fn build_output_root_proof(
        &self,
        l2_block: u64,
    ) -> Result<OutputRootProof, WithdrawalError> {
        let header = self
            .policy
            .call("eth_getBlockByNumber", || self.l2.block_header(l2_block))
            .await?
            .ok_or_else(|| {
                WithdrawalError::DataIntegrity(format!("L2 block {l2_block} not available"))
            })?;

        // the account proof alone carries the message passer's storage root
        let account = self
            .policy
            .call("eth_getProof", || {
                self.l2.storage_proof(self.message_passer, Vec::new(), l2_block)
            })
            .await?;

        Ok(OutputRootProof {
            version: OUTPUT_VERSION_V0,
            stateRoot: header.state_root,
            messagePasserStorageRoot: account.storage_hash,
            latestBlockhash: header.hash,
        })
    }

    /// Merkle proof that `sentMessages[withdrawal_hash]` is set at `l2_block`.
    pub async fn build_storage_proof(
        &self,
        withdrawal_hash: WithdrawalHash,
        l2_block: u64,
    ) -> Result<Vec<Bytes>, WithdrawalError> {
        let slot = compute_storage_slot(withdrawal_hash);
        let account = self
            .policy
            .call("eth_getProof", || {
                self.l2.storage_proof(self.message_passer, vec![slot], l2_block)
            })
            .await?;

        let proof = account.slot_proof(slot).ok_or_else(|| {
            WithdrawalError::DataIntegrity(format!(
                "eth_getProof at block {l2_block} returned no proof for slot {slot}"
            ))
        })?;
        if proof.is_empty() {
            return Err(WithdrawalError::DataIntegrity(format!(
                "empty storage proof for slot {slot} at block {l2_block}"
            )));
        }

        debug!(%withdrawal_hash, l2_block, proof_nodes = proof.len(), "Generated storage proof");
        Ok(proof.to_vec())
    }

    /// Everything `proveWithdrawalTransaction` needs for `withdrawal` against `game`.
    pub async fn build(
        &self,
        withdrawal: &Withdrawal,
        game: &DisputeGameRef,
    ) -> Result<ProveWithdrawalParams, WithdrawalError> {
        debug!(
            withdrawal_hash = %withdrawal.hash,
            withdrawal_block = withdrawal.l2_block,
            game_index = %game.index,
            game_l2_block = game.l2_block,
            "Building withdrawal proof"
        );

        let (output_root_proof, withdrawal_proof) = tokio::try_join!(
            self.build_output_root_proof(game.l2_block),
            self.build_storage_proof(withdrawal.hash, game.l2_block),
        )?;

        Ok(ProveWithdrawalParams {
            withdrawal: withdrawal.transaction.clone(),
            dispute_game_index: game.index,
            output_root_proof,
            withdrawal_proof,
        })
    }
}
