use crate::{
    chain::{L2Receipt, L2Reader},
    error::WithdrawalError,
    hash::compute_withdrawal_hash,
    rpc::RetryPolicy,
    types::Withdrawal,
};
use alloy_primitives::{Address, TxHash};
use alloy_sol_types::SolEvent;
use binding::opstack::{IL2ToL1MessagePasser, WithdrawalTransaction};
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns an L2 transaction into the withdrawal it initiated.
#[derive(Clone)]
pub struct WithdrawalExtractor {
    l2: Arc<dyn L2Reader>,
    message_passer: Address,
    policy: RetryPolicy,
}

impl std::fmt::Debug for WithdrawalExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WithdrawalExtractor")
            .field("message_passer", &self.message_passer)
            .finish_non_exhaustive()
    }
}

impl WithdrawalExtractor {
    pub fn new(l2: Arc<dyn L2Reader>, message_passer: Address, policy: RetryPolicy) -> Self {
        Self {
            l2,
            message_passer,
            policy,
        }
    }

    /// Fetch the receipt of `tx_hash` and decode its withdrawal.
    ///
    /// Unknown and pending transactions, and transactions that did not call the
    /// message passer, are [`WithdrawalError::NotFound`].
    pub async fn extract(&self, tx_hash: TxHash) -> Result<Withdrawal, WithdrawalError> {
        let receipt = self
            .policy
            .call("eth_getTransactionReceipt", || {
                self.l2.transaction_receipt(tx_hash)
            })
            .await?
            .ok_or(WithdrawalError::NotFound(tx_hash))?;

        decode_withdrawal(&receipt, self.message_passer).ok_or(WithdrawalError::NotFound(tx_hash))
    }
}

/// Decode the first `MessagePassed` event emitted by `message_passer` in `receipt`.
///
/// Logs from other contracts are ignored, and so are logs at the message passer
/// that do not decode as `MessagePassed`. The hash embedded in the event is
/// the withdrawal's identity; a recomputed hash that disagrees is only logged.
pub fn decode_withdrawal(
    receipt: &L2Receipt,
    message_passer: Address,
) -> Option<Withdrawal> {
    for log in receipt.logs.iter().filter(|log| log.address == message_passer) {
        let event = match IL2ToL1MessagePasser::MessagePassed::decode_log(log) {
            Ok(decoded) => decoded.data,
            Err(err) => {
                debug!(tx_hash = %receipt.transaction_hash, error = %err, "Skipping undecodable log");
                continue;
            }
        };

        let transaction = WithdrawalTransaction {
            nonce: event.nonce,
            sender: event.sender,
            target: event.target,
            value: event.value,
            gasLimit: event.gasLimit,
            data: event.data,
        };

        let computed = compute_withdrawal_hash(&transaction);
        if computed != event.withdrawalHash {
            warn!(
                tx_hash = %receipt.transaction_hash,
                computed_hash = %computed,
                withdrawal_hash = %event.withdrawalHash,
                "Withdrawal hash mismatch, using the event hash"
            );
        }

        return Some(Withdrawal {
            transaction,
            hash: event.withdrawalHash,
            l2_block: receipt.block_number,
            l2_tx_hash: receipt.transaction_hash,
        });
    }

    None
}
