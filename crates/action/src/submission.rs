//! Observable progress of an L1 submission.

use crate::portal::{L1Writer, PortalCall, PortalReceipt};
use alloy_primitives::TxHash;
use std::fmt;
use tokio::sync::watch;
use tracing::{info, warn};
use withdrawal::{RpcError, WithdrawalError};

/// Progress of one prove or finalize submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    /// Waiting for the signer.
    Pending,
    /// Broadcast, waiting for inclusion.
    Confirming { tx_hash: TxHash },
    Success { tx_hash: TxHash, block_number: Option<u64> },
    Failed {
        reason: String,
        /// The user declined to sign. Not a system fault.
        user_rejected: bool,
    },
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Pending => write!(f, "pending"),
            Self::Confirming { tx_hash } => write!(f, "confirming {tx_hash}"),
            Self::Success { tx_hash, .. } => write!(f, "confirmed {tx_hash}"),
            Self::Failed { reason, .. } => write!(f, "failed: {reason}"),
        }
    }
}

/// Publishes [`SubmissionState`] changes to any number of subscribers.
#[derive(Debug)]
pub struct SubmissionTracker {
    state: watch::Sender<SubmissionState>,
}

impl Default for SubmissionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionTracker {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SubmissionState::Idle);
        Self { state }
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SubmissionState {
        self.state.borrow().clone()
    }

    pub(crate) fn set(&self, next: SubmissionState) {
        // no subscribers is fine
        self.state.send_replace(next);
    }

    pub(crate) fn failed(&self, err: &WithdrawalError) {
        self.set(SubmissionState::Failed {
            reason: err.to_string(),
            user_rejected: err.is_user_rejection(),
        });
    }
}

/// Send `call`, wait for inclusion and publish every step on `tracker`.
///
/// Failures are never retried: only the user decides to pay for another attempt.
pub(crate) async fn submit(
    writer: &dyn L1Writer,
    tracker: &SubmissionTracker,
    call: PortalCall,
) -> Result<PortalReceipt, WithdrawalError> {
    let name = call.name();
    tracker.set(SubmissionState::Pending);

    let result = async {
        let tx_hash = writer.send(call).await?;
        tracker.set(SubmissionState::Confirming { tx_hash });

        let receipt = writer.confirm(tx_hash).await?;
        if !receipt.success {
            return Err(RpcError::Fatal(format!(
                "execution reverted: {name} transaction {tx_hash} failed"
            )));
        }
        Ok(receipt)
    }
    .await
    .map_err(WithdrawalError::Submission);

    match &result {
        Ok(receipt) => {
            info!(
                call = name,
                tx_hash = %receipt.tx_hash,
                block_number = receipt.block_number,
                gas_used = receipt.gas_used,
                "Portal transaction confirmed"
            );
            tracker.set(SubmissionState::Success {
                tx_hash: receipt.tx_hash,
                block_number: receipt.block_number,
            });
        }
        Err(err) => {
            warn!(call = name, error = %err, "Portal transaction failed");
            tracker.failed(err);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::test_utils::MockWriter;
    use alloy_primitives::B256;
    use binding::opstack::WithdrawalTransaction;

    #[test]
    fn test_subscribers_see_latest_state() {
        let tracker = SubmissionTracker::new();
        let rx = tracker.subscribe();
        assert_eq!(*rx.borrow(), SubmissionState::Idle);

        tracker.set(SubmissionState::Confirming {
            tx_hash: B256::repeat_byte(1),
        });
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            tracker.current(),
            SubmissionState::Confirming {
                tx_hash: B256::repeat_byte(1)
            }
        );
    }

    #[test]
    fn test_rejection_is_flagged() {
        let tracker = SubmissionTracker::new();
        tracker.failed(&WithdrawalError::Submission(RpcError::Rejected(
            "User rejected the request.".to_string(),
        )));

        assert!(matches!(
            tracker.current(),
            SubmissionState::Failed {
                user_rejected: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_submit_reverted_transaction_fails() {
        let mut writer = MockWriter::new();
        writer
            .expect_send()
            .times(1)
            .returning(|_| Ok(B256::repeat_byte(7)));
        writer.expect_confirm().returning(|tx_hash| {
            Ok(PortalReceipt {
                tx_hash,
                block_number: Some(10),
                gas_used: 50_000,
                success: false,
            })
        });

        let tracker = SubmissionTracker::new();
        let err = submit(
            &writer,
            &tracker,
            PortalCall::Finalize(WithdrawalTransaction::default()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WithdrawalError::Submission(RpcError::Fatal(_))));
        assert!(matches!(
            tracker.current(),
            SubmissionState::Failed {
                user_rejected: false,
                ..
            }
        ));
    }
}
