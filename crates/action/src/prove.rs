//! Prove withdrawal action.
//!
//! Submits a proof to L1 that a withdrawal was initiated on L2.

use crate::{
    portal::{L1Writer, PortalCall},
    submission::{submit, SubmissionTracker},
    Action, Outcome,
};
use alloy_primitives::TxHash;
use std::sync::Arc;
use tracing::{info, warn};
use withdrawal::{
    proof::{ProofBuilder, ProveWithdrawalParams},
    status::unix_now,
    DisputeGameRef, NotReady, ProvenRecord, StatusTracker, TimestampSource, Withdrawal,
    WithdrawalError, WithdrawalState,
};

/// A proof ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedProof {
    pub withdrawal: Withdrawal,
    pub anchor: DisputeGameRef,
    pub params: ProveWithdrawalParams,
}

/// Action to prove the withdrawal initiated by an L2 transaction.
pub struct ProveAction {
    tracker: StatusTracker,
    proofs: ProofBuilder,
    writer: Arc<dyn L1Writer>,
    tx_hash: TxHash,
    submission: SubmissionTracker,
    state: WithdrawalState,
}

impl std::fmt::Debug for ProveAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProveAction")
            .field("tx_hash", &self.tx_hash)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ProveAction {
    pub fn new(
        tracker: StatusTracker,
        proofs: ProofBuilder,
        writer: Arc<dyn L1Writer>,
        tx_hash: TxHash,
    ) -> Self {
        Self {
            tracker,
            proofs,
            writer,
            tx_hash,
            submission: SubmissionTracker::new(),
            state: WithdrawalState::Loading,
        }
    }

    /// Progress of the prove transaction.
    pub const fn submission(&self) -> &SubmissionTracker {
        &self.submission
    }

    /// Lifecycle state as of the last [`Action::execute`].
    pub const fn state(&self) -> &WithdrawalState {
        &self.state
    }

    /// Run every check and build the proof without sending anything.
    ///
    /// Refuses withdrawals that are already finalized or proven, and withdrawals
    /// no dispute game covers yet.
    pub async fn prepare(&self) -> Result<PreparedProof, WithdrawalError> {
        let withdrawal = self.tracker.extractor().extract(self.tx_hash).await?;
        let hash = withdrawal.hash;
        let l1 = self.tracker.l1();
        let policy = self.tracker.policy();

        if policy
            .call("finalizedWithdrawals", || l1.finalized_withdrawal(hash))
            .await?
        {
            return Err(WithdrawalError::AlreadyFinalized(hash));
        }
        if !policy
            .call("numProofSubmitters", || l1.num_proof_submitters(hash))
            .await?
            .is_zero()
        {
            return Err(WithdrawalError::AlreadyProven(hash));
        }

        let anchor = self
            .tracker
            .locator()
            .find_anchor(withdrawal.l2_block)
            .await?
            .ok_or(WithdrawalError::NotReady(NotReady::OutputNotProposed {
                l2_block: withdrawal.l2_block,
            }))?;

        info!(
            withdrawal_hash = %hash,
            l2_block = withdrawal.l2_block,
            game_index = %anchor.index,
            anchor_block = anchor.l2_block,
            "Generating withdrawal proof"
        );
        let params = self.proofs.build(&withdrawal, &anchor).await?;

        info!(
            dispute_game_index = %params.dispute_game_index,
            proof_nodes = params.withdrawal_proof.len(),
            "Proof generated"
        );

        Ok(PreparedProof {
            withdrawal,
            anchor,
            params,
        })
    }

    /// Record of the confirmed proof, timed by the block that included it.
    async fn confirmed_record(&self, withdrawal: &Withdrawal, block: Option<u64>) -> ProvenRecord {
        let timestamp = match block {
            Some(block) => self
                .tracker
                .policy()
                .call("eth_getBlockByNumber", || {
                    self.tracker.l1().block_timestamp(block)
                })
                .await
                .unwrap_or_else(|err| {
                    warn!(block, error = %err, "Block read failed");
                    None
                }),
            None => None,
        };

        match timestamp {
            Some(proven_timestamp) => ProvenRecord {
                withdrawal_hash: withdrawal.hash,
                proven_timestamp,
                source: TimestampSource::ProofEvent,
            },
            None => ProvenRecord {
                withdrawal_hash: withdrawal.hash,
                proven_timestamp: unix_now(),
                source: TimestampSource::Approximate,
            },
        }
    }
}

impl Action for ProveAction {
    async fn is_ready(&self) -> Result<bool, WithdrawalError> {
        let status = self.tracker.status(self.tx_hash).await;
        Ok(matches!(status.state, WithdrawalState::ReadyToProve { .. }))
    }

    async fn is_completed(&self) -> Result<bool, WithdrawalError> {
        let withdrawal = self.tracker.extractor().extract(self.tx_hash).await?;
        let hash = withdrawal.hash;
        let l1 = self.tracker.l1();
        let policy = self.tracker.policy();

        if policy
            .call("finalizedWithdrawals", || l1.finalized_withdrawal(hash))
            .await?
        {
            return Ok(true);
        }
        let submitters = policy
            .call("numProofSubmitters", || l1.num_proof_submitters(hash))
            .await?;
        Ok(!submitters.is_zero())
    }

    async fn execute(&mut self) -> Result<Outcome, WithdrawalError> {
        let PreparedProof {
            withdrawal,
            anchor,
            params,
        } = self.prepare().await?;

        self.state = WithdrawalState::Loading
            .loaded(WithdrawalState::ReadyToProve { anchor })?
            .begin_prove()?;

        let result = submit(
            self.writer.as_ref(),
            &self.submission,
            PortalCall::Prove(params),
        )
        .await;
        let receipt = match result {
            Ok(receipt) => receipt,
            Err(err) => {
                let state = std::mem::replace(&mut self.state, WithdrawalState::Loading);
                self.state = if err.is_user_rejection() {
                    state.abandon()?
                } else {
                    state.fail(err.to_string())
                };
                return Err(err);
            }
        };

        let record = self
            .confirmed_record(&withdrawal, receipt.block_number)
            .await;
        let state = std::mem::replace(&mut self.state, WithdrawalState::Loading);
        self.state = state.prove_confirmed(record)?;

        info!(
            tx_hash = %receipt.tx_hash,
            block_number = receipt.block_number,
            gas_used = receipt.gas_used,
            withdrawal_hash = %withdrawal.hash,
            dispute_game_index = %anchor.index,
            "Withdrawal proven on L1"
        );

        Ok(receipt.into())
    }

    fn description(&self) -> String {
        format!("Proving withdrawal from L2 transaction {} on L1", self.tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        portal::{test_utils::MockWriter, PortalReceipt},
        submission::SubmissionState,
    };
    use alloy_primitives::{Address, Bytes, B256, U256};
    use binding::opstack::MESSAGE_PASSER_ADDRESS;
    use config::{EngineConfig, RetryConfig};
    use withdrawal::{
        chain::{AccountStorageProof, L1Reader, L2BlockHeader, SlotProof},
        extract::WithdrawalExtractor,
        game::DisputeGameLocator,
        test_utils::{instant_retry, sample_transaction, withdrawal_receipt, MockL1, MockL2},
        types::{GameEntry, GameStatus},
        RpcError,
    };

    const ANCHOR: u64 = 1200;
    const CONFIRMED_AT: u64 = 1_700_000_000;

    fn tx_hash() -> TxHash {
        B256::repeat_byte(0xaa)
    }

    /// L2 serving the sample withdrawal at block 1000 and proofs at the anchor.
    fn l2() -> MockL2 {
        let receipt = withdrawal_receipt(tx_hash(), 1000, &sample_transaction());
        let mut l2 = MockL2::new();
        l2.expect_transaction_receipt()
            .returning(move |_| Ok(Some(receipt.clone())));
        l2.expect_block_header().returning(|number| {
            Ok(Some(
                L2BlockHeader::new(number, B256::repeat_byte(0x11), B256::repeat_byte(0x22), 0)
                    .unwrap(),
            ))
        });
        l2.expect_storage_proof().returning(|_, slots, _| {
            Ok(AccountStorageProof {
                storage_hash: B256::repeat_byte(0x33),
                slots: slots
                    .into_iter()
                    .map(|slot| SlotProof {
                        slot,
                        proof: vec![Bytes::from_static(&[0xf8, 0x51])],
                    })
                    .collect(),
            })
        });
        l2
    }

    /// Unproven withdrawal with a resolved game anchored at 1200 when `games > 0`.
    fn unproven_l1(games: u64) -> MockL1 {
        let mut l1 = MockL1::new();
        l1.expect_finalized_withdrawal().returning(|_| Ok(false));
        l1.expect_num_proof_submitters()
            .returning(|_| Ok(U256::ZERO));
        l1.expect_respected_game_type().returning(|| Ok(1));
        l1.expect_game_count()
            .returning(move || Ok(U256::from(games)));
        l1.expect_game_at_index().returning(|index| {
            let proxy = Address::with_last_byte(index.to::<u8>() + 1);
            Ok(GameEntry::new(1, 0, proxy).unwrap())
        });
        l1.expect_game_l2_block_number()
            .returning(|_| Ok(ANCHOR));
        l1.expect_game_status()
            .returning(|_| Ok(GameStatus::DefenderWins));
        l1.expect_block_timestamp()
            .returning(|_| Ok(Some(CONFIRMED_AT)));
        l1
    }

    fn action(l1: MockL1, writer: MockWriter) -> ProveAction {
        let config = EngineConfig {
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 0,
            },
            ..EngineConfig::default()
        };
        let l1: Arc<dyn L1Reader> = Arc::new(l1);
        let l2 = Arc::new(l2());
        let extractor =
            WithdrawalExtractor::new(l2.clone(), MESSAGE_PASSER_ADDRESS, instant_retry());
        let locator = DisputeGameLocator::new(Arc::clone(&l1), instant_retry(), 50, false);
        let tracker = StatusTracker::new(l1, extractor, locator, config);
        let proofs = ProofBuilder::new(l2, MESSAGE_PASSER_ADDRESS, instant_retry());
        ProveAction::new(tracker, proofs, Arc::new(writer), tx_hash())
    }

    fn confirmed(tx_hash: TxHash) -> Result<PortalReceipt, RpcError> {
        Ok(PortalReceipt {
            tx_hash,
            block_number: Some(20_000_000),
            gas_used: 250_000,
            success: true,
        })
    }

    #[tokio::test]
    async fn test_prepare_uses_newest_covering_game() {
        let prepared = action(unproven_l1(3), MockWriter::new())
            .prepare()
            .await
            .unwrap();

        assert_eq!(prepared.anchor.index, U256::from(2));
        assert_eq!(prepared.params.dispute_game_index, U256::from(2));
        assert_eq!(prepared.params.withdrawal, sample_transaction());
        assert_eq!(prepared.withdrawal.l2_block, 1000);
    }

    #[tokio::test]
    async fn test_execute_proves_withdrawal() {
        let mut writer = MockWriter::new();
        writer
            .expect_send()
            .withf(|call| {
                matches!(call, PortalCall::Prove(params) if params.dispute_game_index == U256::from(2))
            })
            .times(1)
            .returning(|_| Ok(B256::repeat_byte(0xcc)));
        writer.expect_confirm().times(1).returning(confirmed);

        let mut action = action(unproven_l1(3), writer);
        let outcome = action.execute().await.unwrap();

        assert_eq!(outcome.tx_hash, B256::repeat_byte(0xcc));
        assert_eq!(outcome.gas_used, 250_000);
        match action.state() {
            WithdrawalState::Proven { record } => {
                assert_eq!(record.proven_timestamp, CONFIRMED_AT);
                assert_eq!(record.source, TimestampSource::ProofEvent);
            }
            other => panic!("unexpected state {other}"),
        }
        assert!(matches!(
            action.submission().current(),
            SubmissionState::Success { .. }
        ));
    }

    #[tokio::test]
    async fn test_no_game_is_not_ready() {
        let mut writer = MockWriter::new();
        writer.expect_send().never();

        let mut action = action(unproven_l1(0), writer);
        let err = action.execute().await.unwrap_err();

        assert!(matches!(
            err,
            WithdrawalError::NotReady(NotReady::OutputNotProposed { l2_block: 1000 })
        ));
        assert!(!action.is_ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_already_proven_is_refused() {
        let mut l1 = MockL1::new();
        l1.expect_finalized_withdrawal().returning(|_| Ok(false));
        l1.expect_num_proof_submitters()
            .returning(|_| Ok(U256::from(1)));
        l1.expect_game_count().never();
        let mut writer = MockWriter::new();
        writer.expect_send().never();

        let mut action = action(l1, writer);
        assert!(matches!(
            action.execute().await,
            Err(WithdrawalError::AlreadyProven(_))
        ));
        assert!(action.is_completed().await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_signature_returns_to_ready() {
        let mut writer = MockWriter::new();
        writer.expect_send().returning(|_| {
            Err(RpcError::Rejected("User rejected the request.".to_string()))
        });
        writer.expect_confirm().never();

        let mut action = action(unproven_l1(3), writer);
        let err = action.execute().await.unwrap_err();

        assert!(err.is_user_rejection());
        assert_eq!(action.state().name(), "ready-to-prove");
        assert!(matches!(
            action.submission().current(),
            SubmissionState::Failed {
                user_rejected: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_send_failure_is_not_retried() {
        let mut writer = MockWriter::new();
        writer
            .expect_send()
            .times(1)
            .returning(|_| Err(RpcError::Transient("connection reset".to_string())));

        let mut action = action(unproven_l1(3), writer);
        let err = action.execute().await.unwrap_err();

        assert!(matches!(err, WithdrawalError::Submission(_)));
        assert_eq!(action.state().name(), "error");
    }
}
