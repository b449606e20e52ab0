//! Finalize withdrawal action.
//!
//! Executes a proven withdrawal on L1 once its challenge period is over.

use crate::{
    portal::{L1Writer, PortalCall},
    submission::{submit, SubmissionTracker},
    Action, Outcome,
};
use alloy_primitives::{hex, TxHash};
use alloy_sol_types::SolError;
use binding::opstack::IOptimismPortal2::OptimismPortal_ProofNotOldEnough;
use std::sync::Arc;
use tracing::{info, warn};
use withdrawal::{
    status::unix_now, NotReady, ProvenRecord, RpcError, StatusTracker, TimestampSource,
    Withdrawal, WithdrawalError, WithdrawalState,
};

/// Revert reason of pre-Fault-Proofs portals for a proof still in its challenge period.
const NOT_MATURED: &str = "proven withdrawal has not matured yet";

/// Whether the portal refused a finalize because the proof is too young.
fn is_premature_finalize(err: &WithdrawalError) -> bool {
    let WithdrawalError::Submission(RpcError::Fatal(message)) = err else {
        return false;
    };
    let selector = hex::encode(OptimismPortal_ProofNotOldEnough::SELECTOR);
    message.contains(&selector) || message.contains(NOT_MATURED)
}

/// Action to finalize the withdrawal initiated by an L2 transaction.
pub struct FinalizeAction {
    tracker: StatusTracker,
    writer: Arc<dyn L1Writer>,
    tx_hash: TxHash,
    submission: SubmissionTracker,
    state: WithdrawalState,
    clock: fn() -> u64,
}

impl std::fmt::Debug for FinalizeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizeAction")
            .field("tx_hash", &self.tx_hash)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl FinalizeAction {
    pub fn new(tracker: StatusTracker, writer: Arc<dyn L1Writer>, tx_hash: TxHash) -> Self {
        Self {
            tracker,
            writer,
            tx_hash,
            submission: SubmissionTracker::new(),
            state: WithdrawalState::Loading,
            clock: unix_now,
        }
    }

    /// Evaluate the challenge period against `clock` instead of the system time.
    pub const fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Progress of the finalize transaction.
    pub const fn submission(&self) -> &SubmissionTracker {
        &self.submission
    }

    /// Lifecycle state as of the last [`Action::execute`].
    pub const fn state(&self) -> &WithdrawalState {
        &self.state
    }

    /// Re-check the portal and return the withdrawal if it can be finalized now.
    ///
    /// Finalizable means not finalized and proven by at least one submitter.
    /// Both reads are strict: a failing read aborts. A known proof time still
    /// running its challenge period is refused here. An approximate one is only
    /// advisory and the portal has the final say.
    pub async fn check(&self) -> Result<(Withdrawal, ProvenRecord), WithdrawalError> {
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

        let submitters = policy
            .call("numProofSubmitters", || l1.num_proof_submitters(hash))
            .await?;
        if submitters.is_zero() {
            return Err(WithdrawalError::NotReady(NotReady::NotProven));
        }

        let now = (self.clock)();
        let record = self.tracker.proven_record(&withdrawal, now).await;
        if record.source == TimestampSource::Approximate {
            warn!(
                withdrawal_hash = %hash,
                "Proof time unknown, leaving the challenge period check to the portal"
            );
            return Ok((withdrawal, record));
        }

        let remaining_secs = self.remaining_secs(&record, now);
        if remaining_secs > 0 {
            return Err(WithdrawalError::NotReady(NotReady::ChallengePeriod {
                remaining_secs,
            }));
        }
        Ok((withdrawal, record))
    }

    fn remaining_secs(&self, record: &ProvenRecord, now: u64) -> u64 {
        let period = self.tracker.config().challenge_period_secs;
        record.finalizable_at(period).saturating_sub(now)
    }
}

impl Action for FinalizeAction {
    async fn is_ready(&self) -> Result<bool, WithdrawalError> {
        match self.check().await {
            Ok(_) => Ok(true),
            Err(WithdrawalError::NotReady(_) | WithdrawalError::AlreadyFinalized(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn is_completed(&self) -> Result<bool, WithdrawalError> {
        let withdrawal = self.tracker.extractor().extract(self.tx_hash).await?;
        let l1 = self.tracker.l1();
        Ok(self
            .tracker
            .policy()
            .call("finalizedWithdrawals", || {
                l1.finalized_withdrawal(withdrawal.hash)
            })
            .await?)
    }

    async fn execute(&mut self) -> Result<Outcome, WithdrawalError> {
        let (withdrawal, record) = self.check().await?;

        self.state = WithdrawalState::Loading
            .loaded(WithdrawalState::ReadyToFinalize { record })?
            .begin_finalize()?;

        let result = submit(
            self.writer.as_ref(),
            &self.submission,
            PortalCall::Finalize(withdrawal.transaction.clone()),
        )
        .await;
        let receipt = match result {
            Ok(receipt) => receipt,
            Err(err) if is_premature_finalize(&err) => {
                let state = std::mem::replace(&mut self.state, WithdrawalState::Loading);
                self.state = state.finalize_premature()?;
                let remaining_secs = self.remaining_secs(&record, (self.clock)());
                warn!(remaining_secs, "Portal refused finalize, challenge period still running");
                return Err(WithdrawalError::NotReady(NotReady::ChallengePeriod {
                    remaining_secs,
                }));
            }
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

        let state = std::mem::replace(&mut self.state, WithdrawalState::Loading);
        self.state = state.finalize_confirmed()?;

        info!(
            tx_hash = %receipt.tx_hash,
            block_number = receipt.block_number,
            gas_used = receipt.gas_used,
            withdrawal_hash = %withdrawal.hash,
            "Withdrawal finalized on L1"
        );

        Ok(receipt.into())
    }

    fn description(&self) -> String {
        format!(
            "Finalizing withdrawal from L2 transaction {} on L1",
            self.tx_hash
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        portal::{test_utils::MockWriter, PortalReceipt},
        submission::SubmissionState,
    };
    use alloy_primitives::{Address, B256, U256};
    use binding::opstack::MESSAGE_PASSER_ADDRESS;
    use config::{EngineConfig, RetryConfig};
    use withdrawal::{
        chain::{L1Reader, ProvenEvent},
        extract::WithdrawalExtractor,
        game::DisputeGameLocator,
        test_utils::{instant_retry, sample_transaction, withdrawal_receipt, MockL1, MockL2},
        RpcError,
    };

    const PERIOD: u64 = 604_800;
    const PROVEN_AT: u64 = 1_700_000_000;
    const PROOF_BLOCK: u64 = 19_990_000;

    fn tx_hash() -> TxHash {
        B256::repeat_byte(0xaa)
    }

    fn after_period() -> u64 {
        PROVEN_AT + PERIOD
    }

    fn during_period() -> u64 {
        PROVEN_AT + PERIOD - 3_600
    }

    fn long_after_period() -> u64 {
        PROVEN_AT + 10 * PERIOD
    }

    /// Proven withdrawal whose proof event is in `PROOF_BLOCK`, proven at `PROVEN_AT`.
    fn proven_l1() -> MockL1 {
        let mut l1 = MockL1::new();
        l1.expect_finalized_withdrawal().returning(|_| Ok(false));
        l1.expect_num_proof_submitters()
            .returning(|_| Ok(U256::from(1)));
        l1.expect_block_number().returning(|| Ok(20_000_000));
        l1.expect_proven_events().returning(|hash, from, to| {
            Ok(if (from..=to).contains(&PROOF_BLOCK) {
                vec![ProvenEvent {
                    withdrawal_hash: hash,
                    submitter: Address::with_last_byte(1),
                    block_number: PROOF_BLOCK,
                }]
            } else {
                vec![]
            })
        });
        l1.expect_block_timestamp()
            .returning(|_| Ok(Some(PROVEN_AT)));
        l1
    }

    /// Proven withdrawal whose proof time cannot be recovered: the event is out of
    /// range and the portal has no record under any known submitter.
    fn proven_l1_without_timestamp() -> MockL1 {
        let mut l1 = MockL1::new();
        l1.expect_finalized_withdrawal().returning(|_| Ok(false));
        l1.expect_num_proof_submitters()
            .returning(|_| Ok(U256::from(1)));
        l1.expect_block_number().returning(|| Ok(20_000_000));
        l1.expect_proven_events().returning(|_, _, _| Ok(vec![]));
        l1.expect_proof_submitter()
            .returning(|_, _| Ok(Address::with_last_byte(0x77)));
        l1.expect_proven_withdrawal().returning(|_, _| Ok(None));
        l1
    }

    fn action(l1: MockL1, writer: MockWriter, clock: fn() -> u64) -> FinalizeAction {
        let config = EngineConfig {
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 0,
            },
            ..EngineConfig::default()
        };
        let receipt = withdrawal_receipt(tx_hash(), 1000, &sample_transaction());
        let mut l2 = MockL2::new();
        l2.expect_transaction_receipt()
            .returning(move |_| Ok(Some(receipt.clone())));

        let l1: Arc<dyn L1Reader> = Arc::new(l1);
        let extractor =
            WithdrawalExtractor::new(Arc::new(l2), MESSAGE_PASSER_ADDRESS, instant_retry());
        let locator = DisputeGameLocator::new(Arc::clone(&l1), instant_retry(), 50, false);
        let tracker = StatusTracker::new(l1, extractor, locator, config);
        FinalizeAction::new(tracker, Arc::new(writer), tx_hash()).with_clock(clock)
    }

    #[tokio::test]
    async fn test_execute_after_challenge_period() {
        let mut writer = MockWriter::new();
        writer
            .expect_send()
            .withf(|call| matches!(call, PortalCall::Finalize(tx) if *tx == sample_transaction()))
            .times(1)
            .returning(|_| Ok(B256::repeat_byte(0xdd)));
        writer.expect_confirm().times(1).returning(|tx_hash| {
            Ok(PortalReceipt {
                tx_hash,
                block_number: Some(20_100_000),
                gas_used: 120_000,
                success: true,
            })
        });

        let mut action = action(proven_l1(), writer, after_period);
        assert!(action.is_ready().await.unwrap());

        let outcome = action.execute().await.unwrap();
        assert_eq!(outcome.tx_hash, B256::repeat_byte(0xdd));
        assert_eq!(outcome.block_number, Some(20_100_000));
        assert_eq!(*action.state(), WithdrawalState::Finalized);
        assert!(matches!(
            action.submission().current(),
            SubmissionState::Success { .. }
        ));
    }

    #[tokio::test]
    async fn test_challenge_period_running() {
        let mut writer = MockWriter::new();
        writer.expect_send().never();

        let mut action = action(proven_l1(), writer, during_period);
        let err = action.execute().await.unwrap_err();

        assert!(matches!(
            err,
            WithdrawalError::NotReady(NotReady::ChallengePeriod {
                remaining_secs: 3_600
            })
        ));
        assert!(!action.is_ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_proof_time_does_not_block_finalize() {
        let mut writer = MockWriter::new();
        writer
            .expect_send()
            .times(1)
            .returning(|_| Ok(B256::repeat_byte(0xdd)));
        writer.expect_confirm().returning(|tx_hash| {
            Ok(PortalReceipt {
                tx_hash,
                block_number: Some(20_100_000),
                gas_used: 120_000,
                success: true,
            })
        });

        let mut action = action(proven_l1_without_timestamp(), writer, long_after_period);
        assert!(action.is_ready().await.unwrap());

        let outcome = action.execute().await.unwrap();
        assert_eq!(outcome.tx_hash, B256::repeat_byte(0xdd));
        assert_eq!(*action.state(), WithdrawalState::Finalized);
    }

    #[tokio::test]
    async fn test_portal_refusing_young_proof_is_not_ready() {
        let mut writer = MockWriter::new();
        writer.expect_send().times(1).returning(|_| {
            Err(RpcError::classify(format!(
                "server returned an error response: error code 3: execution reverted, data: \"0x{}\"",
                hex::encode(OptimismPortal_ProofNotOldEnough::SELECTOR)
            )))
        });
        writer.expect_confirm().never();

        let mut action = action(proven_l1_without_timestamp(), writer, during_period);
        let err = action.execute().await.unwrap_err();

        assert!(matches!(
            err,
            WithdrawalError::NotReady(NotReady::ChallengePeriod {
                remaining_secs: PERIOD
            })
        ));
        assert_eq!(action.state().name(), "proven");
        assert!(matches!(
            action.submission().current(),
            SubmissionState::Failed {
                user_rejected: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unproven_withdrawal() {
        let mut l1 = MockL1::new();
        l1.expect_finalized_withdrawal().returning(|_| Ok(false));
        l1.expect_num_proof_submitters()
            .returning(|_| Ok(U256::ZERO));
        l1.expect_proven_events().never();
        let mut writer = MockWriter::new();
        writer.expect_send().never();

        let mut action = action(l1, writer, after_period);
        assert!(matches!(
            action.execute().await,
            Err(WithdrawalError::NotReady(NotReady::NotProven))
        ));
    }

    #[tokio::test]
    async fn test_finalize_twice_sends_nothing() {
        let mut l1 = MockL1::new();
        l1.expect_finalized_withdrawal().returning(|_| Ok(true));
        l1.expect_num_proof_submitters().never();
        let mut writer = MockWriter::new();
        writer.expect_send().never();

        let mut action = action(l1, writer, after_period);
        for _ in 0..2 {
            assert!(matches!(
                action.execute().await,
                Err(WithdrawalError::AlreadyFinalized(_))
            ));
        }
        assert!(action.is_completed().await.unwrap());
        assert!(!action.is_ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_finalized_read_aborts() {
        let mut l1 = MockL1::new();
        l1.expect_finalized_withdrawal()
            .returning(|_| Err(RpcError::Transient("timeout".to_string())));
        l1.expect_num_proof_submitters().never();
        let mut writer = MockWriter::new();
        writer.expect_send().never();

        let mut action = action(l1, writer, after_period);
        let err = action.execute().await.unwrap_err();
        assert!(matches!(err, WithdrawalError::Rpc(RpcError::Transient(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_reverted_finalize_is_an_error() {
        let mut writer = MockWriter::new();
        writer
            .expect_send()
            .returning(|_| Ok(B256::repeat_byte(0xdd)));
        writer.expect_confirm().returning(|tx_hash| {
            Ok(PortalReceipt {
                tx_hash,
                block_number: Some(20_100_000),
                gas_used: 90_000,
                success: false,
            })
        });

        let mut action = action(proven_l1(), writer, after_period);
        let err = action.execute().await.unwrap_err();

        assert!(matches!(err, WithdrawalError::Submission(RpcError::Fatal(_))));
        assert_eq!(action.state().name(), "error");
    }
}
