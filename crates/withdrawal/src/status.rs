//! Withdrawal lifecycle.
//!
//! ```text
//! Loading -> Finalized | Proven | ReadyToFinalize | ReadyToProve | WaitingForOutput | Error
//! ReadyToProve -> Proving -> Proven -> ReadyToFinalize -> Finalizing -> Finalized
//! Proving -> ReadyToProve, Finalizing -> ReadyToFinalize   (submission abandoned)
//! Finalizing -> Proven                                     (portal says the proof is too young)
//! any -> Error
//! ```
//!
//! Every state is derived afresh from chain reads. Nothing here is persisted.

use crate::{
    chain::{L1Reader, ProvenEvent},
    error::{RpcError, WithdrawalError},
    extract::WithdrawalExtractor,
    game::DisputeGameLocator,
    rpc::{scan_logs, LogScan, RetryPolicy},
    types::{DisputeGameRef, ProvenRecord, TimestampSource, Withdrawal},
};
use alloy_primitives::{TxHash, U256};
use config::EngineConfig;
use std::{
    fmt,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{debug, info, warn};

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Where a withdrawal is in its L2→L1 lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalState {
    /// Chain reads have not resolved yet.
    Loading,
    /// No dispute game covers the withdrawal's L2 block yet.
    WaitingForOutput,
    /// A covering game exists and the withdrawal can be proven against it.
    ReadyToProve { anchor: DisputeGameRef },
    /// A prove transaction is in flight.
    Proving { anchor: DisputeGameRef },
    /// Proven, challenge period running.
    Proven { record: ProvenRecord },
    /// Challenge period over, can be finalized.
    ReadyToFinalize { record: ProvenRecord },
    /// A finalize transaction is in flight.
    Finalizing { record: ProvenRecord },
    /// Executed on L1.
    Finalized,
    /// The status could not be derived.
    Error { reason: String },
}

impl fmt::Display for WithdrawalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl WithdrawalState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::WaitingForOutput => "waiting-for-output",
            Self::ReadyToProve { .. } => "ready-to-prove",
            Self::Proving { .. } => "proving",
            Self::Proven { .. } => "proven",
            Self::ReadyToFinalize { .. } => "ready-to-finalize",
            Self::Finalizing { .. } => "finalizing",
            Self::Finalized => "finalized",
            Self::Error { .. } => "error",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Error { .. })
    }

    /// The proof record, for states past proving.
    pub const fn proven_record(&self) -> Option<&ProvenRecord> {
        match self {
            Self::Proven { record }
            | Self::ReadyToFinalize { record }
            | Self::Finalizing { record } => Some(record),
            _ => None,
        }
    }

    const fn invalid(&self, event: &'static str) -> WithdrawalError {
        WithdrawalError::InvalidTransition {
            from: self.name(),
            event,
        }
    }

    /// Leave `Loading` with the state derived from chain reads.
    pub fn loaded(self, derived: Self) -> Result<Self, WithdrawalError> {
        if !matches!(self, Self::Loading) {
            return Err(self.invalid("loaded"));
        }
        // in-flight states only follow a submission
        match derived {
            Self::Loading | Self::Proving { .. } | Self::Finalizing { .. } => {
                Err(self.invalid("loaded"))
            }
            derived => Ok(derived),
        }
    }

    /// A prove transaction was submitted.
    pub fn begin_prove(self) -> Result<Self, WithdrawalError> {
        match self {
            Self::ReadyToProve { anchor } => Ok(Self::Proving { anchor }),
            other => Err(other.invalid("begin_prove")),
        }
    }

    /// The prove transaction was confirmed.
    pub fn prove_confirmed(self, record: ProvenRecord) -> Result<Self, WithdrawalError> {
        match self {
            Self::Proving { .. } => Ok(Self::Proven { record }),
            other => Err(other.invalid("prove_confirmed")),
        }
    }

    /// A finalize transaction was submitted.
    pub fn begin_finalize(self) -> Result<Self, WithdrawalError> {
        match self {
            Self::ReadyToFinalize { record } => Ok(Self::Finalizing { record }),
            other => Err(other.invalid("begin_finalize")),
        }
    }

    /// The finalize transaction was confirmed.
    pub fn finalize_confirmed(self) -> Result<Self, WithdrawalError> {
        match self {
            Self::Finalizing { .. } => Ok(Self::Finalized),
            other => Err(other.invalid("finalize_confirmed")),
        }
    }

    /// The in-flight submission was abandoned (e.g. rejected in the wallet).
    pub fn abandon(self) -> Result<Self, WithdrawalError> {
        match self {
            Self::Proving { anchor } => Ok(Self::ReadyToProve { anchor }),
            Self::Finalizing { record } => Ok(Self::ReadyToFinalize { record }),
            other => Err(other.invalid("abandon")),
        }
    }

    /// The portal refused to finalize because the challenge period is still running.
    pub fn finalize_premature(self) -> Result<Self, WithdrawalError> {
        match self {
            Self::Finalizing { record } => Ok(Self::Proven { record }),
            other => Err(other.invalid("finalize_premature")),
        }
    }

    /// Unrecoverable failure. Allowed from every state.
    pub fn fail(self, reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }

    /// Advance the countdown: `Proven` becomes `ReadyToFinalize` once
    /// `now >= proven_timestamp + challenge_period_secs`. Other states are unchanged.
    pub fn tick(self, now: u64, challenge_period_secs: u64) -> Self {
        match self {
            Self::Proven { record } if now >= record.finalizable_at(challenge_period_secs) => {
                Self::ReadyToFinalize { record }
            }
            other => other,
        }
    }

    /// Seconds left in the challenge period, for `Proven` withdrawals.
    pub const fn time_remaining(&self, now: u64, challenge_period_secs: u64) -> Option<u64> {
        match self {
            Self::Proven { record } => {
                Some(record.finalizable_at(challenge_period_secs).saturating_sub(now))
            }
            _ => None,
        }
    }
}

/// Result of a status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalStatus {
    /// `None` when extraction failed.
    pub withdrawal: Option<Withdrawal>,
    pub state: WithdrawalState,
}

/// Derives the lifecycle state of a withdrawal from chain state.
#[derive(Clone)]
pub struct StatusTracker {
    l1: Arc<dyn L1Reader>,
    extractor: WithdrawalExtractor,
    locator: DisputeGameLocator,
    policy: RetryPolicy,
    config: EngineConfig,
}

impl fmt::Debug for StatusTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusTracker")
            .field("extractor", &self.extractor)
            .field("locator", &self.locator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StatusTracker {
    pub fn new(
        l1: Arc<dyn L1Reader>,
        extractor: WithdrawalExtractor,
        locator: DisputeGameLocator,
        config: EngineConfig,
    ) -> Self {
        Self {
            l1,
            extractor,
            locator,
            policy: config.retry.into(),
            config,
        }
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn extractor(&self) -> &WithdrawalExtractor {
        &self.extractor
    }

    pub const fn locator(&self) -> &DisputeGameLocator {
        &self.locator
    }

    pub const fn l1(&self) -> &Arc<dyn L1Reader> {
        &self.l1
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Status of the withdrawal initiated by `tx_hash`, as of now.
    pub async fn status(&self, tx_hash: TxHash) -> WithdrawalStatus {
        self.status_at(tx_hash, unix_now()).await
    }

    /// Status of the withdrawal initiated by `tx_hash`, evaluated at unix time `now`.
    pub async fn status_at(&self, tx_hash: TxHash, now: u64) -> WithdrawalStatus {
        let withdrawal = match self.extractor.extract(tx_hash).await {
            Ok(withdrawal) => withdrawal,
            Err(err) => {
                warn!(%tx_hash, error = %err, "Withdrawal extraction failed");
                return WithdrawalStatus {
                    withdrawal: None,
                    state: WithdrawalState::Loading.fail(err.to_string()),
                };
            }
        };

        let derived = self.state_for(&withdrawal, now).await;
        let state = WithdrawalState::Loading
            .loaded(derived)
            .unwrap_or_else(|err| WithdrawalState::Loading.fail(err.to_string()));

        info!(
            %tx_hash,
            withdrawal_hash = %withdrawal.hash,
            state = %state,
            "Withdrawal status"
        );

        WithdrawalStatus {
            withdrawal: Some(withdrawal),
            state,
        }
    }

    /// State of an already extracted withdrawal at unix time `now`.
    ///
    /// Checks run in priority order: finalized, proven, provable, waiting. A
    /// finalized or proven read that fails after retries yields
    /// [`WithdrawalState::Error`]: the later checks cannot be trusted without it.
    pub async fn state_for(&self, withdrawal: &Withdrawal, now: u64) -> WithdrawalState {
        let hash = withdrawal.hash;

        let finalized = match self
            .policy
            .call("finalizedWithdrawals", || self.l1.finalized_withdrawal(hash))
            .await
        {
            Ok(finalized) => finalized,
            Err(err) => return read_failed(withdrawal, "finalized check", err),
        };
        if finalized {
            return WithdrawalState::Finalized;
        }

        let submitters = match self
            .policy
            .call("numProofSubmitters", || self.l1.num_proof_submitters(hash))
            .await
        {
            Ok(submitters) => submitters,
            Err(err) => return read_failed(withdrawal, "proof check", err),
        };
        if !submitters.is_zero() {
            let record = self.proven_record(withdrawal, now).await;
            return WithdrawalState::Proven { record }.tick(now, self.config.challenge_period_secs);
        }

        match self.locator.find_anchor(withdrawal.l2_block).await {
            Ok(Some(anchor)) => WithdrawalState::ReadyToProve { anchor },
            Ok(None) => WithdrawalState::WaitingForOutput,
            Err(err) => WithdrawalState::Error {
                reason: format!("dispute game lookup failed: {err}"),
            },
        }
    }

    /// When the withdrawal was proven.
    ///
    /// Tries the `WithdrawalProven` event first, then the portal's proof record.
    /// The portal is asked under the event's submitter, the first recorded proof
    /// submitter and the withdrawal sender, in that order. If nothing answers,
    /// `now` is used and the record is marked [`TimestampSource::Approximate`]:
    /// the countdown it drives is then an upper bound.
    pub async fn proven_record(&self, withdrawal: &Withdrawal, now: u64) -> ProvenRecord {
        let hash = withdrawal.hash;

        let event = match self.find_proven_event(withdrawal).await {
            Ok(event) => event,
            Err(err) => {
                warn!(withdrawal_hash = %hash, error = %err, "Proof event search failed");
                None
            }
        };

        if let Some(event) = event {
            match self
                .policy
                .call("eth_getBlockByNumber", || {
                    self.l1.block_timestamp(event.block_number)
                })
                .await
            {
                Ok(Some(timestamp)) => {
                    debug!(withdrawal_hash = %hash, block = event.block_number, timestamp, "Proven at");
                    return ProvenRecord {
                        withdrawal_hash: hash,
                        proven_timestamp: timestamp,
                        source: TimestampSource::ProofEvent,
                    };
                }
                Ok(None) => warn!(block = event.block_number, "Proof event block not found"),
                Err(err) => warn!(block = event.block_number, error = %err, "Block read failed"),
            }
        }

        let mut submitters = Vec::with_capacity(3);
        if let Some(event) = event {
            submitters.push(event.submitter);
        }
        match self
            .policy
            .call("proofSubmitters", || {
                self.l1.proof_submitter(hash, U256::ZERO)
            })
            .await
        {
            Ok(submitter) if !submitters.contains(&submitter) => submitters.push(submitter),
            Ok(_) => {}
            Err(err) => warn!(withdrawal_hash = %hash, error = %err, "Proof submitter read failed"),
        }
        if !submitters.contains(&withdrawal.transaction.sender) {
            submitters.push(withdrawal.transaction.sender);
        }

        for submitter in submitters {
            match self
                .policy
                .call("provenWithdrawals", || {
                    self.l1.proven_withdrawal(hash, submitter)
                })
                .await
            {
                Ok(Some(proven)) => {
                    debug!(withdrawal_hash = %hash, %submitter, timestamp = proven.timestamp, "Proven at");
                    return ProvenRecord {
                        withdrawal_hash: hash,
                        proven_timestamp: proven.timestamp,
                        source: TimestampSource::Portal,
                    };
                }
                Ok(None) => debug!(withdrawal_hash = %hash, %submitter, "No portal proof for submitter"),
                Err(err) => warn!(withdrawal_hash = %hash, %submitter, error = %err, "Portal proof read failed"),
            }
        }

        warn!(
            withdrawal_hash = %hash,
            "Proof time unknown, countdown starts now and overstates the remaining time"
        );
        ProvenRecord {
            withdrawal_hash: hash,
            proven_timestamp: now,
            source: TimestampSource::Approximate,
        }
    }

    /// Earliest `WithdrawalProven` event for the withdrawal in the recent L1 window.
    async fn find_proven_event(
        &self,
        withdrawal: &Withdrawal,
    ) -> Result<Option<ProvenEvent>, RpcError> {
        let head = self
            .policy
            .call("eth_blockNumber", || self.l1.block_number())
            .await?;
        let scan = LogScan {
            head,
            window: self.config.proof_event_scan_window(),
            chunk_size: self.config.proof_event_chunk_size,
            concurrency: self.config.log_concurrency,
        };

        let hash = withdrawal.hash;
        let events = scan_logs(scan, &self.policy, |from, to| {
            self.l1.proven_events(hash, from, to)
        })
        .await?;

        Ok(events.into_iter().min_by_key(|event| event.block_number))
    }
}

/// Error state for a lifecycle read that failed after retries.
fn read_failed(withdrawal: &Withdrawal, what: &str, err: RpcError) -> WithdrawalState {
    warn!(withdrawal_hash = %withdrawal.hash, error = %err, "{what} failed");
    let reason = WithdrawalError::Rpc(err).user_message();
    WithdrawalState::Error {
        reason: format!("{what} failed: {reason}"),
    }
}
