//! Command implementations of the `withdrawer` CLI.

pub mod config;
pub mod metrics;

use crate::{config::Config, metrics::Metrics};
use action::{
    finalize::FinalizeAction,
    portal::{AlloyPortalWriter, GasLimits, L1Writer, PortalCall, PortalReceipt},
    prove::{PreparedProof, ProveAction},
    Action, Outcome,
};
use alloy_primitives::{utils::format_ether, Address, TxHash};
use alloy_provider::{DynProvider, Provider};
use ::config::{EngineConfig, NetworkConfig};
use std::{fmt::Write as _, sync::Arc, time::Instant};
use tracing::info;
use withdrawal::{
    chain::{AlloyL1Reader, AlloyL2Reader, L1Reader, L2Reader},
    countdown::{format_remaining, Countdown, CountdownWatch},
    extract::WithdrawalExtractor,
    game::DisputeGameLocator,
    history::{HistoryScanner, Transfer},
    proof::ProofBuilder,
    rpc::RetryPolicy,
    status::unix_now,
    ProvenRecord, RpcError, StatusTracker, TimestampSource, WithdrawalError, WithdrawalState,
    WithdrawalStatus,
};

/// The engine wired to live RPC endpoints.
pub struct Withdrawer {
    network: NetworkConfig,
    settings: EngineConfig,
    l1_provider: DynProvider,
    tracker: StatusTracker,
    proofs: ProofBuilder,
    history: HistoryScanner,
    metrics: Metrics,
}

impl std::fmt::Debug for Withdrawer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Withdrawer")
            .field("network", &self.network)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Withdrawer {
    /// Connect to both chains and build the engine components.
    pub async fn connect(config: &Config, metrics: Metrics) -> eyre::Result<Self> {
        let network = config.network_config();
        let settings = config.engine_config();
        settings.validate()?;

        let l1_provider = client::create_provider(&config.l1_rpc_url)?.erased();
        let l2_provider = client::create_provider(&config.l2_rpc_url)?.erased();

        let l1_reader = AlloyL1Reader::connect(l1_provider.clone(), &network.l1).await?;
        info!(
            portal = %network.l1.portal,
            factory = %l1_reader.factory(),
            message_passer = %network.l2.message_passer,
            "Connected"
        );

        let l1: Arc<dyn L1Reader> = Arc::new(l1_reader);
        let l2: Arc<dyn L2Reader> = Arc::new(AlloyL2Reader::new(l2_provider, &network.l2));
        let policy = RetryPolicy::from(settings.retry);

        let extractor =
            WithdrawalExtractor::new(Arc::clone(&l2), network.l2.message_passer, policy);
        let locator = DisputeGameLocator::new(
            Arc::clone(&l1),
            policy,
            settings.game_scan_batch,
            settings.allow_in_progress_games,
        );
        let tracker = StatusTracker::new(Arc::clone(&l1), extractor, locator, settings.clone());
        let proofs = ProofBuilder::new(Arc::clone(&l2), network.l2.message_passer, policy);
        let history = HistoryScanner::new(l1, l2, &settings);

        Ok(Self {
            network,
            settings,
            l1_provider,
            tracker,
            proofs,
            history,
            metrics,
        })
    }

    pub const fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    /// A portal writer signing with `private_key`.
    pub fn writer(&self, private_key: &str) -> eyre::Result<Arc<dyn L1Writer>> {
        let signer = client::parse_private_key(private_key)?;
        let from = signer.address();
        let sign =
            client::local_signer_fn(signer, self.network.l1.chain_id, self.l1_provider.clone());

        info!(%from, chain_id = self.network.l1.chain_id, "Using local signer");
        Ok(Arc::new(AlloyPortalWriter::new(
            self.l1_provider.clone(),
            self.network.l1.portal,
            from,
            sign,
            GasLimits::from(&self.settings),
        )))
    }

    /// Current status of the withdrawal initiated by `tx_hash`.
    pub async fn status(&self, tx_hash: TxHash) -> WithdrawalStatus {
        let started = Instant::now();
        let status = self.tracker.status(tx_hash).await;
        self.metrics.record_status(&status.state);
        self.metrics.record_command("status", started.elapsed());
        status
    }

    /// Follow the withdrawal until it needs action or reaches a terminal state.
    ///
    /// Polls while no game covers the withdrawal and runs a local countdown
    /// while the challenge period is open. An approximate countdown is run once
    /// and then handed over to a finalize attempt. `on_update` sees every new state.
    pub async fn watch<F>(&self, tx_hash: TxHash, mut on_update: F) -> WithdrawalStatus
    where
        F: FnMut(&WithdrawalStatus),
    {
        let period = self.settings.challenge_period_secs;
        let tick = self.settings.countdown_tick();

        loop {
            let status = self.status(tx_hash).await;
            on_update(&status);

            match &status.state {
                WithdrawalState::WaitingForOutput => tokio::time::sleep(tick).await,
                WithdrawalState::Proven { record } => {
                    let countdown =
                        CountdownWatch::spawn(status.state.clone(), period, tick, unix_now);
                    let mut rx = countdown.subscribe();
                    loop {
                        let state = rx.borrow_and_update().clone();
                        let Some(remaining) = state.time_remaining(unix_now(), period) else {
                            break;
                        };
                        self.metrics.set_challenge_remaining(remaining);
                        on_update(&WithdrawalStatus {
                            withdrawal: status.withdrawal.clone(),
                            state,
                        });
                        if rx.changed().await.is_err() {
                            break;
                        }
                    }

                    if let Some(status) = countdown_finished(&status, record) {
                        on_update(&status);
                        return status;
                    }
                    // known proof time: confirm on chain before reporting it finalizable
                }
                _ => return status,
            }
        }
    }

    /// Prove the withdrawal initiated by `tx_hash`.
    pub async fn prove(
        &self,
        tx_hash: TxHash,
        writer: Arc<dyn L1Writer>,
    ) -> Result<Outcome, WithdrawalError> {
        let started = Instant::now();
        let mut action =
            ProveAction::new(self.tracker.clone(), self.proofs.clone(), writer, tx_hash);
        info!("{}", action.description());

        let result = action.execute().await;
        self.metrics.record_submission("prove", &result);
        self.metrics.record_command("prove", started.elapsed());
        result
    }

    /// Build the proof for `tx_hash` without submitting it.
    pub async fn prove_dry_run(&self, tx_hash: TxHash) -> Result<PreparedProof, WithdrawalError> {
        let started = Instant::now();
        let writer: Arc<dyn L1Writer> = Arc::new(DryRunWriter);
        let action = ProveAction::new(self.tracker.clone(), self.proofs.clone(), writer, tx_hash);

        let result = action.prepare().await;
        self.metrics.record_command("prove", started.elapsed());
        result
    }

    /// Finalize the withdrawal initiated by `tx_hash`.
    pub async fn finalize(
        &self,
        tx_hash: TxHash,
        writer: Arc<dyn L1Writer>,
    ) -> Result<Outcome, WithdrawalError> {
        let started = Instant::now();
        let mut action = FinalizeAction::new(self.tracker.clone(), writer, tx_hash);
        info!("{}", action.description());

        let result = action.execute().await;
        self.metrics.record_submission("finalize", &result);
        self.metrics.record_command("finalize", started.elapsed());
        result
    }

    /// Recent bridge transfers of `account`, newest first.
    pub async fn history(&self, account: Address) -> Result<Vec<Transfer>, WithdrawalError> {
        let started = Instant::now();
        let transfers = self.history.history(account).await?;
        self.metrics.set_history_transfers(transfers.len());
        self.metrics.record_command("history", started.elapsed());
        Ok(transfers)
    }
}

/// Status to report once the local countdown of `record` ran out.
///
/// A known proof time is re-read from chain, so `None`. A fresh read would
/// restart an approximate countdown, so it ends the watch as finalizable and
/// the portal decides.
fn countdown_finished(
    status: &WithdrawalStatus,
    record: &ProvenRecord,
) -> Option<WithdrawalStatus> {
    (record.source == TimestampSource::Approximate).then(|| WithdrawalStatus {
        withdrawal: status.withdrawal.clone(),
        state: WithdrawalState::ReadyToFinalize { record: *record },
    })
}

/// Refuses every call. Dry runs only prepare.
struct DryRunWriter;

#[async_trait::async_trait]
impl L1Writer for DryRunWriter {
    async fn send(&self, call: PortalCall) -> Result<TxHash, RpcError> {
        Err(RpcError::Fatal(format!("dry run, {} not sent", call.name())))
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<PortalReceipt, RpcError> {
        Err(RpcError::Fatal(format!("dry run, {tx_hash} was never sent")))
    }
}

/// Human-readable status report evaluated at unix time `now`.
pub fn render_status(status: &WithdrawalStatus, now: u64, challenge_period_secs: u64) -> String {
    let mut out = String::new();

    if let Some(withdrawal) = &status.withdrawal {
        let _ = writeln!(out, "withdrawal  {}", withdrawal.hash);
        let _ = writeln!(out, "l2 tx       {}", withdrawal.l2_tx_hash);
        let _ = writeln!(out, "l2 block    {}", withdrawal.l2_block);
        let _ = writeln!(
            out,
            "amount      {} ETH",
            format_ether(withdrawal.transaction.value)
        );
    }
    let _ = writeln!(out, "state       {}", status.state);

    match &status.state {
        WithdrawalState::ReadyToProve { anchor } => {
            let _ = writeln!(
                out,
                "anchor      game #{} at L2 block {} ({})",
                anchor.index, anchor.l2_block, anchor.status
            );
        }
        WithdrawalState::Proven { record } | WithdrawalState::ReadyToFinalize { record } => {
            let countdown = Countdown::new(record, challenge_period_secs);
            let approximate = if record.source == TimestampSource::Approximate {
                " (approximate, proof time unknown)"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "remaining   {}{approximate}",
                format_remaining(countdown.remaining(now))
            );
        }
        WithdrawalState::Error { reason } => {
            let _ = writeln!(out, "reason      {reason}");
        }
        _ => {}
    }

    out
}

/// One line per transfer.
pub fn render_history(transfers: &[Transfer]) -> String {
    let mut out = String::new();
    for transfer in transfers {
        let _ = writeln!(
            out,
            "{:<10} block {:>10}  {}  {} ETH",
            transfer.kind.to_string(),
            transfer.block_number,
            transfer.tx_hash,
            format_ether(transfer.amount)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, U256};
    use withdrawal::history::TransferKind;

    const PERIOD: u64 = 604_800;

    #[test]
    fn test_render_proven_status() {
        let status = WithdrawalStatus {
            withdrawal: None,
            state: WithdrawalState::Proven {
                record: ProvenRecord {
                    withdrawal_hash: B256::ZERO,
                    proven_timestamp: 1_000,
                    source: TimestampSource::Approximate,
                },
            },
        };

        let out = render_status(&status, 1_000 + 86_400, PERIOD);
        assert!(out.contains("state       proven"));
        assert!(out.contains("remaining   6d 0h 0m (approximate"));
    }

    #[test]
    fn test_approximate_countdown_ends_the_watch() {
        let record = ProvenRecord {
            withdrawal_hash: B256::ZERO,
            proven_timestamp: 1_000,
            source: TimestampSource::Approximate,
        };
        let status = WithdrawalStatus {
            withdrawal: None,
            state: WithdrawalState::Proven { record },
        };

        let finished = countdown_finished(&status, &record).unwrap();
        assert_eq!(finished.state, WithdrawalState::ReadyToFinalize { record });

        let known = ProvenRecord {
            source: TimestampSource::ProofEvent,
            ..record
        };
        assert!(countdown_finished(&status, &known).is_none());
    }

    #[test]
    fn test_render_error_status() {
        let status = WithdrawalStatus {
            withdrawal: None,
            state: WithdrawalState::Error {
                reason: "withdrawal not found".to_string(),
            },
        };
        assert!(render_status(&status, 0, PERIOD).contains("reason      withdrawal not found"));
    }

    #[test]
    fn test_render_history() {
        let out = render_history(&[Transfer {
            kind: TransferKind::Deposit,
            tx_hash: B256::repeat_byte(1),
            block_number: 42,
            amount: U256::from(1_500_000_000_000_000_000u128),
        }]);
        assert!(out.starts_with("deposit"));
        assert!(out.contains("1.500000000000000000 ETH"));
    }
}
