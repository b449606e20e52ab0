//! Bridge transfer history of an account.

use crate::{
    chain::{BridgeLog, L1Reader, L2Reader},
    error::RpcError,
    rpc::{scan_logs, LogScan, RetryPolicy},
};
use alloy_primitives::{Address, TxHash, U256};
use config::EngineConfig;
use std::{fmt, sync::Arc};
use tracing::info;

/// Direction of a bridge transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// ETH sent L1 → L2 through the L1StandardBridge.
    Deposit,
    /// Withdrawal started on L2 through the L2StandardBridge.
    Withdrawal,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deposit => write!(f, "deposit"),
            Self::Withdrawal => write!(f, "withdrawal"),
        }
    }
}

/// One bridge transfer. Deposits live on L1, withdrawals on L2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub kind: TransferKind,
    pub tx_hash: TxHash,
    /// Block number on the transfer's own chain.
    pub block_number: u64,
    pub amount: U256,
}

impl Transfer {
    fn from_log(kind: TransferKind, log: BridgeLog) -> Self {
        Self {
            kind,
            tx_hash: log.tx_hash,
            block_number: log.block_number,
            amount: log.amount,
        }
    }
}

/// Scans both bridges for an account's recent transfers.
#[derive(Clone)]
pub struct HistoryScanner {
    l1: Arc<dyn L1Reader>,
    l2: Arc<dyn L2Reader>,
    policy: RetryPolicy,
    window: u64,
    chunk_size: u64,
    concurrency: usize,
}

impl fmt::Debug for HistoryScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryScanner")
            .field("window", &self.window)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl HistoryScanner {
    pub fn new(l1: Arc<dyn L1Reader>, l2: Arc<dyn L2Reader>, config: &EngineConfig) -> Self {
        Self {
            l1,
            l2,
            policy: config.retry.into(),
            window: config.history_window,
            chunk_size: config.history_chunk_size,
            concurrency: config.log_concurrency,
        }
    }

    /// Deposits and withdrawals of `account` in the recent window of each chain,
    /// newest first.
    ///
    /// Both chains are scanned concurrently. The merged list is ordered by block
    /// number, which compares blocks of different chains and is only a rough
    /// recency order.
    pub async fn history(&self, account: Address) -> Result<Vec<Transfer>, RpcError> {
        let (deposits, withdrawals) = tokio::try_join!(
            self.deposits(account),
            self.withdrawals(account),
        )?;

        info!(
            %account,
            deposits = deposits.len(),
            withdrawals = withdrawals.len(),
            "Fetched bridge history"
        );

        let mut transfers: Vec<_> = deposits.into_iter().chain(withdrawals).collect();
        transfers.sort_by(|a, b| b.block_number.cmp(&a.block_number));
        Ok(transfers)
    }

    /// L1 deposits of `account`.
    pub async fn deposits(&self, account: Address) -> Result<Vec<Transfer>, RpcError> {
        let head = self
            .policy
            .call("eth_blockNumber", || self.l1.block_number())
            .await?;
        let logs = scan_logs(self.scan(head), &self.policy, |from, to| {
            self.l1.bridge_deposits(account, from, to)
        })
        .await?;

        Ok(logs
            .into_iter()
            .map(|log| Transfer::from_log(TransferKind::Deposit, log))
            .collect())
    }

    /// L2 withdrawals of `account`.
    pub async fn withdrawals(&self, account: Address) -> Result<Vec<Transfer>, RpcError> {
        let head = self
            .policy
            .call("eth_blockNumber", || self.l2.block_number())
            .await?;
        let logs = scan_logs(self.scan(head), &self.policy, |from, to| {
            self.l2.bridge_withdrawals(account, from, to)
        })
        .await?;

        Ok(logs
            .into_iter()
            .map(|log| Transfer::from_log(TransferKind::Withdrawal, log))
            .collect())
    }

    const fn scan(&self, head: u64) -> LogScan {
        LogScan {
            head,
            window: self.window,
            chunk_size: self.chunk_size,
            concurrency: self.concurrency,
        }
    }
}
