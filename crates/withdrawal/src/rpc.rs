//! Resilient access to chain RPC.
//!
//! Public providers cap `eth_getLogs` ranges and rate-limit aggressively, so
//! every read goes through a [`RetryPolicy`] and log queries are split into
//! bounded chunks with [`scan_logs`].

use crate::error::RpcError;
use config::RetryConfig;
use futures::future::try_join_all;
use std::{future::Future, ops::RangeInclusive, time::Duration};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

/// Retry policy with linear backoff: the wait after attempt `n` is `n * base_delay`.
///
/// Only [`RpcError::Transient`] failures are retried. Rejections and fatal
/// errors are returned on the first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay())
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// A policy that runs the operation exactly once.
    pub const fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Waits between consecutive attempts; one fewer than the attempt count.
    fn backoff(&self) -> impl Iterator<Item = Duration> {
        let base = self.base_delay;
        (1..self.max_attempts.max(1)).map(move |attempt| base * attempt)
    }

    /// Execute one RPC operation under this policy.
    pub async fn call<T, F, Fut>(&self, operation: &'static str, mut f: F) -> Result<T, RpcError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        RetryIf::start(
            self.backoff(),
            || {
                let fut = f();
                async move {
                    fut.await.inspect_err(|e| {
                        warn!(operation, error = %e, "RPC call failed");
                    })
                }
            },
            RpcError::is_transient,
        )
        .await
    }
}

/// Split `[from, to]` into consecutive inclusive ranges of at most `chunk_size` blocks.
pub fn block_chunks(from: u64, to: u64, chunk_size: u64) -> Vec<RangeInclusive<u64>> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = from;

    while current <= to {
        let chunk_end = current.saturating_add(chunk_size - 1).min(to);
        chunks.push(current..=chunk_end);
        if chunk_end == u64::MAX {
            break;
        }
        current = chunk_end + 1;
    }

    chunks
}

/// Parameters of a chunked log scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogScan {
    /// Latest block to include.
    pub head: u64,
    /// How many blocks before `head` to include.
    pub window: u64,
    /// Blocks per `eth_getLogs` call.
    pub chunk_size: u64,
    /// Maximum chunk queries in flight per batch.
    pub concurrency: usize,
}

impl LogScan {
    /// Inclusive block range covered by this scan.
    pub const fn range(&self) -> RangeInclusive<u64> {
        self.head.saturating_sub(self.window)..=self.head
    }
}

/// Scan logs over `[head - window, head]`.
///
/// Chunks are queried in batches of `concurrency`, each chunk retried
/// independently under `policy`. Results are concatenated in chunk order.
/// Callers that need a strict global order must still sort by block number.
pub async fn scan_logs<T, F, Fut>(
    scan: LogScan,
    policy: &RetryPolicy,
    fetch: F,
) -> Result<Vec<T>, RpcError>
where
    F: Fn(u64, u64) -> Fut,
    Fut: Future<Output = Result<Vec<T>, RpcError>>,
{
    let range = scan.range();
    let chunks = block_chunks(*range.start(), *range.end(), scan.chunk_size);

    debug!(
        from = range.start(),
        to = range.end(),
        chunks = chunks.len(),
        "Scanning logs"
    );

    let fetch = &fetch;
    let mut logs = Vec::new();
    for batch in chunks.chunks(scan.concurrency.max(1)) {
        let results = try_join_all(batch.iter().map(move |chunk| {
            let (from, to) = (*chunk.start(), *chunk.end());
            let fut = policy.call("eth_getLogs", move || fetch(from, to));
            async move {
                fut.await.inspect_err(|e| {
                    warn!(from, to, error = %e, "Chunk scan failed");
                })
            }
        }))
        .await?;

        logs.extend(results.into_iter().flatten());
    }

    Ok(logs)
}
