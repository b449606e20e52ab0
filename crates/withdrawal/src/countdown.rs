//! Challenge period countdown.
//!
//! The countdown is pure wall-clock arithmetic against a fixed end time. It
//! never goes back to the chain.

use crate::{status::WithdrawalState, types::ProvenRecord};
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle, time};
use tracing::debug;

/// Time left until a proven withdrawal can be finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    finalizable_at: u64,
}

impl Countdown {
    pub const fn new(record: &ProvenRecord, challenge_period_secs: u64) -> Self {
        Self {
            finalizable_at: record.finalizable_at(challenge_period_secs),
        }
    }

    /// Unix time at which the challenge period ends.
    pub const fn finalizable_at(&self) -> u64 {
        self.finalizable_at
    }

    pub const fn remaining(&self, now: u64) -> u64 {
        self.finalizable_at.saturating_sub(now)
    }

    pub const fn is_complete(&self, now: u64) -> bool {
        now >= self.finalizable_at
    }
}

/// Render seconds as `"{d}d {h}h {m}m"`, dropping leading zero units.
pub fn format_remaining(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// A running countdown. Dropping it stops the timer.
#[derive(Debug)]
pub struct CountdownWatch {
    state: watch::Receiver<WithdrawalState>,
    task: JoinHandle<()>,
}

impl CountdownWatch {
    /// Publish `initial` and recompute it every `tick` from `clock` until it stops
    /// being [`WithdrawalState::Proven`].
    pub fn spawn<C>(
        initial: WithdrawalState,
        challenge_period_secs: u64,
        tick: Duration,
        clock: C,
    ) -> Self
    where
        C: Fn() -> u64 + Send + 'static,
    {
        let (tx, rx) = watch::channel(initial);

        let task = tokio::spawn(async move {
            let mut interval = time::interval(tick);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let current = tx.borrow().clone();
                if !matches!(current, WithdrawalState::Proven { .. }) {
                    break;
                }

                let now = clock();
                let next = current.tick(now, challenge_period_secs);
                if let Some(remaining) = next.time_remaining(now, challenge_period_secs) {
                    debug!(remaining = %format_remaining(remaining), "Challenge period running");
                }
                if tx.send(next).is_err() {
                    break;
                }
            }
        });

        Self { state: rx, task }
    }

    /// The latest published state.
    pub fn current(&self) -> WithdrawalState {
        self.state.borrow().clone()
    }

    /// A receiver notified on every recomputation.
    pub fn subscribe(&self) -> watch::Receiver<WithdrawalState> {
        self.state.clone()
    }
}

impl Drop for CountdownWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}
