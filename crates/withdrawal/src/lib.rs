//! OP Stack withdrawal engine.
//!
//! Derives where an L2→L1 withdrawal is in its lifecycle and builds what the
//! portal needs to move it forward. All chain access goes through the
//! [`chain::L1Reader`] and [`chain::L2Reader`] seams.

pub mod chain;
pub mod countdown;
pub mod error;
pub mod extract;
pub mod game;
pub mod hash;
pub mod history;
pub mod proof;
pub mod rpc;
pub mod status;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{NotReady, RpcError, WithdrawalError};
pub use status::{StatusTracker, WithdrawalState, WithdrawalStatus};
pub use types::{DisputeGameRef, ProvenRecord, TimestampSource, Withdrawal, WithdrawalHash};
