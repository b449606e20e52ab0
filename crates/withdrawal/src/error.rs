//! Error taxonomy of the withdrawal engine.

use crate::types::WithdrawalHash;
use alloy_primitives::TxHash;
use thiserror::Error;

/// Failure of a single chain RPC operation, classified by what the caller may do about it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Timeouts, rate limits, quota errors, dropped connections. Worth retrying.
    #[error("transient rpc failure: {0}")]
    Transient(String),

    /// The user rejected, denied or cancelled a signing step.
    #[error("rejected by user: {0}")]
    Rejected(String),

    /// Anything retrying cannot fix: reverts, insufficient funds, malformed responses.
    #[error("rpc failure: {0}")]
    Fatal(String),
}

const REJECTED_PATTERNS: &[&str] = &["user rejected", "user denied", "user cancelled"];

const FATAL_PATTERNS: &[&str] = &[
    "insufficient funds",
    "exceeds balance",
    "execution reverted",
    "nonce too low",
];

impl RpcError {
    /// Classify a raw provider error message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if REJECTED_PATTERNS.iter().any(|p| lower.contains(p)) {
            Self::Rejected(message)
        } else if FATAL_PATTERNS.iter().any(|p| lower.contains(p)) {
            Self::Fatal(message)
        } else {
            Self::Transient(message)
        }
    }

    /// Malformed or inconsistent response.
    pub fn malformed(what: impl std::fmt::Display) -> Self {
        Self::Fatal(format!("malformed response: {what}"))
    }

    /// Whether a retry can help.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<alloy_transport::TransportError> for RpcError {
    fn from(err: alloy_transport::TransportError) -> Self {
        if let Some(resp) = err.as_error_resp() {
            // 429 over HTTP, -32005 "limit exceeded" from geth-style nodes
            if resp.code == 429 || resp.code == -32005 {
                return Self::Transient(resp.message.to_string());
            }
        }
        Self::classify(err.to_string())
    }
}

impl From<alloy_contract::Error> for RpcError {
    fn from(err: alloy_contract::Error) -> Self {
        match err {
            alloy_contract::Error::TransportError(err) => err.into(),
            other => Self::malformed(other),
        }
    }
}

/// Failure of an engine operation.
///
/// [`WithdrawalError::is_retryable`] separates "try again later" from
/// "this failed and needs attention".
#[derive(Debug, Error)]
pub enum WithdrawalError {
    /// RPC failure that survived the retry policy.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The L2 transaction does not exist or did not initiate a withdrawal.
    #[error("withdrawal not found in transaction {0}")]
    NotFound(TxHash),

    /// Not an error in the protocol sense: the caller has to wait and re-check.
    #[error("not ready: {0}")]
    NotReady(NotReady),

    /// A response contradicted the protocol (hash mismatch, missing proof fields).
    #[error("data integrity: {0}")]
    DataIntegrity(String),

    /// A proof for this withdrawal is already recorded on L1.
    #[error("withdrawal {0} already proven")]
    AlreadyProven(WithdrawalHash),

    /// The withdrawal was already executed on L1.
    #[error("withdrawal {0} already finalized")]
    AlreadyFinalized(WithdrawalHash),

    /// Submitting or confirming an L1 transaction failed.
    #[error("submission failed: {0}")]
    Submission(RpcError),

    /// A lifecycle event was applied to a state that does not accept it.
    #[error("invalid transition: {event} while {from}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },
}

/// Reasons a withdrawal cannot advance yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotReady {
    /// No dispute game covering the withdrawal's L2 block has been proposed.
    #[error("no dispute game covers L2 block {l2_block} yet, the output is not yet proposed")]
    OutputNotProposed { l2_block: u64 },

    /// The withdrawal has not been proven on L1.
    #[error("withdrawal not proven yet")]
    NotProven,

    /// The challenge period is still running.
    #[error("challenge period not complete, {remaining_secs} seconds remaining")]
    ChallengePeriod { remaining_secs: u64 },
}

impl WithdrawalError {
    /// Whether re-running the same operation later can succeed without intervention.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Rpc(err) => err.is_transient(),
            Self::NotReady(_) | Self::DataIntegrity(_) => true,
            Self::NotFound(_)
            | Self::AlreadyProven(_)
            | Self::AlreadyFinalized(_)
            | Self::Submission(_)
            | Self::InvalidTransition { .. } => false,
        }
    }

    /// The user declined a signing step. Not a system fault.
    pub const fn is_user_rejection(&self) -> bool {
        matches!(
            self,
            Self::Rpc(RpcError::Rejected(_)) | Self::Submission(RpcError::Rejected(_))
        )
    }

    /// Short explanation suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rpc(RpcError::Transient(_)) => {
                "Network error or rate limit. Please wait a moment and try again".to_string()
            }
            Self::Rpc(RpcError::Rejected(_)) | Self::Submission(RpcError::Rejected(_)) => {
                "Transaction was rejected in your wallet".to_string()
            }
            Self::Rpc(RpcError::Fatal(msg)) | Self::Submission(RpcError::Fatal(msg)) => {
                if msg.to_lowercase().contains("insufficient funds") {
                    "Insufficient funds for this transaction".to_string()
                } else if msg.to_lowercase().contains("execution reverted") {
                    "Transaction failed. The contract rejected this action".to_string()
                } else {
                    "Transaction failed. Please try again".to_string()
                }
            }
            Self::Submission(RpcError::Transient(_)) => {
                "Transaction could not be submitted. Please try again".to_string()
            }
            Self::NotFound(_) => "Could not find withdrawal data in this transaction".to_string(),
            Self::NotReady(NotReady::OutputNotProposed { .. }) => {
                "Withdrawal is not ready yet. Please wait for the L2 output to be proposed"
                    .to_string()
            }
            Self::NotReady(NotReady::NotProven) => {
                "Withdrawal must be proven before it can be finalized".to_string()
            }
            Self::NotReady(NotReady::ChallengePeriod { .. }) => {
                "Withdrawal is not ready to finalize. Challenge period not complete".to_string()
            }
            Self::DataIntegrity(_) => {
                "Could not fetch L2 data. The output may not be available yet".to_string()
            }
            Self::AlreadyProven(_) => "This withdrawal has already been proven".to_string(),
            Self::AlreadyFinalized(_) => "This withdrawal has already been finalized".to_string(),
            Self::InvalidTransition { .. } => {
                "Withdrawal status changed. Please refresh and try again".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    #[test]
    fn test_classify_transient() {
        for msg in [
            "request timed out",
            "HTTP error 429 Too Many Requests",
            "daily request count exceeded, request rate limited",
            "connection reset by peer",
        ] {
            assert!(RpcError::classify(msg).is_transient(), "{msg}");
        }
    }

    #[test]
    fn test_classify_non_retriable() {
        assert_eq!(
            RpcError::classify("User rejected the request."),
            RpcError::Rejected("User rejected the request.".to_string())
        );
        assert!(matches!(
            RpcError::classify("User denied transaction signature"),
            RpcError::Rejected(_)
        ));
        assert!(matches!(
            RpcError::classify("insufficient funds for gas * price + value"),
            RpcError::Fatal(_)
        ));
        assert!(matches!(
            RpcError::classify("execution reverted: OptimismPortal: withdrawal has already been finalized"),
            RpcError::Fatal(_)
        ));
    }

    #[test]
    fn test_retryable_split() {
        let later = WithdrawalError::NotReady(NotReady::OutputNotProposed { l2_block: 1000 });
        assert!(later.is_retryable());

        let attention = WithdrawalError::AlreadyFinalized(B256::ZERO);
        assert!(!attention.is_retryable());

        let rejected = WithdrawalError::Submission(RpcError::Rejected("user rejected".into()));
        assert!(!rejected.is_retryable());
        assert!(rejected.is_user_rejection());
    }

    #[test]
    fn test_user_message() {
        let err = WithdrawalError::Submission(RpcError::Fatal(
            "insufficient funds for transfer".to_string(),
        ));
        assert_eq!(err.user_message(), "Insufficient funds for this transaction");

        let err = WithdrawalError::NotReady(NotReady::ChallengePeriod { remaining_secs: 10 });
        assert!(err.user_message().contains("Challenge period"));
    }
}
