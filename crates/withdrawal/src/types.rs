use alloy_primitives::{Address, TxHash, B256, U256};
use binding::opstack::WithdrawalTransaction;
use std::fmt;

pub type WithdrawalHash = B256;

/// A withdrawal message extracted from an L2 transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    /// The cross-domain call payload, exactly as passed to the portal.
    pub transaction: WithdrawalTransaction,
    /// Hash of the payload; the protocol's idempotency key.
    pub hash: WithdrawalHash,
    /// L2 block that included the initiating transaction.
    pub l2_block: u64,
    /// The initiating L2 transaction.
    pub l2_tx_hash: TxHash,
}

/// Resolution state of a dispute game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    InProgress,
    ChallengerWins,
    DefenderWins,
}

impl TryFrom<u8> for GameStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::InProgress),
            1 => Ok(Self::ChallengerWins),
            2 => Ok(Self::DefenderWins),
            other => Err(other),
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in-progress"),
            Self::ChallengerWins => write!(f, "challenger-wins"),
            Self::DefenderWins => write!(f, "defender-wins"),
        }
    }
}

/// An entry of the dispute game factory, as returned by `gameAtIndex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameEntry {
    pub game_type: u32,
    pub created_at: u64,
    pub proxy: Address,
}

impl GameEntry {
    /// Validate a raw `gameAtIndex` result. A zero proxy means the index does not exist.
    pub fn new(game_type: u32, created_at: u64, proxy: Address) -> Result<Self, String> {
        if proxy == Address::ZERO {
            return Err(format!("game of type {game_type} has no proxy address"));
        }
        Ok(Self {
            game_type,
            created_at,
            proxy,
        })
    }
}

/// A dispute game usable as the proof anchor for a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisputeGameRef {
    pub index: U256,
    pub proxy: Address,
    pub l2_block: u64,
    pub game_type: u32,
    pub status: GameStatus,
}

/// Where a proven timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    /// Block timestamp of the `WithdrawalProven` event.
    ProofEvent,
    /// `provenWithdrawals(hash, submitter).timestamp` on the portal.
    Portal,
    /// The proof exists but its time could not be found; "now" was used.
    /// The resulting countdown is an upper bound, not authoritative.
    Approximate,
}

/// A proof recorded on L1 for a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvenRecord {
    pub withdrawal_hash: WithdrawalHash,
    /// Unix seconds. Anchors the challenge-period countdown.
    pub proven_timestamp: u64,
    pub source: TimestampSource,
}

impl ProvenRecord {
    /// Unix time at which the withdrawal becomes finalizable.
    pub const fn finalizable_at(&self, challenge_period_secs: u64) -> u64 {
        self.proven_timestamp.saturating_add(challenge_period_secs)
    }
}

/// Proof record stored by the portal for one submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvenWithdrawal {
    pub dispute_game_proxy: Address,
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_status_from_raw() {
        assert_eq!(GameStatus::try_from(0), Ok(GameStatus::InProgress));
        assert_eq!(GameStatus::try_from(1), Ok(GameStatus::ChallengerWins));
        assert_eq!(GameStatus::try_from(2), Ok(GameStatus::DefenderWins));
        assert_eq!(GameStatus::try_from(3), Err(3));
    }

    #[test]
    fn test_game_entry_rejects_zero_proxy() {
        assert!(GameEntry::new(1, 0, Address::ZERO).is_err());
        let entry = GameEntry::new(1, 42, Address::with_last_byte(9)).unwrap();
        assert_eq!(entry.created_at, 42);
    }

    #[test]
    fn test_finalizable_at() {
        let record = ProvenRecord {
            withdrawal_hash: B256::ZERO,
            proven_timestamp: 1_700_000_000,
            source: TimestampSource::ProofEvent,
        };
        assert_eq!(record.finalizable_at(604_800), 1_700_604_800);
    }
}
