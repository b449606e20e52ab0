//! Dispute game lookup.
//!
//! Games are created roughly every hour, and the newest ones are the most
//! likely to cover a recent withdrawal, so the locator walks the factory from
//! the newest index down and stops at the first game that qualifies.

use crate::{
    chain::L1Reader,
    error::RpcError,
    rpc::RetryPolicy,
    types::{DisputeGameRef, GameStatus},
};
use alloy_primitives::U256;
use std::sync::Arc;
use tracing::{debug, warn};

/// Finds a dispute game whose claimed output covers a given L2 block.
#[derive(Clone)]
pub struct DisputeGameLocator {
    l1: Arc<dyn L1Reader>,
    policy: RetryPolicy,
    scan_batch: u64,
    allow_in_progress: bool,
}

impl std::fmt::Debug for DisputeGameLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisputeGameLocator")
            .field("scan_batch", &self.scan_batch)
            .field("allow_in_progress", &self.allow_in_progress)
            .finish_non_exhaustive()
    }
}

impl DisputeGameLocator {
    pub fn new(
        l1: Arc<dyn L1Reader>,
        policy: RetryPolicy,
        scan_batch: u64,
        allow_in_progress: bool,
    ) -> Self {
        Self {
            l1,
            policy,
            scan_batch,
            allow_in_progress,
        }
    }

    /// Find the newest acceptable game anchored at or after `l2_block`.
    ///
    /// `Ok(None)` means no game in the scanned window covers the block yet: the
    /// output has not been proposed. Only the respected game type and the game
    /// count are required reads, per-game failures skip that game.
    pub async fn find_anchor(&self, l2_block: u64) -> Result<Option<DisputeGameRef>, RpcError> {
        let respected_type = self
            .policy
            .call("respectedGameType", || self.l1.respected_game_type())
            .await?;
        let count = self
            .policy
            .call("gameCount", || self.l1.game_count())
            .await?;

        if count.is_zero() {
            debug!("No dispute games exist");
            return Ok(None);
        }

        let oldest = count.saturating_sub(U256::from(self.scan_batch));
        debug!(
            respected_type,
            game_count = %count,
            oldest_scanned = %oldest,
            l2_block,
            "Searching for dispute game"
        );

        let mut index = count;
        while index > oldest {
            index -= U256::from(1);

            match self.check_game(index, respected_type, l2_block).await {
                Ok(Some(game)) => {
                    debug!(
                        game_index = %game.index,
                        game = %game.proxy,
                        game_l2_block = game.l2_block,
                        status = %game.status,
                        "Found dispute game"
                    );
                    return Ok(Some(game));
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(game_index = %index, error = %err, "Skipping unreadable dispute game");
                }
            }
        }

        Ok(None)
    }

    async fn check_game(
        &self,
        index: U256,
        respected_type: u32,
        l2_block: u64,
    ) -> Result<Option<DisputeGameRef>, RpcError> {
        let entry = self
            .policy
            .call("gameAtIndex", || self.l1.game_at_index(index))
            .await?;
        if entry.game_type != respected_type {
            return Ok(None);
        }

        let game_l2_block = self
            .policy
            .call("l2BlockNumber", || self.l1.game_l2_block_number(entry.proxy))
            .await?;
        if game_l2_block < l2_block {
            debug!(game_index = %index, game_l2_block, l2_block, "Game does not cover block");
            return Ok(None);
        }

        let status = self
            .policy
            .call("status", || self.l1.game_status(entry.proxy))
            .await?;
        let accepted = match status {
            GameStatus::DefenderWins => true,
            GameStatus::InProgress => self.allow_in_progress,
            GameStatus::ChallengerWins => false,
        };
        if !accepted {
            debug!(game_index = %index, %status, "Game status not accepted");
            return Ok(None);
        }

        Ok(Some(DisputeGameRef {
            index,
            proxy: entry.proxy,
            l2_block: game_l2_block,
            game_type: entry.game_type,
            status,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{instant_retry, MockL1},
        types::GameEntry,
    };
    use alloy_primitives::Address;

    /// Factory with three games of type 1, the newest (index 2) anchored at `newest_block`.
    fn factory(newest_block: u64, newest_status: GameStatus) -> MockL1 {
        let mut l1 = MockL1::new();
        l1.expect_respected_game_type().returning(|| Ok(1));
        l1.expect_game_count().returning(|| Ok(U256::from(3)));
        l1.expect_game_at_index().returning(|index| {
            let i = index.to::<u8>();
            Ok(GameEntry::new(1, 1_700_000_000 + u64::from(i), Address::with_last_byte(i + 1))
                .unwrap())
        });
        l1.expect_game_l2_block_number().returning(move |game| {
            Ok(match game.as_slice()[19] {
                3 => newest_block,
                2 => 900,
                _ => 800,
            })
        });
        l1.expect_game_status().returning(move |game| {
            Ok(if game.as_slice()[19] == 3 {
                newest_status
            } else {
                GameStatus::DefenderWins
            })
        });
        l1
    }

    fn locator(l1: MockL1, allow_in_progress: bool) -> DisputeGameLocator {
        DisputeGameLocator::new(Arc::new(l1), instant_retry(), 50, allow_in_progress)
    }

    #[tokio::test]
    async fn test_game_behind_withdrawal_is_not_an_anchor() {
        let found = locator(factory(999, GameStatus::InProgress), true)
            .find_anchor(1000)
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_defender_won_game_is_found() {
        let found = locator(factory(1200, GameStatus::DefenderWins), false)
            .find_anchor(1000)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.index, U256::from(2));
        assert_eq!(found.l2_block, 1200);
        assert_eq!(found.proxy, Address::with_last_byte(3));
    }

    #[tokio::test]
    async fn test_in_progress_game_only_when_allowed() {
        let strict = locator(factory(1200, GameStatus::InProgress), false)
            .find_anchor(1000)
            .await
            .unwrap();
        assert_eq!(strict, None);

        let relaxed = locator(factory(1200, GameStatus::InProgress), true)
            .find_anchor(1000)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(relaxed.status, GameStatus::InProgress);
    }

    #[tokio::test]
    async fn test_challenger_won_game_is_skipped() {
        // game 2 lost, game 1 covers 900 only
        let found = locator(factory(1200, GameStatus::ChallengerWins), true)
            .find_anchor(1000)
            .await
            .unwrap();
        assert_eq!(found, None);

        let older = locator(factory(1200, GameStatus::ChallengerWins), true)
            .find_anchor(850)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(older.index, U256::from(1));
    }

    #[tokio::test]
    async fn test_no_games() {
        let mut l1 = MockL1::new();
        l1.expect_respected_game_type().returning(|| Ok(1));
        l1.expect_game_count().returning(|| Ok(U256::ZERO));
        l1.expect_game_at_index().never();

        assert_eq!(locator(l1, true).find_anchor(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wrong_type_and_unreadable_games_are_skipped() {
        let mut l1 = MockL1::new();
        l1.expect_respected_game_type().returning(|| Ok(0));
        l1.expect_game_count().returning(|| Ok(U256::from(3)));
        l1.expect_game_at_index().returning(|index| match index.to::<u8>() {
            2 => Ok(GameEntry::new(1, 0, Address::with_last_byte(3)).unwrap()),
            1 => Err(RpcError::malformed("game of type 0 has no proxy address")),
            _ => Ok(GameEntry::new(0, 0, Address::with_last_byte(1)).unwrap()),
        });
        l1.expect_game_l2_block_number().returning(|_| Ok(5000));
        l1.expect_game_status().returning(|_| Ok(GameStatus::DefenderWins));

        let found = locator(l1, false).find_anchor(1000).await.unwrap().unwrap();
        assert_eq!(found.index, U256::ZERO);
        assert_eq!(found.game_type, 0);
    }

    #[tokio::test]
    async fn test_scan_is_bounded_by_batch() {
        let mut l1 = MockL1::new();
        l1.expect_respected_game_type().returning(|| Ok(0));
        l1.expect_game_count().returning(|| Ok(U256::from(1_000)));
        l1.expect_game_at_index()
            .times(50)
            .returning(|_| Ok(GameEntry::new(0, 0, Address::with_last_byte(1)).unwrap()));
        l1.expect_game_l2_block_number().returning(|_| Ok(10));
        l1.expect_game_status().never();

        assert_eq!(locator(l1, false).find_anchor(1000).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_required_reads_fail_the_search() {
        let mut l1 = MockL1::new();
        l1.expect_respected_game_type()
            .times(3)
            .returning(|| Err(RpcError::classify("request timed out")));

        let err = locator(l1, false).find_anchor(1000).await.unwrap_err();
        assert!(err.is_transient());
    }
}
