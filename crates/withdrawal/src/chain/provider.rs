//! [`L1Reader`] and [`L2Reader`] over alloy providers.
//!
//! These adapters make exactly one RPC request per call and never retry.
//! Retrying is the engine's job, see [`crate::rpc::RetryPolicy`].

use super::{
    AccountStorageProof, BridgeLog, L1Reader, L2BlockHeader, L2Receipt, L2Reader, ProvenEvent,
    SlotProof,
};
use crate::{
    error::RpcError,
    types::{GameEntry, GameStatus, ProvenWithdrawal, WithdrawalHash},
};
use alloy_primitives::{Address, TxHash, B256, U256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::{BlockNumberOrTag, Log};
use async_trait::async_trait;
use binding::{
    bridge::{IL1StandardBridge, IL2StandardBridge},
    opstack::{IDisputeGameFactory, IFaultDisputeGame, IOptimismPortal2},
};
use config::{L1Contracts, L2Contracts};
use tracing::debug;

/// Block number and transaction hash of a mined log.
fn log_position(log: &Log) -> Result<(u64, TxHash), RpcError> {
    match (log.block_number, log.transaction_hash) {
        (Some(block), Some(tx)) => Ok((block, tx)),
        _ => Err(RpcError::malformed("log without block number or transaction hash")),
    }
}

/// L1 reads against the portal, its dispute game factory and the standard bridge.
#[derive(Debug, Clone)]
pub struct AlloyL1Reader<P> {
    provider: P,
    portal: Address,
    factory: Address,
    standard_bridge: Address,
}

impl<P> AlloyL1Reader<P>
where
    P: Provider + Clone,
{
    /// Create a reader for `contracts`, asking the portal for its factory when none is configured.
    pub async fn connect(provider: P, contracts: &L1Contracts) -> Result<Self, RpcError> {
        let factory = match contracts.dispute_game_factory {
            Some(factory) => factory,
            None => {
                let factory = IOptimismPortal2::new(contracts.portal, &provider)
                    .disputeGameFactory()
                    .call()
                    .await?;
                debug!(portal = %contracts.portal, %factory, "Resolved dispute game factory");
                factory
            }
        };

        Ok(Self {
            provider,
            portal: contracts.portal,
            factory,
            standard_bridge: contracts.standard_bridge,
        })
    }

    /// Address of the dispute game factory in use.
    pub const fn factory(&self) -> Address {
        self.factory
    }
}

#[async_trait]
impl<P> L1Reader for AlloyL1Reader<P>
where
    P: Provider + Clone,
{
    async fn finalized_withdrawal(&self, hash: WithdrawalHash) -> Result<bool, RpcError> {
        let portal = IOptimismPortal2::new(self.portal, &self.provider);
        Ok(portal.finalizedWithdrawals(hash).call().await?)
    }

    async fn num_proof_submitters(&self, hash: WithdrawalHash) -> Result<U256, RpcError> {
        let portal = IOptimismPortal2::new(self.portal, &self.provider);
        Ok(portal.numProofSubmitters(hash).call().await?)
    }

    async fn proven_withdrawal(
        &self,
        hash: WithdrawalHash,
        submitter: Address,
    ) -> Result<Option<ProvenWithdrawal>, RpcError> {
        let portal = IOptimismPortal2::new(self.portal, &self.provider);
        let proven = portal.provenWithdrawals(hash, submitter).call().await?;

        // unset entries read back as all zeroes
        if proven.timestamp == 0 {
            return Ok(None);
        }
        Ok(Some(ProvenWithdrawal {
            dispute_game_proxy: proven.disputeGameProxy,
            timestamp: proven.timestamp,
        }))
    }

    async fn proof_submitter(&self, hash: WithdrawalHash, index: U256) -> Result<Address, RpcError> {
        let portal = IOptimismPortal2::new(self.portal, &self.provider);
        Ok(portal.proofSubmitters(hash, index).call().await?)
    }

    async fn respected_game_type(&self) -> Result<u32, RpcError> {
        let portal = IOptimismPortal2::new(self.portal, &self.provider);
        Ok(portal.respectedGameType().call().await?)
    }

    async fn game_count(&self) -> Result<U256, RpcError> {
        let factory = IDisputeGameFactory::new(self.factory, &self.provider);
        Ok(factory.gameCount().call().await?)
    }

    async fn game_at_index(&self, index: U256) -> Result<GameEntry, RpcError> {
        let factory = IDisputeGameFactory::new(self.factory, &self.provider);
        let game = factory.gameAtIndex(index).call().await?;
        GameEntry::new(game.gameType_, game.timestamp_, game.proxy_).map_err(RpcError::malformed)
    }

    async fn game_l2_block_number(&self, game: Address) -> Result<u64, RpcError> {
        let block = IFaultDisputeGame::new(game, &self.provider)
            .l2BlockNumber()
            .call()
            .await?;
        u64::try_from(block)
            .map_err(|_| RpcError::malformed(format!("game {game} anchors block {block}")))
    }

    async fn game_status(&self, game: Address) -> Result<GameStatus, RpcError> {
        let raw = IFaultDisputeGame::new(game, &self.provider)
            .status()
            .call()
            .await?;
        GameStatus::try_from(raw)
            .map_err(|raw| RpcError::malformed(format!("game {game} has status {raw}")))
    }

    async fn proven_events(
        &self,
        hash: WithdrawalHash,
        from: u64,
        to: u64,
    ) -> Result<Vec<ProvenEvent>, RpcError> {
        let portal = IOptimismPortal2::new(self.portal, &self.provider);
        let events = portal
            .WithdrawalProven_filter()
            .topic1(hash)
            .from_block(from)
            .to_block(to)
            .query()
            .await?;

        events
            .into_iter()
            .map(|(event, log)| {
                let (block_number, _) = log_position(&log)?;
                Ok(ProvenEvent {
                    withdrawal_hash: event.withdrawalHash,
                    submitter: event.from,
                    block_number,
                })
            })
            .collect()
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>, RpcError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await?;
        Ok(block.map(|block| block.header.timestamp))
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn bridge_deposits(
        &self,
        account: Address,
        from: u64,
        to: u64,
    ) -> Result<Vec<BridgeLog>, RpcError> {
        let bridge = IL1StandardBridge::new(self.standard_bridge, &self.provider);
        let events = bridge
            .ETHBridgeInitiated_filter()
            .topic1(account.into_word())
            .from_block(from)
            .to_block(to)
            .query()
            .await?;

        events
            .into_iter()
            .map(|(event, log)| {
                let (block_number, tx_hash) = log_position(&log)?;
                Ok(BridgeLog {
                    tx_hash,
                    block_number,
                    amount: event.amount,
                })
            })
            .collect()
    }
}

/// L2 reads: receipts, headers, message passer proofs and standard bridge events.
#[derive(Debug, Clone)]
pub struct AlloyL2Reader<P> {
    provider: P,
    standard_bridge: Address,
}

impl<P> AlloyL2Reader<P>
where
    P: Provider + Clone,
{
    pub const fn new(provider: P, contracts: &L2Contracts) -> Self {
        Self {
            provider,
            standard_bridge: contracts.standard_bridge,
        }
    }
}

#[async_trait]
impl<P> L2Reader for AlloyL2Reader<P>
where
    P: Provider + Clone,
{
    async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<Option<L2Receipt>, RpcError> {
        let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? else {
            return Ok(None);
        };
        let Some(block_number) = receipt.block_number else {
            // still pending
            return Ok(None);
        };

        Ok(Some(L2Receipt {
            transaction_hash: receipt.transaction_hash,
            block_number,
            logs: receipt.logs().iter().map(|log| log.inner.clone()).collect(),
        }))
    }

    async fn block_header(&self, number: u64) -> Result<Option<L2BlockHeader>, RpcError> {
        let Some(block) = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await?
        else {
            return Ok(None);
        };

        L2BlockHeader::new(
            block.header.number,
            block.header.hash,
            block.header.state_root,
            block.header.timestamp,
        )
        .map(Some)
        .map_err(RpcError::malformed)
    }

    async fn storage_proof(
        &self,
        address: Address,
        slots: Vec<B256>,
        block: u64,
    ) -> Result<AccountStorageProof, RpcError> {
        let proof = self
            .provider
            .get_proof(address, slots)
            .block_id(BlockNumberOrTag::Number(block).into())
            .await?;

        Ok(AccountStorageProof {
            storage_hash: proof.storage_hash,
            slots: proof
                .storage_proof
                .into_iter()
                .map(|slot| SlotProof {
                    slot: slot.key.as_b256(),
                    proof: slot.proof,
                })
                .collect(),
        })
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn bridge_withdrawals(
        &self,
        account: Address,
        from: u64,
        to: u64,
    ) -> Result<Vec<BridgeLog>, RpcError> {
        let bridge = IL2StandardBridge::new(self.standard_bridge, &self.provider);
        let events = bridge
            .WithdrawalInitiated_filter()
            .topic3(account.into_word())
            .from_block(from)
            .to_block(to)
            .query()
            .await?;

        events
            .into_iter()
            .map(|(event, log)| {
                let (block_number, tx_hash) = log_position(&log)?;
                Ok(BridgeLog {
                    tx_hash,
                    block_number,
                    amount: event.amount,
                })
            })
            .collect()
    }
}
