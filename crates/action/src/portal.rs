//! Writes to the OptimismPortal2.

use crate::SignerFn;
use alloy_primitives::{Address, TxHash};
use alloy_provider::{PendingTransactionBuilder, PendingTransactionError, Provider};
use alloy_rpc_types::TransactionRequest;
use async_trait::async_trait;
use binding::opstack::{IOptimismPortal2, WithdrawalTransaction};
use config::EngineConfig;
use std::fmt;
use tracing::{debug, info};
use withdrawal::{proof::ProveWithdrawalParams, RpcError};

/// A state-changing portal call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalCall {
    Prove(ProveWithdrawalParams),
    Finalize(WithdrawalTransaction),
}

impl PortalCall {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Prove(_) => "proveWithdrawalTransaction",
            Self::Finalize(_) => "finalizeWithdrawalTransaction",
        }
    }
}

/// Outcome of an included portal transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortalReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// `false` when the transaction reverted.
    pub success: bool,
}

/// Sends portal transactions to L1.
#[async_trait]
pub trait L1Writer: Send + Sync {
    /// Sign and broadcast `call`.
    async fn send(&self, call: PortalCall) -> Result<TxHash, RpcError>;

    /// Wait until `tx_hash` is included.
    async fn confirm(&self, tx_hash: TxHash) -> Result<PortalReceipt, RpcError>;
}

/// Gas limits for portal calls. `None` means estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasLimits {
    pub prove: Option<u64>,
    pub finalize: Option<u64>,
}

impl From<&EngineConfig> for GasLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            prove: config.prove_gas_limit,
            finalize: config.finalize_gas_limit,
        }
    }
}

/// [`L1Writer`] that signs with a [`SignerFn`] and broadcasts raw transactions.
#[derive(Clone)]
pub struct AlloyPortalWriter<P> {
    provider: P,
    portal: Address,
    from: Address,
    signer: SignerFn,
    gas: GasLimits,
}

impl<P> fmt::Debug for AlloyPortalWriter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlloyPortalWriter")
            .field("portal", &self.portal)
            .field("from", &self.from)
            .field("gas", &self.gas)
            .finish_non_exhaustive()
    }
}

impl<P> AlloyPortalWriter<P>
where
    P: Provider + Clone,
{
    pub const fn new(
        provider: P,
        portal: Address,
        from: Address,
        signer: SignerFn,
        gas: GasLimits,
    ) -> Self {
        Self {
            provider,
            portal,
            from,
            signer,
            gas,
        }
    }

    fn request(&self, call: PortalCall) -> TransactionRequest {
        let portal = IOptimismPortal2::new(self.portal, &self.provider);
        let (request, gas) = match call {
            PortalCall::Prove(params) => (
                portal
                    .proveWithdrawalTransaction(
                        params.withdrawal,
                        params.dispute_game_index,
                        params.output_root_proof,
                        params.withdrawal_proof,
                    )
                    .into_transaction_request(),
                self.gas.prove,
            ),
            PortalCall::Finalize(withdrawal) => (
                portal
                    .finalizeWithdrawalTransaction(withdrawal)
                    .into_transaction_request(),
                self.gas.finalize,
            ),
        };

        let request = request.from(self.from);
        match gas {
            Some(gas) => request.gas_limit(gas),
            None => request,
        }
    }
}

fn pending_error(err: PendingTransactionError) -> RpcError {
    match err {
        PendingTransactionError::TransportError(err) => err.into(),
        other => RpcError::Transient(other.to_string()),
    }
}

#[async_trait]
impl<P> L1Writer for AlloyPortalWriter<P>
where
    P: Provider + Clone,
{
    async fn send(&self, call: PortalCall) -> Result<TxHash, RpcError> {
        let name = call.name();
        let request = self.request(call);

        let signed = (self.signer)(request)
            .await
            .map_err(|e| RpcError::classify(e.to_string()))?;

        let pending = self.provider.send_raw_transaction(&signed).await?;
        let tx_hash = *pending.tx_hash();
        info!(call = name, %tx_hash, "Portal transaction sent");
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<PortalReceipt, RpcError> {
        debug!(%tx_hash, "Waiting for inclusion");
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .get_receipt()
            .await
            .map_err(pending_error)?;

        Ok(PortalReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            success: receipt.status(),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use mockall::mock;

    mock! {
        #[derive(Debug)]
        pub Writer {}

        #[async_trait::async_trait]
        impl L1Writer for Writer {
            async fn send(&self, call: PortalCall) -> Result<TxHash, RpcError>;
            async fn confirm(&self, tx_hash: TxHash) -> Result<PortalReceipt, RpcError>;
        }
    }
}
