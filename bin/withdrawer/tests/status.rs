//! Live status derivation against OP Sepolia.

use crate::setup::{setup_withdrawer, withdrawal_tx};
use alloy_primitives::B256;
use withdrawal::{status::unix_now, WithdrawalState};
use withdrawer::render_status;

#[path = "setup.rs"]
mod setup;

#[tokio::test]
#[ignore = "requires RPC access and WITHDRAWAL_TX"]
async fn test_status_of_real_withdrawal() {
    let withdrawer = setup_withdrawer().await;
    let status = withdrawer.status(withdrawal_tx()).await;

    println!(
        "{}",
        render_status(
            &status,
            unix_now(),
            withdrawer.settings().challenge_period_secs
        )
    );
    let withdrawal = status.withdrawal.expect("withdrawal should be extracted");
    assert_ne!(withdrawal.hash, B256::ZERO);
    assert!(!matches!(status.state, WithdrawalState::Error { .. }));
}

#[tokio::test]
#[ignore = "requires RPC access"]
async fn test_unknown_transaction_is_an_error_state() {
    let withdrawer = setup_withdrawer().await;
    let status = withdrawer.status(B256::repeat_byte(0x01)).await;

    assert!(status.withdrawal.is_none());
    assert_eq!(status.state.name(), "error");
}
