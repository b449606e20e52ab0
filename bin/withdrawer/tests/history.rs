//! Live history scan against OP Sepolia.

use crate::setup::setup_withdrawer;
use alloy_primitives::address;
use withdrawer::render_history;

#[path = "setup.rs"]
mod setup;

#[tokio::test]
#[ignore = "requires RPC access, scans 30,000 blocks on each chain"]
async fn test_history_is_newest_first() {
    let withdrawer = setup_withdrawer().await;
    let transfers = withdrawer
        .history(address!("5CFFA347b0aE99cc01E5c01714cA5658e54a23D1"))
        .await
        .expect("history scan failed");

    print!("{}", render_history(&transfers));
    assert!(transfers
        .windows(2)
        .all(|pair| pair[0].block_number >= pair[1].block_number));
}
