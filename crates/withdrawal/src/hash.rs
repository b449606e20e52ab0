use crate::types::WithdrawalHash;
use alloy_primitives::{keccak256, B256, U256};
use alloy_sol_types::SolValue;
use binding::opstack::WithdrawalTransaction;

/// Hash a withdrawal the way `Hashing.hashWithdrawal` does on L1.
pub fn compute_withdrawal_hash(tx: &WithdrawalTransaction) -> WithdrawalHash {
    // keccak256(abi.encode(nonce, sender, target, value, gasLimit, data)), encoded as
    // a parameter sequence rather than a single tuple so there is no leading offset word
    let encoded = (
        &tx.nonce,
        &tx.sender,
        &tx.target,
        &tx.value,
        &tx.gasLimit,
        &tx.data,
    )
        .abi_encode_sequence();

    keccak256(encoded)
}

/// Storage slot of `sentMessages[withdrawalHash]` in the L2ToL1MessagePasser.
///
/// The mapping lives at slot 0, so the slot is `keccak256(abi.encode(hash, 0))`.
pub fn compute_storage_slot(withdrawal_hash: WithdrawalHash) -> B256 {
    keccak256((withdrawal_hash, U256::ZERO).abi_encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{hex, Address, Bytes};

    #[test]
    fn test_compute_withdrawal_hash_known_value() {
        // Unichain mainnet withdrawal, tx 0x91b374b5403401198a892f62db8843b60125cfb3e28ec1664089d9158424dc4a
        let tx = WithdrawalTransaction {
            nonce: U256::from_be_bytes(hex!(
                "0001000000000000000000000000000000000000000000000000000000000818"
            )),
            sender: Address::from_slice(&hex!("000040D6c85A13a1AA74565FDe87e499dC023C6f")),
            target: Address::from_slice(&hex!("B03eEF386A61b5b462051636001485FFfdD3d843")),
            value: U256::ZERO,
            gasLimit: U256::from(200_000),
            data: Bytes::from(hex!(
                "095ea7b3000000000000000000000000000040d6c85a13a1aa74565fde87e499dc023c6fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
            )),
        };

        let expected = B256::from_slice(&hex!(
            "49c43b60ec99e99046b54aec4c90419ff194300e567de63423c3b974ae46bd28"
        ));

        assert_eq!(compute_withdrawal_hash(&tx), expected);
    }

    #[test]
    fn test_nonce_changes_hash() {
        let mut tx = WithdrawalTransaction {
            nonce: U256::from(5),
            sender: Address::with_last_byte(1),
            target: Address::with_last_byte(2),
            value: U256::from(1000),
            gasLimit: U256::from(200_000),
            data: Bytes::new(),
        };
        let first = compute_withdrawal_hash(&tx);

        tx.nonce = U256::from(6);
        assert_ne!(first, compute_withdrawal_hash(&tx));
    }

    #[test]
    fn test_storage_slot_layout() {
        let hash = B256::repeat_byte(0xab);

        let mut preimage = [0u8; 64];
        preimage[..32].copy_from_slice(hash.as_slice());

        assert_eq!(compute_storage_slot(hash), keccak256(preimage));
        assert_eq!(compute_storage_slot(B256::ZERO), keccak256([0u8; 64]));
    }
}
