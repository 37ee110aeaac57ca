//! Inclusion proofs for gateway deposit and withdrawal records.
//!
//! The destination contract verifies a record by walking an account proof of
//! the source contract and a storage proof of the record's slot, both
//! RLP-wrapped into one blob.

use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::{keccak256, rlp::RlpStream};
use tracing::debug;

use crate::client::ChainReader;
use crate::error::{ChainError, ChainResult};
use crate::types::AccountStorageProof;

/// Which gateway mapping a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// `TokenDeposit.deposits`, written on the Ethereum side.
    Deposit,
    /// `Bridge.withdrawals`, written on the Sonic side.
    Withdrawal,
}

impl RecordKind {
    pub fn slot_index(self) -> u8 {
        match self {
            RecordKind::Deposit => 7,
            RecordKind::Withdrawal => 1,
        }
    }
}

pub struct ProofGenerator;

impl ProofGenerator {
    /// `keccak256(abi.encode(recordId, uint8(slotIndex)))`
    pub fn storage_slot(record_id: U256, slot_index: u8) -> H256 {
        let encoded = abi::encode(&[Token::Uint(record_id), Token::Uint(U256::from(slot_index))]);
        H256::from(keccak256(encoded))
    }

    /// Fetches the proof for `record_id` from the source chain and encodes it
    /// for the destination `claim` call. `block` of `None` queries latest.
    pub async fn generate_proof(
        reader: &dyn ChainReader,
        contract: Address,
        record_id: U256,
        kind: RecordKind,
        block: Option<u64>,
    ) -> ChainResult<Bytes> {
        let slot = Self::storage_slot(record_id, kind.slot_index());
        debug!(?contract, %record_id, ?slot, ?block, "requesting storage proof");

        let proof = reader.get_proof(contract, vec![slot], block).await?;
        if proof.storage_proof.is_empty() {
            return Err(ChainError::ProofUnavailable(format!(
                "no storage proof for record {} at slot {:?}",
                record_id, slot
            )));
        }
        Ok(Self::encode_proof(&proof))
    }

    /// `rlp([rlp(accountProof), rlp(storageProof)])`
    pub fn encode_proof(proof: &AccountStorageProof) -> Bytes {
        let account = rlp_node_list(&proof.account_proof);
        let storage = rlp_node_list(&proof.storage_proof);

        let mut stream = RlpStream::new_list(2);
        stream.append(&account);
        stream.append(&storage);
        Bytes::from(stream.out().to_vec())
    }
}

fn rlp_node_list(nodes: &[Bytes]) -> Vec<u8> {
    let mut stream = RlpStream::new_list(nodes.len());
    for node in nodes {
        stream.append(&node.to_vec());
    }
    stream.out().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockChain, RecordedCall};
    use tokio_test::block_on;

    #[test]
    fn test_storage_slot_is_deterministic() {
        let id = U256::from(123_456u64);
        let first = ProofGenerator::storage_slot(id, RecordKind::Deposit.slot_index());
        let second = ProofGenerator::storage_slot(id, RecordKind::Deposit.slot_index());
        assert_eq!(first, second);

        let other_mapping = ProofGenerator::storage_slot(id, RecordKind::Withdrawal.slot_index());
        assert_ne!(first, other_mapping);
    }

    #[test]
    fn test_storage_slot_matches_manual_encoding() {
        let mut preimage = [0u8; 64];
        preimage[31] = 5;
        preimage[63] = 7;
        let expected = H256::from(keccak256(preimage));
        assert_eq!(ProofGenerator::storage_slot(U256::from(5), 7), expected);
    }

    #[test]
    fn test_encode_proof_layout() {
        let proof = AccountStorageProof {
            account_proof: vec![Bytes::from(vec![0xaa; 3]), Bytes::from(vec![0xbb; 2])],
            storage_proof: vec![Bytes::from(vec![0xcc])],
        };
        let encoded = ProofGenerator::encode_proof(&proof);

        // account list c7 83aaaaaa 82bbbb, storage list c2 81cc, each wrapped
        // as a byte string inside the outer two-item list
        let expected: Vec<u8> = vec![
            0xcd, 0x88, 0xc7, 0x83, 0xaa, 0xaa, 0xaa, 0x82, 0xbb, 0xbb, 0x83, 0xc2, 0x81, 0xcc,
        ];
        assert_eq!(encoded.to_vec(), expected);
    }

    #[test]
    fn test_generate_proof_queries_record_slot() -> anyhow::Result<()> {
        let chain = MockChain::new(1, Address::from_low_u64_be(1));
        let contract = Address::from_low_u64_be(0xd3);
        let proof = AccountStorageProof {
            account_proof: vec![Bytes::from(vec![0x01, 0x02])],
            storage_proof: vec![Bytes::from(vec![0x03])],
        };
        block_on(chain.set_proof(Ok(proof.clone())));

        let encoded = block_on(ProofGenerator::generate_proof(
            &chain,
            contract,
            U256::from(42),
            RecordKind::Withdrawal,
            Some(2_000),
        ))?;
        assert_eq!(encoded, ProofGenerator::encode_proof(&proof));

        let calls = block_on(chain.calls());
        assert_eq!(
            calls,
            vec![RecordedCall::Proof {
                contract,
                slots: vec![ProofGenerator::storage_slot(U256::from(42), 1)],
                block: Some(2_000),
            }]
        );
        Ok(())
    }

    #[test]
    fn test_empty_storage_proof_is_unavailable() {
        let chain = MockChain::new(1, Address::from_low_u64_be(1));
        block_on(chain.set_proof(Ok(AccountStorageProof {
            account_proof: vec![Bytes::from(vec![0x01])],
            storage_proof: vec![],
        })));

        let result = block_on(ProofGenerator::generate_proof(
            &chain,
            Address::from_low_u64_be(0xd3),
            U256::one(),
            RecordKind::Deposit,
            None,
        ));
        assert!(matches!(result, Err(ChainError::ProofUnavailable(_))));
    }
}
