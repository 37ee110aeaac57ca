//! The unit of work for one end-to-end move and its status machine.

use ethers::types::{Address, Bytes, H256, U256};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::chains::Chain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pathway {
    Native,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    // native pathway
    Initiated,
    TokenPairVerified,
    Deposited,
    OracleSynced,
    ProofReady,
    Claimed,
    // generic pathway
    Validated,
    SourceTokenResolved,
    DestTokenResolved,
    BalanceChecked,
    Approved,
    Submitted,
    Verifying,
    Confirmed,
    SuspectedFailure,
    // both
    Failed(String),
}

impl TransferStatus {
    /// Position in its pathway's sequence. Terminal states have no rank.
    fn rank(&self) -> Option<u8> {
        let rank = match self {
            TransferStatus::Initiated => 0,
            TransferStatus::TokenPairVerified => 1,
            TransferStatus::Deposited => 2,
            TransferStatus::OracleSynced => 3,
            TransferStatus::ProofReady => 4,
            TransferStatus::Claimed => 5,
            TransferStatus::Validated => 0,
            TransferStatus::SourceTokenResolved => 1,
            TransferStatus::DestTokenResolved => 2,
            TransferStatus::BalanceChecked => 3,
            TransferStatus::Approved => 4,
            TransferStatus::Submitted => 5,
            TransferStatus::Verifying => 6,
            TransferStatus::Confirmed => 7,
            TransferStatus::SuspectedFailure | TransferStatus::Failed(_) => return None,
        };
        Some(rank)
    }

    fn pathway(&self) -> Option<Pathway> {
        match self {
            TransferStatus::Initiated
            | TransferStatus::TokenPairVerified
            | TransferStatus::Deposited
            | TransferStatus::OracleSynced
            | TransferStatus::ProofReady
            | TransferStatus::Claimed => Some(Pathway::Native),
            TransferStatus::Failed(_) => None,
            _ => Some(Pathway::Generic),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Claimed
                | TransferStatus::Confirmed
                | TransferStatus::SuspectedFailure
                | TransferStatus::Failed(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransferStatus::Initiated => "INITIATED",
            TransferStatus::TokenPairVerified => "TOKEN_PAIR_VERIFIED",
            TransferStatus::Deposited => "DEPOSITED",
            TransferStatus::OracleSynced => "ORACLE_SYNCED",
            TransferStatus::ProofReady => "PROOF_READY",
            TransferStatus::Claimed => "CLAIMED",
            TransferStatus::Validated => "VALIDATED",
            TransferStatus::SourceTokenResolved => "SOURCE_TOKEN_RESOLVED",
            TransferStatus::DestTokenResolved => "DEST_TOKEN_RESOLVED",
            TransferStatus::BalanceChecked => "BALANCE_CHECKED",
            TransferStatus::Approved => "APPROVED",
            TransferStatus::Submitted => "SUBMITTED",
            TransferStatus::Verifying => "VERIFYING",
            TransferStatus::Confirmed => "CONFIRMED",
            TransferStatus::SuspectedFailure => "SUSPECTED_FAILURE",
            TransferStatus::Failed(_) => "FAILED",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Failed(reason) => write!(f, "FAILED ({})", reason),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeTransfer {
    id: String,
    pathway: Pathway,
    source_chain: Chain,
    destination_chain: Chain,
    token: String,
    amount: Decimal,
    receiver: Address,
    status: TransferStatus,
    source_tx_hash: Option<H256>,
    source_block_number: Option<u64>,
    record_id: Option<U256>,
    #[serde(skip)]
    proof: Option<Bytes>,
    destination_tx_hash: Option<H256>,
}

impl BridgeTransfer {
    pub fn new(
        pathway: Pathway,
        source_chain: Chain,
        destination_chain: Chain,
        token: impl Into<String>,
        amount: Decimal,
        receiver: Address,
    ) -> Self {
        let status = match pathway {
            Pathway::Native => TransferStatus::Initiated,
            Pathway::Generic => TransferStatus::Validated,
        };
        Self {
            id: format!("{:016x}", rand::thread_rng().gen::<u64>()),
            pathway,
            source_chain,
            destination_chain,
            token: token.into(),
            amount,
            receiver,
            status,
            source_tx_hash: None,
            source_block_number: None,
            record_id: None,
            proof: None,
            destination_tx_hash: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pathway(&self) -> Pathway {
        self.pathway
    }

    pub fn source_chain(&self) -> Chain {
        self.source_chain
    }

    pub fn destination_chain(&self) -> Chain {
        self.destination_chain
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn receiver(&self) -> Address {
        self.receiver
    }

    pub fn status(&self) -> &TransferStatus {
        &self.status
    }

    pub fn source_tx_hash(&self) -> Option<H256> {
        self.source_tx_hash
    }

    pub fn source_block_number(&self) -> Option<u64> {
        self.source_block_number
    }

    pub fn record_id(&self) -> Option<U256> {
        self.record_id
    }

    pub fn proof(&self) -> Option<&Bytes> {
        self.proof.as_ref()
    }

    pub fn destination_tx_hash(&self) -> Option<H256> {
        self.destination_tx_hash
    }

    /// Moves to `next` if it lies ahead of the current status on this
    /// transfer's pathway, or is a failure state. Returns whether the move
    /// was applied; terminal transfers never move again.
    pub fn advance(&mut self, next: TransferStatus) -> bool {
        if self.status.is_terminal() {
            warn!(transfer = %self.id, from = %self.status, to = %next, "transfer already terminal");
            return false;
        }
        let allowed = match (self.status.rank(), next.rank(), next.pathway()) {
            (_, None, pathway) => pathway.map_or(true, |p| p == self.pathway),
            (Some(current), Some(rank), Some(pathway)) => pathway == self.pathway && rank > current,
            _ => false,
        };
        if !allowed {
            warn!(transfer = %self.id, from = %self.status, to = %next, "rejected status regression");
            return false;
        }
        debug!(transfer = %self.id, from = %self.status, to = %next, "transfer status");
        self.status = next;
        true
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        self.advance(TransferStatus::Failed(reason.into()))
    }

    pub(crate) fn record_source_tx(&mut self, tx_hash: H256) {
        self.source_tx_hash.get_or_insert(tx_hash);
    }

    pub(crate) fn record_source_block(&mut self, block_number: u64) {
        self.source_block_number.get_or_insert(block_number);
    }

    pub(crate) fn record_id_from_event(&mut self, record_id: U256) {
        self.record_id.get_or_insert(record_id);
    }

    pub(crate) fn attach_proof(&mut self, proof: Bytes) {
        self.proof.get_or_insert(proof);
    }

    pub(crate) fn record_destination(&mut self, tx_hash: H256) {
        self.destination_tx_hash.get_or_insert(tx_hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native() -> BridgeTransfer {
        BridgeTransfer::new(
            Pathway::Native,
            Chain::Ethereum,
            Chain::Sonic,
            "USDC",
            Decimal::new(10, 0),
            Address::from_low_u64_be(7),
        )
    }

    #[test]
    fn test_status_never_regresses() {
        let mut transfer = native();
        assert!(transfer.advance(TransferStatus::TokenPairVerified));
        assert!(transfer.advance(TransferStatus::Deposited));
        assert!(!transfer.advance(TransferStatus::TokenPairVerified));
        assert_eq!(transfer.status(), &TransferStatus::Deposited);

        assert!(transfer.advance(TransferStatus::OracleSynced));
        assert!(transfer.advance(TransferStatus::ProofReady));
        assert!(transfer.advance(TransferStatus::Claimed));
        assert!(!transfer.advance(TransferStatus::Deposited));
        assert!(!transfer.fail("late"));
        assert_eq!(transfer.status(), &TransferStatus::Claimed);
    }

    #[test]
    fn test_failure_is_terminal_from_any_state() {
        let mut transfer = native();
        assert!(transfer.advance(TransferStatus::TokenPairVerified));
        assert!(transfer.fail("rpc down"));
        assert_eq!(transfer.status().label(), "FAILED");
        assert!(!transfer.advance(TransferStatus::Deposited));
    }

    #[test]
    fn test_pathways_do_not_mix() {
        let mut transfer = native();
        assert!(!transfer.advance(TransferStatus::Submitted));

        let mut generic = BridgeTransfer::new(
            Pathway::Generic,
            Chain::Base,
            Chain::Arbitrum,
            "USDC",
            Decimal::new(10, 0),
            Address::from_low_u64_be(7),
        );
        assert!(generic.advance(TransferStatus::SourceTokenResolved));
        assert!(generic.advance(TransferStatus::BalanceChecked));
        assert!(generic.advance(TransferStatus::SuspectedFailure));
        assert!(!generic.advance(TransferStatus::Confirmed));
    }

    #[test]
    fn test_trailing_fields_are_write_once() {
        let mut transfer = native();
        let first = H256::repeat_byte(1);
        transfer.record_source_tx(first);
        transfer.record_source_block(10);
        transfer.record_source_tx(H256::repeat_byte(2));
        transfer.record_source_block(20);
        assert_eq!(transfer.source_tx_hash(), Some(first));
        assert_eq!(transfer.source_block_number(), Some(10));
        assert_eq!(transfer.amount(), Decimal::new(10, 0));
    }
}
