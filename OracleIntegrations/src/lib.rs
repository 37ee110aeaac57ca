//! Destination-side state oracle tracking for the native bridge pathway.
//!
//! Each gateway chain runs a `StateOracle` contract that records the last
//! block of the opposite chain it has synchronised. A record can only be
//! proven on the destination once that oracle has caught up with the block
//! the record was written in.

use ethereum_contracts::ChainError;
use std::time::Duration;
use thiserror::Error;

pub mod state_oracle;

pub use state_oracle::{OracleWaitConfig, StateOracle, StateOracleWaiter};

/// Oracle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("State oracle did not reach block {target_block} within {waited:?} (last seen: {last_seen:?})")]
    Timeout {
        target_block: u64,
        last_seen: Option<u64>,
        waited: Duration,
    },

    #[error("Wait for state oracle block {target_block} was cancelled (last seen: {last_seen:?})")]
    Cancelled {
        target_block: u64,
        last_seen: Option<u64>,
    },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Emitted after every poll that did not yet satisfy the wait.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleProgress {
    pub attempt: u32,
    pub oracle_block: Option<u64>,
    pub target_block: u64,
    pub elapsed: Duration,
    pub next_poll_in: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleAck {
    pub oracle_block: u64,
    pub attempts: u32,
    pub elapsed: Duration,
}
