//! EVM access for the bridge orchestrators: the chain client traits the
//! caller injects, their `ethers` implementation, gateway calldata and
//! storage-proof generation.

pub mod abi;
pub mod client;
pub mod error;
pub mod proof;
pub mod provider;
pub mod types;
pub mod utils;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use client::{ChainReader, ChainWriter};
pub use error::{ChainError, ChainResult};
pub use proof::{ProofGenerator, RecordKind};
pub use provider::{EthersChainClient, EthersSigner};
pub use types::{AccountStorageProof, EventLog, ReceiptSummary, TxRequest};
