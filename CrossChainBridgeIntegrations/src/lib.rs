//! Cross-chain transfers for a wallet assistant.
//!
//! Two pathways share one request shape: the Ethereum <-> Sonic gateway
//! ([`native`]), which deposits, waits for the destination state oracle and
//! claims with a storage proof, and a third-party aggregator ([`generic`]),
//! which quotes and submits a single transaction and then polls for delivery.
//! [`actions`] is the entry point the presentation layer calls.

pub mod actions;
pub mod chains;
pub mod config;
pub mod error;
pub mod generic;
pub mod minimums;
pub mod native;
pub mod poller;
pub mod provider;
pub mod request;
pub mod tokens;
pub mod transfer;
pub mod updates;

pub use actions::{ActionContext, ActionRequest, ActionResponse};
pub use chains::{resolve_chain_id, Chain, ChainNamespace, Environment, GatewayContracts};
pub use config::BridgeSettings;
pub use error::{BridgeError, BridgeResult, TransferFailure};
pub use generic::{DestinationTokenPolicy, GenericBridgeConfig, GenericBridgeOrchestrator, GenericOutcome, Verification};
pub use minimums::{MinimumAmountPolicy, MinimumAmountRule};
pub use native::{Direction, GatewayClients, NativeBridgeOrchestrator};
pub use poller::{PollerConfig, StatusPoller, StatusProbe};
pub use provider::{BridgeProvider, HttpBridgeProvider, ProviderStatus, Quote, QuoteRequest};
pub use request::{ChainClients, TransferRequest, ValidatedRequest};
pub use tokens::{TokenDescriptor, TokenRegistry, TokenResolver, NATIVE_SENTINEL};
pub use transfer::{BridgeTransfer, Pathway, TransferStatus};
pub use updates::{StatusKind, StatusSink, StatusUpdate};
