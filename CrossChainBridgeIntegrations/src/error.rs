use ethereum_contracts::ChainError;
use ethers::types::H256;
use oracle_integrations::OracleError;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::transfer::BridgeTransfer;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("Source and destination are both {0}")]
    SameChain(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Amount {amount} {symbol} is below the {minimum} {symbol} minimum for {route}")]
    BelowMinimum {
        amount: Decimal,
        minimum: Decimal,
        symbol: String,
        route: String,
    },

    #[error("Wallet is on chain {connected}, transfer starts on {chain} (chain {expected})")]
    ChainMismatch {
        connected: u64,
        expected: u64,
        chain: String,
    },

    #[error("Token {0} is not supported on this route")]
    UnsupportedToken(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Token {symbol} not found on {chain}")]
    TokenNotFound { chain: String, symbol: String },

    #[error("Insufficient {symbol} balance: have {available}, need {required}")]
    InsufficientBalance {
        symbol: String,
        required: String,
        available: String,
    },

    #[error("Transaction was declined in the wallet")]
    UserRejected,

    #[error("Transaction {tx_hash:?} reverted")]
    Reverted { tx_hash: H256 },

    #[error("Gas limit problem: {0}")]
    GasLimit(String),

    #[error("State oracle wait timed out: {0}")]
    OracleTimeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Bridge provider error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Chain(ChainError),
}

impl BridgeError {
    /// Errors raised before any transaction was constructed.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BridgeError::MissingParameter(_)
                | BridgeError::UnsupportedChain(_)
                | BridgeError::SameChain(_)
                | BridgeError::InvalidAmount(_)
                | BridgeError::InvalidAddress(_)
                | BridgeError::BelowMinimum { .. }
                | BridgeError::ChainMismatch { .. }
                | BridgeError::UnsupportedToken(_)
                | BridgeError::UnknownAction(_)
        )
    }

    /// The one message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            BridgeError::MissingParameter(name) => {
                format!("Please provide the {} for this transfer.", name)
            }
            BridgeError::UnsupportedChain(name) => format!(
                "\"{}\" is not a supported chain. Use one of: Ethereum, Sonic, Arbitrum, Base, Optimism, Polygon, BSC, Avalanche, Linea.",
                name
            ),
            BridgeError::SameChain(name) => {
                format!("Source and destination are both {}. Pick two different chains.", name)
            }
            BridgeError::InvalidAmount(amount) => {
                format!("\"{}\" is not a valid amount. Use a positive decimal number such as 10 or 0.5.", amount)
            }
            BridgeError::InvalidAddress(address) => {
                format!("\"{}\" is not a valid receiver address.", address)
            }
            BridgeError::BelowMinimum { amount, minimum, symbol, route } => format!(
                "{} {} is below the minimum of {} {} for {}. Smaller transfers cost more in fees than they move. Raise the amount to at least {} {}.",
                amount, symbol, minimum, symbol, route, minimum, symbol
            ),
            BridgeError::ChainMismatch { connected, expected, chain } => format!(
                "Your wallet is connected to chain {}, but this transfer starts on {} (chain {}). Switch networks in your wallet and try again.",
                connected, chain, expected
            ),
            BridgeError::UnsupportedToken(token) => format!(
                "{} cannot be bridged on this route. Only explicitly paired tokens are supported.",
                token
            ),
            BridgeError::UnknownAction(action) => format!("I don't know how to \"{}\".", action),
            BridgeError::TokenNotFound { chain, symbol } => {
                format!("Could not find token {} on {}. Check the symbol or use the token address.", symbol, chain)
            }
            BridgeError::InsufficientBalance { symbol, required, available } => format!(
                "Insufficient {} balance: you have {} {} but this transfer needs {} {}.",
                symbol, available, symbol, required, symbol
            ),
            BridgeError::UserRejected => {
                "You declined the transaction in your wallet. Nothing was sent.".to_string()
            }
            BridgeError::Reverted { tx_hash } => format!(
                "Transaction {:?} failed on-chain. This usually means the amount is too small relative to bridge fees or the network is congested. Try a larger amount or retry later.",
                tx_hash
            ),
            BridgeError::GasLimit(_) => {
                "The transaction ran out of gas. The network may be congested; retry later or with a larger amount.".to_string()
            }
            BridgeError::OracleTimeout(detail) => format!(
                "Your deposit is recorded but the destination chain has not caught up yet ({}). Nothing is lost; resume the claim later.",
                detail
            ),
            BridgeError::Cancelled(detail) => format!("Stopped before completion: {}.", detail),
            BridgeError::Registry(_) => {
                "The bridge service could not be reached. Please retry in a moment.".to_string()
            }
            BridgeError::Config(detail) => format!("Bridge is not configured correctly: {}.", detail),
            BridgeError::Chain(ChainError::UnsupportedProofMethod(_)) => {
                "The source chain RPC endpoint does not support storage proofs (eth_getProof). Configure a node that does and resume the claim.".to_string()
            }
            BridgeError::Chain(ChainError::ProofUnavailable(_)) => {
                "The deposit record is not provable yet. Wait a few minutes and resume the claim.".to_string()
            }
            BridgeError::Chain(_) => {
                "A network request to the chain failed. Please retry in a moment.".to_string()
            }
        }
    }
}

impl From<ChainError> for BridgeError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::UserRejected => BridgeError::UserRejected,
            ChainError::Reverted { tx_hash } => BridgeError::Reverted { tx_hash },
            ChainError::InvalidAddress(address) => BridgeError::InvalidAddress(address),
            ChainError::Rpc(message) if message.to_lowercase().contains("out of gas") => {
                BridgeError::GasLimit(message)
            }
            other => BridgeError::Chain(other),
        }
    }
}

impl From<OracleError> for BridgeError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Timeout { .. } => BridgeError::OracleTimeout(err.to_string()),
            OracleError::Cancelled { .. } => BridgeError::Cancelled(err.to_string()),
            OracleError::Chain(chain) => chain.into(),
        }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::Registry(err.to_string())
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Why an orchestrator call ended without a result. `transfer` is the
/// record in its terminal `FAILED` state, or `None` when the request was
/// rejected before a transfer existed.
#[derive(Debug, Clone)]
pub struct TransferFailure {
    pub transfer: Option<Box<BridgeTransfer>>,
    pub error: BridgeError,
}

impl TransferFailure {
    pub fn new(transfer: BridgeTransfer, error: BridgeError) -> Self {
        Self {
            transfer: Some(Box::new(transfer)),
            error,
        }
    }

    pub fn user_message(&self) -> String {
        self.error.user_message()
    }
}

impl From<BridgeError> for TransferFailure {
    fn from(error: BridgeError) -> Self {
        Self { transfer: None, error }
    }
}

impl std::fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.transfer {
            Some(transfer) => write!(f, "transfer {} failed: {}", transfer.id(), self.error),
            None => write!(f, "request rejected: {}", self.error),
        }
    }
}

impl std::error::Error for TransferFailure {}
