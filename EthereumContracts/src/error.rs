use ethers::types::H256;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Transaction was rejected by the signer")]
    UserRejected,

    #[error("Gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("Transaction {tx_hash:?} reverted")]
    Reverted { tx_hash: H256 },

    #[error("No receipt for transaction {0:?}")]
    MissingReceipt(H256),

    #[error("ABI error: {0}")]
    AbiError(String),

    #[error("Event {event} not found in transaction {tx_hash:?}")]
    EventNotFound { event: &'static str, tx_hash: H256 },

    #[error("Node does not serve eth_getProof: {0}")]
    UnsupportedProofMethod(String),

    #[error("Proof unavailable: {0}")]
    ProofUnavailable(String),
}

impl ChainError {
    /// Maps raw provider and middleware error text onto the error kinds the
    /// orchestrators react to.
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("user rejected")
            || lower.contains("user denied")
            || lower.contains("rejected the request")
            || lower.contains("code: 4001")
            || lower.contains("\"code\":4001")
        {
            ChainError::UserRejected
        } else if lower.contains("cannot estimate gas")
            || lower.contains("gas required exceeds")
            || lower.contains("failed to estimate gas")
            || lower.contains("unpredictable_gas_limit")
        {
            ChainError::GasEstimation(message)
        } else if lower.contains("eth_getproof")
            && (lower.contains("not supported")
                || lower.contains("does not exist")
                || lower.contains("not found")
                || lower.contains("not available"))
        {
            ChainError::UnsupportedProofMethod(message)
        } else {
            ChainError::Rpc(message)
        }
    }

    pub fn is_gas_estimation(&self) -> bool {
        matches!(self, ChainError::GasEstimation(_))
    }
}

impl From<ethers::abi::Error> for ChainError {
    fn from(err: ethers::abi::Error) -> Self {
        ChainError::AbiError(err.to_string())
    }
}

impl From<ethers::providers::ProviderError> for ChainError {
    fn from(err: ethers::providers::ProviderError) -> Self {
        ChainError::from_provider_message(err.to_string())
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
