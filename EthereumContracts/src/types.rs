use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

/// A call or transfer the orchestrators want broadcast. Leaving `gas_limit`
/// empty lets the signing client estimate it; setting `gas_price` forces a
/// legacy transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxRequest {
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: Option<U256>,
    pub gas_price: Option<U256>,
}

impl TxRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn gas_limit(mut self, gas_limit: impl Into<U256>) -> Self {
        self.gas_limit = Some(gas_limit.into());
        self
    }

    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn is_legacy(&self) -> bool {
        self.gas_price.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    pub tx_hash: H256,
    pub block_number: u64,
    /// 1 = success, 0 = reverted, `None` when the node did not report it.
    pub status: Option<u64>,
    pub logs: Vec<EventLog>,
}

impl ReceiptSummary {
    pub fn succeeded(&self) -> bool {
        self.status == Some(1)
    }

    pub fn reverted(&self) -> bool {
        self.status == Some(0)
    }
}

impl From<ethers::types::TransactionReceipt> for ReceiptSummary {
    fn from(receipt: ethers::types::TransactionReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()).unwrap_or_default(),
            status: receipt.status.map(|s| s.as_u64()),
            logs: receipt
                .logs
                .into_iter()
                .map(|log| EventLog {
                    address: log.address,
                    topics: log.topics,
                    data: log.data,
                })
                .collect(),
        }
    }
}

/// Account and storage inclusion proof as returned by `eth_getProof`, reduced
/// to the node lists the gateway contracts consume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStorageProof {
    pub account_proof: Vec<Bytes>,
    pub storage_proof: Vec<Bytes>,
}
