use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};

use crate::abi;
use crate::error::{ChainError, ChainResult};
use crate::types::{AccountStorageProof, ReceiptSummary, TxRequest};

/// Read side of one chain: balances, contract calls, receipts and proofs.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Native chain id this client is connected to.
    fn chain_id(&self) -> u64;

    async fn native_balance(&self, owner: Address) -> ChainResult<U256>;

    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes>;

    async fn gas_price(&self) -> ChainResult<U256>;

    async fn receipt(&self, tx_hash: H256) -> ChainResult<Option<ReceiptSummary>>;

    /// Waits until the transaction is mined and returns its receipt.
    async fn wait_for_receipt(&self, tx_hash: H256) -> ChainResult<ReceiptSummary>;

    async fn get_proof(
        &self,
        contract: Address,
        slots: Vec<H256>,
        block: Option<u64>,
    ) -> ChainResult<AccountStorageProof>;

    async fn erc20_balance(&self, token: Address, owner: Address) -> ChainResult<U256> {
        let data = self.call(token, abi::balance_of(owner)).await?;
        abi::decode_uint(&data)
    }

    async fn erc20_allowance(&self, token: Address, owner: Address, spender: Address) -> ChainResult<U256> {
        let data = self.call(token, abi::allowance(owner, spender)).await?;
        abi::decode_uint(&data)
    }

    async fn erc20_decimals(&self, token: Address) -> ChainResult<u8> {
        let data = self.call(token, abi::decimals()).await?;
        let raw = abi::decode_uint(&data)?;
        u8::try_from(raw).map_err(|_| ChainError::AbiError(format!("decimals() of {:?} returned {}", token, raw)))
    }

    async fn erc20_symbol(&self, token: Address) -> ChainResult<String> {
        let data = self.call(token, abi::symbol()).await?;
        abi::decode_string(&data)
    }
}

/// Signing side of one chain. Only broadcasts; confirmation goes through the
/// paired [`ChainReader`].
#[async_trait]
pub trait ChainWriter: Send + Sync {
    fn address(&self) -> Address;

    async fn send_transaction(&self, tx: TxRequest) -> ChainResult<H256>;
}
