use async_trait::async_trait;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, PendingTransaction, Provider},
    signers::{LocalWallet, Signer},
    types::{
        transaction::eip2718::TypedTransaction, Address, BlockId, Bytes, Eip1559TransactionRequest,
        TransactionRequest, H256, U256,
    },
};
use tracing::debug;

use crate::client::{ChainReader, ChainWriter};
use crate::error::{ChainError, ChainResult};
use crate::types::{AccountStorageProof, ReceiptSummary, TxRequest};

/// JSON-RPC backed [`ChainReader`].
#[derive(Clone, Debug)]
pub struct EthersChainClient {
    chain_id: u64,
    provider: Provider<Http>,
}

impl EthersChainClient {
    pub fn new(rpc_url: &str, chain_id: u64) -> ChainResult<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ChainError::ProviderError(e.to_string()))?;

        Ok(Self { chain_id, provider })
    }
}

#[async_trait]
impl ChainReader for EthersChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn native_balance(&self, owner: Address) -> ChainResult<U256> {
        Ok(self.provider.get_balance(owner, None).await?)
    }

    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        Ok(self.provider.call(&tx, None).await?)
    }

    async fn gas_price(&self) -> ChainResult<U256> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn receipt(&self, tx_hash: H256) -> ChainResult<Option<ReceiptSummary>> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(ReceiptSummary::from))
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> ChainResult<ReceiptSummary> {
        debug!(chain_id = self.chain_id, ?tx_hash, "waiting for receipt");
        let receipt = PendingTransaction::new(tx_hash, &self.provider)
            .await?
            .ok_or(ChainError::MissingReceipt(tx_hash))?;
        Ok(receipt.into())
    }

    async fn get_proof(
        &self,
        contract: Address,
        slots: Vec<H256>,
        block: Option<u64>,
    ) -> ChainResult<AccountStorageProof> {
        let response = self
            .provider
            .get_proof(contract, slots, block.map(BlockId::from))
            .await?;

        let storage_proof = response
            .storage_proof
            .into_iter()
            .next()
            .map(|entry| entry.proof)
            .unwrap_or_default();

        Ok(AccountStorageProof {
            account_proof: response.account_proof,
            storage_proof,
        })
    }
}

/// Local-key [`ChainWriter`] over the same RPC endpoint as an
/// [`EthersChainClient`].
pub struct EthersSigner {
    client: SignerMiddleware<Provider<Http>, LocalWallet>,
}

impl EthersSigner {
    pub fn new(reader: &EthersChainClient, private_key: &str) -> ChainResult<Self> {
        let wallet = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| ChainError::ProviderError(format!("Invalid private key: {}", e)))?
            .with_chain_id(reader.chain_id);

        Ok(Self {
            client: SignerMiddleware::new(reader.provider.clone(), wallet),
        })
    }
}

#[async_trait]
impl ChainWriter for EthersSigner {
    fn address(&self) -> Address {
        self.client.address()
    }

    async fn send_transaction(&self, tx: TxRequest) -> ChainResult<H256> {
        let typed = to_typed(Some(self.client.address()), &tx);
        let pending = self
            .client
            .send_transaction(typed, None)
            .await
            .map_err(|e| ChainError::from_provider_message(e.to_string()))?;

        let tx_hash = pending.tx_hash();
        debug!(?tx_hash, legacy = tx.is_legacy(), "transaction broadcast");
        Ok(tx_hash)
    }
}

fn to_typed(from: Option<Address>, tx: &TxRequest) -> TypedTransaction {
    if let Some(gas_price) = tx.gas_price {
        let mut request = TransactionRequest::new()
            .data(tx.data.clone())
            .value(tx.value)
            .gas_price(gas_price);
        if let Some(to) = tx.to {
            request = request.to(to);
        }
        if let Some(gas) = tx.gas_limit {
            request = request.gas(gas);
        }
        if let Some(from) = from {
            request = request.from(from);
        }
        request.into()
    } else {
        let mut request = Eip1559TransactionRequest::new()
            .data(tx.data.clone())
            .value(tx.value);
        if let Some(to) = tx.to {
            request = request.to(to);
        }
        if let Some(gas) = tx.gas_limit {
            request = request.gas(gas);
        }
        if let Some(from) = from {
            request = request.from(from);
        }
        request.into()
    }
}
