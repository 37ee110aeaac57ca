//! In-memory chain used by the orchestrator tests. Serves canned state and
//! records every request so tests can assert on what was (not) sent.

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::abi;
use crate::client::{ChainReader, ChainWriter};
use crate::error::{ChainError, ChainResult};
use crate::types::{AccountStorageProof, EventLog, ReceiptSummary, TxRequest};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    NativeBalance(Address),
    Call { to: Address, selector: [u8; 4] },
    GasPrice,
    Receipt(H256),
    Proof { contract: Address, slots: Vec<H256>, block: Option<u64> },
    Send(TxRequest),
}

#[derive(Default)]
struct MockState {
    native_balances: HashMap<Address, U256>,
    token_balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    decimals: HashMap<Address, u8>,
    symbols: HashMap<Address, String>,
    call_responses: HashMap<(Address, [u8; 4]), VecDeque<ChainResult<Bytes>>>,
    receipts: HashMap<H256, ReceiptSummary>,
    send_logs: HashMap<(Address, [u8; 4]), Vec<EventLog>>,
    send_debits: HashMap<Address, (Option<Address>, U256)>,
    send_failures: VecDeque<ChainError>,
    send_status: Option<u64>,
    withhold_receipts: bool,
    proof: Option<ChainResult<AccountStorageProof>>,
    gas_price: U256,
    block_number: u64,
    nonce: u64,
    calls: Vec<RecordedCall>,
}

#[derive(Clone)]
pub struct MockChain {
    chain_id: u64,
    wallet: Address,
    state: Arc<RwLock<MockState>>,
}

impl MockChain {
    pub fn new(chain_id: u64, wallet: Address) -> Self {
        let state = MockState {
            send_status: Some(1),
            gas_price: U256::from(1_000_000_000u64),
            block_number: 1_000,
            ..Default::default()
        };
        Self {
            chain_id,
            wallet,
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn set_native_balance(&self, owner: Address, amount: U256) {
        self.state.write().await.native_balances.insert(owner, amount);
    }

    pub async fn set_token_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state.write().await.token_balances.insert((token, owner), amount);
    }

    pub async fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state.write().await.allowances.insert((token, owner, spender), amount);
    }

    pub async fn set_decimals(&self, token: Address, decimals: u8) {
        self.state.write().await.decimals.insert(token, decimals);
    }

    pub async fn set_symbol(&self, token: Address, symbol: &str) {
        self.state.write().await.symbols.insert(token, symbol.to_string());
    }

    /// Queues responses for `signature` on `to`; the last one keeps being
    /// served once the queue drains.
    pub async fn push_call_response(&self, to: Address, signature: &str, response: ChainResult<Bytes>) {
        self.state
            .write()
            .await
            .call_responses
            .entry((to, abi::selector(signature)))
            .or_default()
            .push_back(response);
    }

    pub async fn set_uint_response(&self, to: Address, signature: &str, value: U256) {
        let encoded = ethers::abi::encode(&[ethers::abi::Token::Uint(value)]);
        self.push_call_response(to, signature, Ok(Bytes::from(encoded))).await;
    }

    pub async fn set_address_response(&self, to: Address, signature: &str, value: Address) {
        let encoded = ethers::abi::encode(&[ethers::abi::Token::Address(value)]);
        self.push_call_response(to, signature, Ok(Bytes::from(encoded))).await;
    }

    /// Logs attached to the receipt of any transaction sent to `to` with
    /// the selector of `signature`.
    pub async fn emit_on_send(&self, to: Address, signature: &str, logs: Vec<EventLog>) {
        self.state
            .write()
            .await
            .send_logs
            .insert((to, abi::selector(signature)), logs);
    }

    /// Debits the wallet when a transaction to `to` is sent. `token` of
    /// `None` debits the native balance.
    pub async fn debit_on_send(&self, to: Address, token: Option<Address>, amount: U256) {
        self.state.write().await.send_debits.insert(to, (token, amount));
    }

    pub async fn fail_next_send(&self, error: ChainError) {
        self.state.write().await.send_failures.push_back(error);
    }

    pub async fn set_send_status(&self, status: Option<u64>) {
        self.state.write().await.send_status = status;
    }

    pub async fn withhold_receipts(&self, withhold: bool) {
        self.state.write().await.withhold_receipts = withhold;
    }

    pub async fn set_receipt(&self, receipt: ReceiptSummary) {
        self.state.write().await.receipts.insert(receipt.tx_hash, receipt);
    }

    pub async fn set_proof(&self, proof: ChainResult<AccountStorageProof>) {
        self.state.write().await.proof = Some(proof);
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.state.read().await.calls.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.state.read().await.calls.len()
    }

    pub async fn sent_transactions(&self) -> Vec<TxRequest> {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Send(tx) => Some(tx.clone()),
                _ => None,
            })
            .collect()
    }

    /// Selectors of sent transactions, in order.
    pub async fn sent_selectors(&self) -> Vec<[u8; 4]> {
        self.sent_transactions()
            .await
            .iter()
            .filter(|tx| tx.data.len() >= 4)
            .map(|tx| [tx.data[0], tx.data[1], tx.data[2], tx.data[3]])
            .collect()
    }

    async fn record(&self, call: RecordedCall) {
        self.state.write().await.calls.push(call);
    }
}

#[async_trait]
impl ChainReader for MockChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn native_balance(&self, owner: Address) -> ChainResult<U256> {
        self.record(RecordedCall::NativeBalance(owner)).await;
        Ok(self
            .state
            .read()
            .await
            .native_balances
            .get(&owner)
            .copied()
            .unwrap_or_default())
    }

    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes> {
        if data.len() < 4 {
            return Err(ChainError::AbiError("calldata shorter than a selector".into()));
        }
        let selector = [data[0], data[1], data[2], data[3]];
        self.record(RecordedCall::Call { to, selector }).await;

        let mut state = self.state.write().await;
        let args = &data[4..];

        if selector == abi::selector(abi::ERC20_BALANCE_OF) {
            let owner = abi::decode_address(args)?;
            let balance = state.token_balances.get(&(to, owner)).copied().unwrap_or_default();
            return Ok(encode_uint(balance));
        }
        if selector == abi::selector(abi::ERC20_ALLOWANCE) {
            let owner = Address::from_slice(&args[12..32]);
            let spender = Address::from_slice(&args[44..64]);
            let allowance = state.allowances.get(&(to, owner, spender)).copied().unwrap_or_default();
            return Ok(encode_uint(allowance));
        }
        if selector == abi::selector(abi::ERC20_DECIMALS) {
            if let Some(decimals) = state.decimals.get(&to) {
                return Ok(encode_uint(U256::from(*decimals)));
            }
        }
        if selector == abi::selector(abi::ERC20_SYMBOL) {
            if let Some(symbol) = state.symbols.get(&to) {
                return Ok(Bytes::from(ethers::abi::encode(&[ethers::abi::Token::String(symbol.clone())])));
            }
        }

        match state.call_responses.get_mut(&(to, selector)) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| Ok(Bytes::new())),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| Ok(Bytes::new())),
            None => Err(ChainError::Rpc(format!("execution reverted: no mock for {:?}", to))),
        }
    }

    async fn gas_price(&self) -> ChainResult<U256> {
        self.record(RecordedCall::GasPrice).await;
        Ok(self.state.read().await.gas_price)
    }

    async fn receipt(&self, tx_hash: H256) -> ChainResult<Option<ReceiptSummary>> {
        self.record(RecordedCall::Receipt(tx_hash)).await;
        let state = self.state.read().await;
        if state.withhold_receipts {
            return Ok(None);
        }
        Ok(state.receipts.get(&tx_hash).cloned())
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> ChainResult<ReceiptSummary> {
        self.record(RecordedCall::Receipt(tx_hash)).await;
        self.state
            .read()
            .await
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or(ChainError::MissingReceipt(tx_hash))
    }

    async fn get_proof(
        &self,
        contract: Address,
        slots: Vec<H256>,
        block: Option<u64>,
    ) -> ChainResult<AccountStorageProof> {
        self.record(RecordedCall::Proof { contract, slots, block }).await;
        self.state
            .read()
            .await
            .proof
            .clone()
            .unwrap_or_else(|| Err(ChainError::UnsupportedProofMethod("no mock proof".into())))
    }
}

#[async_trait]
impl ChainWriter for MockChain {
    fn address(&self) -> Address {
        self.wallet
    }

    async fn send_transaction(&self, tx: TxRequest) -> ChainResult<H256> {
        self.record(RecordedCall::Send(tx.clone())).await;
        let mut state = self.state.write().await;

        if let Some(error) = state.send_failures.pop_front() {
            return Err(error);
        }

        state.nonce += 1;
        state.block_number += 1;
        let tx_hash = H256::from(keccak256(
            [self.chain_id.to_be_bytes(), state.nonce.to_be_bytes()].concat(),
        ));
        let to = tx.to.unwrap_or_default();
        let selector = if tx.data.len() >= 4 {
            [tx.data[0], tx.data[1], tx.data[2], tx.data[3]]
        } else {
            [0u8; 4]
        };

        if selector == abi::selector(abi::ERC20_APPROVE) && tx.data.len() >= 68 {
            let spender = Address::from_slice(&tx.data[16..36]);
            let amount = U256::from_big_endian(&tx.data[36..68]);
            state.allowances.insert((to, self.wallet, spender), amount);
        }

        if let Some((token, amount)) = state.send_debits.get(&to).copied() {
            let wallet = self.wallet;
            let balance = match token {
                Some(token) => state.token_balances.entry((token, wallet)).or_default(),
                None => state.native_balances.entry(wallet).or_default(),
            };
            *balance = balance.saturating_sub(amount);
        }

        let logs = state.send_logs.get(&(to, selector)).cloned().unwrap_or_default();
        let receipt = ReceiptSummary {
            tx_hash,
            block_number: state.block_number,
            status: state.send_status,
            logs,
        };
        state.receipts.insert(tx_hash, receipt);

        Ok(tx_hash)
    }
}

fn encode_uint(value: U256) -> Bytes {
    Bytes::from(ethers::abi::encode(&[ethers::abi::Token::Uint(value)]))
}
