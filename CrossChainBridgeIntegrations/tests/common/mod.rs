#![allow(dead_code)]

use async_trait::async_trait;
use cross_chain_bridge::{
    BridgeProvider, BridgeResult, Chain, ChainClients, GatewayClients, ProviderStatus, Quote, QuoteRequest,
    TokenDescriptor, TokenRegistry,
};
use ethereum_contracts::mock::MockChain;
use ethers::types::{Address, Bytes, H256, U256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const USDC_DECIMALS: u8 = 6;

pub fn wallet() -> Address {
    Address::from_low_u64_be(0xa11ce)
}

pub fn router() -> Address {
    Address::from_low_u64_be(0x1f1)
}

/// USDC address on `chain` in the fake registry.
pub fn usdc(chain: Chain) -> Address {
    Address::from_low_u64_be(0x05dc_0000 + chain.native_id())
}

pub fn usdc_units(whole: u64) -> U256 {
    U256::from(whole) * U256::exp10(USDC_DECIMALS as usize)
}

/// Aggregator stand-in: knows USDC (by symbol or address) and native ETH
/// (at the zero address) on every chain, quotes a call to
/// [`router`], and reports a fixed status.
pub struct FakeProvider {
    pub status: ProviderStatus,
    pub quotes: AtomicUsize,
    pub probes: AtomicUsize,
}

impl FakeProvider {
    pub fn pending() -> Arc<Self> {
        Arc::new(Self {
            status: ProviderStatus::Pending,
            quotes: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
        })
    }

    pub fn quote_count(&self) -> usize {
        self.quotes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRegistry for FakeProvider {
    async fn lookup(&self, chain_id: u64, token: &str) -> BridgeResult<Option<TokenDescriptor>> {
        let Some(chain) = Chain::from_provider_id(chain_id) else {
            return Ok(None);
        };
        if token.eq_ignore_ascii_case("ETH") {
            return Ok(Some(TokenDescriptor {
                chain_id,
                symbol: "ETH".into(),
                address: Address::zero(),
                decimals: 18,
                is_native: false,
            }));
        }
        let by_address = token.parse::<Address>().ok() == Some(usdc(chain));
        if !token.eq_ignore_ascii_case("USDC") && !by_address {
            return Ok(None);
        }
        Ok(Some(TokenDescriptor {
            chain_id,
            symbol: "USDC".into(),
            address: usdc(chain),
            decimals: USDC_DECIMALS,
            is_native: false,
        }))
    }
}

#[async_trait]
impl BridgeProvider for FakeProvider {
    async fn quote(&self, request: &QuoteRequest) -> BridgeResult<Quote> {
        self.quotes.fetch_add(1, Ordering::SeqCst);
        Ok(Quote {
            target: router(),
            data: Bytes::from(vec![0x12, 0x34, 0x56, 0x78]),
            value: U256::zero(),
            approval_address: None,
            estimated_output: Some(request.amount.to_string()),
        })
    }

    async fn status(&self, _tx_hash: H256, _from: Chain, _to: Chain) -> BridgeResult<ProviderStatus> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.status.clone())
    }
}

pub fn clients(chain: &MockChain) -> ChainClients {
    ChainClients::new(Arc::new(chain.clone()), Arc::new(chain.clone()))
}

pub fn gateway_clients(ethereum: &MockChain, sonic: &MockChain) -> GatewayClients {
    GatewayClients {
        ethereum: clients(ethereum),
        sonic: clients(sonic),
    }
}

pub fn client_map(chains: &[(Chain, &MockChain)]) -> HashMap<Chain, ChainClients> {
    chains.iter().map(|(chain, mock)| (*chain, clients(mock))).collect()
}

/// A chain holding `balance` whole USDC for [`wallet`].
pub async fn chain_with_usdc(chain: Chain, balance: u64) -> MockChain {
    let mock = MockChain::new(chain.native_id(), wallet());
    mock.set_token_balance(usdc(chain), wallet(), usdc_units(balance)).await;
    mock.set_decimals(usdc(chain), USDC_DECIMALS).await;
    mock
}

pub fn parameters(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
