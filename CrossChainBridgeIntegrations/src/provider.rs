//! HTTP client for the generic bridge provider: token registry, quotes and
//! transfer status.

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::chains::Chain;
use crate::error::{BridgeError, BridgeResult};
use crate::tokens::{TokenDescriptor, TokenRegistry};

pub const DEFAULT_PROVIDER_URL: &str = "https://li.quest/v1";

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub from_chain: Chain,
    pub to_chain: Chain,
    pub from_token: Address,
    /// Resolved address, or the symbol when the destination token is unknown.
    pub to_token: String,
    pub amount: U256,
    pub from_address: Address,
    pub to_address: Address,
}

/// The transaction the provider wants the wallet to submit.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub target: Address,
    pub data: Bytes,
    pub value: U256,
    pub approval_address: Option<Address>,
    pub estimated_output: Option<String>,
}

impl Quote {
    pub fn spender(&self) -> Address {
        self.approval_address.unwrap_or(self.target)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderStatus {
    Pending,
    Released { destination_tx_hash: Option<H256> },
    Failed(String),
}

#[async_trait]
pub trait BridgeProvider: TokenRegistry {
    async fn quote(&self, request: &QuoteRequest) -> BridgeResult<Quote>;

    async fn status(&self, tx_hash: H256, from: Chain, to: Chain) -> BridgeResult<ProviderStatus>;
}

#[derive(Deserialize)]
struct ApiToken {
    address: Address,
    symbol: String,
    decimals: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiQuote {
    #[serde(default)]
    estimate: Option<ApiEstimate>,
    transaction_request: ApiTransactionRequest,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEstimate {
    #[serde(default)]
    approval_address: Option<Address>,
    #[serde(default)]
    to_amount: Option<String>,
}

#[derive(Deserialize)]
struct ApiTransactionRequest {
    to: Address,
    data: Bytes,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiStatus {
    status: String,
    #[serde(default)]
    substatus_message: Option<String>,
    #[serde(default)]
    receiving: Option<ApiReceiving>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiReceiving {
    #[serde(default)]
    tx_hash: Option<H256>,
}

pub struct HttpBridgeProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpBridgeProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> BridgeResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> BridgeResult<reqwest::Response> {
        let mut request = self.client.get(format!("{}/{}", self.base_url, path)).query(query);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        debug!(path, ?query, "bridge provider request");
        Ok(request.send().await?)
    }
}

#[async_trait]
impl TokenRegistry for HttpBridgeProvider {
    async fn lookup(&self, provider_chain_id: u64, token: &str) -> BridgeResult<Option<TokenDescriptor>> {
        let response = self
            .get("token", &[("chain", provider_chain_id.to_string()), ("token", token.to_string())])
            .await?;
        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::NO_CONTENT) {
            return Ok(None);
        }
        let body = response.error_for_status()?.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let token: ApiToken =
            serde_json::from_str(&body).map_err(|e| BridgeError::Registry(format!("malformed token: {}", e)))?;
        Ok(Some(TokenDescriptor {
            chain_id: provider_chain_id,
            symbol: token.symbol,
            address: token.address,
            decimals: token.decimals,
            is_native: false,
        }))
    }
}

#[async_trait]
impl BridgeProvider for HttpBridgeProvider {
    async fn quote(&self, request: &QuoteRequest) -> BridgeResult<Quote> {
        let query = [
            ("fromChain", request.from_chain.provider_id().to_string()),
            ("toChain", request.to_chain.provider_id().to_string()),
            ("fromToken", format!("{:?}", request.from_token)),
            ("toToken", request.to_token.clone()),
            ("fromAmount", request.amount.to_string()),
            ("fromAddress", format!("{:?}", request.from_address)),
            ("toAddress", format!("{:?}", request.to_address)),
        ];
        let quote: ApiQuote = self.get("quote", &query).await?.error_for_status()?.json().await?;

        let value = match quote.transaction_request.value.as_deref() {
            Some(raw) => parse_u256(raw)?,
            None => U256::zero(),
        };
        let (approval_address, estimated_output) = match quote.estimate {
            Some(estimate) => (estimate.approval_address, estimate.to_amount),
            None => (None, None),
        };
        Ok(Quote {
            target: quote.transaction_request.to,
            data: quote.transaction_request.data,
            value,
            approval_address,
            estimated_output,
        })
    }

    async fn status(&self, tx_hash: H256, from: Chain, to: Chain) -> BridgeResult<ProviderStatus> {
        let query = [
            ("txHash", format!("{:?}", tx_hash)),
            ("fromChain", from.provider_id().to_string()),
            ("toChain", to.provider_id().to_string()),
        ];
        let response = self.get("status", &query).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(ProviderStatus::Pending);
        }
        let status: ApiStatus = response.error_for_status()?.json().await?;
        Ok(match status.status.to_uppercase().as_str() {
            "DONE" => ProviderStatus::Released {
                destination_tx_hash: status.receiving.and_then(|r| r.tx_hash),
            },
            "FAILED" | "INVALID" => ProviderStatus::Failed(
                status.substatus_message.unwrap_or_else(|| "reported failed by provider".into()),
            ),
            _ => ProviderStatus::Pending,
        })
    }
}

/// Accepts `0x`-prefixed hex or a decimal string.
fn parse_u256(raw: &str) -> BridgeResult<U256> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x") {
        Some(hex) if hex.is_empty() => Ok(U256::zero()),
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| e.to_string()),
        None => U256::from_dec_str(raw).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| BridgeError::Registry(format!("bad quantity {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_lookup_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(query_param("chain", "100000014"))
            .and(query_param("token", "USDC"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "address": "0x29219dd400f2bf60e5a23d13be72b486d4038894",
                "symbol": "USDC",
                "decimals": 6,
                "chainId": 100000014
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpBridgeProvider::new(server.uri(), Some("secret".into())).unwrap();
        let token = provider.lookup(100_000_014, "USDC").await.unwrap().unwrap();
        assert_eq!(token.decimals, 6);
        assert_eq!(token.chain_id, 100_000_014);
        assert!(!token.is_native);
    }

    #[tokio::test]
    async fn test_lookup_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = HttpBridgeProvider::new(server.uri(), None).unwrap();
        assert_eq!(provider.lookup(1, "NOPE").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quote_parses_transaction_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .and(query_param("fromChain", "8453"))
            .and(query_param("fromAmount", "10000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "estimate": {
                    "approvalAddress": "0x1231deb6f5749ef6ce6943a275a1d3e7486f4eae",
                    "toAmount": "9950000"
                },
                "transactionRequest": {
                    "to": "0x1231deb6f5749ef6ce6943a275a1d3e7486f4eae",
                    "data": "0xdeadbeef",
                    "value": "0x0"
                }
            })))
            .mount(&server)
            .await;

        let provider = HttpBridgeProvider::new(server.uri(), None).unwrap();
        let quote = provider
            .quote(&QuoteRequest {
                from_chain: Chain::Base,
                to_chain: Chain::Arbitrum,
                from_token: Address::from_low_u64_be(1),
                to_token: "USDC".into(),
                amount: U256::from(10_000_000u64),
                from_address: Address::from_low_u64_be(2),
                to_address: Address::from_low_u64_be(2),
            })
            .await
            .unwrap();
        assert_eq!(quote.data.to_vec(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(quote.value, U256::zero());
        assert_eq!(quote.spender(), quote.target);
        assert_eq!(quote.estimated_output.as_deref(), Some("9950000"));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        let receiving = H256::repeat_byte(0x42);
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "DONE",
                "receiving": { "txHash": format!("{:?}", receiving) }
            })))
            .mount(&server)
            .await;

        let provider = HttpBridgeProvider::new(server.uri(), None).unwrap();
        let status = provider
            .status(H256::repeat_byte(1), Chain::Base, Chain::Arbitrum)
            .await
            .unwrap();
        assert_eq!(
            status,
            ProviderStatus::Released {
                destination_tx_hash: Some(receiving)
            }
        );
    }

    #[test]
    fn test_parse_u256() {
        assert_eq!(parse_u256("0x10").unwrap(), U256::from(16));
        assert_eq!(parse_u256("250").unwrap(), U256::from(250));
        assert_eq!(parse_u256("0x").unwrap(), U256::zero());
        assert!(parse_u256("ten").is_err());
    }
}
