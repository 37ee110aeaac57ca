//! Entry point for the presentation layer: an action name plus a parameter
//! map in, one user-facing message (and optionally a progress stream) out.

use ethereum_contracts::utils::parse_address;
use ethers::types::H256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::chains::Chain;
use crate::config::BridgeSettings;
use crate::error::{BridgeError, BridgeResult, TransferFailure};
use crate::generic::{GenericBridgeOrchestrator, Verification};
use crate::minimums::MinimumAmountPolicy;
use crate::native::{GatewayClients, NativeBridgeOrchestrator};
use crate::provider::{BridgeProvider, HttpBridgeProvider};
use crate::request::{ChainClients, TransferRequest};
use crate::tokens::TokenResolver;
use crate::updates::{StatusSink, StatusUpdate};
use oracle_integrations::StateOracleWaiter;

pub const ACTION_BRIDGE: &str = "bridge";
pub const ACTION_NATIVE_BRIDGE: &str = "native_bridge";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub connected_chain_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub message: String,
    pub tx_hash: Option<H256>,
    /// Transfer status label, when a transfer was created.
    pub status: Option<String>,
    #[serde(skip)]
    pub progress: Option<ReceiverStream<StatusUpdate>>,
}

impl ActionResponse {
    fn failure(failure: TransferFailure) -> Self {
        Self {
            message: failure.user_message(),
            tx_hash: failure.transfer.as_ref().and_then(|t| t.source_tx_hash()),
            status: failure.transfer.as_ref().map(|t| t.status().label().to_string()),
            progress: None,
        }
    }
}

pub struct ActionContext {
    generic: Arc<GenericBridgeOrchestrator>,
    native: Arc<NativeBridgeOrchestrator>,
    minimums: Arc<MinimumAmountPolicy>,
    clients: HashMap<Chain, ChainClients>,
    status: StatusSink,
    cancel: CancellationToken,
}

impl ActionContext {
    /// Wires both orchestrators from settings around the caller's clients.
    pub fn new(settings: &BridgeSettings, clients: HashMap<Chain, ChainClients>) -> BridgeResult<Self> {
        let provider: Arc<dyn BridgeProvider> = Arc::new(HttpBridgeProvider::new(
            settings.provider_url.clone(),
            settings.provider_api_key.clone(),
        )?);
        Self::with_provider(settings, provider, clients)
    }

    pub fn with_provider(
        settings: &BridgeSettings,
        provider: Arc<dyn BridgeProvider>,
        clients: HashMap<Chain, ChainClients>,
    ) -> BridgeResult<Self> {
        let tokens = Arc::new(TokenResolver::new(provider.clone()));
        let minimums = Arc::new(MinimumAmountPolicy::with_rules(&settings.minimum_rules));
        let generic = GenericBridgeOrchestrator::new(provider, tokens.clone(), minimums.clone(), settings.generic.clone());
        let native = NativeBridgeOrchestrator::new(
            settings.gateway_contracts()?,
            StateOracleWaiter::new(settings.oracle.clone()),
            minimums.clone(),
        )
        .with_token_resolver(tokens);

        Ok(Self {
            generic: Arc::new(generic),
            native: Arc::new(native),
            minimums,
            clients,
            status: StatusSink::disabled(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_status(mut self, status: StatusSink) -> Self {
        self.status = status;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn native(&self) -> &NativeBridgeOrchestrator {
        &self.native
    }

    pub fn status(&self) -> &StatusSink {
        &self.status
    }

    pub fn minimums(&self) -> &MinimumAmountPolicy {
        &self.minimums
    }

    pub fn clients(&self, chain: Chain) -> BridgeResult<&ChainClients> {
        self.clients
            .get(&chain)
            .ok_or_else(|| BridgeError::Config(format!("no wallet connection for {}", chain)))
    }

    pub fn gateway_clients(&self) -> BridgeResult<GatewayClients> {
        Ok(GatewayClients {
            ethereum: self.clients(Chain::Ethereum)?.clone(),
            sonic: self.clients(Chain::Sonic)?.clone(),
        })
    }

    /// Never fails: every error becomes the response message.
    pub async fn dispatch(&self, request: ActionRequest) -> ActionResponse {
        let action = request.action.trim().to_lowercase();
        debug!(%action, parameters = ?request.parameters, "dispatching action");

        let transfer = TransferRequest::from_parameters(&request.parameters, request.connected_chain_id);
        let result = match action.as_str() {
            ACTION_BRIDGE => self.bridge(&transfer, request.wallet_address.as_deref()).await,
            ACTION_NATIVE_BRIDGE => self.native_bridge(&transfer, request.wallet_address.as_deref()).await,
            _ => Err(BridgeError::UnknownAction(request.action.clone()).into()),
        };

        result.unwrap_or_else(|failure| {
            warn!(%action, error = %failure, "action failed");
            ActionResponse::failure(failure)
        })
    }

    async fn bridge(&self, request: &TransferRequest, wallet: Option<&str>) -> Result<ActionResponse, TransferFailure> {
        let validated = request.validate(&self.minimums)?;
        let source = self.clients(validated.source)?;
        check_wallet(wallet, source)?;

        let outcome = self
            .generic
            .execute(request, source, self.cancel.child_token(), &self.status)
            .await?;
        let transfer = &outcome.transfer;
        let tx_hash = transfer.source_tx_hash();
        let explorer = tx_hash
            .map(|hash| validated.source.explorer_tx_url(hash))
            .unwrap_or_default();

        let message = match outcome.verification {
            Verification::Confirmed => format!(
                "Sent {} {} from {} to {}. The transfer left your wallet; delivery to {} usually takes a few minutes. {}",
                transfer.amount(),
                transfer.token(),
                transfer.source_chain(),
                transfer.destination_chain(),
                transfer.destination_chain(),
                explorer
            ),
            Verification::Inconclusive => format!(
                "Submitted {} {} from {} to {}. It is not confirmed yet; I'll keep checking. {}",
                transfer.amount(),
                transfer.token(),
                transfer.source_chain(),
                transfer.destination_chain(),
                explorer
            ),
            Verification::Reverted => BridgeError::Reverted {
                tx_hash: tx_hash.unwrap_or_default(),
            }
            .user_message(),
        };

        Ok(ActionResponse {
            message,
            tx_hash,
            status: Some(transfer.status().label().to_string()),
            progress: outcome.progress,
        })
    }

    async fn native_bridge(&self, request: &TransferRequest, wallet: Option<&str>) -> Result<ActionResponse, TransferFailure> {
        let validated = request.validate(&self.minimums)?;
        let clients = self.gateway_clients()?;
        check_wallet(wallet, clients.side(validated.source))?;

        let transfer = self.native.execute(request, &clients, &self.cancel, &self.status).await?;
        let claim = transfer.destination_tx_hash();
        Ok(ActionResponse {
            message: format!(
                "Bridged {} {} from {} to {} through the gateway. Claim transaction: {}",
                transfer.amount(),
                transfer.token(),
                transfer.source_chain(),
                transfer.destination_chain(),
                claim
                    .map(|hash| transfer.destination_chain().explorer_tx_url(hash))
                    .unwrap_or_default()
            ),
            tx_hash: claim,
            status: Some(transfer.status().label().to_string()),
            progress: None,
        })
    }
}

/// The wallet the caller claims to act for must be the one that signs.
fn check_wallet(wallet: Option<&str>, clients: &ChainClients) -> BridgeResult<()> {
    let Some(raw) = wallet.map(str::trim).filter(|w| !w.is_empty()) else {
        return Ok(());
    };
    let claimed = parse_address(raw).map_err(|_| BridgeError::InvalidAddress(raw.to_string()))?;
    if claimed != clients.wallet() {
        return Err(BridgeError::InvalidAddress(format!(
            "{} is not the connected signer {:?}",
            raw,
            clients.wallet()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_contracts::mock::MockChain;
    use ethers::types::Address;

    fn context(clients: HashMap<Chain, ChainClients>) -> ActionContext {
        // an unroutable provider; these tests never get past validation
        let settings = BridgeSettings {
            provider_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        };
        ActionContext::new(&settings, clients).unwrap()
    }

    fn parameters(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let response = context(HashMap::new())
            .dispatch(ActionRequest {
                action: "stake".into(),
                ..Default::default()
            })
            .await;
        assert!(response.message.contains("stake"));
        assert!(response.status.is_none());
    }

    #[tokio::test]
    async fn test_below_minimum_makes_no_calls() {
        let chain = MockChain::new(146, Address::from_low_u64_be(1));
        let clients = HashMap::from([(
            Chain::Sonic,
            ChainClients::new(Arc::new(chain.clone()), Arc::new(chain.clone())),
        )]);

        let response = context(clients)
            .dispatch(ActionRequest {
                action: "bridge".into(),
                parameters: parameters(&[
                    ("fromChain", "sonic"),
                    ("toChain", "ethereum"),
                    ("token", "USDC"),
                    ("amount", "1"),
                ]),
                wallet_address: None,
                connected_chain_id: Some(146),
            })
            .await;

        assert!(response.message.contains("minimum of 5 USDC"));
        assert_eq!(chain.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_parameter_and_wallet_mismatch() {
        let chain = MockChain::new(8453, Address::from_low_u64_be(1));
        let clients = HashMap::from([(
            Chain::Base,
            ChainClients::new(Arc::new(chain.clone()), Arc::new(chain.clone())),
        )]);
        let context = context(clients);

        let missing = context
            .dispatch(ActionRequest {
                action: "bridge".into(),
                parameters: parameters(&[("fromChain", "base"), ("toChain", "arb"), ("token", "USDC")]),
                ..Default::default()
            })
            .await;
        assert!(missing.message.contains("amount"));

        let mismatch = context
            .dispatch(ActionRequest {
                action: "BRIDGE".into(),
                parameters: parameters(&[
                    ("fromChain", "base"),
                    ("toChain", "arb"),
                    ("token", "USDC"),
                    ("amount", "10"),
                ]),
                wallet_address: Some(format!("{:?}", Address::from_low_u64_be(2))),
                connected_chain_id: Some(8453),
            })
            .await;
        assert!(mismatch.message.contains("connected signer"));
        assert_eq!(chain.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_native_bridge_needs_both_gateway_chains() {
        let response = context(HashMap::new())
            .dispatch(ActionRequest {
                action: "native_bridge".into(),
                parameters: parameters(&[
                    ("sourceChain", "ethereum"),
                    ("destinationChain", "sonic"),
                    ("token", "USDC"),
                    ("amount", "10"),
                ]),
                ..Default::default()
            })
            .await;
        assert!(response.message.contains("not configured"));
    }
}
