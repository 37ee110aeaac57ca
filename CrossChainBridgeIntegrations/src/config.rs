use oracle_integrations::OracleWaitConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::chains::{Chain, Environment, GatewayContracts};
use crate::error::{BridgeError, BridgeResult};
use crate::generic::GenericBridgeConfig;
use crate::minimums::MinimumAmountRule;
use crate::provider::DEFAULT_PROVIDER_URL;

/// Process-wide settings. Loaded once; every field has a default so an empty
/// file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    pub environment: Environment,
    pub rpc_urls: HashMap<Chain, String>,
    pub provider_url: String,
    pub provider_api_key: Option<String>,
    /// Overrides the built-in gateway address book; required on testnet.
    pub gateway_contracts: Option<GatewayContracts>,
    pub oracle: OracleWaitConfig,
    pub generic: GenericBridgeConfig,
    pub minimum_rules: Vec<MinimumAmountRule>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        let rpc_urls = [
            (Chain::Ethereum, "https://eth.llamarpc.com"),
            (Chain::Sonic, "https://rpc.soniclabs.com"),
            (Chain::Arbitrum, "https://arb1.arbitrum.io/rpc"),
            (Chain::Base, "https://mainnet.base.org"),
            (Chain::Optimism, "https://mainnet.optimism.io"),
            (Chain::Polygon, "https://polygon-rpc.com"),
            (Chain::Bsc, "https://bsc-dataseed.binance.org"),
            (Chain::Avalanche, "https://api.avax.network/ext/bc/C/rpc"),
            (Chain::Linea, "https://rpc.linea.build"),
        ]
        .into_iter()
        .map(|(chain, url)| (chain, url.to_string()))
        .collect();

        Self {
            environment: Environment::Mainnet,
            rpc_urls,
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            provider_api_key: None,
            gateway_contracts: None,
            oracle: OracleWaitConfig::default(),
            generic: GenericBridgeConfig::default(),
            minimum_rules: Vec::new(),
        }
    }
}

impl BridgeSettings {
    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let settings = Self::from_json(&raw)?;
        info!(path = %path.display(), environment = ?settings.environment, "bridge settings loaded");
        Ok(settings)
    }

    /// Missing `rpc_urls` entries keep their defaults.
    pub fn from_json(raw: &str) -> BridgeResult<Self> {
        let mut settings: BridgeSettings =
            serde_json::from_str(raw).map_err(|e| BridgeError::Config(format!("invalid settings: {}", e)))?;
        for (chain, url) in BridgeSettings::default().rpc_urls {
            settings.rpc_urls.entry(chain).or_insert(url);
        }
        Ok(settings)
    }

    pub fn rpc_url(&self, chain: Chain) -> BridgeResult<&str> {
        self.rpc_urls
            .get(&chain)
            .map(String::as_str)
            .ok_or_else(|| BridgeError::Config(format!("no RPC URL configured for {}", chain)))
    }

    pub fn gateway_contracts(&self) -> BridgeResult<GatewayContracts> {
        GatewayContracts::for_environment(self.environment, self.gateway_contracts)
    }
}
