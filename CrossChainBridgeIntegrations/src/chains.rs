//! Canonical chain table. Every chain has exactly one id in each namespace
//! and call sites always go through [`Chain`] to get one, never through a
//! raw integer of unknown origin.

use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Sonic,
    Arbitrum,
    Base,
    Optimism,
    Polygon,
    Bsc,
    Avalanche,
    Linea,
}

/// Which id space a chain id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainNamespace {
    /// EIP-155 chain ids, as reported by wallets and nodes.
    Native,
    /// Ids used by the generic bridge provider's API.
    Provider,
}

impl Chain {
    pub const ALL: [Chain; 9] = [
        Chain::Ethereum,
        Chain::Sonic,
        Chain::Arbitrum,
        Chain::Base,
        Chain::Optimism,
        Chain::Polygon,
        Chain::Bsc,
        Chain::Avalanche,
        Chain::Linea,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Sonic => "Sonic",
            Chain::Arbitrum => "Arbitrum",
            Chain::Base => "Base",
            Chain::Optimism => "Optimism",
            Chain::Polygon => "Polygon",
            Chain::Bsc => "BSC",
            Chain::Avalanche => "Avalanche",
            Chain::Linea => "Linea",
        }
    }

    pub fn native_id(self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Sonic => 146,
            Chain::Arbitrum => 42161,
            Chain::Base => 8453,
            Chain::Optimism => 10,
            Chain::Polygon => 137,
            Chain::Bsc => 56,
            Chain::Avalanche => 43114,
            Chain::Linea => 59144,
        }
    }

    pub fn provider_id(self) -> u64 {
        match self {
            Chain::Sonic => 100_000_014,
            other => other.native_id(),
        }
    }

    pub fn id(self, namespace: ChainNamespace) -> u64 {
        match namespace {
            ChainNamespace::Native => self.native_id(),
            ChainNamespace::Provider => self.provider_id(),
        }
    }

    pub fn native_symbol(self) -> &'static str {
        match self {
            Chain::Sonic => "S",
            Chain::Polygon => "POL",
            Chain::Bsc => "BNB",
            Chain::Avalanche => "AVAX",
            _ => "ETH",
        }
    }

    pub fn explorer_url(self) -> &'static str {
        match self {
            Chain::Ethereum => "https://etherscan.io",
            Chain::Sonic => "https://sonicscan.org",
            Chain::Arbitrum => "https://arbiscan.io",
            Chain::Base => "https://basescan.org",
            Chain::Optimism => "https://optimistic.etherscan.io",
            Chain::Polygon => "https://polygonscan.com",
            Chain::Bsc => "https://bscscan.com",
            Chain::Avalanche => "https://snowtrace.io",
            Chain::Linea => "https://lineascan.build",
        }
    }

    pub fn explorer_tx_url(self, tx_hash: H256) -> String {
        format!("{}/tx/{:?}", self.explorer_url(), tx_hash)
    }

    /// Case-insensitive lookup by name or alias.
    pub fn from_name(name: &str) -> Option<Chain> {
        let normalized = name.trim().to_lowercase();
        let chain = match normalized.as_str() {
            "eth" | "ethereum" | "mainnet" | "ethereum mainnet" => Chain::Ethereum,
            "sonic" | "s" | "sonic mainnet" => Chain::Sonic,
            "arb" | "arbitrum" | "arbitrum one" => Chain::Arbitrum,
            "base" => Chain::Base,
            "op" | "optimism" => Chain::Optimism,
            "polygon" | "matic" | "pol" => Chain::Polygon,
            "bsc" | "bnb" | "binance" | "binance smart chain" | "bnb chain" => Chain::Bsc,
            "avax" | "avalanche" => Chain::Avalanche,
            "linea" => Chain::Linea,
            _ => return None,
        };
        Some(chain)
    }

    pub fn from_native_id(id: u64) -> Option<Chain> {
        Chain::ALL.into_iter().find(|chain| chain.native_id() == id)
    }

    pub fn from_provider_id(id: u64) -> Option<Chain> {
        Chain::ALL.into_iter().find(|chain| chain.provider_id() == id)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chain {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chain::from_name(s).ok_or_else(|| BridgeError::UnsupportedChain(s.trim().to_string()))
    }
}

pub fn resolve_chain_id(name: &str, namespace: ChainNamespace) -> Result<u64, BridgeError> {
    Ok(name.parse::<Chain>()?.id(namespace))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Mainnet,
    Testnet,
}

/// Address book for the Ethereum <-> Sonic gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayContracts {
    pub ethereum_token_deposit: Address,
    pub ethereum_token_pairs: Address,
    pub ethereum_state_oracle: Address,
    pub sonic_bridge: Address,
    pub sonic_token_pairs: Address,
    pub sonic_state_oracle: Address,
}

impl GatewayContracts {
    pub fn mainnet() -> Self {
        Self {
            ethereum_token_deposit: known("0xa1E2481a9CD0Cb0447EeB1cbc26F1b3fff3bec20"),
            ethereum_token_pairs: known("0xf2b1510c2709072C88C5b14db90Ec3b6297193e4"),
            ethereum_state_oracle: known("0xB7e8CC3F5FeA12443136f0cc13D81F109B2dEd7f"),
            sonic_bridge: known("0x9Ef7629F9B930168b76283AdD7120777b3c895b3"),
            sonic_token_pairs: known("0x134E4c207aD5A13549DE1eBF8D43c1f49b00ba94"),
            sonic_state_oracle: known("0x836664B0c0CB29B7877bCcF94159CC996528F2C3"),
        }
    }

    /// Testnet deployments move too often to ship built in; they come from
    /// settings.
    pub fn for_environment(
        environment: Environment,
        configured: Option<GatewayContracts>,
    ) -> Result<Self, BridgeError> {
        match (configured, environment) {
            (Some(contracts), _) => Ok(contracts),
            (None, Environment::Mainnet) => Ok(Self::mainnet()),
            (None, Environment::Testnet) => Err(BridgeError::Config(
                "testnet gateway contracts must be set in settings".into(),
            )),
        }
    }
}

fn known(address: &str) -> Address {
    address.parse().unwrap_or_default()
}
