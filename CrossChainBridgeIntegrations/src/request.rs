//! What a caller hands the orchestrators, and the checks every request passes
//! before any chain is touched.

use ethereum_contracts::utils::{looks_like_address, parse_address};
use ethereum_contracts::{ChainReader, ChainWriter};
use ethers::types::{Address, U256};
use ethers::utils::{format_units, parse_units};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::chains::Chain;
use crate::error::{BridgeError, BridgeResult};
use crate::minimums::MinimumAmountPolicy;

/// Read and signing clients for one chain, supplied by the wallet layer.
#[derive(Clone)]
pub struct ChainClients {
    pub reader: Arc<dyn ChainReader>,
    pub writer: Arc<dyn ChainWriter>,
}

impl ChainClients {
    pub fn new(reader: Arc<dyn ChainReader>, writer: Arc<dyn ChainWriter>) -> Self {
        Self { reader, writer }
    }

    pub fn wallet(&self) -> Address {
        self.writer.address()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_chain: Option<String>,
    pub destination_chain: Option<String>,
    pub token: Option<String>,
    pub amount: Option<String>,
    pub receiver: Option<String>,
    /// Native chain id the wallet is currently on.
    pub connected_chain_id: Option<u64>,
}

impl TransferRequest {
    pub fn from_parameters(parameters: &HashMap<String, String>, connected_chain_id: Option<u64>) -> Self {
        let pick = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| parameters.get(*key))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            source_chain: pick(&["sourceChain", "fromChain"]),
            destination_chain: pick(&["destinationChain", "toChain"]),
            token: pick(&["token", "tokenSymbol"]),
            amount: pick(&["amount"]),
            receiver: pick(&["receiver"]),
            connected_chain_id,
        }
    }

    /// Field presence, chain names, amount, receiver, route minimum and
    /// connected chain, in that order. Performs no I/O.
    pub fn validate(&self, minimums: &MinimumAmountPolicy) -> BridgeResult<ValidatedRequest> {
        let source_name = required(&self.source_chain, "source chain")?;
        let destination_name = required(&self.destination_chain, "destination chain")?;
        let token = required(&self.token, "token")?;
        let amount_raw = required(&self.amount, "amount")?;

        let source: Chain = source_name.parse()?;
        let destination: Chain = destination_name.parse()?;
        if source == destination {
            return Err(BridgeError::SameChain(source.to_string()));
        }

        let amount = Decimal::from_str(amount_raw)
            .ok()
            .filter(|amount| amount.is_sign_positive() && !amount.is_zero())
            .ok_or_else(|| BridgeError::InvalidAmount(amount_raw.to_string()))?;

        let receiver = match self.receiver.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => Some(parse_address(raw).map_err(|_| BridgeError::InvalidAddress(raw.to_string()))?),
            None => None,
        };

        let symbol = if looks_like_address(token) {
            token.to_string()
        } else {
            token.to_uppercase()
        };
        minimums.check(source, destination, &symbol, amount)?;

        if let Some(connected) = self.connected_chain_id {
            if connected != source.native_id() {
                return Err(BridgeError::ChainMismatch {
                    connected,
                    expected: source.native_id(),
                    chain: source.to_string(),
                });
            }
        }

        Ok(ValidatedRequest {
            source,
            destination,
            token: symbol,
            amount,
            receiver,
        })
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> BridgeResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(BridgeError::MissingParameter(name))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub source: Chain,
    pub destination: Chain,
    /// Upper-cased symbol, or the address exactly as given.
    pub token: String,
    pub amount: Decimal,
    pub receiver: Option<Address>,
}

/// Scales a decimal amount to the token's base units.
pub fn to_base_units(amount: Decimal, decimals: u8) -> BridgeResult<U256> {
    let amount = amount.normalize();
    if amount.scale() > decimals as u32 {
        return Err(BridgeError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            amount, decimals
        )));
    }
    parse_units(amount.to_string(), decimals as u32)
        .map(U256::from)
        .map_err(|e| BridgeError::InvalidAmount(format!("{}: {}", amount, e)))
}

/// Base units back to a trimmed decimal string for messages.
pub fn from_base_units(value: U256, decimals: u8) -> String {
    match format_units(value, decimals as u32) {
        Ok(formatted) => Decimal::from_str(&formatted)
            .map(|d| d.normalize().to_string())
            .unwrap_or(formatted),
        Err(_) => value.to_string(),
    }
}
