use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::chains::Chain;
use crate::error::{BridgeError, BridgeResult};

/// Floor applied when neither a route rule nor a token default matches.
pub const GLOBAL_MINIMUM: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

/// Minimum for one token, either on a specific route or as the token default
/// when `source`/`destination` are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimumAmountRule {
    #[serde(default)]
    pub source: Option<Chain>,
    #[serde(default)]
    pub destination: Option<Chain>,
    pub token: String,
    pub minimum: Decimal,
}

impl MinimumAmountRule {
    fn route(source: Chain, destination: Chain, token: &str, minimum: Decimal) -> Self {
        Self {
            source: Some(source),
            destination: Some(destination),
            token: token.to_string(),
            minimum,
        }
    }

    fn token_default(token: &str, minimum: Decimal) -> Self {
        Self {
            source: None,
            destination: None,
            token: token.to_string(),
            minimum,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinimumAmountPolicy {
    routes: HashMap<(Chain, Chain, String), Decimal>,
    tokens: HashMap<String, Decimal>,
    global: Decimal,
}

impl Default for MinimumAmountPolicy {
    fn default() -> Self {
        Self::with_rules(&[])
    }
}

impl MinimumAmountPolicy {
    /// Built-in table plus `extra` rules; an extra rule for the same key
    /// replaces the built-in one.
    pub fn with_rules(extra: &[MinimumAmountRule]) -> Self {
        let mut policy = Self {
            routes: HashMap::new(),
            tokens: HashMap::new(),
            global: GLOBAL_MINIMUM,
        };
        for rule in builtin_rules().iter().chain(extra) {
            policy.insert(rule);
        }
        policy
    }

    fn insert(&mut self, rule: &MinimumAmountRule) {
        let token = rule.token.trim().to_uppercase();
        match (rule.source, rule.destination) {
            (Some(source), Some(destination)) => {
                self.routes.insert((source, destination, token), rule.minimum);
            }
            _ => {
                self.tokens.insert(token, rule.minimum);
            }
        }
    }

    /// Route rule, then token default, then the global floor.
    pub fn minimum_amount(&self, source: Chain, destination: Chain, symbol: &str) -> Decimal {
        let symbol = symbol.trim().to_uppercase();
        self.routes
            .get(&(source, destination, symbol.clone()))
            .or_else(|| self.tokens.get(&symbol))
            .copied()
            .unwrap_or(self.global)
    }

    pub fn check(&self, source: Chain, destination: Chain, symbol: &str, amount: Decimal) -> BridgeResult<()> {
        let minimum = self.minimum_amount(source, destination, symbol);
        if amount < minimum {
            return Err(BridgeError::BelowMinimum {
                amount,
                minimum,
                symbol: symbol.trim().to_uppercase(),
                route: format!("{} to {}", source, destination),
            });
        }
        Ok(())
    }
}

fn builtin_rules() -> Vec<MinimumAmountRule> {
    let d = |s: &str| Decimal::from_str(s).unwrap_or(GLOBAL_MINIMUM);
    vec![
        MinimumAmountRule::route(Chain::Sonic, Chain::Ethereum, "USDC", d("5")),
        MinimumAmountRule::route(Chain::Sonic, Chain::Ethereum, "USDT", d("5")),
        MinimumAmountRule::route(Chain::Sonic, Chain::Ethereum, "ETH", d("0.002")),
        MinimumAmountRule::route(Chain::Sonic, Chain::Ethereum, "WETH", d("0.002")),
        MinimumAmountRule::token_default("USDC", d("1")),
        MinimumAmountRule::token_default("USDT", d("1")),
        MinimumAmountRule::token_default("ETH", d("0.001")),
        MinimumAmountRule::token_default("WETH", d("0.001")),
        MinimumAmountRule::token_default("S", d("1")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_lookup_order() {
        let policy = MinimumAmountPolicy::default();
        assert_eq!(policy.minimum_amount(Chain::Sonic, Chain::Ethereum, "usdc"), dec("5"));
        assert_eq!(policy.minimum_amount(Chain::Ethereum, Chain::Sonic, "USDC"), dec("1"));
        assert_eq!(policy.minimum_amount(Chain::Base, Chain::Arbitrum, "DAI"), dec("0.1"));
        assert_eq!(GLOBAL_MINIMUM, dec("0.1"));
    }

    #[test]
    fn test_check_rejects_below_route_minimum() {
        let policy = MinimumAmountPolicy::default();
        let err = policy
            .check(Chain::Sonic, Chain::Ethereum, "USDC", dec("1"))
            .unwrap_err();
        match err {
            BridgeError::BelowMinimum { minimum, .. } => assert_eq!(minimum, dec("5")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(policy.check(Chain::Sonic, Chain::Ethereum, "USDC", dec("5")).is_ok());
    }

    #[test]
    fn test_extra_rules_override_builtins() {
        let policy = MinimumAmountPolicy::with_rules(&[
            MinimumAmountRule::route(Chain::Sonic, Chain::Ethereum, "USDC", dec("20")),
            MinimumAmountRule::token_default("DAI", dec("2")),
        ]);
        assert_eq!(policy.minimum_amount(Chain::Sonic, Chain::Ethereum, "USDC"), dec("20"));
        assert_eq!(policy.minimum_amount(Chain::Base, Chain::Linea, "dai"), dec("2"));
    }
}
