//! Token identity per chain, resolved lazily through the bridge provider's
//! registry and cached for the life of the process.

use async_trait::async_trait;
use dashmap::DashMap;
use ethers::types::{Address, H160};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::chains::Chain;
use crate::error::{BridgeError, BridgeResult};

/// Address the bridge provider uses for a chain's native coin.
pub const NATIVE_SENTINEL: Address = H160([0xee; 20]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    /// Provider-namespace chain id.
    pub chain_id: u64,
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
    pub is_native: bool,
}

/// Source of token metadata. `Ok(None)` means the registry does not know
/// the token on that chain.
#[async_trait]
pub trait TokenRegistry: Send + Sync {
    async fn lookup(&self, provider_chain_id: u64, token: &str) -> BridgeResult<Option<TokenDescriptor>>;
}

pub struct TokenResolver {
    registry: Arc<dyn TokenRegistry>,
    cache: DashMap<(u64, String), TokenDescriptor>,
}

impl TokenResolver {
    pub fn new(registry: Arc<dyn TokenRegistry>) -> Self {
        Self {
            registry,
            cache: DashMap::new(),
        }
    }

    pub async fn resolve(&self, chain: Chain, token: &str) -> BridgeResult<TokenDescriptor> {
        self.resolve_token(chain.provider_id(), token).await
    }

    /// Looks up `token` (symbol or address) on a provider-namespace chain.
    /// Only hits are cached; a miss is retried on the next call.
    pub async fn resolve_token(&self, provider_chain_id: u64, token: &str) -> BridgeResult<TokenDescriptor> {
        let key = (provider_chain_id, token.trim().to_uppercase());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let chain_name = Chain::from_provider_id(provider_chain_id)
            .map(|chain| chain.name().to_string())
            .unwrap_or_else(|| provider_chain_id.to_string());

        let mut descriptor = self
            .registry
            .lookup(provider_chain_id, token.trim())
            .await?
            .ok_or_else(|| BridgeError::TokenNotFound {
                chain: chain_name,
                symbol: token.trim().to_string(),
            })?;

        if descriptor.address.is_zero() || descriptor.address == NATIVE_SENTINEL {
            descriptor.address = NATIVE_SENTINEL;
            descriptor.is_native = true;
        }

        debug!(
            chain = provider_chain_id,
            symbol = %descriptor.symbol,
            address = ?descriptor.address,
            decimals = descriptor.decimals,
            "token resolved"
        );
        self.cache.insert(key, descriptor.clone());
        Ok(descriptor)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRegistry {
        hits: AtomicUsize,
        address: Address,
    }

    #[async_trait]
    impl TokenRegistry for CountingRegistry {
        async fn lookup(&self, chain_id: u64, token: &str) -> BridgeResult<Option<TokenDescriptor>> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            if token.eq_ignore_ascii_case("nope") {
                return Ok(None);
            }
            Ok(Some(TokenDescriptor {
                chain_id,
                symbol: token.to_uppercase(),
                address: self.address,
                decimals: 18,
                is_native: false,
            }))
        }
    }

    fn resolver(address: Address) -> (Arc<CountingRegistry>, TokenResolver) {
        let registry = Arc::new(CountingRegistry {
            hits: AtomicUsize::new(0),
            address,
        });
        let resolver = TokenResolver::new(registry.clone());
        (registry, resolver)
    }

    #[tokio::test]
    async fn test_resolution_is_cached_and_idempotent() {
        let (registry, resolver) = resolver(Address::from_low_u64_be(0xabc));
        let first = resolver.resolve(Chain::Base, "usdc").await.unwrap();
        let second = resolver.resolve(Chain::Base, " USDC ").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.hits.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached(), 1);
    }

    #[tokio::test]
    async fn test_zero_address_becomes_sentinel() {
        let (_, resolver) = resolver(Address::zero());
        let token = resolver.resolve(Chain::Sonic, "S").await.unwrap();
        assert!(token.is_native);
        assert_eq!(token.address, NATIVE_SENTINEL);
        assert_eq!(
            format!("{:?}", NATIVE_SENTINEL),
            "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"
        );
        assert_eq!(token.chain_id, 100_000_014);
    }

    #[tokio::test]
    async fn test_misses_are_not_cached() {
        let (registry, resolver) = resolver(Address::from_low_u64_be(1));
        for _ in 0..2 {
            let err = resolver.resolve(Chain::Ethereum, "nope").await.unwrap_err();
            assert!(matches!(err, BridgeError::TokenNotFound { ref chain, .. } if chain == "Ethereum"));
        }
        assert_eq!(registry.hits.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached(), 0);
    }
}
