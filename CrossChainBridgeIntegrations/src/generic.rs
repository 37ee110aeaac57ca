//! General-purpose bridging through a third-party provider.
//!
//! Validation, token resolution on both ends, minimum amount, balance and
//! allowance checks all run before the transfer call is signed. After
//! submission the only signals are the sender's balance, the receipt and the
//! provider's status endpoint, so completion is reported as a
//! [`Verification`] plus a stream of poller updates rather than a yes/no.

use ethereum_contracts::{abi, ChainReader, TxRequest};
use ethers::types::{Address, H256, U256};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{BridgeError, BridgeResult, TransferFailure};
use crate::minimums::MinimumAmountPolicy;
use crate::poller::{PollerConfig, ProviderProbe, StatusPoller, StatusProbe};
use crate::provider::{BridgeProvider, QuoteRequest};
use crate::request::{from_base_units, to_base_units, ChainClients, TransferRequest, ValidatedRequest};
use crate::tokens::{TokenDescriptor, TokenResolver};
use crate::transfer::{BridgeTransfer, Pathway, TransferStatus};
use crate::updates::{StatusSink, StatusUpdate};

/// What to do when the destination chain does not know the token yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationTokenPolicy {
    /// Continue with a warning; the provider may mint it on arrival.
    #[default]
    Warn,
    /// Fail the transfer.
    Require,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericBridgeConfig {
    pub gas_ceiling: u64,
    pub verification_delay_secs: u64,
    pub destination_token_policy: DestinationTokenPolicy,
    pub poller: PollerConfig,
}

impl Default for GenericBridgeConfig {
    fn default() -> Self {
        Self {
            gas_ceiling: 2_000_000,
            verification_delay_secs: 5,
            destination_token_policy: DestinationTokenPolicy::Warn,
            poller: PollerConfig::default(),
        }
    }
}

/// Outcome of the post-submission balance and receipt check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verification {
    Confirmed,
    Inconclusive,
    Reverted,
}

#[derive(Debug)]
pub struct GenericOutcome {
    pub transfer: BridgeTransfer,
    pub verification: Verification,
    pub estimated_output: Option<String>,
    /// Poller updates; `None` when the transfer reverted.
    pub progress: Option<ReceiverStream<StatusUpdate>>,
}

struct Submission {
    tx_hash: H256,
    verification: Verification,
    estimated_output: Option<String>,
}

pub struct GenericBridgeOrchestrator {
    provider: Arc<dyn BridgeProvider>,
    tokens: Arc<TokenResolver>,
    minimums: Arc<MinimumAmountPolicy>,
    config: GenericBridgeConfig,
}

impl GenericBridgeOrchestrator {
    pub fn new(
        provider: Arc<dyn BridgeProvider>,
        tokens: Arc<TokenResolver>,
        minimums: Arc<MinimumAmountPolicy>,
        config: GenericBridgeConfig,
    ) -> Self {
        Self {
            provider,
            tokens,
            minimums,
            config,
        }
    }

    pub async fn execute(
        &self,
        request: &TransferRequest,
        source: &ChainClients,
        cancel: CancellationToken,
        status: &StatusSink,
    ) -> Result<GenericOutcome, TransferFailure> {
        let validated = request.validate(&self.minimums)?;
        let client_chain = source.reader.chain_id();
        if client_chain != validated.source.native_id() {
            return Err(BridgeError::ChainMismatch {
                connected: client_chain,
                expected: validated.source.native_id(),
                chain: validated.source.to_string(),
            }
            .into());
        }

        let receiver = validated.receiver.unwrap_or_else(|| source.wallet());
        let mut transfer = BridgeTransfer::new(
            Pathway::Generic,
            validated.source,
            validated.destination,
            validated.token.clone(),
            validated.amount,
            receiver,
        );
        counter!("bridge_transfers_started", "pathway" => "generic").increment(1);
        info!(
            transfer = transfer.id(),
            from = %validated.source,
            to = %validated.destination,
            token = %validated.token,
            amount = %validated.amount,
            "starting generic bridge transfer"
        );

        let submission = match self.drive(&mut transfer, &validated, source, &cancel, status).await {
            Ok(submission) => submission,
            Err(error) => {
                warn!(transfer = transfer.id(), %error, "generic bridge transfer failed");
                transfer.fail(error.to_string());
                counter!("bridge_transfers_failed", "pathway" => "generic").increment(1);
                return Err(TransferFailure::new(transfer, error));
            }
        };

        let explorer = validated.source.explorer_tx_url(submission.tx_hash);
        let progress = match submission.verification {
            Verification::Confirmed => {
                transfer.advance(TransferStatus::Confirmed);
                status.milestone(
                    Some(submission.tx_hash),
                    format!("Transfer confirmed on {}: {}", validated.source, explorer),
                );
                Some(self.spawn_poller(&validated, submission.tx_hash, explorer, cancel))
            }
            Verification::Inconclusive => {
                status.warning(
                    Some(submission.tx_hash),
                    "Your balance has not changed yet and the receipt is not available. This is common on some routes; the transfer is still being tracked.",
                );
                Some(self.spawn_poller(&validated, submission.tx_hash, explorer, cancel))
            }
            Verification::Reverted => {
                transfer.advance(TransferStatus::SuspectedFailure);
                counter!("bridge_transfers_failed", "pathway" => "generic").increment(1);
                status.warning(
                    Some(submission.tx_hash),
                    BridgeError::Reverted {
                        tx_hash: submission.tx_hash,
                    }
                    .user_message(),
                );
                None
            }
        };

        Ok(GenericOutcome {
            transfer,
            verification: submission.verification,
            estimated_output: submission.estimated_output,
            progress,
        })
    }

    async fn drive(
        &self,
        transfer: &mut BridgeTransfer,
        request: &ValidatedRequest,
        source: &ChainClients,
        cancel: &CancellationToken,
        status: &StatusSink,
    ) -> BridgeResult<Submission> {
        let wallet = source.wallet();
        let reader = source.reader.as_ref();

        let token = self.tokens.resolve(request.source, &request.token).await?;
        // rules key on symbol; the request may have named an address
        self.minimums
            .check(request.source, request.destination, &token.symbol, request.amount)?;
        transfer.advance(TransferStatus::SourceTokenResolved);

        let destination_token = match self.tokens.resolve(request.destination, &token.symbol).await {
            Ok(found) => {
                transfer.advance(TransferStatus::DestTokenResolved);
                Some(found)
            }
            Err(error) => match self.config.destination_token_policy {
                DestinationTokenPolicy::Require => return Err(error),
                DestinationTokenPolicy::Warn => {
                    warn!(%error, "destination token unresolved");
                    status.warning(
                        None,
                        format!(
                            "{} is not listed on {} yet; the token will be created during bridging.",
                            token.symbol, request.destination
                        ),
                    );
                    None
                }
            },
        };

        let units = to_base_units(request.amount, token.decimals)?;
        let balance = balance_of(reader, &token, wallet).await?;
        if balance < units {
            return Err(BridgeError::InsufficientBalance {
                symbol: token.symbol.clone(),
                required: request.amount.normalize().to_string(),
                available: from_base_units(balance, token.decimals),
            });
        }
        transfer.advance(TransferStatus::BalanceChecked);

        let quote = self
            .provider
            .quote(&QuoteRequest {
                from_chain: request.source,
                to_chain: request.destination,
                from_token: token.address,
                to_token: destination_token
                    .map(|t| format!("{:?}", t.address))
                    .unwrap_or_else(|| token.symbol.clone()),
                amount: units,
                from_address: wallet,
                to_address: transfer.receiver(),
            })
            .await?;

        if !token.is_native {
            self.ensure_allowance(source, &token, quote.spender(), units, status).await?;
            transfer.advance(TransferStatus::Approved);
        }

        let value = match (token.is_native, quote.value.is_zero()) {
            (true, true) => units,
            _ => quote.value,
        };
        let call = TxRequest::new()
            .to(quote.target)
            .data(quote.data.clone())
            .value(value)
            .gas_limit(self.config.gas_ceiling);

        let pre_balance = balance_of(reader, &token, wallet).await?;
        let tx_hash = self.submit(source, call).await?;
        transfer.record_source_tx(tx_hash);
        transfer.advance(TransferStatus::Submitted);
        info!(transfer = transfer.id(), ?tx_hash, "bridge transfer submitted");
        status.milestone(
            Some(tx_hash),
            format!(
                "Transfer submitted on {}: {}",
                request.source,
                request.source.explorer_tx_url(tx_hash)
            ),
        );

        transfer.advance(TransferStatus::Verifying);
        let verification = self
            .verify(reader, &token, wallet, pre_balance, units, tx_hash, cancel)
            .await;
        Ok(Submission {
            tx_hash,
            verification,
            estimated_output: quote.estimated_output,
        })
    }

    async fn ensure_allowance(
        &self,
        source: &ChainClients,
        token: &TokenDescriptor,
        spender: Address,
        units: U256,
        status: &StatusSink,
    ) -> BridgeResult<()> {
        let wallet = source.wallet();
        let allowance = source.reader.erc20_allowance(token.address, wallet, spender).await?;
        if allowance >= units {
            return Ok(());
        }

        status.milestone(None, format!("Approve {} for the bridge in your wallet.", token.symbol));
        let approve = TxRequest::new()
            .to(token.address)
            .data(abi::approve(spender, units));
        let tx_hash = source.writer.send_transaction(approve).await?;
        let receipt = source.reader.wait_for_receipt(tx_hash).await?;
        if receipt.reverted() {
            return Err(BridgeError::Reverted { tx_hash });
        }
        info!(?tx_hash, ?spender, "approval confirmed");
        status.milestone(Some(tx_hash), "Approval confirmed.");
        Ok(())
    }

    /// Sends with the fixed gas ceiling. When the signer still trips over
    /// gas estimation, resends as a legacy transaction with an explicit gas
    /// price.
    async fn submit(&self, source: &ChainClients, call: TxRequest) -> BridgeResult<H256> {
        match source.writer.send_transaction(call.clone()).await {
            Ok(tx_hash) => Ok(tx_hash),
            Err(error) if error.is_gas_estimation() => {
                warn!(%error, gas_ceiling = self.config.gas_ceiling, "gas estimation failed, resending with manual gas");
                let gas_price = source.reader.gas_price().await?;
                Ok(source.writer.send_transaction(call.gas_price(gas_price)).await?)
            }
            Err(error) => Err(error.into()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn verify(
        &self,
        reader: &dyn ChainReader,
        token: &TokenDescriptor,
        wallet: Address,
        pre_balance: U256,
        units: U256,
        tx_hash: H256,
        cancel: &CancellationToken,
    ) -> Verification {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(?tx_hash, "verification cancelled");
                return Verification::Inconclusive;
            }
            _ = tokio::time::sleep(Duration::from_secs(self.config.verification_delay_secs)) => {}
        }

        match balance_of(reader, token, wallet).await {
            // native balances also drop by the gas fee, so require the value
            Ok(post) if token.is_native && pre_balance.saturating_sub(post) >= units => {
                return Verification::Confirmed
            }
            Ok(post) if !token.is_native && post < pre_balance => return Verification::Confirmed,
            Ok(_) => {}
            Err(error) => warn!(%error, "post-transfer balance read failed"),
        }

        match reader.receipt(tx_hash).await {
            Ok(Some(receipt)) if receipt.reverted() => Verification::Reverted,
            Ok(Some(receipt)) if receipt.succeeded() => Verification::Confirmed,
            Ok(_) => Verification::Inconclusive,
            Err(error) => {
                warn!(%error, ?tx_hash, "receipt read failed");
                Verification::Inconclusive
            }
        }
    }

    fn spawn_poller(
        &self,
        request: &ValidatedRequest,
        tx_hash: H256,
        explorer: String,
        cancel: CancellationToken,
    ) -> ReceiverStream<StatusUpdate> {
        let probe: Arc<dyn StatusProbe> = Arc::new(ProviderProbe::new(
            self.provider.clone(),
            request.source,
            request.destination,
        ));
        StatusPoller::new(self.config.poller.clone())
            .with_explorer_url(explorer)
            .spawn(tx_hash, Some(probe), cancel)
    }
}

async fn balance_of(reader: &dyn ChainReader, token: &TokenDescriptor, owner: Address) -> BridgeResult<U256> {
    let balance = if token.is_native {
        reader.native_balance(owner).await?
    } else {
        reader.erc20_balance(token.address, owner).await?
    };
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::Chain;
    use crate::provider::{ProviderStatus, Quote};
    use crate::tokens::TokenRegistry;
    use async_trait::async_trait;
    use ethereum_contracts::mock::MockChain;
    use ethereum_contracts::ChainError;
    use ethers::types::Bytes;

    const USDC_BASE: u64 = 0xba5e;
    const ROUTER: u64 = 0x1f1;

    struct FakeProvider {
        destination_known: bool,
    }

    #[async_trait]
    impl TokenRegistry for FakeProvider {
        async fn lookup(&self, chain_id: u64, token: &str) -> BridgeResult<Option<TokenDescriptor>> {
            if chain_id != Chain::Base.provider_id() && !self.destination_known {
                return Ok(None);
            }
            Ok(Some(TokenDescriptor {
                chain_id,
                symbol: token.to_uppercase(),
                address: Address::from_low_u64_be(USDC_BASE),
                decimals: 6,
                is_native: false,
            }))
        }
    }

    #[async_trait]
    impl BridgeProvider for FakeProvider {
        async fn quote(&self, _request: &QuoteRequest) -> BridgeResult<Quote> {
            Ok(Quote {
                target: Address::from_low_u64_be(ROUTER),
                data: Bytes::from(vec![0xab, 0xcd, 0xef, 0x01]),
                value: U256::zero(),
                approval_address: None,
                estimated_output: None,
            })
        }

        async fn status(&self, _tx_hash: H256, _from: Chain, _to: Chain) -> BridgeResult<ProviderStatus> {
            Ok(ProviderStatus::Pending)
        }
    }

    fn orchestrator(destination_known: bool, policy: DestinationTokenPolicy) -> GenericBridgeOrchestrator {
        let provider = Arc::new(FakeProvider { destination_known });
        let config = GenericBridgeConfig {
            verification_delay_secs: 0,
            destination_token_policy: policy,
            poller: PollerConfig {
                interval_secs: 0,
                max_attempts: 2,
            },
            ..Default::default()
        };
        GenericBridgeOrchestrator::new(
            provider.clone(),
            Arc::new(TokenResolver::new(provider)),
            Arc::new(MinimumAmountPolicy::default()),
            config,
        )
    }

    async fn funded_chain(wallet: Address) -> MockChain {
        let chain = MockChain::new(Chain::Base.native_id(), wallet);
        chain
            .set_token_balance(Address::from_low_u64_be(USDC_BASE), wallet, U256::from(50_000_000u64))
            .await;
        chain
    }

    fn request() -> TransferRequest {
        TransferRequest {
            source_chain: Some("base".into()),
            destination_chain: Some("arbitrum".into()),
            token: Some("USDC".into()),
            amount: Some("10".into()),
            receiver: None,
            connected_chain_id: Some(8453),
        }
    }

    #[tokio::test]
    async fn test_gas_estimation_failure_falls_back_to_legacy() {
        let wallet = Address::from_low_u64_be(0xa11ce);
        let chain = funded_chain(wallet).await;
        chain
            .set_allowance(
                Address::from_low_u64_be(USDC_BASE),
                wallet,
                Address::from_low_u64_be(ROUTER),
                U256::MAX,
            )
            .await;
        chain.fail_next_send(ChainError::GasEstimation("cannot estimate gas".into())).await;
        let clients = ChainClients::new(Arc::new(chain.clone()), Arc::new(chain.clone()));

        let outcome = orchestrator(true, DestinationTokenPolicy::Warn)
            .execute(&request(), &clients, CancellationToken::new(), &StatusSink::disabled())
            .await
            .unwrap();

        let sent = chain.sent_transactions().await;
        assert_eq!(sent.len(), 2);
        assert!(!sent[0].is_legacy());
        assert!(sent[1].is_legacy());
        assert_eq!(sent[1].gas_limit, Some(U256::from(2_000_000u64)));
        // receipt succeeded even though the mock did not debit the balance
        assert_eq!(outcome.verification, Verification::Confirmed);
        assert_eq!(outcome.transfer.status(), &TransferStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_reverted_receipt_is_suspected_failure() {
        let wallet = Address::from_low_u64_be(0xa11ce);
        let chain = funded_chain(wallet).await;
        let clients = ChainClients::new(Arc::new(chain.clone()), Arc::new(chain.clone()));

        // allowance already in place; the transfer call itself reverts
        let orchestrator = orchestrator(true, DestinationTokenPolicy::Warn);
        let token = Address::from_low_u64_be(USDC_BASE);
        let spender = Address::from_low_u64_be(ROUTER);
        chain.set_allowance(token, wallet, spender, U256::MAX).await;
        chain.set_send_status(Some(0)).await;

        let outcome = orchestrator
            .execute(&request(), &clients, CancellationToken::new(), &StatusSink::disabled())
            .await
            .unwrap();
        assert_eq!(outcome.verification, Verification::Reverted);
        assert_eq!(outcome.transfer.status(), &TransferStatus::SuspectedFailure);
        assert!(outcome.progress.is_none());
    }

    #[tokio::test]
    async fn test_missing_receipt_keeps_polling() {
        let wallet = Address::from_low_u64_be(0xa11ce);
        let chain = funded_chain(wallet).await;
        chain
            .set_allowance(
                Address::from_low_u64_be(USDC_BASE),
                wallet,
                Address::from_low_u64_be(ROUTER),
                U256::MAX,
            )
            .await;
        chain.withhold_receipts(true).await;
        let clients = ChainClients::new(Arc::new(chain.clone()), Arc::new(chain.clone()));
        let (sink, mut updates) = StatusSink::channel();

        let outcome = orchestrator(true, DestinationTokenPolicy::Warn)
            .execute(&request(), &clients, CancellationToken::new(), &sink)
            .await
            .unwrap();
        assert_eq!(outcome.verification, Verification::Inconclusive);
        assert_eq!(outcome.transfer.status(), &TransferStatus::Verifying);
        assert!(outcome.progress.is_some());

        drop(sink);
        let mut kinds = Vec::new();
        while let Some(update) = updates.recv().await {
            kinds.push(update.kind);
        }
        assert!(kinds.contains(&crate::updates::StatusKind::Warning));
    }

    #[tokio::test]
    async fn test_cancellation_cuts_verification_delay_short() {
        let wallet = Address::from_low_u64_be(0xa11ce);
        let chain = funded_chain(wallet).await;
        chain
            .set_allowance(
                Address::from_low_u64_be(USDC_BASE),
                wallet,
                Address::from_low_u64_be(ROUTER),
                U256::MAX,
            )
            .await;
        chain.withhold_receipts(true).await;
        let clients = ChainClients::new(Arc::new(chain.clone()), Arc::new(chain.clone()));
        let mut orchestrator = orchestrator(true, DestinationTokenPolicy::Warn);
        orchestrator.config.verification_delay_secs = 3_600;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.execute(&request(), &clients, cancel, &StatusSink::disabled()),
        )
        .await
        .expect("verification delay outlived cancellation")
        .unwrap();

        assert_eq!(outcome.verification, Verification::Inconclusive);
        assert_eq!(chain.sent_transactions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_destination_token_policy() {
        let wallet = Address::from_low_u64_be(0xa11ce);

        let chain = funded_chain(wallet).await;
        let clients = ChainClients::new(Arc::new(chain.clone()), Arc::new(chain.clone()));
        let failure = orchestrator(false, DestinationTokenPolicy::Require)
            .execute(&request(), &clients, CancellationToken::new(), &StatusSink::disabled())
            .await
            .unwrap_err();
        assert!(matches!(failure.error, BridgeError::TokenNotFound { .. }));
        assert!(chain.sent_transactions().await.is_empty());
        assert_eq!(failure.transfer.unwrap().status().label(), "FAILED");

        let chain = funded_chain(wallet).await;
        let clients = ChainClients::new(Arc::new(chain.clone()), Arc::new(chain.clone()));
        let outcome = orchestrator(false, DestinationTokenPolicy::Warn)
            .execute(&request(), &clients, CancellationToken::new(), &StatusSink::disabled())
            .await
            .unwrap();
        assert_eq!(outcome.verification, Verification::Confirmed);
        // approve then transfer
        assert_eq!(chain.sent_transactions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_clients_for_wrong_chain() {
        let wallet = Address::from_low_u64_be(0xa11ce);
        let chain = MockChain::new(Chain::Ethereum.native_id(), wallet);
        let clients = ChainClients::new(Arc::new(chain.clone()), Arc::new(chain.clone()));
        let mut request = request();
        request.connected_chain_id = None;

        let failure = orchestrator(true, DestinationTokenPolicy::Warn)
            .execute(&request, &clients, CancellationToken::new(), &StatusSink::disabled())
            .await
            .unwrap_err();
        assert!(matches!(failure.error, BridgeError::ChainMismatch { connected: 1, .. }));
        assert!(failure.transfer.is_none());
        assert_eq!(chain.call_count().await, 0);
    }
}
