//! Ethereum <-> Sonic gateway pathway: deposit on the source chain, wait for
//! the destination state oracle to pass the deposit block, prove the record
//! and claim it on the destination chain.

use ethereum_contracts::abi::{self, GatewayRecord};
use ethereum_contracts::utils::{looks_like_address, parse_address};
use ethereum_contracts::{ProofGenerator, RecordKind, TxRequest};
use ethers::types::{Address, Bytes, H256, U256};
use metrics::counter;
use oracle_integrations::{OracleError, OracleProgress, StateOracle, StateOracleWaiter};
use rand::rngs::OsRng;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chains::{Chain, GatewayContracts};
use crate::error::{BridgeError, BridgeResult, TransferFailure};
use crate::minimums::MinimumAmountPolicy;
use crate::request::{from_base_units, to_base_units, ChainClients, TransferRequest};
use crate::tokens::TokenResolver;
use crate::transfer::{BridgeTransfer, Pathway, TransferStatus};
use crate::updates::{StatusKind, StatusSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    EthereumToSonic,
    SonicToEthereum,
}

impl Direction {
    pub fn from_chains(source: Chain, destination: Chain) -> BridgeResult<Self> {
        match (source, destination) {
            (Chain::Ethereum, Chain::Sonic) => Ok(Direction::EthereumToSonic),
            (Chain::Sonic, Chain::Ethereum) => Ok(Direction::SonicToEthereum),
            _ => Err(BridgeError::UnsupportedChain(format!(
                "{} to {} (the gateway only connects Ethereum and Sonic)",
                source, destination
            ))),
        }
    }

    pub fn source(self) -> Chain {
        match self {
            Direction::EthereumToSonic => Chain::Ethereum,
            Direction::SonicToEthereum => Chain::Sonic,
        }
    }

    pub fn destination(self) -> Chain {
        match self {
            Direction::EthereumToSonic => Chain::Sonic,
            Direction::SonicToEthereum => Chain::Ethereum,
        }
    }

    fn record_kind(self) -> RecordKind {
        match self {
            Direction::EthereumToSonic => RecordKind::Deposit,
            Direction::SonicToEthereum => RecordKind::Withdrawal,
        }
    }

    fn event(self) -> &'static str {
        match self {
            Direction::EthereumToSonic => abi::DEPOSIT_EVENT,
            Direction::SonicToEthereum => abi::WITHDRAWAL_EVENT,
        }
    }
}

/// Contracts one direction touches.
struct GatewayRoute {
    token_pairs: Address,
    source_gateway: Address,
    destination_gateway: Address,
    destination_oracle: Address,
}

fn route(contracts: &GatewayContracts, direction: Direction) -> GatewayRoute {
    match direction {
        Direction::EthereumToSonic => GatewayRoute {
            token_pairs: contracts.ethereum_token_pairs,
            source_gateway: contracts.ethereum_token_deposit,
            destination_gateway: contracts.sonic_bridge,
            destination_oracle: contracts.sonic_state_oracle,
        },
        Direction::SonicToEthereum => GatewayRoute {
            token_pairs: contracts.sonic_token_pairs,
            source_gateway: contracts.sonic_bridge,
            destination_gateway: contracts.ethereum_token_deposit,
            destination_oracle: contracts.ethereum_state_oracle,
        },
    }
}

/// Client pairs for both gateway chains.
#[derive(Clone)]
pub struct GatewayClients {
    pub ethereum: ChainClients,
    pub sonic: ChainClients,
}

impl GatewayClients {
    pub fn side(&self, chain: Chain) -> &ChainClients {
        match chain {
            Chain::Sonic => &self.sonic,
            _ => &self.ethereum,
        }
    }
}

pub struct NativeBridgeOrchestrator {
    contracts: GatewayContracts,
    waiter: StateOracleWaiter,
    minimums: Arc<MinimumAmountPolicy>,
    tokens: Option<Arc<TokenResolver>>,
}

impl NativeBridgeOrchestrator {
    pub fn new(contracts: GatewayContracts, waiter: StateOracleWaiter, minimums: Arc<MinimumAmountPolicy>) -> Self {
        Self {
            contracts,
            waiter,
            minimums,
            tokens: None,
        }
    }

    /// Lets requests name tokens by symbol instead of address.
    pub fn with_token_resolver(mut self, tokens: Arc<TokenResolver>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub async fn execute(
        &self,
        request: &TransferRequest,
        clients: &GatewayClients,
        cancel: &CancellationToken,
        status: &StatusSink,
    ) -> Result<BridgeTransfer, TransferFailure> {
        let validated = request.validate(&self.minimums)?;
        let direction = Direction::from_chains(validated.source, validated.destination)?;
        let wallet = clients.side(direction.source()).wallet();
        if let Some(receiver) = validated.receiver {
            if receiver != wallet {
                return Err(BridgeError::InvalidAddress(format!(
                    "{:?} (gateway claims always pay the depositing wallet {:?})",
                    receiver, wallet
                ))
                .into());
            }
        }

        let mut transfer = BridgeTransfer::new(
            Pathway::Native,
            validated.source,
            validated.destination,
            validated.token.clone(),
            validated.amount,
            wallet,
        );
        counter!("bridge_transfers_started", "pathway" => "native").increment(1);
        info!(
            transfer = transfer.id(),
            ?direction,
            token = %validated.token,
            amount = %validated.amount,
            "starting gateway transfer"
        );

        let result = self.deposit_and_claim(&mut transfer, direction, clients, cancel, status).await;
        finish(transfer, result)
    }

    /// Picks up a deposit or withdrawal that was already made, from the
    /// oracle wait onwards.
    pub async fn resume_claim(
        &self,
        direction: Direction,
        source_tx_hash: H256,
        clients: &GatewayClients,
        cancel: &CancellationToken,
        status: &StatusSink,
    ) -> Result<BridgeTransfer, TransferFailure> {
        let route = route(&self.contracts, direction);
        let source = clients.side(direction.source());

        let receipt = source
            .reader
            .wait_for_receipt(source_tx_hash)
            .await
            .map_err(BridgeError::from)?;
        let record = GatewayRecord::from_receipt(&receipt, route.source_gateway, direction.event())
            .map_err(BridgeError::from)?;
        let claimant = clients.side(direction.destination()).wallet();
        if record.owner != claimant {
            return Err(BridgeError::InvalidAddress(format!(
                "{:?} (record {} belongs to {:?})",
                claimant, record.id, record.owner
            ))
            .into());
        }

        // original tokens live on Ethereum in both directions
        let decimals = clients
            .ethereum
            .reader
            .erc20_decimals(record.token)
            .await
            .map_err(BridgeError::from)?;
        let amount = Decimal::from_str(&from_base_units(record.amount, decimals))
            .map_err(|e| BridgeError::InvalidAmount(e.to_string()))?;

        let mut transfer = BridgeTransfer::new(
            Pathway::Native,
            direction.source(),
            direction.destination(),
            format!("{:?}", record.token),
            amount,
            record.owner,
        );
        transfer.record_source_tx(source_tx_hash);
        transfer.record_source_block(record.block_number);
        transfer.record_id_from_event(record.id);
        transfer.advance(TransferStatus::Deposited);
        info!(transfer = transfer.id(), record = %record.id, ?source_tx_hash, "resuming gateway claim");

        let result = self.claim(&mut transfer, direction, &record, clients, cancel, status).await;
        finish(transfer, result)
    }

    async fn deposit_and_claim(
        &self,
        transfer: &mut BridgeTransfer,
        direction: Direction,
        clients: &GatewayClients,
        cancel: &CancellationToken,
        status: &StatusSink,
    ) -> BridgeResult<()> {
        let route = route(&self.contracts, direction);
        let source = clients.side(direction.source());
        let wallet = source.wallet();

        let token = self.source_token(direction.source(), transfer.token()).await?;
        let pair_call = match direction {
            Direction::EthereumToSonic => abi::original_to_minted(token),
            Direction::SonicToEthereum => abi::minted_to_original(token),
        };
        let counterpart = abi::decode_address(&source.reader.call(route.token_pairs, pair_call).await?)?;
        if counterpart.is_zero() {
            return Err(BridgeError::UnsupportedToken(transfer.token().to_string()));
        }
        transfer.advance(TransferStatus::TokenPairVerified);
        info!(?token, ?counterpart, "token pair verified");

        // minimums key on the original token's symbol, not the address
        let original = match direction {
            Direction::EthereumToSonic => token,
            Direction::SonicToEthereum => counterpart,
        };
        let symbol = clients.ethereum.reader.erc20_symbol(original).await?;
        self.minimums
            .check(direction.source(), direction.destination(), &symbol, transfer.amount())?;

        let decimals = source.reader.erc20_decimals(token).await?;
        let units = to_base_units(transfer.amount(), decimals)?;
        let balance = source.reader.erc20_balance(token, wallet).await?;
        if balance < units {
            return Err(BridgeError::InsufficientBalance {
                symbol,
                required: transfer.amount().normalize().to_string(),
                available: from_base_units(balance, decimals),
            });
        }

        if direction == Direction::EthereumToSonic {
            self.ensure_allowance(source, token, route.source_gateway, units, status).await?;
        }

        let uid = random_uid();
        let data = match direction {
            Direction::EthereumToSonic => abi::gateway_deposit(uid, token, units)?,
            Direction::SonicToEthereum => abi::gateway_withdraw(uid, counterpart, units)?,
        };
        status.milestone(None, format!("Confirm the {} in your wallet.", action_name(direction)));
        let tx_hash = source
            .writer
            .send_transaction(TxRequest::new().to(route.source_gateway).data(data))
            .await?;
        let receipt = source.reader.wait_for_receipt(tx_hash).await?;
        if receipt.reverted() {
            return Err(BridgeError::Reverted { tx_hash });
        }

        let record = GatewayRecord::from_receipt(&receipt, route.source_gateway, direction.event())?;
        transfer.record_source_tx(tx_hash);
        transfer.record_source_block(record.block_number);
        transfer.record_id_from_event(record.id);
        transfer.advance(TransferStatus::Deposited);
        info!(
            transfer = transfer.id(),
            ?tx_hash,
            record = %record.id,
            block = record.block_number,
            "gateway {} recorded",
            action_name(direction)
        );
        status.milestone(
            Some(tx_hash),
            format!(
                "{} recorded on {} as #{} in block {}: {}",
                capitalize(action_name(direction)),
                direction.source(),
                record.id,
                record.block_number,
                direction.source().explorer_tx_url(tx_hash)
            ),
        );

        self.claim(transfer, direction, &record, clients, cancel, status).await
    }

    async fn claim(
        &self,
        transfer: &mut BridgeTransfer,
        direction: Direction,
        record: &GatewayRecord,
        clients: &GatewayClients,
        cancel: &CancellationToken,
        status: &StatusSink,
    ) -> BridgeResult<()> {
        let route = route(&self.contracts, direction);
        let source = clients.side(direction.source());
        let destination = clients.side(direction.destination());
        let source_tx = transfer.source_tx_hash();
        let resume_hint = format!(
            "record {} from transaction {:?} is safe; resume the claim with that transaction hash",
            record.id,
            source_tx.unwrap_or_default()
        );

        status.emit(
            source_tx,
            StatusKind::Waiting,
            format!(
                "Waiting for the {} state oracle to reach {} block {}.",
                direction.destination(),
                direction.source(),
                record.block_number
            ),
        );
        let oracle = StateOracle::new(route.destination_oracle);
        let ack = self
            .waiter
            .wait(
                destination.reader.as_ref(),
                &oracle,
                record.block_number,
                cancel,
                |progress: &OracleProgress| {
                    status.emit(source_tx, StatusKind::Waiting, waiting_message(progress));
                },
            )
            .await
            .map_err(|error| match error {
                OracleError::Cancelled { .. } => BridgeError::Cancelled(resume_hint.clone()),
                OracleError::Timeout { .. } => BridgeError::OracleTimeout(format!("{}; {}", error, resume_hint)),
                other => other.into(),
            })?;
        transfer.advance(TransferStatus::OracleSynced);

        let proof = ProofGenerator::generate_proof(
            source.reader.as_ref(),
            route.source_gateway,
            record.id,
            direction.record_kind(),
            Some(ack.oracle_block),
        )
        .await?;
        transfer.attach_proof(proof.clone());
        transfer.advance(TransferStatus::ProofReady);

        let claim_hash = self.submit_claim(destination, route.destination_gateway, record, proof, status).await?;
        transfer.record_destination(claim_hash);
        transfer.advance(TransferStatus::Claimed);
        counter!("bridge_claims_submitted").increment(1);
        info!(transfer = transfer.id(), ?claim_hash, record = %record.id, "gateway claim confirmed");
        status.milestone(
            Some(claim_hash),
            format!(
                "Claimed on {}: {}",
                direction.destination(),
                direction.destination().explorer_tx_url(claim_hash)
            ),
        );
        Ok(())
    }

    async fn submit_claim(
        &self,
        destination: &ChainClients,
        gateway: Address,
        record: &GatewayRecord,
        proof: Bytes,
        status: &StatusSink,
    ) -> BridgeResult<H256> {
        status.milestone(None, "Confirm the claim in your wallet.");
        let data = abi::gateway_claim(record.id, record.token, record.amount, proof);
        let tx_hash = destination
            .writer
            .send_transaction(TxRequest::new().to(gateway).data(data))
            .await?;
        let receipt = destination.reader.wait_for_receipt(tx_hash).await?;
        if receipt.reverted() {
            return Err(BridgeError::Reverted { tx_hash });
        }
        Ok(tx_hash)
    }

    async fn ensure_allowance(
        &self,
        source: &ChainClients,
        token: Address,
        spender: Address,
        units: U256,
        status: &StatusSink,
    ) -> BridgeResult<()> {
        let allowance = source.reader.erc20_allowance(token, source.wallet(), spender).await?;
        if allowance >= units {
            return Ok(());
        }
        status.milestone(None, "Approve the gateway to move your tokens.");
        let tx_hash = source
            .writer
            .send_transaction(TxRequest::new().to(token).data(abi::approve(spender, units)))
            .await?;
        let receipt = source.reader.wait_for_receipt(tx_hash).await?;
        if receipt.reverted() {
            return Err(BridgeError::Reverted { tx_hash });
        }
        info!(?tx_hash, "gateway approval confirmed");
        Ok(())
    }

    async fn source_token(&self, chain: Chain, token: &str) -> BridgeResult<Address> {
        if looks_like_address(token) {
            return parse_address(token).map_err(|_| BridgeError::UnsupportedToken(token.to_string()));
        }
        let resolver = self
            .tokens
            .as_ref()
            .ok_or_else(|| BridgeError::UnsupportedToken(token.to_string()))?;
        let descriptor = resolver.resolve(chain, token).await?;
        if descriptor.is_native {
            return Err(BridgeError::UnsupportedToken(token.to_string()));
        }
        Ok(descriptor.address)
    }
}

fn finish(mut transfer: BridgeTransfer, result: BridgeResult<()>) -> Result<BridgeTransfer, TransferFailure> {
    match result {
        Ok(()) => Ok(transfer),
        Err(error) => {
            warn!(transfer = transfer.id(), status = %transfer.status(), %error, "gateway transfer failed");
            transfer.fail(error.to_string());
            counter!("bridge_transfers_failed", "pathway" => "native").increment(1);
            Err(TransferFailure::new(transfer, error))
        }
    }
}

/// Random `uint96` deposit id.
fn random_uid() -> u128 {
    OsRng.gen::<u128>() & abi::UINT96_MAX
}

fn action_name(direction: Direction) -> &'static str {
    match direction {
        Direction::EthereumToSonic => "deposit",
        Direction::SonicToEthereum => "withdrawal",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn waiting_message(progress: &OracleProgress) -> String {
    let seen = progress
        .oracle_block
        .map(|block| format!("at block {}", block))
        .unwrap_or_else(|| "not readable".to_string());
    format!(
        "State oracle {}, waiting for block {} ({}s elapsed, next check in {}s).",
        seen,
        progress.target_block,
        progress.elapsed.as_secs(),
        progress.next_poll_in.as_secs()
    )
}
