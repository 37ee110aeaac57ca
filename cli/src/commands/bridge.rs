use crate::commands::{create_progress_bar, CommandError, CommandResult};
use colored::*;
use cross_chain_bridge::actions::{ACTION_BRIDGE, ACTION_NATIVE_BRIDGE};
use cross_chain_bridge::{
    ActionContext, ActionRequest, BridgeProvider, BridgeSettings, Chain, ChainClients, Direction,
    HttpBridgeProvider, ProviderStatus, StatusKind, StatusSink, StatusUpdate,
};
use ethereum_contracts::{EthersChainClient, EthersSigner};
use ethers::types::H256;
use futures::StreamExt;
use indicatif::ProgressBar;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const PRIVATE_KEY_ENV: &str = "BRIDGE_PRIVATE_KEY";

pub struct TransferArgs {
    pub from: String,
    pub to: String,
    pub token: String,
    pub amount: String,
    pub receiver: Option<String>,
    pub native: bool,
}

pub async fn transfer(settings: &BridgeSettings, args: TransferArgs, cancel: CancellationToken) -> CommandResult<()> {
    let source: Chain = args.from.parse()?;
    let chains = if args.native {
        vec![Chain::Ethereum, Chain::Sonic]
    } else {
        vec![source]
    };
    let (context, updates) = connect(settings, &chains, cancel)?;

    let mut parameters = HashMap::from([
        ("fromChain".to_string(), args.from.clone()),
        ("toChain".to_string(), args.to.clone()),
        ("token".to_string(), args.token.clone()),
        ("amount".to_string(), args.amount.clone()),
    ]);
    if let Some(receiver) = args.receiver {
        parameters.insert("receiver".to_string(), receiver);
    }
    let request = ActionRequest {
        action: if args.native { ACTION_NATIVE_BRIDGE } else { ACTION_BRIDGE }.to_string(),
        parameters,
        wallet_address: None,
        connected_chain_id: Some(source.native_id()),
    };

    let pb = create_progress_bar(format!(
        "Bridging {} {} from {} to {}...",
        args.amount, args.token, args.from, args.to
    ));
    let relay = relay(pb.clone(), updates);
    let response = context.dispatch(request).await;
    drop(context);
    let _ = relay.await;

    if matches!(response.status.as_deref(), None | Some("FAILED") | Some("SUSPECTED_FAILURE")) {
        pb.finish_and_clear();
        return Err(CommandError::Failed(response.message));
    }
    pb.println(format!("{} {}", "✓".green(), response.message));

    if let Some(mut progress) = response.progress {
        pb.set_message("Waiting for delivery on the destination chain...");
        while let Some(update) = progress.next().await {
            show(&pb, &update);
        }
    }
    pb.finish_and_clear();
    Ok(())
}

pub async fn claim(
    settings: &BridgeSettings,
    from: &str,
    to: &str,
    tx_hash: &str,
    cancel: CancellationToken,
) -> CommandResult<()> {
    let direction = Direction::from_chains(from.parse()?, to.parse()?)?;
    let tx_hash = parse_hash(tx_hash)?;
    let (context, updates) = connect(settings, &[Chain::Ethereum, Chain::Sonic], cancel.clone())?;
    let clients = context.gateway_clients()?;

    let pb = create_progress_bar(format!("Resuming claim for {:?}...", tx_hash));
    let relay = relay(pb.clone(), updates);
    let result = context
        .native()
        .resume_claim(direction, tx_hash, &clients, &cancel, context.status())
        .await;
    drop(context);
    let _ = relay.await;
    pb.finish_and_clear();

    let transfer = result.map_err(|failure| CommandError::Failed(failure.user_message()))?;
    println!("\n{}", "Claim complete".green().bold());
    println!("Transfer: {}", transfer.id());
    println!("Status: {}", transfer.status());
    if let Some(hash) = transfer.destination_tx_hash() {
        println!("Claim transaction: {}", transfer.destination_chain().explorer_tx_url(hash));
    }
    Ok(())
}

pub async fn status(settings: &BridgeSettings, tx_hash: &str, from: &str, to: &str) -> CommandResult<()> {
    let from: Chain = from.parse()?;
    let to: Chain = to.parse()?;
    let tx_hash = parse_hash(tx_hash)?;
    let provider = HttpBridgeProvider::new(settings.provider_url.clone(), settings.provider_api_key.clone())?;

    let pb = create_progress_bar(format!("Checking bridge status for tx: {:?}...", tx_hash));
    let status = provider.status(tx_hash, from, to).await;
    pb.finish_and_clear();

    println!("\nBridge Transaction Status:");
    println!("Transaction: {}", from.explorer_tx_url(tx_hash));
    match status? {
        ProviderStatus::Pending => println!("Status: {}", "in progress".yellow()),
        ProviderStatus::Released { destination_tx_hash } => {
            println!("Status: {}", "delivered".green());
            if let Some(hash) = destination_tx_hash {
                println!("Destination transaction: {}", to.explorer_tx_url(hash));
            }
        }
        ProviderStatus::Failed(reason) => println!("Status: {} ({})", "failed".red(), reason),
    }
    Ok(())
}

fn connect(
    settings: &BridgeSettings,
    chains: &[Chain],
    cancel: CancellationToken,
) -> CommandResult<(ActionContext, UnboundedReceiver<StatusUpdate>)> {
    let key = std::env::var(PRIVATE_KEY_ENV).map_err(|_| CommandError::MissingEnv(PRIVATE_KEY_ENV))?;
    let mut clients = HashMap::new();
    for &chain in chains {
        let reader = EthersChainClient::new(settings.rpc_url(chain)?, chain.native_id())?;
        let signer = EthersSigner::new(&reader, &key)?;
        debug!(chain = %chain, "connected");
        clients.insert(chain, ChainClients::new(Arc::new(reader), Arc::new(signer)));
    }

    let (sink, updates) = StatusSink::channel();
    let context = ActionContext::new(settings, clients)?
        .with_status(sink)
        .with_cancellation(cancel);
    Ok((context, updates))
}

/// Mirrors orchestrator updates onto the spinner until the sink is dropped.
fn relay(pb: ProgressBar, mut updates: UnboundedReceiver<StatusUpdate>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            show(&pb, &update);
        }
    })
}

fn show(pb: &ProgressBar, update: &StatusUpdate) {
    match update.kind {
        StatusKind::Warning | StatusKind::ProviderFailed => {
            pb.println(format!("{} {}", "!".yellow().bold(), update.message))
        }
        StatusKind::Released => pb.println(format!("{} {}", "✓".green(), update.message)),
        StatusKind::Narrative | StatusKind::StillInProgress | StatusKind::Cancelled => {
            pb.println(update.message.dimmed().to_string())
        }
        _ => pb.set_message(update.message.clone()),
    }
}

fn parse_hash(raw: &str) -> CommandResult<H256> {
    raw.trim()
        .parse::<H256>()
        .map_err(|_| CommandError::Failed(format!("{} is not a transaction hash", raw)))
}
