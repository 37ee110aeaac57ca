use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
use commands::{bridge, chains, load_settings};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON settings file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use testnet gateway contracts from the settings file
    #[arg(long)]
    testnet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported chains and their ids
    Chains,
    /// Show the minimum transfer amount for a route
    Minimum {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        token: String,
    },
    /// Bridge through the aggregator
    Transfer(TransferArgs),
    /// Bridge through the Ethereum <-> Sonic gateway
    Gateway(TransferArgs),
    /// Finish a gateway transfer whose claim did not complete
    Claim {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        tx_hash: String,
    },
    /// Check aggregator transfer status
    Status {
        #[arg(long)]
        tx_hash: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
}

#[derive(Args)]
struct TransferArgs {
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: String,
    #[arg(long)]
    token: String,
    #[arg(long)]
    amount: String,
    #[arg(long)]
    receiver: Option<String>,
}

impl TransferArgs {
    fn into_request(self, native: bool) -> bridge::TransferArgs {
        bridge::TransferArgs {
            from: self.from,
            to: self.to,
            token: self.token,
            amount: self.amount,
            receiver: self.receiver,
            native,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref(), cli.testnet)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping");
            on_interrupt.cancel();
        }
    });

    let result = match cli.command {
        Commands::Chains => chains::list(&settings),
        Commands::Minimum { from, to, token } => chains::minimum(&settings, &from, &to, &token),
        Commands::Transfer(args) => {
            info!(from = %args.from, to = %args.to, token = %args.token, amount = %args.amount, "transfer requested");
            bridge::transfer(&settings, args.into_request(false), cancel).await
        }
        Commands::Gateway(args) => {
            info!(from = %args.from, to = %args.to, token = %args.token, amount = %args.amount, "gateway transfer requested");
            bridge::transfer(&settings, args.into_request(true), cancel).await
        }
        Commands::Claim { from, to, tx_hash } => {
            info!(%from, %to, %tx_hash, "resuming claim");
            bridge::claim(&settings, &from, &to, &tx_hash, cancel).await
        }
        Commands::Status { tx_hash, from, to } => bridge::status(&settings, &tx_hash, &from, &to).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

// Example usage:
/*
$ BRIDGE_PRIVATE_KEY=... bridge-cli transfer --from base --to arb --token USDC --amount 25
$ BRIDGE_PRIVATE_KEY=... bridge-cli gateway --from ethereum --to sonic --token USDC --amount 10
$ BRIDGE_PRIVATE_KEY=... bridge-cli claim --from ethereum --to sonic --tx-hash 0x...
$ bridge-cli status --tx-hash 0x... --from base --to arb
$ bridge-cli minimum --from sonic --to ethereum --token USDC
*/
