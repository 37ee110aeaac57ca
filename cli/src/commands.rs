pub mod bridge;
pub mod chains;

use cross_chain_bridge::{BridgeError, BridgeSettings, Environment};
use ethereum_contracts::ChainError;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("{0}")]
    Failed(String),
}

impl CommandError {
    pub fn user_message(&self) -> String {
        match self {
            CommandError::Bridge(e) => e.user_message(),
            CommandError::Chain(e) => BridgeError::from(e.clone()).user_message(),
            other => other.to_string(),
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Defaults when no file is given.
pub fn load_settings(path: Option<&Path>, testnet: bool) -> CommandResult<BridgeSettings> {
    let mut settings = match path {
        Some(path) => BridgeSettings::load(path)?,
        None => BridgeSettings::default(),
    };
    if testnet {
        settings.environment = Environment::Testnet;
    }
    Ok(settings)
}

pub(crate) fn create_progress_bar(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");
    pb.set_style(style);
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
