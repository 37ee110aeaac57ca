//! Time-boxed status polling for submitted generic transfers.
//!
//! The poller never reports success on its own. It escalates the detail of
//! its "still working" messages with elapsed time and ends with an
//! open-ended "check the explorer" message once the attempt ceiling is hit.
//! Only a provider probe reporting a release or failure ends it early.

use async_trait::async_trait;
use ethers::types::H256;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chains::Chain;
use crate::error::BridgeResult;
use crate::provider::{BridgeProvider, ProviderStatus};
use crate::updates::{StatusKind, StatusUpdate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub interval_secs: u64,
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            max_attempts: 20,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// One look at the outside world per poll attempt.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn probe(&self, tx_hash: H256) -> BridgeResult<ProviderStatus>;
}

/// Asks the bridge provider's status endpoint.
pub struct ProviderProbe {
    provider: Arc<dyn BridgeProvider>,
    from: Chain,
    to: Chain,
}

impl ProviderProbe {
    pub fn new(provider: Arc<dyn BridgeProvider>, from: Chain, to: Chain) -> Self {
        Self { provider, from, to }
    }
}

#[async_trait]
impl StatusProbe for ProviderProbe {
    async fn probe(&self, tx_hash: H256) -> BridgeResult<ProviderStatus> {
        self.provider.status(tx_hash, self.from, self.to).await
    }
}

#[derive(Debug, Clone)]
pub struct StatusPoller {
    config: PollerConfig,
    explorer_url: Option<String>,
}

impl StatusPoller {
    pub fn new(config: PollerConfig) -> Self {
        Self {
            config,
            explorer_url: None,
        }
    }

    /// Link included in the final message.
    pub fn with_explorer_url(mut self, url: impl Into<String>) -> Self {
        self.explorer_url = Some(url.into());
        self
    }

    /// Runs the poll loop on a background task and hands back its updates.
    pub fn spawn(
        &self,
        tx_hash: H256,
        probe: Option<Arc<dyn StatusProbe>>,
        cancel: CancellationToken,
    ) -> ReceiverStream<StatusUpdate> {
        let (tx, rx) = mpsc::channel(32);
        let poller = self.clone();
        tokio::spawn(async move { poller.run(tx_hash, probe, cancel, tx).await });
        ReceiverStream::new(rx)
    }

    /// Sleeps, probes, reports; at most `max_attempts` times. Stops early when
    /// the receiver goes away.
    pub async fn run(
        &self,
        tx_hash: H256,
        probe: Option<Arc<dyn StatusProbe>>,
        cancel: CancellationToken,
        updates: mpsc::Sender<StatusUpdate>,
    ) {
        let max_attempts = self.config.max_attempts.max(1);
        let interval = self.config.interval();
        let send = |kind: StatusKind, message: String| {
            let updates = updates.clone();
            async move { updates.send(StatusUpdate::new(Some(tx_hash), kind, message)).await.is_ok() }
        };

        for attempt in 1..=max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(?tx_hash, attempt, "status polling cancelled");
                    send(StatusKind::Cancelled, "Stopped watching this transfer. It keeps going on-chain.".into()).await;
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
            counter!("bridge_poll_attempts").increment(1);

            if let Some(probe) = &probe {
                match probe.probe(tx_hash).await {
                    Ok(ProviderStatus::Released { destination_tx_hash }) => {
                        info!(?tx_hash, ?destination_tx_hash, attempt, "provider reports release");
                        let message = match destination_tx_hash {
                            Some(hash) => format!(
                                "The bridge reports funds released on the destination chain in transaction {:?}. Check your destination wallet.",
                                hash
                            ),
                            None => "The bridge reports funds released on the destination chain. Check your destination wallet.".to_string(),
                        };
                        send(StatusKind::Released, message).await;
                        return;
                    }
                    Ok(ProviderStatus::Failed(reason)) => {
                        warn!(?tx_hash, %reason, attempt, "provider reports failure");
                        send(
                            StatusKind::ProviderFailed,
                            format!("The bridge reports a problem with this transfer: {}. Check the explorer before retrying.", reason),
                        )
                        .await;
                        return;
                    }
                    Ok(ProviderStatus::Pending) => debug!(?tx_hash, attempt, "still pending"),
                    Err(e) => warn!(?tx_hash, attempt, error = %e, "status probe failed"),
                }
            }

            let elapsed = interval * attempt;
            if attempt == max_attempts {
                let message = match &self.explorer_url {
                    Some(url) => format!(
                        "Still in progress after {}. Cross-chain transfers can take longer; check the explorer: {}",
                        minutes(elapsed),
                        url
                    ),
                    None => format!(
                        "Still in progress after {}. Cross-chain transfers can take longer; check the explorer for the latest status.",
                        minutes(elapsed)
                    ),
                };
                send(StatusKind::StillInProgress, message).await;
                return;
            }

            let (kind, message) = tier_message(attempt, elapsed);
            if !send(kind, message).await {
                return;
            }
            if let Some(narrative) = narrative_message(attempt) {
                if !send(StatusKind::Narrative, narrative.to_string()).await {
                    return;
                }
            }
        }
    }
}

fn tier_message(attempt: u32, elapsed: Duration) -> (StatusKind, String) {
    match attempt {
        1..=2 => (
            StatusKind::Tier1,
            format!("Waiting for source chain finality ({} elapsed).", minutes(elapsed)),
        ),
        3..=5 => (
            StatusKind::Tier2,
            format!("Waiting for bridge validators to confirm ({} elapsed).", minutes(elapsed)),
        ),
        _ => (
            StatusKind::Tier3,
            format!("Waiting for release on the destination chain ({} elapsed).", minutes(elapsed)),
        ),
    }
}

fn narrative_message(attempt: u32) -> Option<&'static str> {
    match attempt {
        4 => Some(
            "Your tokens have left the source chain. The bridge's validators are confirming the transfer, which usually takes a few minutes.",
        ),
        10 => Some(
            "This is taking longer than usual, which is normal when the destination chain is busy. Your funds are tracked by the bridge and nothing needs to be done yet.",
        ),
        _ => None,
    }
}

fn minutes(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else {
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_stream::StreamExt;

    struct ScriptedProbe {
        calls: AtomicU32,
        release_at: Option<u32>,
    }

    #[async_trait]
    impl StatusProbe for ScriptedProbe {
        async fn probe(&self, _tx_hash: H256) -> BridgeResult<ProviderStatus> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(call) == self.release_at {
                return Ok(ProviderStatus::Released {
                    destination_tx_hash: Some(H256::repeat_byte(9)),
                });
            }
            if call % 3 == 0 {
                return Err(BridgeError::Registry("connection reset".into()));
            }
            Ok(ProviderStatus::Pending)
        }
    }

    fn count(updates: &[StatusUpdate], kind: StatusKind) -> usize {
        updates.iter().filter(|u| u.kind == kind).count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_emits_single_final_message() {
        let probe = Arc::new(ScriptedProbe {
            calls: AtomicU32::new(0),
            release_at: None,
        });
        let started = tokio::time::Instant::now();
        let updates: Vec<_> = StatusPoller::new(PollerConfig::default())
            .spawn(H256::repeat_byte(1), Some(probe.clone() as Arc<dyn StatusProbe>), CancellationToken::new())
            .collect()
            .await;

        assert_eq!(probe.calls.load(Ordering::SeqCst), 20);
        assert_eq!(count(&updates, StatusKind::StillInProgress), 1);
        assert_eq!(updates.last().unwrap().kind, StatusKind::StillInProgress);
        assert_eq!(count(&updates, StatusKind::Tier1), 2);
        assert_eq!(count(&updates, StatusKind::Tier2), 3);
        assert_eq!(count(&updates, StatusKind::Tier3), 14);
        assert_eq!(count(&updates, StatusKind::Narrative), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(600));
        assert!(updates.iter().all(|u| u.tx_hash == Some(H256::repeat_byte(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_stops_polling() {
        let probe = Arc::new(ScriptedProbe {
            calls: AtomicU32::new(0),
            release_at: Some(5),
        });
        let updates: Vec<_> = StatusPoller::new(PollerConfig::default())
            .spawn(H256::zero(), Some(probe.clone() as Arc<dyn StatusProbe>), CancellationToken::new())
            .collect()
            .await;

        assert_eq!(probe.calls.load(Ordering::SeqCst), 5);
        assert_eq!(updates.last().unwrap().kind, StatusKind::Released);
        assert_eq!(count(&updates, StatusKind::StillInProgress), 0);
        assert_eq!(count(&updates, StatusKind::Narrative), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation() {
        let cancel = CancellationToken::new();
        let mut stream = StatusPoller::new(PollerConfig::default()).spawn(H256::zero(), None, cancel.clone());

        let first = stream.next().await.unwrap();
        assert_eq!(first.kind, StatusKind::Tier1);
        cancel.cancel();
        let rest: Vec<_> = stream.collect().await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].kind, StatusKind::Cancelled);
    }

    #[test]
    fn test_tiers() {
        assert_eq!(tier_message(2, Duration::from_secs(60)).0, StatusKind::Tier1);
        assert_eq!(tier_message(3, Duration::from_secs(90)).0, StatusKind::Tier2);
        assert_eq!(tier_message(6, Duration::from_secs(180)).0, StatusKind::Tier3);
        assert_eq!(minutes(Duration::from_secs(90)), "1m 30s");
    }
}
