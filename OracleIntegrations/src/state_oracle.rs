use backoff::{backoff::Backoff, ExponentialBackoffBuilder};
use ethereum_contracts::{abi, ChainReader, ChainResult};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{OracleAck, OracleError, OracleProgress};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleWaitConfig {
    pub initial_interval_secs: u64,
    pub multiplier: f64,
    pub max_interval_secs: u64,
    pub max_wait_secs: u64,
}

impl Default for OracleWaitConfig {
    fn default() -> Self {
        Self {
            initial_interval_secs: 30,
            multiplier: 1.5,
            max_interval_secs: 300,
            max_wait_secs: 3_600,
        }
    }
}

impl OracleWaitConfig {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_secs(self.initial_interval_secs)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_secs.max(self.initial_interval_secs))
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// A `StateOracle` contract deployed on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateOracle {
    pub address: Address,
}

impl StateOracle {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub async fn last_block_num(&self, reader: &dyn ChainReader) -> ChainResult<u64> {
        let data = reader.call(self.address, abi::last_block_num()).await?;
        Ok(abi::decode_uint(&data)?.low_u64())
    }
}

pub struct StateOracleWaiter {
    config: OracleWaitConfig,
}

impl StateOracleWaiter {
    pub fn new(config: OracleWaitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OracleWaitConfig {
        &self.config
    }

    /// Polls `oracle` until its last synchronised block is at least
    /// `target_block`, backing off between polls. Read failures count as an
    /// unsatisfied poll. Gives up once the wait budget is spent or `cancel`
    /// fires.
    pub async fn wait<F>(
        &self,
        reader: &dyn ChainReader,
        oracle: &StateOracle,
        target_block: u64,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<OracleAck, OracleError>
    where
        F: FnMut(&OracleProgress) + Send,
    {
        let started = Instant::now();
        let max_wait = self.config.max_wait();
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.initial_interval())
            .with_randomization_factor(0.0)
            .with_multiplier(self.config.multiplier)
            .with_max_interval(self.config.max_interval())
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 0u32;
        let mut last_seen = None;

        loop {
            if cancel.is_cancelled() {
                return Err(OracleError::Cancelled { target_block, last_seen });
            }

            attempt += 1;
            match oracle.last_block_num(reader).await {
                Ok(block) => {
                    debug!(attempt, oracle_block = block, target_block, "state oracle polled");
                    last_seen = Some(block);
                    if block >= target_block {
                        let elapsed = started.elapsed();
                        info!(attempt, oracle_block = block, target_block, ?elapsed, "state oracle synced");
                        return Ok(OracleAck {
                            oracle_block: block,
                            attempts: attempt,
                            elapsed,
                        });
                    }
                }
                Err(e) => warn!(attempt, error = %e, "state oracle read failed"),
            }

            let elapsed = started.elapsed();
            if elapsed >= max_wait {
                return Err(OracleError::Timeout {
                    target_block,
                    last_seen,
                    waited: elapsed,
                });
            }

            let next = backoff
                .next_backoff()
                .unwrap_or_else(|| self.config.max_interval())
                .min(max_wait - elapsed);

            on_progress(&OracleProgress {
                attempt,
                oracle_block: last_seen,
                target_block,
                elapsed,
                next_poll_in: next,
            });

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(OracleError::Cancelled { target_block, last_seen });
                }
                _ = tokio::time::sleep(next) => {}
            }
        }
    }
}
