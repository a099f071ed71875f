use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::RwLock;
use tokio::time::sleep;

use crate::config::DevnetConfig;
use crate::devnet::{Devnet, FlushReport, RelayReport};

pub type SharedDevnet = Arc<RwLock<Devnet>>;

/// Moves messages between the ledgers on a fixed interval, the way a
/// sequencer and a relayer would.
pub struct Node {
    pub devnet: SharedDevnet,
    pub interval: Duration,
    pub auto_relay: bool,
}

impl Node {
    pub fn new(devnet: SharedDevnet, config: &DevnetConfig) -> Self {
        Self {
            devnet,
            interval: config.auto_flush_interval,
            auto_relay: config.auto_relay,
        }
    }

    pub async fn start(&self) -> Result<()> {
        if self.interval.is_zero() {
            log::info!("Auto flush disabled, messages move on devnet_flush only");
            return Ok(());
        }
        log::info!(
            "Starting node loop every {:?} (auto relay: {})",
            self.interval,
            self.auto_relay
        );
        loop {
            sleep(self.interval).await;
            if let Err(e) = self.tick().await {
                log::info!("Node error: {:?}", e);
            }
        }
    }

    /// One round: flush, then optionally relay what was posted.
    pub async fn tick(&self) -> Result<(FlushReport, Option<RelayReport>)> {
        let mut devnet = self.devnet.write().await;
        let flushed = devnet.flush()?;
        let relayed = if self.auto_relay {
            Some(devnet.relay()?)
        } else {
            None
        };

        // Messages never expire, so anything left here needs attention.
        let pending = devnet.pending_messages();
        if !flushed.failed.is_empty() || !pending.l2_to_l1.is_empty() {
            log::warn!(
                "{} L1 -> L2 and {} L2 -> L1 messages still pending",
                pending.l1_to_l2.len(),
                pending.l2_to_l1.len()
            );
        }
        Ok((flushed, relayed))
    }
}
