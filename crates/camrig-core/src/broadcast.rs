// ── Command broadcaster ──

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use camrig_api::{CameraCommand, CommandSender};

use crate::error::CoreError;

/// Sends fleet-wide commands. Cheap to clone.
#[derive(Clone)]
pub struct Broadcaster {
    sender: Arc<dyn CommandSender>,
}

impl Broadcaster {
    pub fn new(sender: Arc<dyn CommandSender>) -> Self {
        Self { sender }
    }

    /// Ask every camera for a heartbeat.
    pub async fn ping(&self) -> Result<(), CoreError> {
        self.sender
            .send(CameraCommand::Ping)
            .await
            .map_err(CoreError::Multicast)
    }

    /// Trigger a capture on every camera.
    pub async fn shoot(&self) -> Result<(), CoreError> {
        debug!("broadcasting shoot");
        self.sender
            .send(CameraCommand::Shoot)
            .await
            .map_err(CoreError::Multicast)
    }

    /// Ping every `interval` until cancelled. A failed ping is logged and
    /// the next tick goes ahead.
    pub async fn ping_task(self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.ping().await {
                        warn!(error = %e, "ping failed");
                    }
                }
            }
        }
    }
}
