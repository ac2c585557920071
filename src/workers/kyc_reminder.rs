//! Background KYC reminder sweep
//!
//! Periodically walks the KYC records and fires due verification
//! reminders. A failed cycle is logged and retried on the next tick; the
//! worker never propagates a failure upward.

use crate::kyc::KycService;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct KycReminderConfig {
    pub sweep_interval: Duration,
}

impl Default for KycReminderConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

impl KycReminderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sweep_interval: Duration::from_secs(
                std::env::var("KYC_REMINDER_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.sweep_interval.as_secs()),
            ),
        }
    }
}

pub struct KycReminderWorker {
    kyc: Arc<KycService>,
    config: KycReminderConfig,
}

impl KycReminderWorker {
    pub fn new(kyc: Arc<KycService>, config: KycReminderConfig) -> Self {
        Self { kyc, config }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            "KYC reminder worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("KYC reminder worker stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.sweep_interval) => {
                    let fired = self.kyc.remind_due(Utc::now());
                    if fired > 0 {
                        info!(reminders = fired, "KYC reminder sweep completed");
                    } else {
                        debug!("KYC reminder sweep completed, nothing due");
                    }
                }
            }
        }

        info!("KYC reminder worker stopped");
    }
}
