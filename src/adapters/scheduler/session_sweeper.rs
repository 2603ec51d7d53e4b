//! SessionSweeper - Periodically closes sessions whose end time has passed.
//!
//! The sweep is idempotent and touches nothing but the open flag, so it is
//! safe to run on several nodes at once and to trigger by hand.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::application::SweepExpiredSessionsHandler;
use crate::domain::foundation::{DomainError, Timestamp};

/// Default delay between sweeps.
pub const DEFAULT_SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Background loop around [`SweepExpiredSessionsHandler`].
pub struct SessionSweeper {
    handler: Arc<SweepExpiredSessionsHandler>,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(handler: Arc<SweepExpiredSessionsHandler>, interval: Duration) -> Self {
        Self { handler, interval }
    }

    /// Sweep on every tick until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), DomainError> {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Session sweeper stopped");
                        return Ok(());
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::warn!(error = %e, "Session sweep failed");
                    }
                }
            }
        }
    }

    /// Run one sweep now. Returns how many sessions were closed.
    pub async fn sweep_once(&self) -> Result<usize, DomainError> {
        self.handler.handle(Timestamp::now()).await
    }
}
