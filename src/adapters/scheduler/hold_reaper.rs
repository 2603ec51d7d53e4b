//! HoldReaper - Periodically expires abandoned registration holds.
//!
//! Every tick first retries seat releases left over from failed
//! cancellations, then runs one expiry sweep. A sweep that fills its whole
//! batch is followed immediately by another, so a backlog drains without
//! waiting for the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::application::{ExpireStaleRegistrationsCommand, ExpireStaleRegistrationsHandler};
use crate::domain::registration::RegistrationError;

/// Default delay between sweeps.
pub const DEFAULT_HOLD_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Background loop around [`ExpireStaleRegistrationsHandler`].
pub struct HoldReaper {
    handler: Arc<ExpireStaleRegistrationsHandler>,
    interval: Duration,
    batch_size: usize,
}

impl HoldReaper {
    pub fn new(
        handler: Arc<ExpireStaleRegistrationsHandler>,
        interval: Duration,
        batch_size: u32,
    ) -> Self {
        Self {
            handler,
            interval,
            batch_size: batch_size.max(1) as usize,
        }
    }

    /// Sweep on every tick until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), RegistrationError> {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        tracing::info!(
            hold_timeout_secs = self.handler.hold_timeout().as_secs(),
            "Hold reaper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Hold reaper stopped");
                        return Ok(());
                    }
                }

                _ = interval.tick() => {
                    match self.handler.release_pending_seats().await {
                        Ok(0) => {}
                        Ok(released) => tracing::info!(released, "Returned pending seats"),
                        Err(e) => tracing::warn!(error = %e, "Pending seat release pass failed"),
                    }
                    if let Err(e) = self.drain().await {
                        tracing::warn!(error = %e, "Hold expiry sweep failed");
                    }
                }
            }
        }
    }

    /// Sweep until a pass comes back short of a full batch.
    pub async fn drain(&self) -> Result<usize, RegistrationError> {
        let mut total = 0;
        loop {
            let expired = self.sweep_once().await?;
            total += expired;
            if expired < self.batch_size {
                return Ok(total);
            }
        }
    }

    /// Run one expiry sweep now. Returns how many holds were released.
    pub async fn sweep_once(&self) -> Result<usize, RegistrationError> {
        self.handler
            .handle(ExpireStaleRegistrationsCommand::now())
            .await
    }
}
