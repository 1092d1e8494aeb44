//! # Sync Daemon
//!
//! Repeats sync cycles on a fixed interval and keeps the Mergin session
//! alive. Cycle failures are logged and retried on the next tick; only a
//! failed login or bootstrap stops the daemon.

use bridge_traits::time::Clock;
use bridge_traits::vcs::{VcsConnector, VersionControl};
use chrono::{DateTime, Utc};
use core_auth::session_renewal_threshold;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::coordinator::SyncCoordinator;
use crate::cycle::CycleReport;
use crate::Result;

/// Whether a session expiring at `expires_at` must be renewed at `now`.
pub fn session_needs_renewal(
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold: chrono::Duration,
) -> bool {
    expires_at.is_some_and(|expires_at| expires_at - now < threshold)
}

pub struct SyncDaemon {
    connector: Arc<dyn VcsConnector>,
    coordinator: SyncCoordinator,
    clock: Arc<dyn Clock>,
    sleep_time: Duration,
    session: Arc<dyn VersionControl>,
}

impl SyncDaemon {
    /// Log in and create the daemon.
    pub async fn start(
        connector: Arc<dyn VcsConnector>,
        coordinator: SyncCoordinator,
        clock: Arc<dyn Clock>,
        sleep_time: Duration,
    ) -> Result<Self> {
        info!("Logging in to Mergin...");
        let session = connector.connect().await?;
        Ok(Self {
            connector,
            coordinator,
            clock,
            sleep_time,
            session,
        })
    }

    pub fn session(&self) -> &Arc<dyn VersionControl> {
        &self.session
    }

    /// Download and sync the project once when no working copy exists yet.
    pub async fn bootstrap(&mut self) -> Result<Option<CycleReport>> {
        if !self.coordinator.needs_bootstrap() {
            return Ok(None);
        }
        info!("No local working copy, running initial sync");
        self.coordinator
            .run_cycle(self.session.as_ref())
            .await
            .map(Some)
    }

    /// Replace the session when it expires within the renewal threshold.
    ///
    /// Returns whether a new session was created.
    pub async fn renew_session_if_needed(&mut self) -> Result<bool> {
        let expires_at = self.session.session_expires_at();
        if !session_needs_renewal(expires_at, self.clock.now(), session_renewal_threshold()) {
            return Ok(false);
        }

        info!(?expires_at, "Session about to expire, logging in again");
        self.session = self.connector.connect().await?;
        Ok(true)
    }

    /// One loop iteration without the sleep.
    #[instrument(skip(self))]
    pub async fn tick(&mut self) -> Result<CycleReport> {
        self.renew_session_if_needed().await?;
        self.coordinator.run_cycle(self.session.as_ref()).await
    }

    /// Run until `cancel` fires. Cancellation is only observed while sleeping.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            info!("Going to sleep for {:?}", self.sleep_time);
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Media sync daemon stopped");
                    return;
                }
                _ = tokio::time::sleep(self.sleep_time) => {}
            }

            if let Err(e) = self.tick().await {
                error!(error = %e, "Sync cycle failed, retrying on next tick");
            }
        }
    }
}
