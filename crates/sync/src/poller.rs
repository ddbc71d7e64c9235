//! Fallback full-refresh polling for the dashboard job list.
//!
//! The poller is a pure backstop: it fetches the authoritative snapshot
//! immediately on start and then on a timer whose cadence adapts to
//! connection health. Once the push channel is healthy and nothing is
//! running, it stops itself; the owning session restarts it when new
//! work appears.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;

use tally_core::types::UserId;
use tally_gateway::JobsApi;

use crate::config::SyncConfig;
use crate::connection::ConnectionState;
use crate::events::SyncEvent;
use crate::store::{self, SharedJobStore};

/// Adaptive snapshot poller for one user's job list.
pub struct PollingScheduler {
    api: Arc<dyn JobsApi>,
    user_id: UserId,
    store: SharedJobStore,
    conn_state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<SyncEvent>,
    interval_connected: Duration,
    interval_disconnected: Duration,
    cancel: CancellationToken,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PollingScheduler {
    pub fn new(
        api: Arc<dyn JobsApi>,
        user_id: UserId,
        store: SharedJobStore,
        conn_state: watch::Receiver<ConnectionState>,
        events: broadcast::Sender<SyncEvent>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            api,
            user_id,
            store,
            conn_state,
            events,
            interval_connected: config.poll_interval_connected,
            interval_disconnected: config.poll_interval_disconnected,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Start the poll loop unless one is already running.
    ///
    /// Idempotent: a live loop is left alone, a self-terminated one is
    /// respawned. The session calls this again after creating a job, so
    /// a scheduler that stopped while the dashboard was idle resumes.
    pub async fn ensure_running(self: &Arc<Self>) {
        if self.cancel.is_cancelled() {
            return;
        }
        let mut slot = self.task.lock().await;
        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }
        let this = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            this.run().await;
        }));
    }

    /// Stop polling for good and wait for the loop to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.task.lock().await.take() {
            if tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .is_err()
            {
                tracing::warn!(user_id = self.user_id, "Poll loop did not exit in time");
            }
        }
    }

    async fn run(&self) {
        loop {
            self.tick().await;

            // Connection health is a hint read once per lap; a flap that
            // stops the loop is healed by the next ensure_running call.
            let connected = *self.conn_state.borrow() == ConnectionState::Connected;
            if connected && !store::read(&self.store).any_running() {
                tracing::debug!(
                    user_id = self.user_id,
                    "Push channel healthy and no job running; polling stops",
                );
                return;
            }

            let interval = if connected {
                self.interval_connected
            } else {
                self.interval_disconnected
            };
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Fetch one snapshot and reconcile it into the store.
    async fn tick(&self) {
        match self.api.list_jobs(self.user_id).await {
            Ok(snapshot) => {
                let job_count = snapshot.len();
                let changed = store::write(&self.store).apply_snapshot(snapshot);
                if changed {
                    let _ = self.events.send(SyncEvent::SnapshotApplied { job_count });
                }
            }
            Err(e) => {
                // A failed poll never blanks a populated dashboard.
                tracing::warn!(user_id = self.user_id, error = %e, "Job list poll failed");
                let _ = self.events.send(SyncEvent::PollFailed {
                    error: e.to_string(),
                });
            }
        }
    }
}
