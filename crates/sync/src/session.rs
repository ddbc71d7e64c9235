//! Scoped owner of one user's dashboard subscription.
//!
//! [`DashboardSession`] ties the pieces together: it builds the store,
//! wires push events into it through the dispatcher's handler cell,
//! opens the realtime channel, and starts the fallback poller. The
//! connection, the timers, and the store are reachable only through the
//! session, and all of them die with [`DashboardSession::unsubscribe`].

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use tally_core::job::Job;
use tally_core::types::{JobId, UserId};
use tally_gateway::JobsApi;

use crate::config::SyncConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::detail::TransactionPageView;
use crate::dispatch::ProgressEventDispatcher;
use crate::events::SyncEvent;
use crate::poller::PollingScheduler;
use crate::store::{self, SharedJobStore};

/// Broadcast channel capacity for sync events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One user's live dashboard subscription.
///
/// Created via [`subscribe`](Self::subscribe); the returned `Arc` can be
/// cheaply cloned into views.
pub struct DashboardSession {
    user_id: UserId,
    config: SyncConfig,
    api: Arc<dyn JobsApi>,
    store: SharedJobStore,
    dispatcher: Arc<ProgressEventDispatcher>,
    connection: ConnectionManager,
    poller: Arc<PollingScheduler>,
    events_tx: broadcast::Sender<SyncEvent>,
}

impl DashboardSession {
    /// Subscribe to a user's dashboard: open the realtime channel, wire
    /// push events into the store, and start the fallback poller.
    ///
    /// * `ws_url` - WebSocket base URL, e.g. `ws://localhost:8000`.
    pub async fn subscribe(
        api: Arc<dyn JobsApi>,
        ws_url: impl Into<String>,
        user_id: UserId,
        config: SyncConfig,
    ) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = store::new_shared();
        let dispatcher = Arc::new(ProgressEventDispatcher::new());

        // Push events flow into the store through the handler cell; the
        // cell is re-read per frame, so a view that replaces the handler
        // later takes over without reconnecting.
        {
            let store = store.clone();
            let events = events_tx.clone();
            dispatcher.set_handler(move |event| {
                let job_id = event.job_id;
                if let (Some(done), Some(total)) = (event.batch_completed, event.total_batches) {
                    tracing::debug!(job_id, batch = done, total_batches = total, "Progress event");
                }
                let changed = store::write(&store).apply_progress_event(&event, chrono::Utc::now());
                if changed {
                    let _ = events.send(SyncEvent::JobUpdated { job_id });
                }
            });
        }

        let connection = ConnectionManager::new(
            ws_url,
            config.reconnect_delay,
            Arc::clone(&dispatcher),
            events_tx.clone(),
        );
        connection.connect(user_id).await;

        let poller = Arc::new(PollingScheduler::new(
            Arc::clone(&api),
            user_id,
            store.clone(),
            connection.state(),
            events_tx.clone(),
            &config,
        ));
        poller.ensure_running().await;

        tracing::info!(user_id, "Dashboard session subscribed");

        Arc::new(Self {
            user_id,
            config,
            api,
            store,
            dispatcher,
            connection,
            poller,
            events_tx,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Subscribe to the session's structured sync events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events_tx.subscribe()
    }

    /// Watch the realtime channel state.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.state()
    }

    /// The realtime channel, for sends and manual reconnects.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// The dispatcher, for views that install their own progress handler.
    pub fn dispatcher(&self) -> &Arc<ProgressEventDispatcher> {
        &self.dispatcher
    }

    /// Current job list, head first.
    pub fn jobs(&self) -> Vec<Job> {
        store::read(&self.store).jobs().to_vec()
    }

    /// Restart the fallback poller if it has self-terminated.
    ///
    /// Call after creating a new job; idempotent while the poller is
    /// already running.
    pub async fn resume_polling(&self) {
        self.poller.ensure_running().await;
    }

    /// Open a transaction detail view for one of this user's jobs.
    pub async fn detail_view(&self, job_id: JobId) -> TransactionPageView {
        TransactionPageView::open(
            Arc::clone(&self.api),
            job_id,
            self.events_tx.clone(),
            self.config.detail_poll_interval,
        )
        .await
    }

    /// Tear the subscription down.
    ///
    /// Order matters: cancel any pending reconnection and close the
    /// channel with the normal-closure signal first (so no reconnect
    /// races a dead subscriber), then stop the polling loop.
    pub async fn unsubscribe(&self) {
        self.connection.disconnect().await;
        self.poller.stop().await;
        self.dispatcher.clear_handler();
        tracing::info!(user_id = self.user_id, "Dashboard session unsubscribed");
    }
}
