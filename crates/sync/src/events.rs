//! Structured events emitted by the sync layer.
//!
//! The sync core reports state changes and failures here instead of
//! logging for the UI's benefit; subscribers (views, tests, the watcher
//! binary) receive them over a [`tokio::sync::broadcast`] channel via
//! [`crate::session::DashboardSession::subscribe_events`].

use serde::Serialize;
use tally_core::types::{JobId, UserId};

/// A state change or failure observed by the sync layer.
#[derive(Debug, Clone, Serialize)]
pub enum SyncEvent {
    /// The realtime channel reached the Connected state.
    ConnectionOpened { user_id: UserId },

    /// The realtime channel left the Connected state.
    ConnectionClosed { user_id: UserId },

    /// A push event updated (or created) a job entry.
    JobUpdated { job_id: JobId },

    /// A poll snapshot replaced the job list.
    SnapshotApplied { job_count: usize },

    /// A dashboard poll fetch failed; existing state was left untouched.
    PollFailed { error: String },

    /// A detail view fetch failed; the current page was left untouched.
    DetailFetchFailed { job_id: JobId, error: String },
}
