//! Live job-state synchronization for the tally dashboard.
//!
//! Keeps a local view of a user's batch jobs consistent under two
//! unordered update sources: a realtime WebSocket push channel and a
//! periodic full-snapshot poll. The push channel self-heals with a
//! fixed-delay reconnect; the poll acts as ground truth and adapts its
//! cadence to connection health. A per-job transaction detail view
//! runs its own short-lived status poll with an edge-triggered stop.
//!
//! Entry point: [`session::DashboardSession::subscribe`].

pub mod config;
pub mod connection;
pub mod detail;
pub mod dispatch;
pub mod events;
pub mod messages;
pub mod poller;
pub mod session;
pub mod store;

pub use config::SyncConfig;
pub use connection::{ConnectionManager, ConnectionState};
pub use detail::TransactionPageView;
pub use dispatch::ProgressEventDispatcher;
pub use events::SyncEvent;
pub use messages::ProgressEvent;
pub use poller::PollingScheduler;
pub use session::DashboardSession;
pub use store::JobStateStore;
