//! Routing of parsed frames to the registered progress subscriber.
//!
//! The subscriber handler lives in an indirection cell that is read at
//! dispatch time, never captured at connect time. The owning view may
//! replace its handler between connection open and message arrival;
//! dispatch always invokes the current one.

use std::sync::{Arc, PoisonError, RwLock};

use crate::messages::{message_type, ProgressEvent, PROGRESS_UPDATE_TYPE};

/// Handler invoked for each recognized progress update.
pub type ProgressHandler = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Classifies inbound JSON frames and forwards progress updates to the
/// single registered subscriber.
///
/// Frames of any other type are recorded as the most recent message but
/// not dispatched. Malformed progress payloads are logged and dropped.
#[derive(Default)]
pub struct ProgressEventDispatcher {
    handler: RwLock<Option<ProgressHandler>>,
    last_message: RwLock<Option<serde_json::Value>>,
}

impl ProgressEventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current handler. Takes effect for the next frame.
    pub fn set_handler(&self, handler: impl Fn(ProgressEvent) + Send + Sync + 'static) {
        *write(&self.handler) = Some(Arc::new(handler));
    }

    /// Remove the handler; subsequent progress updates are recorded only.
    pub fn clear_handler(&self) {
        *write(&self.handler) = None;
    }

    /// The most recent successfully parsed JSON frame, of any type.
    pub fn last_message(&self) -> Option<serde_json::Value> {
        read(&self.last_message).clone()
    }

    /// Record a parsed frame and forward it when it is a progress update.
    pub fn dispatch(&self, frame: serde_json::Value) {
        let kind = message_type(&frame).map(str::to_owned);
        *write(&self.last_message) = Some(frame.clone());

        if kind.as_deref() != Some(PROGRESS_UPDATE_TYPE) {
            tracing::debug!(message_type = kind.as_deref(), "Ignoring non-progress frame");
            return;
        }

        match serde_json::from_value::<ProgressEvent>(frame) {
            Ok(event) => {
                // Clone the handler out of the cell before invoking so the
                // cell is free for a concurrent replacement.
                let handler = read(&self.handler).clone();
                if let Some(handler) = handler {
                    handler(event);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Malformed progress update dropped");
            }
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
