//! Inbound realtime frames from the gateway.
//!
//! The channel carries two literal control strings (`"ping"`/`"pong"`)
//! and JSON messages discriminated by a `type` field. Only
//! [`PROGRESS_UPDATE_TYPE`] messages are dispatched further; everything
//! else is recorded and ignored.

use serde::Deserialize;
use tally_core::job::JobStatus;
use tally_core::types::{JobId, UserId};

/// Message type tag for push-channel progress reports.
pub const PROGRESS_UPDATE_TYPE: &str = "progress_update";

/// Classification of an inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Keepalive probe; answered immediately with a literal `"pong"`.
    Ping,
    /// Keepalive reply; accepted and ignored.
    Pong,
    /// A parsed JSON message.
    Json(serde_json::Value),
}

/// Split control literals from JSON payloads.
///
/// Returns `Err` for frames that are neither control literals nor valid
/// JSON. Callers log and drop those; a malformed frame never closes the
/// connection.
pub fn classify_frame(text: &str) -> Result<InboundFrame, serde_json::Error> {
    match text {
        "ping" => Ok(InboundFrame::Ping),
        "pong" => Ok(InboundFrame::Pong),
        _ => Ok(InboundFrame::Json(serde_json::from_str(text)?)),
    }
}

/// The frame's `type` discriminator, when present.
pub fn message_type(value: &serde_json::Value) -> Option<&str> {
    value.get("type").and_then(|t| t.as_str())
}

/// A push-channel progress report for one job.
///
/// Carries the job identifier plus whichever job fields the gateway
/// included; the store updates only the fields that are present. The
/// protocol has no sequence number, so arrival order is the only order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressEvent {
    pub job_id: JobId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub progress_percent: Option<u8>,
    #[serde(default)]
    pub processed_records: Option<u64>,
    #[serde(default)]
    pub total_records: Option<u64>,
    #[serde(default)]
    pub valid_records: Option<u64>,
    #[serde(default)]
    pub invalid_records: Option<u64>,
    #[serde(default)]
    pub suspicious_records: Option<u64>,
    /// Batch counters from the gateway's worker; logged, never stored.
    #[serde(default)]
    pub batch_completed: Option<u32>,
    #[serde(default)]
    pub total_batches: Option<u32>,
}
