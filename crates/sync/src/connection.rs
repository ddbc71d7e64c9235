//! WebSocket connection lifecycle for the realtime channel.
//!
//! [`ConnectionManager`] owns at most one live channel per session.
//! The connection task runs connect -> process frames -> reconnect; a
//! reconnection is scheduled only after an abnormal closure (any close
//! code other than normal, a dropped stream, or a read error), with a
//! fixed delay. A normal closure by either peer ends the task.
//!
//! Connection state is published on a [`watch`] channel so the poller
//! can adapt its cadence without holding a reference to the manager.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use tally_core::types::UserId;

use crate::dispatch::ProgressEventDispatcher;
use crate::events::SyncEvent;
use crate::messages::{classify_frame, InboundFrame};

/// Realtime channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// How a live connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseKind {
    /// Close frame with the normal code, from either peer.
    Normal,
    /// Any other close code, a dropped stream, or a read error.
    Abnormal,
    /// Local teardown via the cancellation token.
    Local,
}

/// Sender slot for the outbound half of the live channel.
///
/// `None` whenever no channel is open; `send_text` consults it so that
/// sends outside the Connected state are silent no-ops, never queued.
type OutboundSlot = Arc<RwLock<Option<mpsc::UnboundedSender<Message>>>>;

/// Owns the single realtime channel of a dashboard session.
pub struct ConnectionManager {
    ws_url: String,
    reconnect_delay: Duration,
    dispatcher: Arc<ProgressEventDispatcher>,
    events: broadcast::Sender<SyncEvent>,
    state_tx: watch::Sender<ConnectionState>,
    outbound: OutboundSlot,
    task: Mutex<Option<(CancellationToken, tokio::task::JoinHandle<()>)>>,
}

impl ConnectionManager {
    /// Create a manager targeting a gateway WebSocket endpoint.
    ///
    /// * `ws_url` - WebSocket base URL, e.g. `ws://localhost:8000`.
    pub fn new(
        ws_url: impl Into<String>,
        reconnect_delay: Duration,
        dispatcher: Arc<ProgressEventDispatcher>,
        events: broadcast::Sender<SyncEvent>,
    ) -> Self {
        let ws_url = ws_url.into().trim_end_matches('/').to_string();
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            ws_url,
            reconnect_delay,
            dispatcher,
            events,
            state_tx,
            outbound: Arc::new(RwLock::new(None)),
            task: Mutex::new(None),
        }
    }

    /// Watch the connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Whether the channel is currently in the Connected state.
    pub fn is_connected(&self) -> bool {
        *self.state_tx.borrow() == ConnectionState::Connected
    }

    /// Establish the channel for `user_id`, tearing down any prior one
    /// (and any pending reconnection) first.
    pub async fn connect(&self, user_id: UserId) {
        self.teardown_task().await;

        let cancel = CancellationToken::new();
        let task = ConnectionTask {
            user_id,
            url: format!("{}/ws/{}", self.ws_url, user_id),
            reconnect_delay: self.reconnect_delay,
            dispatcher: Arc::clone(&self.dispatcher),
            events: self.events.clone(),
            state: self.state_tx.clone(),
            outbound: Arc::clone(&self.outbound),
        };
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            run_connection(task, task_cancel).await;
        });
        *self.task.lock().await = Some((cancel, handle));
    }

    /// Close with the normal-closure signal and cancel any pending
    /// reconnection. Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        self.teardown_task().await;
    }

    /// Send a text payload over the channel.
    ///
    /// A no-op unless the channel is currently Connected; nothing is
    /// ever queued for later delivery.
    pub fn send_text(&self, payload: impl Into<String>) {
        if !self.is_connected() {
            return;
        }
        let sender = slot_read(&self.outbound).clone();
        if let Some(sender) = sender {
            let _ = sender.send(Message::Text(payload.into()));
        }
    }

    /// Cancel the connection task (aborting a pending reconnect sleep,
    /// or closing a live channel with the normal code) and wait for it
    /// to exit.
    async fn teardown_task(&self) {
        let taken = self.task.lock().await.take();
        if let Some((cancel, handle)) = taken {
            cancel.cancel();
            if tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .is_err()
            {
                tracing::warn!("Connection task did not exit in time");
            }
        }
    }
}

/// Everything the connection task needs, cloned out of the manager.
struct ConnectionTask {
    user_id: UserId,
    url: String,
    reconnect_delay: Duration,
    dispatcher: Arc<ProgressEventDispatcher>,
    events: broadcast::Sender<SyncEvent>,
    state: watch::Sender<ConnectionState>,
    outbound: OutboundSlot,
}

/// Core connection loop: connect -> process frames -> maybe reconnect.
async fn run_connection(task: ConnectionTask, cancel: CancellationToken) {
    loop {
        task.state.send_replace(ConnectionState::Connecting);

        let attempt = tokio::select! {
            _ = cancel.cancelled() => {
                task.state.send_replace(ConnectionState::Disconnected);
                return;
            }
            result = connect_async(task.url.as_str()) => result,
        };

        match attempt {
            Ok((ws_stream, _response)) => {
                // Install the sender before publishing Connected so that
                // a send issued right after observing the state change
                // always has a live channel.
                let (out_tx, out_rx) = mpsc::unbounded_channel::<Message>();
                *slot_write(&task.outbound) = Some(out_tx.clone());
                task.state.send_replace(ConnectionState::Connected);
                let _ = task.events.send(SyncEvent::ConnectionOpened {
                    user_id: task.user_id,
                });
                tracing::info!(user_id = task.user_id, "Realtime channel connected");

                let kind = process_frames(ws_stream, &task, &cancel, out_tx, out_rx).await;

                task.state.send_replace(ConnectionState::Disconnected);
                let _ = task.events.send(SyncEvent::ConnectionClosed {
                    user_id: task.user_id,
                });

                match kind {
                    // Normal closure schedules nothing; local teardown
                    // has already suppressed the reconnect loop.
                    CloseKind::Normal | CloseKind::Local => return,
                    CloseKind::Abnormal => {}
                }
            }
            Err(e) => {
                task.state.send_replace(ConnectionState::Disconnected);
                tracing::warn!(user_id = task.user_id, error = %e, "Realtime connect failed");
            }
        }

        // Fixed-delay reconnect; this sleep is the single pending
        // reconnection timer, and cancelling the token aborts it.
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(task.reconnect_delay) => {}
        }
        tracing::info!(user_id = task.user_id, "Reconnecting realtime channel");
    }
}

/// Pump frames on a live channel until it closes.
///
/// Splits the stream: a writer task drains the outbound queue into the
/// sink while this loop reads inbound frames, answers keepalives, and
/// hands JSON frames to the dispatcher.
async fn process_frames(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    task: &ConnectionTask,
    cancel: &CancellationToken,
    out_tx: mpsc::UnboundedSender<Message>,
    mut out_rx: mpsc::UnboundedReceiver<Message>,
) -> CloseKind {
    let (mut sink, mut stream) = ws_stream.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let is_close = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() {
                break;
            }
            if is_close {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let kind = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // Local teardown: say goodbye properly.
                let _ = out_tx.send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                })));
                break CloseKind::Local;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_text(&text, task, &out_tx),
                Some(Ok(Message::Binary(_))) => {
                    tracing::trace!(user_id = task.user_id, "Ignoring binary frame");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Protocol-level keepalive, handled by tungstenite.
                }
                Some(Ok(Message::Close(frame))) => {
                    let normal = matches!(&frame, Some(f) if f.code == CloseCode::Normal);
                    tracing::info!(user_id = task.user_id, ?frame, "Realtime channel closed by peer");
                    break if normal { CloseKind::Normal } else { CloseKind::Abnormal };
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    // The error itself is not a close; the closure it
                    // causes (no normal close frame seen) drives the
                    // reconnect decision.
                    tracing::error!(user_id = task.user_id, error = %e, "WebSocket receive error");
                    break CloseKind::Abnormal;
                }
                None => {
                    tracing::warn!(user_id = task.user_id, "WebSocket stream ended without close frame");
                    break CloseKind::Abnormal;
                }
            }
        }
    };

    // Drop every outbound sender so the writer drains and exits.
    *slot_write(&task.outbound) = None;
    drop(out_tx);
    let _ = tokio::time::timeout(Duration::from_secs(5), writer).await;

    kind
}

/// React to one inbound text frame.
fn handle_text(text: &str, task: &ConnectionTask, out: &mpsc::UnboundedSender<Message>) {
    match classify_frame(text) {
        Ok(InboundFrame::Ping) => {
            let _ = out.send(Message::Text("pong".into()));
        }
        Ok(InboundFrame::Pong) => {}
        Ok(InboundFrame::Json(value)) => task.dispatcher.dispatch(value),
        Err(e) => {
            // Malformed frames are dropped; the connection stays open.
            tracing::warn!(
                user_id = task.user_id,
                error = %e,
                raw_frame = %text,
                "Malformed frame dropped",
            );
        }
    }
}

fn slot_read(slot: &OutboundSlot) -> std::sync::RwLockReadGuard<'_, Option<mpsc::UnboundedSender<Message>>> {
    slot.read().unwrap_or_else(PoisonError::into_inner)
}

fn slot_write(slot: &OutboundSlot) -> std::sync::RwLockWriteGuard<'_, Option<mpsc::UnboundedSender<Message>>> {
    slot.write().unwrap_or_else(PoisonError::into_inner)
}
