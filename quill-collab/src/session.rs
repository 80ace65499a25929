//! Collaboration session: the composition root.
//!
//! One session per document. It owns the socket, drives the
//! [`ReconnectController`](crate::reconnect::ReconnectController), arms the
//! [`HeartbeatMonitor`](crate::heartbeat::HeartbeatMonitor) while connected,
//! routes inbound envelopes through the codec into the
//! [`PresenceStore`](crate::presence::PresenceStore), and re-emits typed
//! events to the embedding editor over an owned mpsc channel.
//!
//! ```text
//! editor ──send_cursor()──► CollabSession ──envelope──► relay
//!   ▲                            │
//!   └────── SessionEvent ◄───────┘ (mpsc, take_event_rx once)
//! ```
//!
//! Concurrency model: a single driver task per session. The driver owns the
//! reconnect state machine and the heartbeat; a writer task owns the sink
//! half of the socket and writes envelopes in call order. At most one timer
//! exists at a time — heartbeat while connected, backoff while reconnecting.
//! Aborting the driver drops the heartbeat monitor (cancelling its timer)
//! and the reader half; the writer ends when the last outgoing sender is
//! dropped, flushing anything already queued and closing the socket.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::CollabConfig;
use crate::heartbeat::HeartbeatMonitor;
use crate::presence::{Participant, PresenceStore};
use crate::protocol::{ClientMessage, CursorPosition, SelectionRange, ServerMessage};
use crate::reconnect::{Effect, LinkEvent, Phase, ReconnectController};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The local user's identity, fixed for the life of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalIdentity {
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: String,
}

impl LocalIdentity {
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        user_avatar: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            user_avatar: user_avatar.into(),
        }
    }
}

/// Events delivered to the embedding editor.
///
/// The editor is the sole consumer; in particular it alone interprets
/// `ContentChanged` payloads — this layer forwards them opaquely.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    UserJoined(Participant),
    UserLeft { user_id: String },
    CursorMoved { user_id: String, position: CursorPosition },
    SelectionChanged { user_id: String, selection: SelectionRange },
    ContentChanged { user_id: String, changes: serde_json::Value },
    PresenceUpdate(Vec<Participant>),
    /// The reconnect attempt budget is exhausted. Terminal: the session is
    /// closed and must be explicitly reconnected (or recreated) to resume.
    ReconnectFailed,
    Error(String),
}

/// Client-side collaboration session for one document.
pub struct CollabSession {
    identity: LocalIdentity,
    document_id: String,
    config: CollabConfig,
    phase: Arc<RwLock<Phase>>,
    presence: Arc<RwLock<PresenceStore>>,
    /// Sender into the per-connection writer task; `None` while not connected.
    outgoing: Arc<RwLock<Option<mpsc::Sender<ClientMessage>>>>,
    event_tx: mpsc::Sender<SessionEvent>,
    event_rx: Option<mpsc::Receiver<SessionEvent>>,
    driver: Option<JoinHandle<()>>,
}

impl CollabSession {
    pub fn new(
        identity: LocalIdentity,
        document_id: impl Into<String>,
        config: CollabConfig,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
        let presence = PresenceStore::new(identity.user_id.clone());
        Self {
            identity,
            document_id: document_id.into(),
            config,
            phase: Arc::new(RwLock::new(Phase::Idle)),
            presence: Arc::new(RwLock::new(presence)),
            outgoing: Arc::new(RwLock::new(None)),
            event_tx,
            event_rx: Some(event_rx),
            driver: None,
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.event_rx.take()
    }

    /// Start (or restart) the connection.
    ///
    /// No-op unless the session is `Idle` or `Closed`. Restarting after a
    /// terminal close builds a fresh controller; nothing is carried across
    /// the terminal boundary except the identity and configuration.
    pub async fn connect(&mut self, endpoint_override: Option<&str>) {
        {
            let mut phase = self.phase.write().await;
            match *phase {
                Phase::Idle | Phase::Closed => *phase = Phase::Connecting,
                _ => return,
            }
        }
        self.presence.write().await.clear();
        if let Some(stale) = self.driver.take() {
            // A finished driver from a previous terminal close.
            stale.abort();
        }

        let ctx = DriverContext {
            url: self
                .config
                .collaborate_url(endpoint_override, &self.document_id),
            identity: self.identity.clone(),
            document_id: self.document_id.clone(),
            config: self.config.clone(),
            phase: Arc::clone(&self.phase),
            presence: Arc::clone(&self.presence),
            outgoing: Arc::clone(&self.outgoing),
            event_tx: self.event_tx.clone(),
        };
        self.driver = Some(tokio::spawn(run_driver(ctx)));
    }

    /// Tear the session down for good.
    ///
    /// Cancels the driver — and with it any pending backoff timer and the
    /// heartbeat — before touching anything else, writes a `leave` envelope
    /// if the socket is open, closes the socket, and transitions to
    /// `Closed`. An explicit disconnect never triggers an automatic
    /// reconnect.
    pub async fn disconnect(&mut self) {
        let was_connected;
        {
            let phase = self.phase.read().await;
            if *phase == Phase::Closed {
                return;
            }
            was_connected = *phase == Phase::Connected;
        }
        if let Some(driver) = self.driver.take() {
            driver.abort();
            // Wait for the cancellation to land so no driver write can race
            // the terminal phase below.
            let _ = driver.await;
        }
        *self.phase.write().await = Phase::Closed;

        let writer = self.outgoing.write().await.take();
        if was_connected {
            if let Some(tx) = writer {
                let _ = tx
                    .send(ClientMessage::Leave {
                        user_id: self.identity.user_id.clone(),
                    })
                    .await;
                // Dropping the last sender lets the writer flush the leave
                // and close the socket.
            }
            let _ = self.event_tx.send(SessionEvent::Disconnected).await;
        }
    }

    /// Report the local caret position. Written immediately when connected;
    /// silently dropped otherwise — a stale cursor is worthless on
    /// reconnect, so nothing is queued.
    pub async fn send_cursor(&self, position: CursorPosition) {
        self.send(ClientMessage::CursorMove {
            user_id: self.identity.user_id.clone(),
            position,
        })
        .await;
    }

    /// Report the local selection. Same drop-when-offline contract as
    /// [`send_cursor`](Self::send_cursor).
    pub async fn send_selection(&self, selection: SelectionRange) {
        self.send(ClientMessage::SelectionChange {
            user_id: self.identity.user_id.clone(),
            selection,
        })
        .await;
    }

    /// Forward an opaque content change produced by the editor.
    pub async fn send_content_change(&self, changes: serde_json::Value) {
        self.send(ClientMessage::ContentChange {
            user_id: self.identity.user_id.clone(),
            changes,
        })
        .await;
    }

    async fn send(&self, msg: ClientMessage) {
        if *self.phase.read().await != Phase::Connected {
            return;
        }
        if let Some(tx) = self.outgoing.read().await.as_ref() {
            let _ = tx.send(msg).await;
        }
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> Phase {
        *self.phase.read().await
    }

    /// Snapshot of the remote participants, in stable order.
    pub async fn participants(&self) -> Vec<Participant> {
        self.presence
            .read()
            .await
            .all()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn local_identity(&self) -> &LocalIdentity {
        &self.identity
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }
}

impl Drop for CollabSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

/// Everything the driver task needs, cloned out of the session.
struct DriverContext {
    url: String,
    identity: LocalIdentity,
    document_id: String,
    config: CollabConfig,
    phase: Arc<RwLock<Phase>>,
    presence: Arc<RwLock<PresenceStore>>,
    outgoing: Arc<RwLock<Option<mpsc::Sender<ClientMessage>>>>,
    event_tx: mpsc::Sender<SessionEvent>,
}

/// Drive one connect lifetime: a fresh state machine, interpreted until it
/// reaches `Closed` (budget exhausted) or the task is aborted by
/// `disconnect()`.
async fn run_driver(ctx: DriverContext) {
    let mut ctl = ReconnectController::new(ctx.config.reconnect);
    let mut heartbeat = HeartbeatMonitor::new(ctx.config.ping_interval);
    let mut reader: Option<SplitStream<WsStream>> = None;
    let mut out_tx: Option<mpsc::Sender<ClientMessage>> = None;

    let mut pending = VecDeque::from([LinkEvent::ConnectRequested]);
    while let Some(event) = pending.pop_front() {
        let effects = ctl.handle(event);
        // Publish the post-transition phase before running the effects, so
        // an editor that reacts to an emitted event observes the new phase.
        *ctx.phase.write().await = ctl.phase();

        for effect in effects {
            match effect {
                Effect::OpenSocket => {
                    log::debug!("opening socket to {}", ctx.url);
                    match tokio_tungstenite::connect_async(&ctx.url).await {
                        Ok((stream, _)) => {
                            let (sink, stream) = stream.split();
                            let (tx, rx) = mpsc::channel::<ClientMessage>(256);
                            spawn_writer(sink, rx);
                            out_tx = Some(tx);
                            reader = Some(stream);
                            pending.push_back(LinkEvent::SocketOpened);
                        }
                        Err(e) => {
                            log::warn!("connect to {} failed: {e}", ctx.url);
                            pending.push_back(LinkEvent::SocketClosed);
                        }
                    }
                }
                Effect::SendJoin => {
                    if let Some(tx) = &out_tx {
                        let _ = tx
                            .send(ClientMessage::Join {
                                user_id: ctx.identity.user_id.clone(),
                                user_name: ctx.identity.user_name.clone(),
                                user_avatar: ctx.identity.user_avatar.clone(),
                                document_id: ctx.document_id.clone(),
                            })
                            .await;
                    }
                }
                Effect::ArmHeartbeat => {
                    if let Some(tx) = &out_tx {
                        heartbeat.arm(tx.clone());
                    }
                }
                Effect::DisarmHeartbeat => heartbeat.disarm(),
                Effect::NotifyConnected => {
                    // Public sends unlock only now, after the join envelope
                    // is queued ahead of them.
                    *ctx.outgoing.write().await = out_tx.clone();
                    log::info!("connected to {}", ctx.url);
                    let _ = ctx.event_tx.send(SessionEvent::Connected).await;
                }
                Effect::NotifyDisconnected => {
                    ctx.outgoing.write().await.take();
                    out_tx = None;
                    let _ = ctx.event_tx.send(SessionEvent::Disconnected).await;
                }
                Effect::ScheduleRetry(delay) => {
                    ctx.outgoing.write().await.take();
                    out_tx = None;
                    log::info!(
                        "reconnect attempt {} of {} in {delay:?}",
                        ctl.attempt(),
                        ctl.policy().max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    pending.push_back(LinkEvent::RetryTimerFired);
                }
                Effect::NotifyReconnectFailed => {
                    ctx.outgoing.write().await.take();
                    log::warn!("reconnect budget exhausted for {}", ctx.url);
                    let _ = ctx.event_tx.send(SessionEvent::ReconnectFailed).await;
                    return;
                }
                // Only produced for DisconnectRequested, which is handled by
                // `disconnect()` outside the driver.
                Effect::SendLeave | Effect::CloseSocket | Effect::CancelRetry => {}
            }
        }

        // Steady state: pump the socket until it closes, then feed the
        // closure back into the state machine.
        if pending.is_empty() && ctl.phase() == Phase::Connected {
            if let Some(mut stream) = reader.take() {
                pump_inbound(&mut stream, &ctx).await;
                pending.push_back(LinkEvent::SocketClosed);
            }
        }
    }
}

fn spawn_writer(mut sink: SplitSink<WsStream, Message>, mut rx: mpsc::Receiver<ClientMessage>) {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let bytes = match msg.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("failed to encode outbound envelope: {e}");
                    continue;
                }
            };
            if sink.send(Message::Binary(bytes.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });
}

/// Read frames until the socket closes or errors. Malformed envelopes are
/// logged and dropped without touching the store; the connection stays open.
async fn pump_inbound(stream: &mut SplitStream<WsStream>, ctx: &DriverContext) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => route_inbound(text.as_bytes(), ctx).await,
            Ok(Message::Binary(data)) => route_inbound(&data, ctx).await,
            Ok(Message::Close(_)) => break,
            // Transport-level ping/pong is tungstenite's concern.
            Ok(_) => {}
            Err(e) => {
                log::warn!("socket error: {e}");
                let _ = ctx.event_tx.send(SessionEvent::Error(e.to_string())).await;
                break;
            }
        }
    }
}

async fn route_inbound(bytes: &[u8], ctx: &DriverContext) {
    let msg = match ServerMessage::decode(bytes) {
        Ok(msg) => msg,
        Err(e) => {
            log::warn!("dropping malformed envelope: {e}");
            return;
        }
    };

    let event = match msg {
        ServerMessage::UserJoined {
            user_id,
            user_name,
            user_avatar,
        } => {
            // The relay never echoes our own join; guard anyway.
            if user_id == ctx.identity.user_id {
                return;
            }
            let participant = Participant::new(user_id, user_name, user_avatar);
            ctx.presence.write().await.apply_join(participant.clone());
            SessionEvent::UserJoined(participant)
        }
        ServerMessage::UserLeft { user_id } => {
            ctx.presence.write().await.apply_leave(&user_id);
            SessionEvent::UserLeft { user_id }
        }
        ServerMessage::CursorMoved { user_id, position } => {
            ctx.presence.write().await.apply_cursor(&user_id, position);
            SessionEvent::CursorMoved { user_id, position }
        }
        ServerMessage::SelectionChanged { user_id, selection } => {
            ctx.presence
                .write()
                .await
                .apply_selection(&user_id, selection);
            SessionEvent::SelectionChanged { user_id, selection }
        }
        ServerMessage::ContentChanged { user_id, changes } => {
            // Opaque to this layer; the editor interprets it.
            SessionEvent::ContentChanged { user_id, changes }
        }
        ServerMessage::PresenceUpdate { users } => {
            let mut store = ctx.presence.write().await;
            store.apply_snapshot(users);
            SessionEvent::PresenceUpdate(store.all().into_iter().cloned().collect())
        }
        // Liveness only; nothing to route.
        ServerMessage::Pong => return,
    };
    let _ = ctx.event_tx.send(event).await;
}
