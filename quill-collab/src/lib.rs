//! # quill-collab — Real-time collaboration client for Quill
//!
//! Synchronizes cursors, selections, content edits, and participant presence
//! between editors of the same document over a long-lived WebSocket to the
//! collaboration relay, with automatic reconnection and exponential backoff.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   SessionEvent    ┌───────────────┐
//! │   Editor     │ ◄──────────────── │ CollabSession │
//! │ (embedding)  │ ──send_cursor()─► │  (per doc)    │
//! └──────────────┘                   └───────┬───────┘
//!                                            │ tagged JSON envelopes
//!                                            ▼
//!                                    ┌───────────────┐
//!                                    │     Relay     │
//!                                    │  (external)   │
//!                                    └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — tagged JSON wire envelopes and the fail-closed codec
//! - [`color`] — deterministic participant colors from a fixed palette
//! - [`presence`] — ordered store of remote participants and their carets
//! - [`heartbeat`] — periodic liveness pings while connected
//! - [`reconnect`] — pure connect/retry state machine with bounded backoff
//! - [`session`] — composition root owning the socket and the event surface
//! - [`config`] — endpoint, heartbeat, and backoff tunables
//!
//! The actual text-merge semantics are out of scope: `content-change`
//! payloads pass through this layer opaquely and the embedding editor
//! interprets them.

pub mod color;
pub mod config;
pub mod heartbeat;
pub mod presence;
pub mod protocol;
pub mod reconnect;
pub mod session;

// Re-exports for convenience
pub use color::{color_for, Color, PALETTE};
pub use config::CollabConfig;
pub use heartbeat::HeartbeatMonitor;
pub use presence::{Participant, PresenceStore};
pub use protocol::{
    ClientMessage, CursorPosition, PresenceEntry, ProtocolError, SelectionRange, ServerMessage,
};
pub use reconnect::{Effect, LinkEvent, Phase, ReconnectController, ReconnectPolicy};
pub use session::{CollabSession, LocalIdentity, SessionEvent};
