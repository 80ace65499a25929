//! Session configuration.

use std::time::Duration;

use crate::heartbeat::DEFAULT_PING_INTERVAL;
use crate::reconnect::ReconnectPolicy;

/// Environment variable overriding the relay endpoint.
pub const ENDPOINT_ENV: &str = "QUILL_COLLAB_ENDPOINT";

/// Well-known local development relay.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:9090";

/// Tunables for one collaboration session.
#[derive(Debug, Clone)]
pub struct CollabConfig {
    /// Base relay endpoint, e.g. `ws://127.0.0.1:9090`. The per-document
    /// path is appended by [`collaborate_url`](Self::collaborate_url).
    pub endpoint: String,
    /// Liveness ping period while connected.
    pub ping_interval: Duration,
    /// Backoff and attempt-budget knobs.
    pub reconnect: ReconnectPolicy,
    /// Capacity of the event channel handed to the embedding editor.
    pub event_capacity: usize,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            ping_interval: DEFAULT_PING_INTERVAL,
            reconnect: ReconnectPolicy::default(),
            event_capacity: 256,
        }
    }
}

impl CollabConfig {
    /// Defaults, with the endpoint taken from `QUILL_COLLAB_ENDPOINT` when
    /// set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.is_empty() {
                config.endpoint = endpoint;
            }
        }
        config
    }

    /// Connection URL for a document: `{base}/collaborate/{documentId}`.
    /// A caller-supplied override replaces the configured base.
    pub fn collaborate_url(&self, endpoint_override: Option<&str>, document_id: &str) -> String {
        let base = endpoint_override
            .unwrap_or(&self.endpoint)
            .trim_end_matches('/');
        format!("{base}/collaborate/{document_id}")
    }
}
