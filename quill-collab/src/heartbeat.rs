//! Periodic liveness pings for an open connection.
//!
//! The monitor's only job is to enqueue a `ping` envelope every interval
//! while the connection is up. It does not watch for pongs; failure
//! detection belongs to the socket-close path in the session. What it must
//! get right is cancellation: exactly one disarm on *every* exit from
//! `connected`, planned or not, so no stale timer keeps pinging a dead
//! socket.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::ClientMessage;

/// Default ping period.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Owns the ping timer task for one connection.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: None,
        }
    }

    /// Start pinging on the given outgoing channel. The first ping fires one
    /// full interval after arming. Re-arming disarms the previous timer
    /// first, so at most one ping task ever exists.
    pub fn arm(&mut self, outgoing: mpsc::Sender<ClientMessage>) {
        self.disarm();
        let interval = self.interval;
        self.task = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                if outgoing.send(ClientMessage::Ping).await.is_err() {
                    // Writer gone: the connection is down, stop quietly.
                    break;
                }
            }
        }));
    }

    /// Stop the ping timer. Idempotent.
    pub fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.disarm();
    }
}
