//! Connection lifecycle state machine with exponential backoff.
//!
//! ```text
//! idle ──connect──► connecting ──open──► connected
//!                       │  ▲                 │
//!                  close│  │retry fired      │close / error
//!                       ▼  │                 ▼
//!                     reconnecting ◄─────────┘
//!                       │
//!                       │ attempt budget exhausted, or disconnect()
//!                       ▼
//!                     closed (terminal)
//! ```
//!
//! The controller is a pure transition function: `(state, event) -> effects`.
//! It owns no sockets and no timers, so the whole reconnect policy — delay
//! sequence, attempt budget, cancellation on explicit disconnect — is unit
//! testable without a clock. The session interprets the returned effects
//! (open a socket, schedule a retry timer, disarm the heartbeat, ...).
//!
//! Backoff doubles from `base_delay` per consecutive failed attempt and is
//! capped by `delay_ceiling` when one is configured. The attempt budget
//! keeps a permanently unreachable relay from being masked behind an
//! infinitely retrying client.

use std::time::Duration;

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal. A closed controller is never reused; `connect()` on a
    /// closed session builds a fresh one.
    Closed,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The editor asked to connect.
    ConnectRequested,
    /// A socket finished opening successfully.
    SocketOpened,
    /// The socket failed to open, errored, or closed.
    SocketClosed,
    /// The scheduled backoff timer fired.
    RetryTimerFired,
    /// The editor asked to disconnect.
    DisconnectRequested,
}

/// Side effects the session must carry out after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    OpenSocket,
    SendJoin,
    SendLeave,
    CloseSocket,
    ArmHeartbeat,
    DisarmHeartbeat,
    ScheduleRetry(Duration),
    CancelRetry,
    NotifyConnected,
    NotifyDisconnected,
    NotifyReconnectFailed,
}

/// Retry policy knobs. The defaults mirror the delay sequence
/// 1s, 2s, 4s, 8s, 16s with a terminal failure on the sixth attempt.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
    /// Upper bound on a single backoff delay. `None` leaves the doubling
    /// uncapped, which is only sane while `max_attempts` stays small.
    pub delay_ceiling: Option<Duration>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_attempts: 5,
            delay_ceiling: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay.saturating_mul(factor);
        match self.delay_ceiling {
            Some(ceiling) => delay.min(ceiling),
            None => delay,
        }
    }
}

/// The connect/disconnect/retry state machine.
#[derive(Debug)]
pub struct ReconnectController {
    phase: Phase,
    attempt: u32,
    policy: ReconnectPolicy,
}

impl ReconnectController {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            phase: Phase::Idle,
            attempt: 0,
            policy,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Consecutive failed attempts since the last successful connection.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Advance the machine. Returns the effects the caller must execute, in
    /// order. `Closed` absorbs everything.
    pub fn handle(&mut self, event: LinkEvent) -> Vec<Effect> {
        if self.phase == Phase::Closed {
            return Vec::new();
        }
        match (self.phase, event) {
            (Phase::Idle, LinkEvent::ConnectRequested) => {
                self.phase = Phase::Connecting;
                vec![Effect::OpenSocket]
            }

            (Phase::Connecting, LinkEvent::SocketOpened) => {
                self.phase = Phase::Connected;
                self.attempt = 0;
                vec![
                    Effect::SendJoin,
                    Effect::ArmHeartbeat,
                    Effect::NotifyConnected,
                ]
            }

            // Open failed, or closed before the open completed.
            (Phase::Connecting, LinkEvent::SocketClosed) => self.retry_step(Vec::new()),

            (Phase::Connected, LinkEvent::SocketClosed) => self.retry_step(vec![
                Effect::DisarmHeartbeat,
                Effect::NotifyDisconnected,
            ]),

            (Phase::Reconnecting, LinkEvent::RetryTimerFired) => {
                self.phase = Phase::Connecting;
                vec![Effect::OpenSocket]
            }

            (Phase::Idle, LinkEvent::DisconnectRequested) => {
                self.phase = Phase::Closed;
                Vec::new()
            }
            (Phase::Connecting, LinkEvent::DisconnectRequested) => {
                self.phase = Phase::Closed;
                vec![Effect::CloseSocket]
            }
            (Phase::Connected, LinkEvent::DisconnectRequested) => {
                self.phase = Phase::Closed;
                vec![
                    Effect::SendLeave,
                    Effect::DisarmHeartbeat,
                    Effect::CloseSocket,
                    Effect::NotifyDisconnected,
                ]
            }
            (Phase::Reconnecting, LinkEvent::DisconnectRequested) => {
                self.phase = Phase::Closed;
                vec![Effect::CancelRetry]
            }

            // Everything else is a stale or out-of-order signal; ignore it.
            _ => Vec::new(),
        }
    }

    fn retry_step(&mut self, mut effects: Vec<Effect>) -> Vec<Effect> {
        if self.attempt >= self.policy.max_attempts {
            self.phase = Phase::Closed;
            effects.push(Effect::NotifyReconnectFailed);
            return effects;
        }
        self.attempt += 1;
        self.phase = Phase::Reconnecting;
        effects.push(Effect::ScheduleRetry(self.policy.delay_for(self.attempt)));
        effects
    }
}
