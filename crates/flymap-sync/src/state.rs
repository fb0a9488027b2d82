//! Connection state tracking for a live map session.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Lifecycle state of a session's channel connection.
///
/// `Fallback` is terminal: the session has permanently degraded to the
/// non-real-time rendering path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Attempting to join the channel
    Connecting,
    /// Joined and applying events
    Joined,
    /// Join failed or the transport errored
    Error,
    /// Channel closed
    Closed,
    /// Reconnect budget spent; server-rendered output takes over
    Fallback,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Joined => write!(f, "Joined"),
            ConnectionState::Error => write!(f, "Error"),
            ConnectionState::Closed => write!(f, "Closed"),
            ConnectionState::Fallback => write!(f, "Fallback"),
        }
    }
}

/// Shared view of a session's state and counters.
///
/// The session actor is the only writer; handles held by the host read.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    state: Arc<parking_lot::RwLock<ConnectionState>>,
    reconnect_attempts: Arc<AtomicU32>,
    events_applied: Arc<AtomicU64>,
    events_dropped: Arc<AtomicU64>,
    fallback_notified: Arc<AtomicBool>,
    error_message: Arc<parking_lot::RwLock<Option<String>>>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStatus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(parking_lot::RwLock::new(ConnectionState::Connecting)),
            reconnect_attempts: Arc::new(AtomicU32::new(0)),
            events_applied: Arc::new(AtomicU64::new(0)),
            events_dropped: Arc::new(AtomicU64::new(0)),
            fallback_notified: Arc::new(AtomicBool::new(false)),
            error_message: Arc::new(parking_lot::RwLock::new(None)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.state(), ConnectionState::Joined)
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.state(), ConnectionState::Fallback)
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    pub fn record_reconnect_attempt(&self) -> u32 {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Called on successful join.
    pub fn reset_reconnect_attempts(&self) {
        self.reconnect_attempts.store(0, Ordering::Relaxed);
    }

    pub fn record_event_applied(&self) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied.load(Ordering::Relaxed)
    }

    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    /// Marks the fallback notification as sent. Returns true only for the
    /// first caller, so the notice goes out exactly once.
    pub fn mark_fallback_notified(&self) -> bool {
        !self.fallback_notified.swap(true, Ordering::SeqCst)
    }

    pub fn set_error(&self, message: String) {
        *self.error_message.write() = Some(message);
    }

    pub fn error_message(&self) -> Option<String> {
        self.error_message.read().clone()
    }
}
