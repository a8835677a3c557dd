//! Per-connection session state machine.
//!
//! UNINITIALIZED -> NEGOTIATING -> READY -> CLOSED, with NEGOTIATING -> CLOSED
//! on failure. Every transition is a compare-and-swap, so no state is ever
//! revisited.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::protocol::negotiation::Negotiated;
use crate::types::{McpError, McpResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Uninitialized = 0,
    Negotiating = 1,
    Ready = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SessionState::Uninitialized,
            1 => SessionState::Negotiating,
            2 => SessionState::Ready,
            _ => SessionState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Negotiating => "negotiating",
            SessionState::Ready => "ready",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One negotiated connection.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    state: AtomicU8,
    negotiated: OnceLock<Negotiated>,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: AtomicU8::new(SessionState::Uninitialized as u8),
            negotiated: OnceLock::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Version and capabilities agreed at initialization, once READY.
    pub fn negotiated(&self) -> Option<&Negotiated> {
        self.negotiated.get()
    }

    /// Whether `name` was agreed by both sides. False before negotiation.
    pub fn has_capability(&self, name: &str) -> bool {
        self.negotiated()
            .and_then(|n| n.capabilities.get(name))
            .copied()
            .unwrap_or(false)
    }

    /// Claim the session for an `initialize` request.
    pub fn begin_negotiation(&self) -> McpResult<()> {
        match self.transition(SessionState::Uninitialized, SessionState::Negotiating) {
            Ok(()) => Ok(()),
            Err(SessionState::Negotiating) => Err(McpError::InvalidRequest(
                "Initialization already in progress".to_string(),
            )),
            Err(SessionState::Ready) => Err(McpError::InvalidRequest(
                "Session already initialized".to_string(),
            )),
            Err(state) => Err(McpError::SessionNotReady(state.to_string())),
        }
    }

    /// Record the outcome and move to READY. Returns false if the session
    /// was closed while negotiating.
    pub fn complete_negotiation(&self, negotiated: Negotiated) -> bool {
        if self.state() != SessionState::Negotiating {
            return false;
        }
        // Only the NEGOTIATING owner gets here, so the cell is still empty.
        let _ = self.negotiated.set(negotiated);
        self.transition(SessionState::Negotiating, SessionState::Ready)
            .is_ok()
    }

    /// Move to CLOSED from any state. Returns true if this call closed it.
    pub fn close(&self) -> bool {
        let previous = self.state.swap(SessionState::Closed as u8, Ordering::AcqRel);
        let closed_now = previous != SessionState::Closed as u8;
        if closed_now {
            tracing::debug!(
                "Session {} closed (was {})",
                self.id,
                SessionState::from_u8(previous)
            );
        }
        closed_now
    }

    /// Error for a non-initialize request if the session cannot serve it.
    pub fn ensure_ready(&self) -> McpResult<()> {
        match self.state() {
            SessionState::Ready => Ok(()),
            state => Err(McpError::SessionNotReady(state.to_string())),
        }
    }

    fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SessionState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(SessionState::from_u8)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
