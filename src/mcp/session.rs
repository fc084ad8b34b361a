/// Per-connection session lifecycle
///
/// A session starts `Uninitialized` and moves to `Ready` once `initialize`
/// succeeds. It never goes back; it simply ends when the connection closes.

use crate::mcp::protocol::{ClientInfo, ProtocolError};

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Ready,
}

/// Session owned by one connection and threaded through dispatch
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    protocol_version: Option<String>,
    client: Option<ClientInfo>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Record a successful `initialize`
    ///
    /// Calling this again on a ready session only refreshes the negotiated
    /// details.
    pub fn mark_ready(&mut self, protocol_version: String, client: Option<ClientInfo>) {
        self.state = SessionState::Ready;
        self.protocol_version = Some(protocol_version);
        if client.is_some() {
            self.client = client;
        }
    }

    /// Gate for every method that needs a completed handshake
    pub fn require_ready(&self) -> Result<(), ProtocolError> {
        match self.state {
            SessionState::Ready => Ok(()),
            SessionState::Uninitialized => Err(ProtocolError::NotInitialized),
        }
    }

    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    pub fn client(&self) -> Option<&ClientInfo> {
        self.client.as_ref()
    }
}
