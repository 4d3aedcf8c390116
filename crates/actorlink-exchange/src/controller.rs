//! Session lifecycle and peer command dispatch.
//!
//! ```text
//! Unopened --handshake--> Open --close / quit / fatal error--> Closed
//! ```
//!
//! `Closed` is terminal. A session is never re-opened.

use actorlink_core::error::ExchangeError;
use tracing::{debug, info};

use crate::batch::StepBatchBuffer;
use crate::protocol::PeerCommand;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Open,
    Closed,
}

/// Callback fired on a local quit or reset notification.
pub type Listener = Box<dyn FnMut() + Send>;

/// Gatekeeper for the session state and its notification listeners.
pub struct SessionController {
    state: SessionState,
    quit_listeners: Vec<Listener>,
    reset_listeners: Vec<Listener>,
    quit_notified: bool,
}

impl SessionController {
    pub const fn new() -> Self {
        Self {
            state: SessionState::Unopened,
            quit_listeners: Vec::new(),
            reset_listeners: Vec::new(),
            quit_notified: false,
        }
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open)
    }

    pub fn on_quit(&mut self, listener: impl FnMut() + Send + 'static) {
        self.quit_listeners.push(Box::new(listener));
    }

    pub fn on_reset(&mut self, listener: impl FnMut() + Send + 'static) {
        self.reset_listeners.push(Box::new(listener));
    }

    /// Fail unless the session has never been opened.
    pub fn ensure_unopened(&self) -> Result<(), ExchangeError> {
        match self.state {
            SessionState::Unopened => Ok(()),
            SessionState::Open | SessionState::Closed => Err(ExchangeError::AlreadyOpened),
        }
    }

    pub fn mark_open(&mut self) {
        if self.state == SessionState::Unopened {
            self.state = SessionState::Open;
            info!("session open");
        }
    }

    /// Move to `Closed`. Returns whether the state changed.
    pub fn close(&mut self) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        self.state = SessionState::Closed;
        true
    }

    /// Fire the quit listeners, at most once per session.
    pub fn notify_quit(&mut self) {
        if std::mem::replace(&mut self.quit_notified, true) {
            return;
        }
        debug!(listeners = self.quit_listeners.len(), "notifying quit");
        for listener in &mut self.quit_listeners {
            listener();
        }
    }

    pub fn notify_reset(&mut self) {
        debug!(listeners = self.reset_listeners.len(), "notifying reset");
        for listener in &mut self.reset_listeners {
            listener();
        }
    }

    /// Apply a peer command.
    ///
    /// `Reset` drops every pending decision list and notifies reset listeners.
    /// `Quit` closes the session and notifies quit listeners.
    pub fn dispatch(&mut self, command: PeerCommand, batch: &mut StepBatchBuffer) {
        match command {
            PeerCommand::None => {}
            PeerCommand::Reset => {
                info!("peer requested reset");
                batch.clear_pending();
                self.notify_reset();
            }
            PeerCommand::Quit => {
                info!("peer requested quit");
                self.close();
                self.notify_quit();
            }
        }
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("quit_listeners", &self.quit_listeners.len())
            .field("reset_listeners", &self.reset_listeners.len())
            .field("quit_notified", &self.quit_notified)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
