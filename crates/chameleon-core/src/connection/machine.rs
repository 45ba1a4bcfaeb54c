//! The stateful wrapper around [`transition`].
//!
//! [`StateMachine`] owns the current state and the last transition. Instead of
//! calling back into its owner it posts every effective transition to a
//! channel; the orchestrator consumes that channel in a single loop.

use std::fmt;

use tokio::sync::mpsc;
use tracing::trace;

use super::state::{ConnectionEvent, ConnectionState, transition};

/// One effective change of state.
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// The state left behind. `None` only for the machine's initial state.
    pub previous: Option<ConnectionState>,
    /// The state entered.
    pub next: ConnectionState,
}

impl StateTransition {
    /// Returns `true` if this transition entered a ready state from a state
    /// that was not ready.
    pub fn became_ready(&self) -> bool {
        self.next.is_ready() && !self.previous.as_ref().is_some_and(ConnectionState::is_ready)
    }

    /// Returns `true` if this transition entered `Connecting`.
    pub fn entered_connecting(&self) -> bool {
        self.next.is_connecting()
    }

    /// Returns `true` if this transition entered `Disconnected`.
    pub fn entered_disconnected(&self) -> bool {
        self.next.is_disconnected()
    }
}

impl fmt::Display for StateTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.previous {
            Some(previous) => write!(f, "{previous} -> {}", self.next),
            None => write!(f, "-> {}", self.next),
        }
    }
}

/// Holds the current [`ConnectionState`] and applies [`ConnectionEvent`]s to it.
///
/// The machine is not synchronised; the owner serialises calls to
/// [`apply`](Self::apply).
#[derive(Debug)]
pub struct StateMachine {
    current: ConnectionState,
    last_transition: Option<StateTransition>,
    observer: Option<mpsc::UnboundedSender<StateTransition>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Creates a machine in `Disconnected` with no cause.
    pub fn new() -> Self {
        Self {
            current: ConnectionState::initial(),
            last_transition: None,
            observer: None,
        }
    }

    /// Registers the observer, replacing any previous one.
    ///
    /// Every effective transition is sent to the returned receiver, in order.
    pub fn observe(&mut self) -> mpsc::UnboundedReceiver<StateTransition> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observer = Some(tx);
        rx
    }

    /// Returns the current state.
    pub fn state(&self) -> &ConnectionState {
        &self.current
    }

    /// Returns the most recent effective transition.
    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.last_transition.as_ref()
    }

    /// Returns `true` once the machine has come back to `Disconnected` after
    /// leaving it.
    pub fn is_settled(&self) -> bool {
        self.current.is_disconnected() && self.last_transition.is_some()
    }

    /// Applies `event` to the current state.
    ///
    /// Returns the transition if the state changed. Undefined pairs and
    /// transitions to an equal state leave the machine untouched and notify
    /// nobody.
    pub fn apply(&mut self, event: ConnectionEvent) -> Option<StateTransition> {
        let next = transition(&self.current, event)?;
        if next == self.current {
            trace!(state = %self.current, "Suppressed identity transition");
            return None;
        }

        let previous = std::mem::replace(&mut self.current, next.clone());
        let record = StateTransition {
            previous: Some(previous),
            next,
        };
        self.last_transition = Some(record.clone());

        if let Some(observer) = &self.observer
            && observer.send(record.clone()).is_err()
        {
            trace!("Transition observer dropped");
            self.observer = None;
        }

        Some(record)
    }
}
