//! Real-time transport contract.
//!
//! A transport is a duplex channel to the messaging backend. It is told where
//! to connect and reports back through a [`TransportObserver`]; the bot turns
//! those signals into state machine events.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::foundation::error::{BotError, TransportError, TransportResult};
use crate::foundation::event::RealtimeEvent;

/// What a transport reports back to its owner.
#[derive(Debug, Clone)]
pub enum TransportSignal {
    /// An event was received. Includes the `hello` handshake acknowledgement.
    Event(RealtimeEvent),
    /// A runtime error occurred on an established connection.
    Error(TransportError),
    /// The connection ended without being asked to.
    Disconnected(Option<TransportError>),
}

/// Sending half handed to a transport through [`Transport::bind`].
///
/// Cloneable; signals sent after the owner went away are dropped.
#[derive(Debug, Clone)]
pub struct TransportObserver {
    tx: mpsc::UnboundedSender<TransportSignal>,
}

impl TransportObserver {
    /// Creates an observer together with the receiving half.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Reports a received event.
    pub fn event(&self, event: RealtimeEvent) {
        let _ = self.tx.send(TransportSignal::Event(event));
    }

    /// Reports a runtime error.
    pub fn error(&self, error: TransportError) {
        let _ = self.tx.send(TransportSignal::Error(error));
    }

    /// Reports a remote disconnection.
    pub fn disconnected(&self, cause: Option<TransportError>) {
        let _ = self.tx.send(TransportSignal::Disconnected(cause));
    }

    /// Returns `true` once the owner stopped listening.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A real-time transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attaches the observer all later signals are sent to.
    ///
    /// Called once, before the first [`connect`](Self::connect).
    fn bind(&self, observer: TransportObserver);

    /// Opens a connection to `url`, pinging every `keep_alive`.
    ///
    /// Returns once the socket is open; the handshake acknowledgement arrives
    /// later as an event.
    async fn connect(&self, url: &str, keep_alive: Duration) -> TransportResult<()>;

    /// Closes the connection. A no-op when not connected.
    async fn disconnect(&self, cause: Option<&BotError>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_observer_forwards_signals() {
        let (observer, mut rx) = TransportObserver::channel();
        observer.event(RealtimeEvent::hello());
        observer.error(TransportError::Runtime("ping timeout".into()));
        observer.disconnected(None);

        assert!(matches!(rx.recv().await, Some(TransportSignal::Event(e)) if e.is_hello()));
        assert!(matches!(rx.recv().await, Some(TransportSignal::Error(_))));
        assert!(matches!(rx.recv().await, Some(TransportSignal::Disconnected(None))));
    }

    #[test]
    fn test_observer_after_owner_dropped() {
        let (observer, rx) = TransportObserver::channel();
        drop(rx);
        assert!(observer.is_closed());
        observer.event(RealtimeEvent::hello());
    }
}
