//! Events delivered by the real-time transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single event received over the real-time channel.
///
/// The core only interprets the `hello` handshake acknowledgement; every other
/// kind is forwarded to event-observer services untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    /// Event type, e.g. `"hello"`, `"message"`, `"team_join"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The full event body.
    #[serde(default)]
    pub payload: Value,
}

impl RealtimeEvent {
    /// Event type of the handshake acknowledgement.
    pub const HELLO: &'static str = "hello";

    /// Creates a new event.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Creates the handshake acknowledgement event.
    pub fn hello() -> Self {
        Self::new(Self::HELLO, Value::Null)
    }

    /// Returns `true` if this event acknowledges the handshake.
    pub fn is_hello(&self) -> bool {
        self.kind == Self::HELLO
    }

    /// Parses a raw frame of the form `{"type": "...", ...}`.
    ///
    /// The whole frame becomes the payload. For [`Transport`](crate::Transport)
    /// implementations, which decode frames before handing events to their
    /// [`TransportObserver`](crate::TransportObserver).
    pub fn from_frame(frame: &[u8]) -> serde_json::Result<Self> {
        let payload: Value = serde_json::from_slice(frame)?;
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Self { kind, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_frame() {
        let event = RealtimeEvent::from_frame(br#"{"type":"message","text":"hi"}"#).unwrap();
        assert_eq!(event.kind, "message");
        assert_eq!(event.payload["text"], "hi");
        assert!(!event.is_hello());

        let hello = RealtimeEvent::from_frame(br#"{"type":"hello"}"#).unwrap();
        assert!(hello.is_hello());
    }

    #[test]
    fn test_from_frame_without_type() {
        let event = RealtimeEvent::from_frame(br#"{"ok":true}"#).unwrap();
        assert_eq!(event.kind, "");
        assert!(RealtimeEvent::from_frame(b"not json").is_err());
    }
}
