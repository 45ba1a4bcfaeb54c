//! Connection states, events and the transition function.
//!
//! The bot is only *ready* once two independent asynchronous steps have
//! completed: the real-time transport acknowledged the handshake, and the
//! session bootstrap delivered the team data. They may finish in either order,
//! so `Connected` carries a [`Substate`] flag set that is only ever grown by
//! union while the state stays `Connected`.
//!
//! # Transition table
//!
//! | From | Event | To |
//! |---|---|---|
//! | `Disconnected` | `Connect(max)` | `Connecting(1, max)` |
//! | `Connecting(a, max)` | `SubstateReached(bit)` | `Connected(bit, max)` |
//! | `Connecting(a, max)` | `Disconnect(reconnect, err)` | `Connecting(a + 1, max)` if `reconnect && a < max`, else `Disconnected(err)` |
//! | `Connected(bits, max)` | `SubstateReached(bit)` | `Connected(bits | bit, max)` |
//! | `Connected(bits, max)` | `Disconnect(true, _)` | `Connecting(1, max)` |
//! | `Connected(bits, max)` | `Disconnect(false, err)` | `Disconnected(err)` |
//!
//! Every other pair is ignored ([`transition`] returns `None`).

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::foundation::error::BotError;

// =============================================================================
// Substate
// =============================================================================

/// Flag set of the preconditions reached while connected.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Substate(u8);

impl Substate {
    /// No precondition reached.
    pub const EMPTY: Self = Self(0);
    /// The transport acknowledged the handshake.
    pub const HANDSHAKE: Self = Self(1 << 0);
    /// The session bootstrap delivered the team data.
    pub const SESSION_DATA: Self = Self(1 << 1);
    /// Every precondition of readiness.
    pub const READY: Self = Self(Self::HANDSHAKE.0 | Self::SESSION_DATA.0);

    const NAMES: [(Self, &'static str); 2] = [
        (Self::HANDSHAKE, "handshake"),
        (Self::SESSION_DATA, "session-data"),
    ];

    /// Returns the raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns the union of both sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if every flag of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Substate {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for Substate {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Display for Substate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Substate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Substate({self})")
    }
}

// =============================================================================
// ConnectionState
// =============================================================================

/// Where the bot is in its connection lifecycle.
#[derive(Debug, Clone)]
pub enum ConnectionState {
    /// Not connected. `cause` is set when an error led here.
    Disconnected {
        /// Error that ended the connection, if any.
        cause: Option<BotError>,
    },
    /// A connect sequence is in flight.
    Connecting {
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Attempts allowed before giving up.
        max_attempts: u32,
    },
    /// At least one readiness precondition has been reached.
    Connected {
        /// Preconditions reached so far.
        substate: Substate,
        /// Attempts allowed by the next reconnection cycle.
        max_reconnect_attempts: u32,
    },
}

impl ConnectionState {
    /// The state a bot starts in.
    pub const fn initial() -> Self {
        Self::Disconnected { cause: None }
    }

    /// Returns `true` if every readiness precondition has been reached.
    pub fn is_ready(&self) -> bool {
        is_ready(self)
    }

    /// Returns `true` for `Disconnected`.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }

    /// Returns `true` for `Connecting`.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. })
    }

    /// Returns the disconnection cause, if this is a `Disconnected` state with one.
    pub fn cause(&self) -> Option<&BotError> {
        match self {
            Self::Disconnected { cause } => cause.as_ref(),
            _ => None,
        }
    }

    /// Applies `event` to this state. See [`transition`].
    pub fn transition(&self, event: ConnectionEvent) -> Option<Self> {
        transition(self, event)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Change-detection equality.
///
/// Only the variant, the attempt number (`Connecting`) and the substate
/// (`Connected`) are compared; causes and attempt limits are ignored.
impl PartialEq for ConnectionState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Disconnected { .. }, Self::Disconnected { .. }) => true,
            (Self::Connecting { attempt: a, .. }, Self::Connecting { attempt: b, .. }) => a == b,
            (Self::Connected { substate: a, .. }, Self::Connected { substate: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected { cause: None } => write!(f, "Disconnected"),
            Self::Disconnected { cause: Some(e) } => write!(f, "Disconnected: {e}"),
            Self::Connecting {
                attempt,
                max_attempts,
            } => write!(f, "Connecting: attempt {attempt} of {max_attempts}"),
            Self::Connected { substate, .. } => write!(f, "Connected: {substate}"),
        }
    }
}

// =============================================================================
// ConnectionEvent
// =============================================================================

/// Signals that drive the state machine.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Drop the connection, optionally asking for a reconnect.
    Disconnect {
        /// Whether a reconnection should be attempted.
        reconnect: bool,
        /// Error that caused the disconnection.
        cause: Option<BotError>,
    },
    /// Start connecting.
    Connect {
        /// Attempts allowed for this cycle.
        max_attempts: u32,
    },
    /// One readiness precondition completed.
    SubstateReached(Substate),
}

impl ConnectionEvent {
    /// A disconnect asking for a reconnect, caused by `cause`.
    pub fn retry(cause: impl Into<BotError>) -> Self {
        Self::Disconnect {
            reconnect: true,
            cause: Some(cause.into()),
        }
    }

    /// A disconnect that must not reconnect.
    pub fn stop(cause: Option<BotError>) -> Self {
        Self::Disconnect {
            reconnect: false,
            cause,
        }
    }
}

// =============================================================================
// Transition function
// =============================================================================

/// Reconnection policy: retry iff reconnection was requested and attempts remain.
pub fn should_reconnect(reconnect: bool, attempt: u32, max_attempts: u32) -> bool {
    reconnect && attempt < max_attempts
}

/// Readiness gate: connected with every precondition reached.
pub fn is_ready(state: &ConnectionState) -> bool {
    match state {
        ConnectionState::Connected { substate, .. } => substate.contains(Substate::READY),
        _ => false,
    }
}

/// Computes the state following `current` on `event`.
///
/// Returns `None` for pairs the table does not define; unknown signals are
/// ignored, not rejected.
pub fn transition(current: &ConnectionState, event: ConnectionEvent) -> Option<ConnectionState> {
    use ConnectionEvent as E;
    use ConnectionState as S;

    match (current, event) {
        (S::Disconnected { .. }, E::Connect { max_attempts }) => Some(S::Connecting {
            attempt: 1,
            max_attempts: max_attempts.max(1),
        }),

        (S::Connecting { max_attempts, .. }, E::SubstateReached(bit)) => Some(S::Connected {
            substate: bit,
            max_reconnect_attempts: *max_attempts,
        }),

        (
            S::Connecting {
                attempt,
                max_attempts,
            },
            E::Disconnect { reconnect, cause },
        ) => {
            if should_reconnect(reconnect, *attempt, *max_attempts) {
                Some(S::Connecting {
                    attempt: attempt + 1,
                    max_attempts: *max_attempts,
                })
            } else {
                Some(S::Disconnected { cause })
            }
        }

        (
            S::Connected {
                substate,
                max_reconnect_attempts,
            },
            E::SubstateReached(bit),
        ) => Some(S::Connected {
            substate: *substate | bit,
            max_reconnect_attempts: *max_reconnect_attempts,
        }),

        (
            S::Connected {
                max_reconnect_attempts,
                ..
            },
            E::Disconnect { reconnect, cause },
        ) => {
            if reconnect {
                Some(S::Connecting {
                    attempt: 1,
                    max_attempts: *max_reconnect_attempts,
                })
            } else {
                Some(S::Disconnected { cause })
            }
        }

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::error::{ApiError, TransportError};

    fn disconnected() -> ConnectionState {
        ConnectionState::initial()
    }

    fn connecting(attempt: u32, max_attempts: u32) -> ConnectionState {
        ConnectionState::Connecting {
            attempt,
            max_attempts,
        }
    }

    fn connected(substate: Substate, max: u32) -> ConnectionState {
        ConnectionState::Connected {
            substate,
            max_reconnect_attempts: max,
        }
    }

    fn err(msg: &str) -> BotError {
        BotError::Api(ApiError::Remote(msg.to_string()))
    }

    fn all_states() -> Vec<ConnectionState> {
        vec![
            disconnected(),
            ConnectionState::Disconnected {
                cause: Some(err("boom")),
            },
            connecting(1, 3),
            connecting(3, 3),
            connected(Substate::HANDSHAKE, 3),
            connected(Substate::SESSION_DATA, 3),
            connected(Substate::READY, 3),
        ]
    }

    #[test]
    fn test_undefined_pairs_are_ignored() {
        for state in all_states() {
            match state {
                ConnectionState::Disconnected { .. } => {
                    assert!(transition(&state, ConnectionEvent::stop(None)).is_none());
                    assert!(transition(&state, ConnectionEvent::retry(err("x"))).is_none());
                    assert!(
                        transition(&state, ConnectionEvent::SubstateReached(Substate::HANDSHAKE))
                            .is_none()
                    );
                }
                ConnectionState::Connecting { .. } | ConnectionState::Connected { .. } => {
                    assert!(
                        transition(&state, ConnectionEvent::Connect { max_attempts: 5 }).is_none()
                    );
                }
            }
        }
    }

    #[test]
    fn test_connect_from_disconnected() {
        let next = transition(&disconnected(), ConnectionEvent::Connect { max_attempts: 4 });
        assert!(matches!(
            next,
            Some(ConnectionState::Connecting {
                attempt: 1,
                max_attempts: 4
            })
        ));
    }

    #[test]
    fn test_connecting_retry_until_exhausted() {
        for max in 1..=5 {
            for attempt in 1..=max {
                let next = transition(&connecting(attempt, max), ConnectionEvent::retry(err("e")))
                    .unwrap();
                if attempt < max {
                    assert_eq!(next, connecting(attempt + 1, max));
                } else {
                    assert_eq!(next.cause(), Some(&err("e")));
                }
            }
        }
    }

    #[test]
    fn test_connecting_disconnect_without_reconnect() {
        let next = transition(&connecting(1, 5), ConnectionEvent::stop(None)).unwrap();
        assert!(next.is_disconnected());
        assert!(next.cause().is_none());
    }

    #[test]
    fn test_substates_in_either_order() {
        for (first, second) in [
            (Substate::HANDSHAKE, Substate::SESSION_DATA),
            (Substate::SESSION_DATA, Substate::HANDSHAKE),
        ] {
            let s1 = transition(&connecting(1, 5), ConnectionEvent::SubstateReached(first)).unwrap();
            assert!(!s1.is_ready());
            let s2 = transition(&s1, ConnectionEvent::SubstateReached(second)).unwrap();
            assert!(s2.is_ready());
            assert!(matches!(
                s2,
                ConnectionState::Connected {
                    substate: Substate::READY,
                    max_reconnect_attempts: 5
                }
            ));
        }
    }

    #[test]
    fn test_duplicate_substate_is_idempotent() {
        let state = connected(Substate::HANDSHAKE, 2);
        let next = transition(&state, ConnectionEvent::SubstateReached(Substate::HANDSHAKE)).unwrap();
        assert_eq!(next, state);
    }

    #[test]
    fn test_full_reconnect_resets_attempts() {
        // Reached connected after exhausting two attempts.
        let state = transition(&connecting(3, 3), ConnectionEvent::SubstateReached(Substate::READY))
            .unwrap();
        let next = transition(
            &state,
            ConnectionEvent::retry(TransportError::ConnectionClosed {
                reason: "gone".into(),
            }),
        )
        .unwrap();
        assert!(matches!(
            next,
            ConnectionState::Connecting {
                attempt: 1,
                max_attempts: 3
            }
        ));
    }

    #[test]
    fn test_connected_stop() {
        let next = transition(&connected(Substate::READY, 3), ConnectionEvent::stop(Some(err("bye"))))
            .unwrap();
        assert_eq!(next.cause(), Some(&err("bye")));
    }

    #[test]
    fn test_readiness() {
        for state in all_states() {
            let expected = matches!(
                state,
                ConnectionState::Connected {
                    substate: Substate::READY,
                    ..
                }
            );
            assert_eq!(state.is_ready(), expected, "{state}");
        }
    }

    #[test]
    fn test_equality_ignores_payloads() {
        assert_eq!(
            disconnected(),
            ConnectionState::Disconnected {
                cause: Some(err("x"))
            }
        );
        assert_eq!(connecting(2, 3), connecting(2, 9));
        assert_ne!(connecting(1, 3), connecting(2, 3));
        assert_eq!(connected(Substate::HANDSHAKE, 1), connected(Substate::HANDSHAKE, 7));
        assert_ne!(connected(Substate::HANDSHAKE, 1), connected(Substate::READY, 1));
    }

    #[test]
    fn test_display() {
        assert_eq!(disconnected().to_string(), "Disconnected");
        assert_eq!(connecting(2, 3).to_string(), "Connecting: attempt 2 of 3");
        assert_eq!(
            connected(Substate::READY, 3).to_string(),
            "Connected: handshake,session-data"
        );
        assert_eq!(format!("{:?}", Substate::SESSION_DATA), "Substate(session-data)");
    }

    #[test]
    fn test_substate_bits() {
        let mut s = Substate::EMPTY;
        assert!(s.is_empty());
        s |= Substate::SESSION_DATA;
        assert!(s.contains(Substate::SESSION_DATA));
        assert!(!s.contains(Substate::READY));
        assert_eq!((s | Substate::HANDSHAKE).bits(), 0b11);
    }
}
