//! Connection lifecycle: states, the transition table, reconnection policy and
//! the readiness gate.

pub mod machine;
pub mod state;

pub use machine::{StateMachine, StateTransition};
pub use state::{ConnectionEvent, ConnectionState, Substate, is_ready, should_reconnect, transition};
