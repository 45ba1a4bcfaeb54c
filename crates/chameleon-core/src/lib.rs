//! # Chameleon Core
//!
//! The pure core of the Chameleon bot runtime.
//!
//! This crate holds everything the runtime reasons about without performing
//! I/O itself: the connection state machine, the domain model and the
//! contracts of the collaborators the runtime drives.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! Errors and the domain model:
//! - **Errors**: one `thiserror` enum per failure category, unified by [`BotError`]
//! - **Session**: the team data delivered by the bootstrap ([`SessionSnapshot`])
//! - **Events**: real-time events ([`RealtimeEvent`])
//! - **Webhooks**: models decoded from callbacks ([`SlashCommand`], [`InteractiveButton`])
//!
//! ### Connection Layer
//!
//! The lifecycle:
//! - **States**: [`ConnectionState`], [`Substate`] and the [`transition`] table
//! - **Reconnection policy**: [`should_reconnect`]
//! - **Readiness gate**: [`is_ready`]
//! - **State machine**: [`StateMachine`] posting every [`StateTransition`] to a channel
//!
//! ### Integration Layer
//!
//! Collaborator contracts: [`Transport`], [`RequestApi`], [`Authenticator`]
//! and [`HttpServer`].
//!
//! ## Connection Lifecycle
//!
//! ```text
//!                 connect(max)
//! ┌──────────────┐ ───────────▶ ┌────────────────┐  substate   ┌─────────────────┐
//! │ Disconnected │              │ Connecting(a)  │ ──────────▶ │ Connected(bits) │
//! └──────────────┘ ◀─────────── └────────────────┘ ◀────────── └─────────────────┘
//!              disconnect, no retry left     disconnect(reconnect)
//! ```
//!
//! The bot is ready once `Connected` carries both [`Substate::HANDSHAKE`] and
//! [`Substate::SESSION_DATA`].

// Architectural layers
pub mod connection;
pub mod foundation;
pub mod integration;

// Re-export foundation types
pub use foundation::{
    ApiError, ApiResult, AuthError, AuthResult, BotError, BotUser, ButtonAction, COMMAND_PREFIX,
    Channel, DecodeError, DecodeResult, Group, Im, InteractiveButton, Payload, RealtimeEvent,
    SessionSnapshot, SlashCommand, Team, TransportError, TransportResult, User, normalize_command,
};

// Re-export connection types
pub use connection::{
    ConnectionEvent, ConnectionState, StateMachine, StateTransition, Substate, is_ready,
    should_reconnect, transition,
};

// Re-export integration types
pub use integration::{
    Authenticator, BootstrapOption, BootstrapRequest, BootstrapResponse, Credential, ErrorHandler,
    HttpMethod, HttpResponse, HttpServer, InvalidBootstrapOption, RequestApi, RouteFuture,
    RouteHandler, Transport, TransportObserver, TransportSignal, WebhookRequest, normalize_path,
};

pub use futures::future::BoxFuture;

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::*;
    pub use super::connection::{ConnectionState, StateTransition, Substate};
    pub use super::integration::{Credential, RequestApi};
}
