//! Foundation layer - errors and the domain model.

pub mod error;
pub mod event;
pub mod session;
pub mod webhook;

pub use error::{
    ApiError, ApiResult, AuthError, AuthResult, BotError, DecodeError, DecodeResult,
    TransportError, TransportResult,
};
pub use event::RealtimeEvent;
pub use session::{BotUser, Channel, Group, Im, SessionSnapshot, Team, User};
pub use webhook::{
    ButtonAction, COMMAND_PREFIX, InteractiveButton, Payload, SlashCommand, normalize_command,
};
