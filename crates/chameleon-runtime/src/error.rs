//! Runtime error types.

use chameleon_core::{BotError, TransportError};
use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded, looked up or validated.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A collaborator the bot cannot run without was not supplied.
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// `start()` was called while the bot is already running.
    #[error("Bot is already running")]
    AlreadyRunning,

    /// The webhook server could not be set up.
    #[error("Webhook server error: {0}")]
    Server(#[from] TransportError),

    /// The bot stopped in a terminal disconnected state with a cause.
    #[error("Bot disconnected: {0}")]
    Disconnected(BotError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
