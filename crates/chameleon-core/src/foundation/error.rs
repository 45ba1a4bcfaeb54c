//! Unified error types for the Chameleon core.
//!
//! Every reconnect-eligible failure ends up as a [`BotError`] carried by a
//! `disconnect` event, so all categories here are `Clone` and cheap to copy
//! into state values and transition records.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised by the real-time transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// The remote end closed the connection.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Runtime error on an established connection.
    #[error("transport error: {0}")]
    Runtime(String),

    /// Failed to bind or serve a listener.
    #[error("listener error: {0}")]
    Listener(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Errors raised by the request/response API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No credential has been supplied yet.
    #[error("no credential available for API call")]
    Unauthenticated,

    /// The API answered with an error code.
    #[error("API error: {0}")]
    Remote(String),

    /// The response could not be understood.
    #[error("malformed API response: {0}")]
    MalformedResponse(String),

    /// The call did not complete.
    #[error("API request failed: {0}")]
    Request(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

// =============================================================================
// Authentication Errors
// =============================================================================

/// Errors raised by an authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The authenticator has no usable credential.
    #[error("no credential available: {0}")]
    MissingCredential(String),

    /// The authentication flow was rejected.
    #[error("authentication rejected: {0}")]
    Rejected(String),

    /// Teardown of stored credentials failed.
    #[error("failed to clear credentials: {0}")]
    Teardown(String),
}

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors raised while turning an inbound webhook payload into a model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A required field was absent.
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    /// A field was present with the wrong shape.
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl DecodeError {
    /// Creates an invalid field error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Bot Error
// =============================================================================

/// The cause carried by `disconnect` events and `disconnected` states, and the
/// value handed to error-observer services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotError {
    /// Authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Bootstrap or other API failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Transport connect failure, runtime error or remote disconnection.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Webhook payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A configuration value needed by the connect sequence was unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// A service failed while handling a dispatch.
    #[error("service '{service}' failed: {message}")]
    Service {
        /// Name of the failing service.
        service: String,
        /// Rendered failure.
        message: String,
    },
}

impl BotError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a service failure from the service name and its error.
    ///
    /// The alternate format is used so that error chains (e.g. `anyhow`
    /// contexts) are kept in the message.
    pub fn service(service: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Service {
            service: service.into(),
            message: format!("{error:#}"),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for authentication.
pub type AuthResult<T> = Result<T, AuthError>;

/// Result type for webhook model decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;
