//! Request/response API contract.
//!
//! Only the session bootstrap is interpreted by the core. Services reach the
//! rest of the backend's method catalog through [`RequestApi::call`].

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use super::auth::Credential;
use crate::foundation::error::{ApiError, ApiResult};
use crate::foundation::session::SessionSnapshot;

// =============================================================================
// Bootstrap Options
// =============================================================================

/// A `key=value` option sent with the bootstrap request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BootstrapOption {
    /// Option name.
    pub key: String,
    /// Option value.
    pub value: String,
}

impl BootstrapOption {
    /// Creates a new option.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A bootstrap option string was not of the form `key=value`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid bootstrap option '{0}', expected 'key=value'")]
pub struct InvalidBootstrapOption(pub String);

impl FromStr for BootstrapOption {
    type Err = InvalidBootstrapOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) if !key.trim().is_empty() => {
                Ok(Self::new(key.trim(), value.trim()))
            }
            _ => Err(InvalidBootstrapOption(s.to_string())),
        }
    }
}

impl fmt::Display for BootstrapOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

// =============================================================================
// Bootstrap
// =============================================================================

/// The session bootstrap call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapRequest {
    /// Options forwarded to the backend.
    pub options: Vec<BootstrapOption>,
}

/// Result of a successful bootstrap call.
pub struct BootstrapResponse {
    /// URL of the real-time endpoint.
    pub url: String,
    /// Resolves once the session data has been decoded.
    ///
    /// Completes independently of the transport handshake.
    pub session: BoxFuture<'static, ApiResult<SessionSnapshot>>,
}

impl fmt::Debug for BootstrapResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapResponse")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// The request/response API.
#[async_trait]
pub trait RequestApi: Send + Sync {
    /// Stores the credential that signs later calls.
    fn authorize(&self, credential: Credential);

    /// Starts a session and returns the real-time URL.
    async fn bootstrap(&self, request: BootstrapRequest) -> ApiResult<BootstrapResponse>;

    /// Invokes an arbitrary API method.
    async fn call(&self, method: &str, params: Value) -> ApiResult<Value> {
        let _ = params;
        Err(ApiError::Request(format!("method '{method}' is not supported")))
    }
}
