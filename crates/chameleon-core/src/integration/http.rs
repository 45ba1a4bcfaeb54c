//! Contract of the embedding HTTP server that receives webhook callbacks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::foundation::error::{BotError, TransportResult};
use crate::foundation::webhook::Payload;

/// HTTP methods routes can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// Normalises a route path to a single leading `/` without a trailing one.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{trimmed}")
}

/// An inbound request as seen by a route handler.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Request path, normalised.
    pub path: String,
    /// Headers with lowercase names.
    pub headers: HashMap<String, String>,
    /// Body parsed as a mapping; `None` when absent or not a mapping.
    pub body: Option<Payload>,
}

impl WebhookRequest {
    /// Creates a request without headers.
    pub fn new(method: HttpMethod, path: &str, body: Option<Payload>) -> Self {
        Self {
            method,
            path: normalize_path(path),
            headers: HashMap::new(),
            body,
        }
    }
}

/// A handler's answer. Handlers returning `None` produce an empty 200.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl HttpResponse {
    /// An empty 200.
    pub fn ok() -> Self {
        Self {
            status: 200,
            body: None,
        }
    }

    /// A 200 with a JSON body.
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }
}

/// Future returned by a [`RouteHandler`].
pub type RouteFuture = BoxFuture<'static, Result<Option<HttpResponse>, BotError>>;

/// Handles requests on one `(method, path)` pair.
pub type RouteHandler = Arc<dyn Fn(WebhookRequest) -> RouteFuture + Send + Sync>;

/// Receives failures returned by route handlers.
pub type ErrorHandler = Arc<dyn Fn(&BotError) + Send + Sync>;

/// The HTTP server webhook routes are registered on.
#[async_trait]
pub trait HttpServer: Send + Sync {
    /// Registers `handler` for `method` requests on `path`, replacing any
    /// previous handler for the pair.
    fn respond(&self, method: HttpMethod, path: &str, handler: RouteHandler);

    /// Registers the handler for route failures.
    fn on_error(&self, handler: ErrorHandler);

    /// Serves requests until `shutdown` is cancelled.
    async fn start(&self, shutdown: CancellationToken) -> TransportResult<()>;
}
