//! Axum implementation of the webhook [`HttpServer`].
//!
//! Routes are kept in a table keyed by `(method, path)` and consulted by a
//! single fallback handler, so routes can be registered before or after the
//! listener is bound:
//!
//! ```text
//! 0.0.0.0:8080
//! ├── GET  /status             → status handler
//! ├── POST /slash-command      → slash command handler
//! └── POST /interactive-button → button handler
//! ```
//!
//! Bodies are parsed into a mapping according to `Content-Type`
//! (`application/json` or `application/x-www-form-urlencoded`). A missing or
//! non-mapping body reaches the handler as `None`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chameleon_core::{
    ErrorHandler, HttpMethod, HttpResponse, HttpServer, Payload, RouteHandler, TransportError,
    TransportResult, WebhookRequest, normalize_path,
};

// ─── Shared state ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct SharedState {
    routes: RwLock<HashMap<(HttpMethod, String), RouteHandler>>,
    error_handler: RwLock<Option<ErrorHandler>>,
}

// ─── Server ───────────────────────────────────────────────────────────────────

/// An [`HttpServer`] backed by axum.
pub struct AxumHttpServer {
    addr: String,
    state: Arc<SharedState>,
}

impl AxumHttpServer {
    /// Creates a server that will listen on `addr` (e.g. `"0.0.0.0:8080"`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            state: Arc::new(SharedState::default()),
        }
    }

    /// The configured listen address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Returns the router serving the route table.
    ///
    /// Useful for embedding into a larger axum application.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(Arc::clone(&self.state))
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.state.routes.read().len()
    }
}

#[async_trait]
impl HttpServer for AxumHttpServer {
    fn respond(&self, method: HttpMethod, path: &str, handler: RouteHandler) {
        let path = normalize_path(path);
        debug!(%method, path = %path, "Registered HTTP route");
        if self
            .state
            .routes
            .write()
            .insert((method, path.clone()), handler)
            .is_some()
        {
            warn!(%method, path = %path, "Replaced existing HTTP route");
        }
    }

    fn on_error(&self, handler: ErrorHandler) {
        *self.state.error_handler.write() = Some(handler);
    }

    async fn start(&self, shutdown: CancellationToken) -> TransportResult<()> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| TransportError::Listener(format!("{}: {e}", self.addr)))?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, routes = self.route_count(), "Webhook server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(|e| TransportError::Listener(e.to_string()))?;

        info!(addr = %local_addr, "Webhook server shut down");
        Ok(())
    }
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

async fn dispatch(
    State(state): State<Arc<SharedState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = normalize_path(uri.path());
    let method = match method {
        Method::GET => HttpMethod::Get,
        Method::POST => HttpMethod::Post,
        other => {
            return (
                StatusCode::METHOD_NOT_ALLOWED,
                format!("Unsupported method: {other}"),
            )
                .into_response();
        }
    };

    let handler = state.routes.read().get(&(method, path.clone())).cloned();
    let Some(handler) = handler else {
        return (
            StatusCode::NOT_FOUND,
            format!("No HTTP handler for {method} {path}"),
        )
            .into_response();
    };

    let request = WebhookRequest {
        method,
        path: path.clone(),
        headers: collect_headers(&headers),
        body: parse_body(&headers, &body),
    };
    debug!(%method, path = %path, len = body.len(), "Received webhook request");

    match handler(request).await {
        Ok(None) => StatusCode::OK.into_response(),
        Ok(Some(response)) => into_response(response),
        Err(e) => {
            error!(%method, path = %path, error = %e, "Webhook handler failed");
            let on_error = state.error_handler.read().clone();
            if let Some(on_error) = on_error {
                on_error(&e);
            }
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn into_response(response: HttpResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    match response.body {
        Some(body) => (status, Json(body)).into_response(),
        None => status.into_response(),
    }
}

fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}

fn parse_body(headers: &HeaderMap, body: &Bytes) -> Option<Payload> {
    if body.is_empty() {
        return None;
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        parse_form(body)
    } else if content_type.starts_with("application/json") {
        parse_json(body)
    } else {
        parse_json(body).or_else(|| parse_form(body))
    }
}

fn parse_json(body: &[u8]) -> Option<Payload> {
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_form(body: &[u8]) -> Option<Payload> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).ok()?;
    if pairs.is_empty() || pairs.iter().all(|(_, v)| v.is_empty()) {
        return None;
    }
    Some(
        pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chameleon_core::{BotError, DecodeError, RouteFuture};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn echo_keys() -> RouteHandler {
        Arc::new(|request: WebhookRequest| -> RouteFuture {
            Box::pin(async move {
                let keys: Vec<String> = request
                    .body
                    .map(|b| b.keys().cloned().collect())
                    .unwrap_or_default();
                Ok(Some(HttpResponse::json(serde_json::json!(keys))))
            })
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let server = AxumHttpServer::new("127.0.0.1:0");
        let response = server
            .router()
            .oneshot(Request::get("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_method_is_part_of_the_route() {
        let server = AxumHttpServer::new("127.0.0.1:0");
        server.respond(
            HttpMethod::Get,
            "status",
            Arc::new(|_: WebhookRequest| -> RouteFuture { Box::pin(async { Ok(None) }) }),
        );

        let ok = server
            .router()
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let wrong_method = server
            .router()
            .oneshot(Request::post("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(wrong_method.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_form_body() {
        let server = AxumHttpServer::new("127.0.0.1:0");
        server.respond(HttpMethod::Post, "/slash-command", echo_keys());

        let response = server
            .router()
            .oneshot(
                Request::post("/slash-command")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("command=%2Fweather&text=london"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!(["command", "text"]));
    }

    #[tokio::test]
    async fn test_json_body_and_missing_body() {
        let server = AxumHttpServer::new("127.0.0.1:0");
        server.respond(HttpMethod::Post, "/hook", echo_keys());

        let response = server
            .router()
            .oneshot(
                Request::post("/hook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"token":"t"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await, serde_json::json!(["token"]));

        let response = server
            .router()
            .oneshot(Request::post("/hook").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_handler_failure_reaches_error_handler() {
        let server = AxumHttpServer::new("127.0.0.1:0");
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        server.on_error(Arc::new(move |_: &BotError| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        server.respond(
            HttpMethod::Post,
            "/interactive-button",
            Arc::new(|_: WebhookRequest| -> RouteFuture {
                Box::pin(async { Err(BotError::from(DecodeError::MissingField("callback_id"))) })
            }),
        );

        let response = server
            .router()
            .oneshot(Request::post("/interactive-button").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_body_without_content_type() {
        let headers = HeaderMap::new();
        assert!(parse_body(&headers, &Bytes::from_static(b"[1,2]")).is_none());
        let form = parse_body(&headers, &Bytes::from_static(b"payload=%7B%7D")).unwrap();
        assert_eq!(form["payload"], "{}");
    }

    #[tokio::test]
    async fn test_start_stops_on_cancel() {
        let server = AxumHttpServer::new("127.0.0.1:0");
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        assert!(server.start(shutdown).await.is_ok());
    }
}
