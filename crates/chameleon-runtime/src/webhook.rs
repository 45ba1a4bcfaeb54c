//! Webhook routes.
//!
//! ```text
//! GET  /status             → always 200, liveness only
//! POST /slash-command      → SlashCommand        → slash command handlers
//! POST /interactive-button → payload field → InteractiveButton → button handlers
//! ```
//!
//! Requests arriving while the bot is not ready are answered with an empty
//! 200 and never decoded. Decode failures are returned to the HTTP layer.

use std::sync::Arc;

use chameleon_core::{
    BotError, HttpMethod, HttpResponse, HttpServer, InteractiveButton, RouteFuture,
    SlashCommand, WebhookRequest,
};
use tracing::{debug, warn};

use crate::bot::BotShared;

/// Route paths.
pub mod paths {
    /// Liveness check.
    pub const STATUS: &str = "/status";
    /// Slash command callbacks.
    pub const SLASH_COMMAND: &str = "/slash-command";
    /// Interactive button callbacks.
    pub const INTERACTIVE_BUTTON: &str = "/interactive-button";
}

type RouteResult = Result<Option<HttpResponse>, BotError>;

pub(crate) struct WebhookRouter {
    shared: Arc<BotShared>,
}

impl WebhookRouter {
    pub(crate) fn new(shared: Arc<BotShared>) -> Arc<Self> {
        Arc::new(Self { shared })
    }

    /// Registers the three routes and the error handler on `server`.
    pub(crate) fn register(self: &Arc<Self>, server: &dyn HttpServer) {
        server.respond(
            HttpMethod::Get,
            paths::STATUS,
            Arc::new(|_: WebhookRequest| -> RouteFuture { Box::pin(async { Ok(None) }) }),
        );

        let router = Arc::clone(self);
        server.respond(
            HttpMethod::Post,
            paths::SLASH_COMMAND,
            Arc::new(move |request: WebhookRequest| -> RouteFuture {
                let router = Arc::clone(&router);
                Box::pin(async move { router.slash_command(request).await })
            }),
        );

        let router = Arc::clone(self);
        server.respond(
            HttpMethod::Post,
            paths::INTERACTIVE_BUTTON,
            Arc::new(move |request: WebhookRequest| -> RouteFuture {
                let router = Arc::clone(&router);
                Box::pin(async move { router.interactive_button(request).await })
            }),
        );

        server.on_error(Arc::new(|e: &BotError| {
            warn!(error = %e, "Webhook request rejected");
        }));
    }

    async fn slash_command(&self, request: WebhookRequest) -> RouteResult {
        if !self.shared.accepts_requests() {
            debug!("Bot not ready, slash command dropped");
            return Ok(None);
        }
        let Some(body) = request.body else {
            debug!("Slash command without body, ignored");
            return Ok(None);
        };

        let ctx = self.shared.context();
        let command = SlashCommand::from_payload(&body, ctx.session())?;
        let Some(token) = self.shared.verification_token() else {
            return Ok(None);
        };

        let report = self
            .shared
            .dispatcher
            .slash_command(&ctx, &command, &token)
            .await;
        self.shared.report(report.failures).await;
        Ok(None)
    }

    async fn interactive_button(&self, request: WebhookRequest) -> RouteResult {
        if !self.shared.accepts_requests() {
            debug!("Bot not ready, interactive button dropped");
            return Ok(None);
        }
        let Some(form) = request.body else {
            debug!("Interactive button without body, ignored");
            return Ok(None);
        };
        let Some(payload) = InteractiveButton::embedded_payload(&form)? else {
            debug!("Interactive button without payload field, ignored");
            return Ok(None);
        };

        let ctx = self.shared.context();
        let button = InteractiveButton::from_payload(&payload, ctx.session())?;
        let Some(token) = self.shared.verification_token() else {
            return Ok(None);
        };

        let report = self
            .shared
            .dispatcher
            .interactive_button(&ctx, &button, &token)
            .await;
        self.shared.report(report.failures).await;
        Ok(None)
    }
}
