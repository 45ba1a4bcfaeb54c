//! Service units and the capabilities they can provide.
//!
//! A service is an opaque unit registered with the bot. It opts into any of
//! six capabilities by implementing the matching trait and returning itself
//! from the corresponding `as_*` accessor on [`Service`]. Accessors run once, at
//! registration; dispatch never inspects types.
//!
//! ```rust,ignore
//! struct Greeter;
//!
//! impl Service for Greeter {
//!     fn name(&self) -> &str {
//!         "greeter"
//!     }
//!
//!     fn as_connection_observer(self: Arc<Self>) -> Option<Arc<dyn ConnectionObserver>> {
//!         Some(self)
//!     }
//! }
//!
//! #[async_trait]
//! impl ConnectionObserver for Greeter {
//!     async fn connected(&self, ctx: &ServiceContext) -> ServiceResult {
//!         tracing::info!(users = ctx.session().users.len(), "Hello team");
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use chameleon_core::{BotError, InteractiveButton, RealtimeEvent, SlashCommand};

use crate::context::ServiceContext;

/// What capability handlers return. Failures are reported to error observers.
pub type ServiceResult = anyhow::Result<()>;

/// Notified once per connection, when the bot becomes ready.
#[async_trait]
pub trait ConnectionObserver: Send + Sync {
    /// The bot is ready; `ctx.session()` holds the full snapshot.
    async fn connected(&self, ctx: &ServiceContext) -> ServiceResult;
}

/// Notified when the bot enters `Disconnected`.
#[async_trait]
pub trait DisconnectionObserver: Send + Sync {
    /// The bot disconnected, because of `cause` if set.
    async fn disconnected(&self, ctx: &ServiceContext, cause: Option<&BotError>);
}

/// Notified of errors while the bot is ready.
#[async_trait]
pub trait ErrorObserver: Send + Sync {
    /// Something failed.
    async fn error(&self, ctx: &ServiceContext, error: &BotError);
}

/// Receives every real-time event while the bot is ready.
#[async_trait]
pub trait EventObserver: Send + Sync {
    /// Handles one event.
    async fn event(&self, ctx: &ServiceContext, event: &RealtimeEvent) -> ServiceResult;
}

/// Handles slash commands.
#[async_trait]
pub trait SlashCommandHandler: Send + Sync {
    /// Commands this handler answers to. The leading `/` is optional.
    fn slash_commands(&self) -> Vec<String>;

    /// Handles a command whose name is among [`slash_commands`](Self::slash_commands).
    async fn slash_command(&self, ctx: &ServiceContext, command: &SlashCommand) -> ServiceResult;
}

/// Handles interactive button presses.
#[async_trait]
pub trait InteractiveButtonHandler: Send + Sync {
    /// Attachment callback IDs this handler answers to.
    fn callback_ids(&self) -> Vec<String>;

    /// Handles a press whose callback ID is among [`callback_ids`](Self::callback_ids).
    async fn interactive_button(
        &self,
        ctx: &ServiceContext,
        button: &InteractiveButton,
    ) -> ServiceResult;
}

/// A unit of bot functionality.
///
/// Every accessor defaults to `None`; a service overrides the ones it supports.
pub trait Service: Send + Sync + 'static {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Probes for [`ConnectionObserver`].
    fn as_connection_observer(self: Arc<Self>) -> Option<Arc<dyn ConnectionObserver>> {
        None
    }

    /// Probes for [`DisconnectionObserver`].
    fn as_disconnection_observer(self: Arc<Self>) -> Option<Arc<dyn DisconnectionObserver>> {
        None
    }

    /// Probes for [`ErrorObserver`].
    fn as_error_observer(self: Arc<Self>) -> Option<Arc<dyn ErrorObserver>> {
        None
    }

    /// Probes for [`EventObserver`].
    fn as_event_observer(self: Arc<Self>) -> Option<Arc<dyn EventObserver>> {
        None
    }

    /// Probes for [`SlashCommandHandler`].
    fn as_slash_command_handler(self: Arc<Self>) -> Option<Arc<dyn SlashCommandHandler>> {
        None
    }

    /// Probes for [`InteractiveButtonHandler`].
    fn as_interactive_button_handler(
        self: Arc<Self>,
    ) -> Option<Arc<dyn InteractiveButtonHandler>> {
        None
    }
}

/// Which capabilities a service provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Provides [`ConnectionObserver`].
    pub connection: bool,
    /// Provides [`DisconnectionObserver`].
    pub disconnection: bool,
    /// Provides [`ErrorObserver`].
    pub error: bool,
    /// Provides [`EventObserver`].
    pub event: bool,
    /// Provides [`SlashCommandHandler`].
    pub slash_command: bool,
    /// Provides [`InteractiveButtonHandler`].
    pub interactive_button: bool,
}

impl Capabilities {
    /// Returns `true` if no capability is provided.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
