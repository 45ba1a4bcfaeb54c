//! # Chameleon
//!
//! A chat bot runtime: connection lifecycle, reconnection and service dispatch.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  signals   ┌───────────────┐  transitions  ┌────────────┐
//! │  Transport   │──────────▶│      Bot      │──────────────▶│ Dispatcher │──▶ services
//! │  (real-time) │            │ (run loop +   │               │            │
//! └──────────────┘            │ state machine)│◀── webhooks ──│ HTTP server│
//!                             └───────────────┘               └────────────┘
//! ```
//!
//! - **Core**: connection states, the transition table, domain model and
//!   collaborator contracts
//! - **Framework**: services, their capabilities and the dispatcher
//! - **Runtime**: the [`Bot`](runtime::Bot) orchestrator, webhook routes,
//!   configuration and logging
//! - **Transport**: the axum webhook server
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chameleon::prelude::*;
//!
//! struct Greeter;
//!
//! impl Service for Greeter {
//!     fn as_connection_observer(self: Arc<Self>) -> Option<Arc<dyn ConnectionObserver>> {
//!         Some(self)
//!     }
//! }
//!
//! #[async_trait]
//! impl ConnectionObserver for Greeter {
//!     async fn connected(&self, ctx: &ServiceContext) -> ServiceResult {
//!         info!(users = ctx.session().users.len(), "Hello team");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bot = Bot::builder()
//!         .api(MyApi::new())
//!         .transport(MyTransport::new())
//!         .service(Greeter)
//!         .build()?;
//!     bot.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: read `chameleon.toml` (default)
//! - `yaml-config`: read `chameleon.yaml`
//! - `json-log`: JSON log output
//! - `http-server`: axum webhook listener (default)

pub use chameleon_core as core;
pub use chameleon_framework as framework;
pub use chameleon_runtime as runtime;
#[cfg(feature = "http-server")]
pub use chameleon_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use chameleon::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Orchestrator
    pub use chameleon_runtime::{Bot, BotBuilder, BotConfig, ConfigLoader, TokenAuthenticator};

    // Services and what they receive
    pub use chameleon_framework::{
        ConnectionObserver, DisconnectionObserver, ErrorObserver, EventObserver,
        InteractiveButtonHandler, Service, ServiceContext, ServiceResult, SlashCommandHandler,
        async_trait,
    };

    // Domain model
    pub use chameleon_core::{
        BotError, ConnectionState, InteractiveButton, RealtimeEvent, SessionSnapshot,
        SlashCommand, StateTransition,
    };

    // Collaborator contracts
    pub use chameleon_core::{Authenticator, Credential, HttpServer, RequestApi, Transport};

    // Logging
    pub use chameleon_runtime::prelude::*;
}
