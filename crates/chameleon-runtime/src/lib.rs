//! Chameleon Runtime - Orchestration layer for the Chameleon bot runtime.
//!
//! This crate provides:
//! - The bot orchestrator (`Bot`, `BotBuilder`) driving the connection
//!   lifecycle and feeding registered services
//! - Webhook routes for slash commands and interactive buttons
//! - A token-based `Authenticator`
//! - Configuration loading and logging setup
//!
//! ```ignore
//! use chameleon_runtime::Bot;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bot = Bot::builder()
//!         .api(MyApi::new())
//!         .transport(MyTransport::new())
//!         .service(Greeter)
//!         .build()?;
//!
//!     // Run until the connection is lost for good or Ctrl+C
//!     bot.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! Settings are read from `chameleon.toml` (feature `toml-config`) or
//! `chameleon.yaml` (feature `yaml-config`), then from `CHAMELEON_*`
//! environment variables, e.g. `CHAMELEON_RECONNECT__MAX_ATTEMPTS=5`.

pub mod auth;
pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod webhook;

// Re-exports
pub use auth::TokenAuthenticator;
pub use bot::{Bot, BotBuilder};
pub use config::{BotConfig, ChameleonConfig, ConfigError, ConfigLoader, ConfigResult, Profile};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use webhook::paths;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `instrument` attribute
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
