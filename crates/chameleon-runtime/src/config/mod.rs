//! Configuration module for the Chameleon runtime.
//!
//! This module provides figment-based configuration loading, typed key lookup
//! and validation for the bot orchestrator, its transport and the webhook
//! listener.

pub mod error;
pub mod loader;
pub mod lookup;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use lookup::BotConfig;
pub use schema::{
    AuthConfig, BootstrapConfig, ChameleonConfig, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, ReconnectConfig, ServerConfig, SpanEventConfig, TransportConfig, WebhookConfig,
    keys,
};
pub use validation::validate_config;
