//! Typed key lookup over a loaded configuration.

use std::fmt;
use std::time::Duration;

use chameleon_core::BootstrapOption;
use figment::Figment;
use figment::providers::Serialized;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::{ConfigError, ConfigResult};
use super::schema::{ChameleonConfig, keep_alive_serde::KeepAlive, keys};

/// A loaded configuration, queried by dotted key.
///
/// Every source the [`ConfigLoader`](super::ConfigLoader) merged is visible
/// here, including keys the typed [`ChameleonConfig`] does not know about, so
/// authenticators and services can keep their own sections.
#[derive(Clone)]
pub struct BotConfig {
    figment: Figment,
}

impl BotConfig {
    /// Wraps an already merged figment.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// Built-in defaults only.
    pub fn defaults() -> Self {
        Self::from_figment(Figment::from(Serialized::defaults(
            ChameleonConfig::default(),
        )))
    }

    /// Returns a copy with `key` set to `value`, overriding every other source.
    pub fn with<V: Serialize>(self, key: &str, value: V) -> Self {
        Self {
            figment: self.figment.merge(Serialized::default(key, value)),
        }
    }

    /// Looks up `key` and converts it to `T`.
    pub fn value<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<T> {
        self.figment.extract_inner(key).map_err(|e| {
            if e.missing() {
                ConfigError::missing_field(key)
            } else {
                ConfigError::invalid_value(key, e.to_string())
            }
        })
    }

    /// Returns `true` if `key` resolves to a value.
    pub fn contains(&self, key: &str) -> bool {
        self.figment.find_value(key).is_ok()
    }

    /// Extracts the whole typed configuration.
    pub fn settings(&self) -> ConfigResult<ChameleonConfig> {
        self.figment
            .extract()
            .map_err(|e| ConfigError::ParseError(format!("Failed to extract configuration: {e}")))
    }

    /// The underlying figment.
    pub fn figment(&self) -> &Figment {
        &self.figment
    }

    // =========================================================================
    // Well-known keys
    // =========================================================================

    /// `reconnect.max_attempts`.
    pub fn max_reconnect_attempts(&self) -> ConfigResult<u32> {
        self.value(keys::MAX_RECONNECT_ATTEMPTS)
    }

    /// `transport.keep_alive`.
    pub fn keep_alive(&self) -> ConfigResult<Duration> {
        self.value::<KeepAlive>(keys::KEEP_ALIVE).map(|k| k.0)
    }

    /// `bootstrap.options`, parsed. An absent key means no options.
    pub fn bootstrap_options(&self) -> ConfigResult<Vec<BootstrapOption>> {
        let raw: Vec<String> = match self.value(keys::BOOTSTRAP_OPTIONS) {
            Ok(raw) => raw,
            Err(ConfigError::MissingField { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        raw.iter()
            .map(|option| {
                option
                    .parse()
                    .map_err(|e| ConfigError::invalid_value(keys::BOOTSTRAP_OPTIONS, format!("{e}")))
            })
            .collect()
    }

    /// `webhook.verification_token`.
    pub fn verification_token(&self) -> ConfigResult<String> {
        self.value(keys::VERIFICATION_TOKEN)
    }

    /// `server.host:server.port`.
    pub fn server_addr(&self) -> ConfigResult<String> {
        let host: String = self.value(keys::SERVER_HOST)?;
        let port: u16 = self.value(keys::SERVER_PORT)?;
        Ok(format!("{host}:{port}"))
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig").finish_non_exhaustive()
    }
}
