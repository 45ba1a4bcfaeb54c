//! Configuration validation utilities.

use chameleon_core::BootstrapOption;

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    ChameleonConfig, LogOutput, LoggingConfig, ReconnectConfig, ServerConfig, TransportConfig,
    keys,
};

/// Validates the entire configuration.
///
/// Log levels and formats are already checked when the configuration is
/// extracted, since they deserialize into closed enums.
pub fn validate_config(config: &ChameleonConfig) -> ConfigResult<()> {
    validate_reconnect_config(&config.reconnect)?;
    validate_transport_config(&config.transport)?;
    validate_bootstrap_options(&config.bootstrap.options)?;
    validate_server_config(&config.server)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_reconnect_config(reconnect: &ReconnectConfig) -> ConfigResult<()> {
    if reconnect.max_attempts == 0 {
        return Err(ConfigError::validation(
            "Maximum reconnection attempts must be at least 1",
        ));
    }
    Ok(())
}

fn validate_transport_config(transport: &TransportConfig) -> ConfigResult<()> {
    if transport.keep_alive.is_zero() {
        return Err(ConfigError::validation(
            "Keep-alive interval must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_bootstrap_options(options: &[String]) -> ConfigResult<()> {
    for option in options {
        option
            .parse::<BootstrapOption>()
            .map_err(|e| ConfigError::invalid_value(keys::BOOTSTRAP_OPTIONS, e.to_string()))?;
    }
    Ok(())
}

fn validate_server_config(server: &ServerConfig) -> ConfigResult<()> {
    if server.host.trim().is_empty() {
        return Err(ConfigError::missing_field(keys::SERVER_HOST));
    }
    validate_port(server.port)
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

/// Validates a port number.
fn validate_port(port: u16) -> ConfigResult<()> {
    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }
    Ok(())
}
