//! Configuration loading.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. Profile variant of the config file (`chameleon.{profile}.toml`)
//! 3. The config file: the one given to [`ConfigLoader::file`], or the first of
//!    `chameleon.toml`, `config.toml` (feature `toml-config`) and
//!    `chameleon.yaml`, `chameleon.yml`, `config.yaml`, `config.yml` (feature
//!    `yaml-config`) found in the search directories
//! 4. `CHAMELEON_*` environment variables, `__` separating sections:
//!    `CHAMELEON_RECONNECT__MAX_ATTEMPTS=5` sets `reconnect.max_attempts`
//! 5. Programmatic overrides
//!
//! ```rust,ignore
//! use chameleon_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/chameleon.toml")
//!     .set("reconnect.max_attempts", 5)
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::lookup::BotConfig;
use super::schema::ChameleonConfig;

const ENV_PREFIX: &str = "CHAMELEON_";
const PROFILE_ENV: &str = "CHAMELEON_PROFILE";
const APP_DIR: &str = "chameleon";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Creates a profile from `CHAMELEON_PROFILE` or defaults to Development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Layered configuration loader.
///
/// Sources are merged in this order, later ones winning: built-in defaults,
/// the profile variant of the config file, the config file, `CHAMELEON_*`
/// variables, then values given through [`set`](Self::set) or
/// [`merge`](Self::merge).
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader for the profile named by `CHAMELEON_PROFILE`.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search. Without any, the working directory and
    /// the user config directory are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Ignores `CHAMELEON_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a whole typed configuration over every other source.
    pub fn merge(mut self, config: ChameleonConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Sets a single dotted key over every other source.
    pub fn set<V: Serialize>(mut self, key: &str, value: V) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads the configuration without validating it.
    pub fn load(self) -> ConfigResult<BotConfig> {
        let profile = self.profile.clone();
        let config = BotConfig::from_figment(self.build_figment()?);
        debug!(profile = %profile, "Configuration loaded");
        Ok(config)
    }

    /// Loads the configuration and runs [`validate_config`](super::validate_config) on it.
    pub fn load_validated(self) -> ConfigResult<BotConfig> {
        let config = self.load()?;
        super::validate_config(&config.settings()?)?;
        Ok(config)
    }

    fn build_figment(self) -> ConfigResult<Figment> {
        let defaults = Figment::from(Serialized::defaults(ChameleonConfig::default()));

        let mut figment = match &self.config_file {
            Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path.clone())),
            Some(path) => self.merge_with_profile(defaults, path)?,
            None => match self.find_config_file() {
                Some(path) => self.merge_with_profile(defaults, &path)?,
                None => {
                    warn!("No configuration file found, using defaults");
                    defaults
                }
            },
        };

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Reading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    /// Merges `chameleon.<profile>.toml` when present, then `path` itself.
    fn merge_with_profile(&self, figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let mut figment = figment;
        if let Some(variant) = profile_variant(path, &self.profile).filter(|p| p.exists()) {
            debug!(path = %variant.display(), "Loading profile configuration file");
            figment = merge_file(figment, &variant)?;
        }
        info!(path = %path.display(), "Loading configuration file");
        merge_file(figment, path)
    }

    /// First existing candidate, directory by directory.
    fn find_config_file(&self) -> Option<PathBuf> {
        let dirs = if self.search_paths.is_empty() {
            default_search_paths()
        } else {
            self.search_paths.clone()
        };
        let names = candidate_names();
        dirs.iter()
            .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
            .find(|path| path.exists())
    }
}

fn default_search_paths() -> Vec<PathBuf> {
    std::env::current_dir()
        .ok()
        .into_iter()
        .chain(dirs::config_dir().map(|dir| dir.join(APP_DIR)))
        .collect()
}

/// Config file names for the enabled formats, TOML first.
fn candidate_names() -> Vec<&'static str> {
    #[allow(unused_mut)]
    let mut names = Vec::new();
    #[cfg(feature = "toml-config")]
    names.extend(["chameleon.toml", "config.toml"]);
    #[cfg(feature = "yaml-config")]
    names.extend(["chameleon.yaml", "chameleon.yml", "config.yaml", "config.yml"]);
    names
}

/// `dir/chameleon.toml` → `dir/chameleon.<profile>.toml`.
fn profile_variant(path: &Path, profile: &Profile) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?;
    Some(path.with_file_name(format!("{stem}.{profile}.{ext}")))
}

/// Merges one file, picking the provider from its extension.
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => {
            let _ = figment;
            Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            )))
        }
    }
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<BotConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from a specific file, with environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<BotConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::keys;
    use figment::Jail;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|_jail| {
            let config = ConfigLoader::new().without_env().load().unwrap();
            assert_eq!(config.max_reconnect_attempts().unwrap(), 3);
            assert_eq!(config.settings().unwrap().logging.level.as_str(), "info");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides() {
        Jail::expect_with(|jail| {
            jail.set_env("CHAMELEON_RECONNECT__MAX_ATTEMPTS", "7");
            jail.set_env("CHAMELEON_TRANSPORT__KEEP_ALIVE", "45");
            jail.set_env("CHAMELEON_WEBHOOK__VERIFICATION_TOKEN", "secret");
            let config = ConfigLoader::new().load().unwrap();
            assert_eq!(config.max_reconnect_attempts().unwrap(), 7);
            assert_eq!(config.keep_alive().unwrap(), Duration::from_secs(45));
            assert_eq!(config.verification_token().unwrap(), "secret");
            Ok(())
        });
    }

    #[test]
    fn test_programmatic_override_wins() {
        Jail::expect_with(|jail| {
            jail.set_env("CHAMELEON_RECONNECT__MAX_ATTEMPTS", "7");
            let config = ConfigLoader::new()
                .set(keys::MAX_RECONNECT_ATTEMPTS, 2)
                .load()
                .unwrap();
            assert_eq!(config.max_reconnect_attempts().unwrap(), 2);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new().file("/nonexistent/chameleon.toml").load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_then_base_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "chameleon.production.toml",
                r#"
                [server]
                port = 9000
                "#,
            )?;
            jail.create_file(
                "chameleon.toml",
                r#"
                [reconnect]
                max_attempts = 4

                [bootstrap]
                options = ["simple_latest=true"]
                "#,
            )?;
            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.max_reconnect_attempts().unwrap(), 4);
            assert_eq!(config.server_addr().unwrap(), "0.0.0.0:9000");
            assert_eq!(config.bootstrap_options().unwrap().len(), 1);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_explicit_file_takes_its_profile_variant() {
        Jail::expect_with(|jail| {
            jail.create_file("bot.toml", "[reconnect]\nmax_attempts = 4\n")?;
            jail.create_file("bot.staging.toml", "[server]\nport = 9100\n")?;
            jail.create_file("chameleon.toml", "[reconnect]\nmax_attempts = 9\n")?;
            let config = ConfigLoader::new()
                .profile("staging")
                .file(jail.directory().join("bot.toml"))
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.max_reconnect_attempts().unwrap(), 4);
            assert_eq!(config.server_addr().unwrap(), "0.0.0.0:9100");
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("chameleon.ini", "max_attempts = 4")?;
            let result = ConfigLoader::new()
                .file(jail.directory().join("chameleon.ini"))
                .load();
            assert!(matches!(result, Err(ConfigError::ParseError(_))));
            Ok(())
        });
    }

    #[test]
    fn test_profile_variant_name() {
        let path = Path::new("/etc/chameleon/chameleon.toml");
        assert_eq!(
            profile_variant(path, &Profile::Production).unwrap(),
            Path::new("/etc/chameleon/chameleon.production.toml")
        );
        assert!(profile_variant(Path::new("/etc/chameleon/noext"), &Profile::Production).is_none());
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env(PROFILE_ENV, "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            jail.set_env(PROFILE_ENV, "Staging");
            assert_eq!(Profile::from_env(), Profile::Custom("staging".into()));
            Ok(())
        });
    }
}
