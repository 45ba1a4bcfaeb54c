//! Static token authentication.

use async_trait::async_trait;
use chameleon_core::{AuthError, AuthResult, Authenticator, Credential};
use tracing::debug;

use crate::config::{BotConfig, ConfigResult, keys};

/// An [`Authenticator`] that hands out a pre-issued bot token.
///
/// Reads `auth.token`, which it also declares as required so a bot built
/// with it fails fast when the token is not configured.
pub struct TokenAuthenticator {
    credential: Credential,
}

impl TokenAuthenticator {
    /// Creates an authenticator for a bot token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: Credential::new(token),
        }
    }

    /// Creates an authenticator from `auth.token`.
    pub fn from_config(config: &BotConfig) -> ConfigResult<Self> {
        let token: String = config.value(keys::AUTH_TOKEN)?;
        Ok(Self::new(token))
    }

    /// Adds a user token for user-scoped API methods.
    pub fn with_user_token(mut self, token: impl Into<String>) -> Self {
        self.credential = self.credential.with_user_token(token);
        self
    }
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("credential", &self.credential)
            .finish()
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(&self) -> AuthResult<Credential> {
        if self.credential.bot_token().trim().is_empty() {
            return Err(AuthError::MissingCredential(keys::AUTH_TOKEN.to_string()));
        }
        debug!("Using configured bot token");
        Ok(self.credential.clone())
    }

    fn required_config_keys(&self) -> &'static [&'static str] {
        &[keys::AUTH_TOKEN]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[tokio::test]
    async fn test_authenticate() {
        let auth = TokenAuthenticator::new("xoxb-1").with_user_token("xoxp-2");
        let credential = auth.authenticate().await.unwrap();
        assert_eq!(credential.bot_token(), "xoxb-1");
        assert_eq!(credential.user_token(), Some("xoxp-2"));
        assert!(auth.disconnected().await.is_ok());
        assert_eq!(auth.required_config_keys(), &["auth.token"]);
    }

    #[tokio::test]
    async fn test_empty_token_is_rejected() {
        let auth = TokenAuthenticator::new("  ");
        assert!(matches!(
            auth.authenticate().await,
            Err(AuthError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_from_config() {
        let config = BotConfig::defaults();
        assert!(matches!(
            TokenAuthenticator::from_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        let config = config.with(keys::AUTH_TOKEN, "xoxb-1");
        assert!(TokenAuthenticator::from_config(&config).is_ok());
    }
}
