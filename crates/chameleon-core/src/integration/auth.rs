//! Authenticator contract and the credential it produces.

use std::fmt;

use async_trait::async_trait;

use crate::foundation::error::AuthResult;

/// Tokens used to sign request API calls.
///
/// `Debug` never prints the tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    bot_token: String,
    user_token: Option<String>,
}

impl Credential {
    /// Creates a credential holding only a bot token.
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            user_token: None,
        }
    }

    /// Adds a user token.
    pub fn with_user_token(mut self, token: impl Into<String>) -> Self {
        self.user_token = Some(token.into());
        self
    }

    /// Returns the bot token.
    pub fn bot_token(&self) -> &str {
        &self.bot_token
    }

    /// Returns the user token, if one was granted.
    pub fn user_token(&self) -> Option<&str> {
        self.user_token.as_deref()
    }

    /// Selects the token for a call. Calls that need user scope get the user
    /// token when there is one, and the bot token otherwise.
    pub fn token_for(&self, requires_user_scope: bool) -> &str {
        match (&self.user_token, requires_user_scope) {
            (Some(user), true) => user,
            _ => &self.bot_token,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("bot_token", &"<redacted>")
            .field("user_token", &self.user_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Supplies the credential for request API calls.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Obtains a credential. Runs off the state transition path.
    async fn authenticate(&self) -> AuthResult<Credential>;

    /// Tears down whatever the authenticator holds once the bot stopped.
    async fn disconnected(&self) -> AuthResult<()> {
        Ok(())
    }

    /// Configuration keys that must be present for this authenticator.
    fn required_config_keys(&self) -> &'static [&'static str] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_selection() {
        let bot_only = Credential::new("xoxb-1");
        assert_eq!(bot_only.token_for(true), "xoxb-1");
        assert_eq!(bot_only.token_for(false), "xoxb-1");

        let both = Credential::new("xoxb-1").with_user_token("xoxp-2");
        assert_eq!(both.token_for(true), "xoxp-2");
        assert_eq!(both.token_for(false), "xoxb-1");
    }

    #[test]
    fn test_debug_redacts() {
        let rendered = format!("{:?}", Credential::new("xoxb-secret").with_user_token("xoxp-secret"));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
