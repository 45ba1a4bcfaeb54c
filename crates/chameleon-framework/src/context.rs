//! The context handed to services on every dispatch.

use std::sync::Arc;

use serde_json::Value;

use chameleon_core::{ApiResult, BotUser, RequestApi, SessionSnapshot, Team};

/// What a service can see and use while handling a dispatch.
///
/// The session is the snapshot current when the dispatch started. A
/// reconnect publishes a new snapshot; contexts already handed out keep the
/// old one.
#[derive(Clone)]
pub struct ServiceContext {
    session: Arc<SessionSnapshot>,
    api: Arc<dyn RequestApi>,
}

impl ServiceContext {
    /// Creates a context.
    pub fn new(session: Arc<SessionSnapshot>, api: Arc<dyn RequestApi>) -> Self {
        Self { session, api }
    }

    /// The session snapshot.
    pub fn session(&self) -> &SessionSnapshot {
        &self.session
    }

    /// A shared handle to the session snapshot.
    pub fn session_arc(&self) -> Arc<SessionSnapshot> {
        Arc::clone(&self.session)
    }

    /// The bot's own identity, once a bootstrap completed.
    pub fn bot_user(&self) -> Option<&BotUser> {
        self.session.bot.as_ref()
    }

    /// The connected team, once a bootstrap completed.
    pub fn team(&self) -> Option<&Team> {
        self.session.team.as_ref()
    }

    /// The request API.
    pub fn api(&self) -> &Arc<dyn RequestApi> {
        &self.api
    }

    /// Invokes an API method.
    pub async fn call(&self, method: &str, params: Value) -> ApiResult<Value> {
        self.api.call(method, params).await
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("team", &self.team().map(|t| t.id.as_str()))
            .field("users", &self.session.users.len())
            .finish_non_exhaustive()
    }
}
