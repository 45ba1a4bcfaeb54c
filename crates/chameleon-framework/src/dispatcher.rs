//! The service dispatch fabric.
//!
//! The [`Dispatcher`] walks one capability list of the [`ServiceRegistry`] per
//! callback, in registration order. Failures never stop the walk: each one is
//! logged, converted into [`BotError::Service`] and returned in a
//! [`Dispatched`] report for the caller to route to error observers.
//!
//! Readiness is not checked here; the bot only calls the gated paths when it
//! is ready.

use tracing::{Instrument, Level, debug, span, warn};

use chameleon_core::{
    BotError, InteractiveButton, RealtimeEvent, SlashCommand, normalize_command,
};

use crate::context::ServiceContext;
use crate::registry::{Entry, ServiceRegistry};
use crate::service::ServiceResult;

/// Outcome of one dispatch.
#[derive(Debug, Default)]
pub struct Dispatched {
    /// Number of handlers invoked.
    pub invoked: usize,
    /// Failures raised by those handlers, in invocation order.
    pub failures: Vec<BotError>,
}

impl Dispatched {
    /// Returns `true` if no handler failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record<T: ?Sized>(&mut self, entry: &Entry<T>, kind: &'static str, result: ServiceResult) {
        self.invoked += 1;
        if let Err(e) = result {
            let failure = BotError::service(&*entry.service, e);
            warn!(kind, error = %failure, "Service failed");
            self.failures.push(failure);
        }
    }
}

/// Fans callbacks out to registered services.
#[derive(Debug, Default, Clone)]
pub struct Dispatcher {
    registry: ServiceRegistry,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    pub fn new(registry: ServiceRegistry) -> Self {
        Self { registry }
    }

    /// The registry being dispatched to.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Notifies every connection observer.
    pub async fn connected(&self, ctx: &ServiceContext) -> Dispatched {
        let mut report = Dispatched::default();
        for entry in &self.registry.connection {
            let result = entry.handler.connected(ctx).await;
            report.record(entry, "connected", result);
        }
        report
    }

    /// Notifies every disconnection observer. Returns how many were notified.
    pub async fn disconnected(&self, ctx: &ServiceContext, cause: Option<&BotError>) -> usize {
        for entry in &self.registry.disconnection {
            entry.handler.disconnected(ctx, cause).await;
        }
        self.registry.disconnection.len()
    }

    /// Notifies every error observer. Returns how many were notified.
    pub async fn error(&self, ctx: &ServiceContext, error: &BotError) -> usize {
        for entry in &self.registry.error {
            entry.handler.error(ctx, error).await;
        }
        self.registry.error.len()
    }

    /// Delivers an event to every event observer.
    pub async fn event(&self, ctx: &ServiceContext, event: &RealtimeEvent) -> Dispatched {
        let span = span!(Level::DEBUG, "dispatch", kind = %event.kind);
        async {
            let mut report = Dispatched::default();
            for entry in &self.registry.event {
                let result = entry.handler.event(ctx, event).await;
                report.record(entry, "event", result);
            }
            report
        }
        .instrument(span)
        .await
    }

    /// Delivers a slash command to every handler registered for it.
    ///
    /// Nothing is invoked unless `command.token` equals `verification_token`.
    pub async fn slash_command(
        &self,
        ctx: &ServiceContext,
        command: &SlashCommand,
        verification_token: &str,
    ) -> Dispatched {
        let span = span!(Level::DEBUG, "dispatch", command = %command.command);
        async {
            let mut report = Dispatched::default();
            if command.token != verification_token {
                debug!("Slash command token mismatch, dropped");
                return report;
            }

            let wanted = normalize_command(&command.command);
            for entry in &self.registry.slash_command {
                let matches = entry
                    .handler
                    .slash_commands()
                    .iter()
                    .any(|c| normalize_command(c) == wanted);
                if matches {
                    let result = entry.handler.slash_command(ctx, command).await;
                    report.record(entry, "slash_command", result);
                }
            }

            if report.invoked == 0 {
                debug!("No handler for slash command");
            }
            report
        }
        .instrument(span)
        .await
    }

    /// Delivers a button press to every handler registered for its callback ID.
    ///
    /// Nothing is invoked unless `button.token` equals `verification_token`.
    pub async fn interactive_button(
        &self,
        ctx: &ServiceContext,
        button: &InteractiveButton,
        verification_token: &str,
    ) -> Dispatched {
        let span = span!(Level::DEBUG, "dispatch", callback_id = %button.callback_id);
        async {
            let mut report = Dispatched::default();
            if button.token != verification_token {
                debug!("Interactive button token mismatch, dropped");
                return report;
            }

            for entry in &self.registry.interactive_button {
                if entry.handler.callback_ids().contains(&button.callback_id) {
                    let result = entry.handler.interactive_button(ctx, button).await;
                    report.record(entry, "interactive_button", result);
                }
            }
            report
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{
        ConnectionObserver, ErrorObserver, EventObserver, InteractiveButtonHandler, Service,
        SlashCommandHandler,
    };
    use async_trait::async_trait;
    use chameleon_core::{
        ApiResult, BootstrapRequest, BootstrapResponse, Channel, Credential, RequestApi,
        SessionSnapshot, User,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct NoApi;

    #[async_trait]
    impl RequestApi for NoApi {
        fn authorize(&self, _credential: Credential) {}

        async fn bootstrap(&self, _request: BootstrapRequest) -> ApiResult<BootstrapResponse> {
            unreachable!("not used by dispatch tests")
        }
    }

    fn ctx() -> ServiceContext {
        ServiceContext::new(Arc::new(SessionSnapshot::empty()), Arc::new(NoApi))
    }

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        commands: Vec<String>,
        fail: bool,
        log: Log,
    }

    impl Recorder {
        fn new(name: &'static str, commands: &[&str], log: &Log) -> Self {
            Self {
                name,
                commands: commands.iter().map(|c| c.to_string()).collect(),
                fail: false,
                log: Arc::clone(log),
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn outcome(&self, what: &str) -> ServiceResult {
            self.log.lock().push(format!("{}:{what}", self.name));
            if self.fail {
                anyhow::bail!("{} exploded", self.name);
            }
            Ok(())
        }
    }

    impl Service for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn as_connection_observer(self: Arc<Self>) -> Option<Arc<dyn ConnectionObserver>> {
            Some(self)
        }

        fn as_event_observer(self: Arc<Self>) -> Option<Arc<dyn EventObserver>> {
            Some(self)
        }

        fn as_slash_command_handler(self: Arc<Self>) -> Option<Arc<dyn SlashCommandHandler>> {
            Some(self)
        }

        fn as_interactive_button_handler(
            self: Arc<Self>,
        ) -> Option<Arc<dyn InteractiveButtonHandler>> {
            Some(self)
        }

        fn as_error_observer(self: Arc<Self>) -> Option<Arc<dyn ErrorObserver>> {
            Some(self)
        }
    }

    #[async_trait]
    impl ConnectionObserver for Recorder {
        async fn connected(&self, _ctx: &ServiceContext) -> ServiceResult {
            self.outcome("connected")
        }
    }

    #[async_trait]
    impl EventObserver for Recorder {
        async fn event(&self, _ctx: &ServiceContext, event: &RealtimeEvent) -> ServiceResult {
            self.outcome(&event.kind)
        }
    }

    #[async_trait]
    impl SlashCommandHandler for Recorder {
        fn slash_commands(&self) -> Vec<String> {
            self.commands.clone()
        }

        async fn slash_command(&self, _ctx: &ServiceContext, command: &SlashCommand) -> ServiceResult {
            self.outcome(&command.command)
        }
    }

    #[async_trait]
    impl InteractiveButtonHandler for Recorder {
        fn callback_ids(&self) -> Vec<String> {
            self.commands.clone()
        }

        async fn interactive_button(
            &self,
            _ctx: &ServiceContext,
            button: &InteractiveButton,
        ) -> ServiceResult {
            self.outcome(&button.callback_id)
        }
    }

    #[async_trait]
    impl ErrorObserver for Recorder {
        async fn error(&self, _ctx: &ServiceContext, error: &BotError) {
            self.log.lock().push(format!("{}:error:{error}", self.name));
        }
    }

    fn command(token: &str, name: &str) -> SlashCommand {
        SlashCommand {
            token: token.into(),
            command: name.into(),
            text: String::new(),
            user: User::default(),
            channel: Channel::default(),
            team: None,
            response_url: None,
            trigger_id: None,
        }
    }

    fn button(token: &str, callback_id: &str) -> InteractiveButton {
        InteractiveButton {
            token: token.into(),
            callback_id: callback_id.into(),
            actions: vec![],
            user: User::default(),
            channel: Channel::default(),
            team: None,
            action_ts: None,
            message_ts: None,
            response_url: None,
            original_message: None,
        }
    }

    #[tokio::test]
    async fn test_wrong_token_invokes_nothing() {
        let log = Log::default();
        let dispatcher = Dispatcher::new(
            ServiceRegistry::new().with(Recorder::new("a", &["/deploy"], &log)),
        );

        let report = dispatcher
            .slash_command(&ctx(), &command("forged", "/deploy"), "secret")
            .await;
        assert_eq!(report.invoked, 0);

        let report = dispatcher
            .interactive_button(&ctx(), &button("forged", "/deploy"), "secret")
            .await;
        assert_eq!(report.invoked, 0);
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_all_matching_handlers_in_order() {
        let log = Log::default();
        let dispatcher = Dispatcher::new(
            ServiceRegistry::new()
                .with(Recorder::new("first", &["deploy"], &log))
                .with(Recorder::new("other", &["/status"], &log))
                .with(Recorder::new("second", &["/deploy"], &log)),
        );

        let report = dispatcher
            .slash_command(&ctx(), &command("secret", "/deploy"), "secret")
            .await;

        assert_eq!(report.invoked, 2);
        assert!(report.is_clean());
        assert_eq!(*log.lock(), vec!["first:/deploy", "second:/deploy"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_remaining_services() {
        let log = Log::default();
        let dispatcher = Dispatcher::new(
            ServiceRegistry::new()
                .with(Recorder::new("broken", &[], &log).failing())
                .with(Recorder::new("healthy", &[], &log)),
        );

        let report = dispatcher.connected(&ctx()).await;
        assert_eq!(report.invoked, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0],
            BotError::Service {
                service: "broken".into(),
                message: "broken exploded".into()
            }
        );
        assert_eq!(*log.lock(), vec!["broken:connected", "healthy:connected"]);

        let report = dispatcher
            .event(&ctx(), &RealtimeEvent::new("message", serde_json::Value::Null))
            .await;
        assert_eq!(report.invoked, 2);
        assert_eq!(report.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_button_matches_callback_id() {
        let log = Log::default();
        let dispatcher = Dispatcher::new(
            ServiceRegistry::new()
                .with(Recorder::new("approvals", &["approve"], &log))
                .with(Recorder::new("polls", &["vote"], &log)),
        );

        let report = dispatcher
            .interactive_button(&ctx(), &button("secret", "vote"), "secret")
            .await;
        assert_eq!(report.invoked, 1);
        assert_eq!(*log.lock(), vec!["polls:vote"]);
    }

    #[test]
    fn test_error_observers() {
        let log = Log::default();
        let dispatcher = Dispatcher::new(
            ServiceRegistry::new()
                .with(Recorder::new("a", &[], &log))
                .with(Recorder::new("b", &[], &log)),
        );

        let notified =
            tokio_test::block_on(dispatcher.error(&ctx(), &BotError::config("bad keep-alive")));
        assert_eq!(notified, 2);
        assert_eq!(log.lock().len(), 2);
        assert!(log.lock()[0].starts_with("a:error:"));
    }
}
