//! The bot orchestrator.
//!
//! A [`Bot`] owns the connection state machine and every collaborator. All
//! state changes are serialised through one loop that runs inside
//! [`Bot::start`]:
//!
//! ```text
//!  transitions ──┐
//!  signals     ──┼──► run loop ──► StateMachine::apply
//!  transport   ──┘        │
//!                         ├─ entered Connecting   → (re)start the connect sequence
//!                         ├─ became ready         → connection observers, then forwarding on
//!                         └─ entered Disconnected → transport down, disconnection observers, exit
//! ```
//!
//! The connect sequence (authenticate, bootstrap, transport connect) and the
//! session download run as background tasks and report back through the
//! signal channel. At most one connect sequence is alive at a time.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chameleon_core::{
    ApiResult, Authenticator, BootstrapRequest, BootstrapResponse, BotError, BoxFuture,
    ConnectionEvent, ConnectionState, HttpServer, RealtimeEvent, RequestApi, SessionSnapshot,
    StateMachine, StateTransition, Substate, Transport, TransportObserver, TransportSignal, User,
    is_ready,
};
use chameleon_framework::{Dispatcher, Service, ServiceContext, ServiceRegistry};
use parking_lot::{Mutex, RwLock};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::auth::TokenAuthenticator;
use crate::config::{BotConfig, ConfigError, ConfigLoader, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::webhook::WebhookRouter;

const TRANSITION_CAPACITY: usize = 64;
const TEAM_JOIN: &str = "team_join";

// =============================================================================
// Shared state
// =============================================================================

/// Messages posted to the run loop by background tasks and by [`Bot::stop`].
pub(crate) enum Signal {
    /// Applied as is.
    Event(ConnectionEvent),
    /// Reported by connect sequence `generation`; dropped once it is superseded.
    Attempt {
        generation: u64,
        outcome: AttemptOutcome,
    },
}

pub(crate) enum AttemptOutcome {
    Failed(BotError),
    SessionLoaded(SessionSnapshot),
}

/// One connect sequence and the session download it started.
struct Attempt {
    generation: u64,
    token: CancellationToken,
    failed: AtomicBool,
}

struct Receivers {
    transitions: mpsc::UnboundedReceiver<StateTransition>,
    signals: mpsc::UnboundedReceiver<Signal>,
    transport: mpsc::UnboundedReceiver<TransportSignal>,
}

/// State shared between the run loop, background tasks and webhook routes.
pub(crate) struct BotShared {
    config: BotConfig,
    api: Arc<dyn RequestApi>,
    transport: Arc<dyn Transport>,
    authenticator: Arc<dyn Authenticator>,
    pub(crate) dispatcher: Dispatcher,
    machine: Mutex<StateMachine>,
    session: RwLock<Arc<SessionSnapshot>>,
    /// Cleared while connection observers run and whenever the bot is not ready.
    forwarding: AtomicBool,
    connect_task: Mutex<Option<Arc<Attempt>>>,
    /// Generation of the live connect sequence; bumped on every start and cancel.
    generation: AtomicU64,
    signals: mpsc::UnboundedSender<Signal>,
    transitions: broadcast::Sender<StateTransition>,
}

impl BotShared {
    fn post(&self, event: ConnectionEvent) {
        self.send(Signal::Event(event));
    }

    fn send(&self, signal: Signal) {
        if self.signals.send(signal).is_err() {
            trace!("Run loop gone, signal dropped");
        }
    }

    /// Only called from the run loop.
    fn apply(&self, event: ConnectionEvent) {
        let mut machine = self.machine.lock();
        if machine.apply(event).is_none() {
            trace!(state = %machine.state(), "Event ignored");
        }
    }

    fn state(&self) -> ConnectionState {
        self.machine.lock().state().clone()
    }

    pub(crate) fn is_ready(&self) -> bool {
        is_ready(self.machine.lock().state())
    }

    /// Ready, and the connected notification has completed.
    pub(crate) fn accepts_requests(&self) -> bool {
        self.is_ready() && self.forwarding.load(Ordering::SeqCst)
    }

    pub(crate) fn context(&self) -> ServiceContext {
        ServiceContext::new(Arc::clone(&self.session.read()), Arc::clone(&self.api))
    }

    pub(crate) fn verification_token(&self) -> Option<String> {
        match self.config.verification_token() {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(error = %e, "No verification token, webhook request dropped");
                None
            }
        }
    }

    /// Sends a failure to the error observers. Dropped unless ready.
    pub(crate) async fn notify_error(&self, error: &BotError) {
        if !self.is_ready() {
            debug!(error = %error, "Bot not ready, error notification dropped");
            return;
        }
        let ctx = self.context();
        self.dispatcher.error(&ctx, error).await;
    }

    pub(crate) async fn report(&self, failures: Vec<BotError>) {
        for failure in &failures {
            self.notify_error(failure).await;
        }
    }

    // =========================================================================
    // Run loop
    // =========================================================================

    async fn run_loop(self: &Arc<Self>, rx: &mut Receivers) -> RuntimeResult<()> {
        loop {
            tokio::select! {
                biased;
                Some(transition) = rx.transitions.recv() => {
                    if self.on_transition(transition).await {
                        break;
                    }
                }
                Some(signal) = rx.signals.recv() => self.on_signal(signal),
                Some(signal) = rx.transport.recv() => self.on_transport_signal(signal).await,
                else => break,
            }
        }

        let cause = self.machine.lock().state().cause().cloned();
        match cause {
            Some(cause) => Err(RuntimeError::Disconnected(cause)),
            None => Ok(()),
        }
    }

    /// Returns `true` once the bot has settled in `Disconnected`.
    async fn on_transition(self: &Arc<Self>, transition: StateTransition) -> bool {
        info!(%transition, "Connection state changed");
        let _ = self.transitions.send(transition.clone());

        match &transition.next {
            ConnectionState::Connecting {
                attempt,
                max_attempts,
            } => {
                self.forwarding.store(false, Ordering::SeqCst);
                debug!(attempt, max_attempts, "Starting connect sequence");
                self.begin_connect();
                false
            }
            ConnectionState::Connected { .. } => {
                if transition.became_ready() {
                    self.notify_connected().await;
                }
                false
            }
            ConnectionState::Disconnected { cause } => {
                self.forwarding.store(false, Ordering::SeqCst);
                self.cancel_connect();
                self.transport.disconnect(cause.as_ref()).await;
                let ctx = self.context();
                let notified = self.dispatcher.disconnected(&ctx, cause.as_ref()).await;
                debug!(services = notified, "Disconnection observers notified");
                true
            }
        }
    }

    async fn notify_connected(&self) {
        self.forwarding.store(false, Ordering::SeqCst);
        let ctx = self.context();
        let report = self.dispatcher.connected(&ctx).await;
        info!(
            services = report.invoked,
            team = ctx.team().map(|t| t.name.as_str()).unwrap_or_default(),
            "Bot is ready"
        );
        self.report(report.failures).await;
        self.forwarding.store(true, Ordering::SeqCst);
    }

    fn on_signal(&self, signal: Signal) {
        let (generation, outcome) = match signal {
            Signal::Event(event) => return self.apply(event),
            Signal::Attempt {
                generation,
                outcome,
            } => (generation, outcome),
        };
        if generation != self.generation.load(Ordering::SeqCst) {
            trace!(generation, "Outcome of a superseded connect sequence dropped");
            return;
        }

        match outcome {
            AttemptOutcome::Failed(e) => self.apply(ConnectionEvent::retry(e)),
            AttemptOutcome::SessionLoaded(snapshot) => {
                debug!(
                    users = snapshot.users.len(),
                    channels = snapshot.channels.len(),
                    "Session data loaded"
                );
                *self.session.write() = Arc::new(snapshot);
                self.apply(ConnectionEvent::SubstateReached(Substate::SESSION_DATA));
            }
        }
    }

    async fn on_transport_signal(&self, signal: TransportSignal) {
        match signal {
            TransportSignal::Event(event) => {
                if event.is_hello() {
                    debug!("Handshake acknowledged");
                    self.apply(ConnectionEvent::SubstateReached(Substate::HANDSHAKE));
                    // consumed here; event observers never see `hello`
                    return;
                }
                if !self.accepts_requests() {
                    debug!(kind = %event.kind, "Bot not ready, event dropped");
                    return;
                }
                if event.kind == TEAM_JOIN {
                    self.record_team_join(&event);
                }
                let ctx = self.context();
                let report = self.dispatcher.event(&ctx, &event).await;
                self.report(report.failures).await;
            }
            TransportSignal::Error(e) => {
                warn!(error = %e, "Transport error");
                self.notify_error(&BotError::Transport(e)).await;
            }
            TransportSignal::Disconnected(cause) => {
                match &cause {
                    Some(e) => warn!(error = %e, "Transport disconnected"),
                    None => info!("Transport disconnected"),
                }
                self.apply(ConnectionEvent::Disconnect {
                    reconnect: true,
                    cause: cause.map(BotError::from),
                });
            }
        }
    }

    /// Replaces the snapshot with one that includes the new member.
    fn record_team_join(&self, event: &RealtimeEvent) {
        let Some(user) = event
            .payload
            .get("user")
            .and_then(|u| serde_json::from_value::<User>(u.clone()).ok())
        else {
            debug!("team_join without a readable user");
            return;
        };

        let mut session = self.session.write();
        if session.user(&user.id).is_some() {
            return;
        }
        debug!(user = %user.id, "Team member joined");
        let mut updated = SessionSnapshot::clone(&session);
        updated.users.push(user);
        *session = Arc::new(updated);
    }

    // =========================================================================
    // Connect sequence
    // =========================================================================

    fn begin_connect(self: &Arc<Self>) {
        let attempt = Arc::new(Attempt {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            token: CancellationToken::new(),
            failed: AtomicBool::new(false),
        });
        if let Some(previous) = self.connect_task.lock().replace(Arc::clone(&attempt)) {
            previous.token.cancel();
        }

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = attempt.token.cancelled() => trace!("Connect sequence cancelled"),
                result = shared.connect_sequence(&attempt) => {
                    if let Err(e) = result {
                        shared.fail(&attempt, e);
                    }
                }
            }
        });
    }

    fn cancel_connect(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(attempt) = self.connect_task.lock().take() {
            attempt.token.cancel();
        }
    }

    /// Reports the first failure of `attempt` and stops the rest of it.
    fn fail(&self, attempt: &Attempt, error: BotError) {
        if attempt.failed.swap(true, Ordering::SeqCst) {
            trace!(error = %error, "Connect sequence already failed");
            return;
        }
        attempt.token.cancel();
        warn!(generation = attempt.generation, error = %error, "Connect sequence failed");
        self.send(Signal::Attempt {
            generation: attempt.generation,
            outcome: AttemptOutcome::Failed(error),
        });
    }

    async fn connect_sequence(self: &Arc<Self>, attempt: &Arc<Attempt>) -> Result<(), BotError> {
        debug!("Authenticating");
        let credential = self.authenticator.authenticate().await?;
        self.api.authorize(credential);

        let options = self.config.bootstrap_options()?;
        let keep_alive = self.config.keep_alive()?;

        debug!(options = options.len(), "Requesting session bootstrap");
        let BootstrapResponse { url, session } =
            self.api.bootstrap(BootstrapRequest { options }).await?;
        self.await_session(session, Arc::clone(attempt));

        debug!(%url, ?keep_alive, "Connecting transport");
        self.transport.connect(&url, keep_alive).await?;
        Ok(())
    }

    fn await_session(
        self: &Arc<Self>,
        session: BoxFuture<'static, ApiResult<SessionSnapshot>>,
        attempt: Arc<Attempt>,
    ) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = attempt.token.cancelled() => trace!("Session download cancelled"),
                result = session => match result {
                    Ok(snapshot) => shared.send(Signal::Attempt {
                        generation: attempt.generation,
                        outcome: AttemptOutcome::SessionLoaded(snapshot),
                    }),
                    Err(e) => shared.fail(&attempt, e.into()),
                },
            }
        });
    }
}

// =============================================================================
// Bot
// =============================================================================

/// A chat bot: connection lifecycle plus the services it feeds.
///
/// # Example
///
/// ```rust,ignore
/// let bot = Bot::builder()
///     .api(MyApi::new())
///     .transport(MyTransport::new())
///     .service(Greeter)
///     .build()?;
/// bot.run().await?;
/// ```
pub struct Bot {
    shared: Arc<BotShared>,
    server: Arc<dyn HttpServer>,
    receivers: Mutex<Option<Receivers>>,
    running: AtomicBool,
}

impl Bot {
    /// Creates a new builder.
    pub fn builder() -> BotBuilder {
        BotBuilder::new()
    }

    fn assemble(
        config: BotConfig,
        api: Arc<dyn RequestApi>,
        transport: Arc<dyn Transport>,
        authenticator: Arc<dyn Authenticator>,
        server: Arc<dyn HttpServer>,
        registry: ServiceRegistry,
    ) -> RuntimeResult<Self> {
        if let Some(key) = authenticator
            .required_config_keys()
            .iter()
            .find(|key| !config.contains(key))
        {
            return Err(ConfigError::missing_field(*key).into());
        }

        let mut machine = StateMachine::new();
        let transitions = machine.observe();
        let (signals_tx, signals) = mpsc::unbounded_channel();
        let (observer, transport_rx) = TransportObserver::channel();
        transport.bind(observer);
        let (transitions_tx, _) = broadcast::channel(TRANSITION_CAPACITY);

        info!(
            services = registry.len(),
            "Bot assembled"
        );

        let shared = Arc::new(BotShared {
            config,
            api,
            transport,
            authenticator,
            dispatcher: Dispatcher::new(registry),
            machine: Mutex::new(machine),
            session: RwLock::new(Arc::new(SessionSnapshot::empty())),
            forwarding: AtomicBool::new(false),
            connect_task: Mutex::new(None),
            generation: AtomicU64::new(0),
            signals: signals_tx,
            transitions: transitions_tx,
        });
        WebhookRouter::new(Arc::clone(&shared)).register(server.as_ref());

        Ok(Self {
            shared,
            server,
            receivers: Mutex::new(Some(Receivers {
                transitions,
                signals,
                transport: transport_rx,
            })),
            running: AtomicBool::new(false),
        })
    }

    /// Connects and serves until the bot settles in `Disconnected`.
    ///
    /// Starts the webhook server, issues `connect` with the configured
    /// maximum attempts and processes every state change until reconnection
    /// gives up or [`stop`](Self::stop) is called. Returns
    /// [`RuntimeError::Disconnected`] when the final state carries a cause.
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Bot is already running");
            return Err(RuntimeError::AlreadyRunning);
        }
        let taken = self.receivers.lock().take();
        let Some(mut receivers) = taken else {
            self.running.store(false, Ordering::SeqCst);
            return Err(RuntimeError::AlreadyRunning);
        };
        while receivers.transport.try_recv().is_ok() {}
        while receivers.signals.try_recv().is_ok() {}

        info!("Starting bot");
        let server_shutdown = CancellationToken::new();
        self.spawn_server(server_shutdown.clone());

        let result = match self.shared.config.max_reconnect_attempts() {
            Ok(max_attempts) => {
                self.shared.post(ConnectionEvent::Connect { max_attempts });
                self.shared.run_loop(&mut receivers).await
            }
            Err(e) => {
                error!(error = %e, "Cannot read reconnection policy");
                Err(e.into())
            }
        };

        if let Err(e) = self.shared.authenticator.disconnected().await {
            warn!(error = %e, "Authenticator teardown failed");
        }
        server_shutdown.cancel();
        self.shared.cancel_connect();
        *self.receivers.lock() = Some(receivers);
        self.running.store(false, Ordering::SeqCst);

        match &result {
            Ok(()) => info!("Bot stopped"),
            Err(e) => info!(error = %e, "Bot stopped"),
        }
        result
    }

    fn spawn_server(&self, shutdown: CancellationToken) {
        let server = Arc::clone(&self.server);
        tokio::spawn(async move {
            if let Err(e) = server.start(shutdown).await {
                error!(error = %e, "Webhook server failed");
            }
        });
    }

    /// Requests a disconnect without reconnection.
    ///
    /// The running [`start`](Self::start) returns once observers were notified.
    pub fn stop(&self) {
        info!("Stop requested");
        self.shared.post(ConnectionEvent::stop(None));
    }

    /// Runs until the bot disconnects or a shutdown signal arrives.
    ///
    /// Handles Ctrl+C and, on Unix, SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until the bot disconnects or `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let running = self.start();
        tokio::pin!(running);
        tokio::select! {
            result = &mut running => result,
            () = shutdown => {
                self.stop();
                running.await
            }
        }
    }

    /// Subscribes to every state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StateTransition> {
        self.shared.transitions.subscribe()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Most recent transition.
    pub fn last_transition(&self) -> Option<StateTransition> {
        self.shared.machine.lock().last_transition().cloned()
    }

    /// Returns `true` when connected with handshake and session data.
    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    /// Returns `true` while [`start`](Self::start) is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current session snapshot (last known after a disconnect).
    pub fn session(&self) -> Arc<SessionSnapshot> {
        Arc::clone(&self.shared.session.read())
    }

    /// The configuration.
    pub fn config(&self) -> &BotConfig {
        &self.shared.config
    }

    /// The registered services.
    pub fn registry(&self) -> &ServiceRegistry {
        self.shared.dispatcher.registry()
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("state", &self.state())
            .field("running", &self.is_running())
            .field("registry", self.registry())
            .finish_non_exhaustive()
    }
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c() => {}
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            futures::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`Bot`].
///
/// The request API and the transport are required. Without an explicit
/// configuration the default [`ConfigLoader`] is used; without an
/// authenticator a [`TokenAuthenticator`] reads `auth.token`; without a
/// server the axum server listens on `server.host:server.port` (feature
/// `http-server`).
pub struct BotBuilder {
    config: Option<BotConfig>,
    api: Option<Arc<dyn RequestApi>>,
    transport: Option<Arc<dyn Transport>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    server: Option<Arc<dyn HttpServer>>,
    registry: ServiceRegistry,
    init_logging: bool,
}

impl Default for BotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BotBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            api: None,
            transport: None,
            authenticator: None,
            server: None,
            registry: ServiceRegistry::new(),
            init_logging: true,
        }
    }

    /// Uses an already loaded configuration.
    pub fn config(mut self, config: BotConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the request/response API.
    pub fn api(mut self, api: impl RequestApi + 'static) -> Self {
        self.api = Some(Arc::new(api));
        self
    }

    /// Sets the real-time transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the authenticator.
    pub fn authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    /// Sets the webhook HTTP server.
    pub fn server(mut self, server: impl HttpServer + 'static) -> Self {
        self.server = Some(Arc::new(server));
        self
    }

    /// Registers a service.
    pub fn service<S: Service>(mut self, service: S) -> Self {
        self.registry.register(service);
        self
    }

    /// Replaces the registry.
    pub fn registry(mut self, registry: ServiceRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Validates the configuration and assembles the bot.
    pub fn build(self) -> RuntimeResult<Bot> {
        let config = match self.config {
            Some(config) => config,
            None => ConfigLoader::new().load()?,
        };
        let settings = config.settings()?;
        validate_config(&settings)?;
        if self.init_logging {
            logging::init_from_config(&settings.logging);
        }

        let api = self
            .api
            .ok_or(RuntimeError::MissingCollaborator("request API"))?;
        let transport = self
            .transport
            .ok_or(RuntimeError::MissingCollaborator("transport"))?;
        let authenticator = match self.authenticator {
            Some(authenticator) => authenticator,
            None => Arc::new(TokenAuthenticator::from_config(&config)?),
        };
        let server = match self.server {
            Some(server) => server,
            None => default_server(&config)?,
        };

        Bot::assemble(config, api, transport, authenticator, server, self.registry)
    }
}

#[cfg(feature = "http-server")]
fn default_server(config: &BotConfig) -> RuntimeResult<Arc<dyn HttpServer>> {
    Ok(Arc::new(chameleon_transport::AxumHttpServer::new(
        config.server_addr()?,
    )))
}

#[cfg(not(feature = "http-server"))]
fn default_server(_config: &BotConfig) -> RuntimeResult<Arc<dyn HttpServer>> {
    Err(RuntimeError::MissingCollaborator("HTTP server"))
}

// =============================================================================
// Tests
// =============================================================================
