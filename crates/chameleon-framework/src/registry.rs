//! The service registry.
//!
//! Services are inspected once, on registration, and sorted into one list per
//! capability. Each list keeps registration order.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::service::{
    Capabilities, ConnectionObserver, DisconnectionObserver, ErrorObserver, EventObserver,
    InteractiveButtonHandler, Service, SlashCommandHandler,
};

/// A capability implementation together with the name of its service.
pub struct Entry<T: ?Sized> {
    /// Name of the providing service.
    pub service: Arc<str>,
    /// The capability.
    pub handler: Arc<T>,
}

impl<T: ?Sized> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Registered services, sorted by capability.
#[derive(Default, Clone)]
pub struct ServiceRegistry {
    services: Vec<Arc<str>>,
    pub(crate) connection: Vec<Entry<dyn ConnectionObserver>>,
    pub(crate) disconnection: Vec<Entry<dyn DisconnectionObserver>>,
    pub(crate) error: Vec<Entry<dyn ErrorObserver>>,
    pub(crate) event: Vec<Entry<dyn EventObserver>>,
    pub(crate) slash_command: Vec<Entry<dyn SlashCommandHandler>>,
    pub(crate) interactive_button: Vec<Entry<dyn InteractiveButtonHandler>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service and returns the capabilities found on it.
    pub fn register<S: Service>(&mut self, service: S) -> Capabilities {
        self.register_arc(Arc::new(service))
    }

    /// Registers a shared service and returns the capabilities found on it.
    pub fn register_arc(&mut self, service: Arc<dyn Service>) -> Capabilities {
        let name: Arc<str> = Arc::from(service.name());

        fn push<T: ?Sized>(list: &mut Vec<Entry<T>>, service: &Arc<str>, found: Option<Arc<T>>) -> bool {
            match found {
                Some(handler) => {
                    list.push(Entry {
                        service: Arc::clone(service),
                        handler,
                    });
                    true
                }
                None => false,
            }
        }

        let capabilities = Capabilities {
            connection: push(
                &mut self.connection,
                &name,
                Arc::clone(&service).as_connection_observer(),
            ),
            disconnection: push(
                &mut self.disconnection,
                &name,
                Arc::clone(&service).as_disconnection_observer(),
            ),
            error: push(&mut self.error, &name, Arc::clone(&service).as_error_observer()),
            event: push(&mut self.event, &name, Arc::clone(&service).as_event_observer()),
            slash_command: push(
                &mut self.slash_command,
                &name,
                Arc::clone(&service).as_slash_command_handler(),
            ),
            interactive_button: push(
                &mut self.interactive_button,
                &name,
                service.as_interactive_button_handler(),
            ),
        };

        if capabilities.is_empty() {
            warn!(service = %name, "Registered service provides no capability");
        } else {
            debug!(service = %name, ?capabilities, "Service registered");
        }
        self.services.push(name);
        capabilities
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<S: Service>(mut self, service: S) -> Self {
        self.register(service);
        self
    }

    /// Names of all registered services, in registration order.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|s| &**s)
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no service is registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.services)
            .field("connection", &self.connection.len())
            .field("disconnection", &self.disconnection.len())
            .field("error", &self.error.len())
            .field("event", &self.event.len())
            .field("slash_command", &self.slash_command.len())
            .field("interactive_button", &self.interactive_button.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ServiceContext;
    use crate::service::ServiceResult;
    use async_trait::async_trait;
    use chameleon_core::{BotError, RealtimeEvent};

    struct Inert;

    impl Service for Inert {}

    struct Watcher;

    impl Service for Watcher {
        fn name(&self) -> &str {
            "watcher"
        }

        fn as_event_observer(self: Arc<Self>) -> Option<Arc<dyn EventObserver>> {
            Some(self)
        }

        fn as_disconnection_observer(self: Arc<Self>) -> Option<Arc<dyn DisconnectionObserver>> {
            Some(self)
        }
    }

    #[async_trait]
    impl EventObserver for Watcher {
        async fn event(&self, _ctx: &ServiceContext, _event: &RealtimeEvent) -> ServiceResult {
            Ok(())
        }
    }

    #[async_trait]
    impl DisconnectionObserver for Watcher {
        async fn disconnected(&self, _ctx: &ServiceContext, _cause: Option<&BotError>) {}
    }

    #[test]
    fn test_capability_probing() {
        let mut registry = ServiceRegistry::new();

        let caps = registry.register(Watcher);
        assert!(caps.event && caps.disconnection);
        assert!(!caps.connection && !caps.slash_command);

        assert!(registry.register(Inert).is_empty());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.event.len(), 1);
        assert_eq!(registry.disconnection.len(), 1);
        assert!(registry.connection.is_empty());
        assert_eq!(&*registry.event[0].service, "watcher");
    }

    #[test]
    fn test_default_name() {
        let registry = ServiceRegistry::new().with(Inert);
        let names: Vec<&str> = registry.service_names().collect();
        assert!(names[0].ends_with("Inert"));
    }
}
