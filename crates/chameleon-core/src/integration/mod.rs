//! Contracts of the collaborators the bot core drives.
//!
//! Implementations live outside the core:
//!
//! - [`Transport`]: the real-time duplex channel
//! - [`RequestApi`]: the request/response API, including the session bootstrap
//! - [`Authenticator`]: supplies the [`Credential`] that signs API calls
//! - [`HttpServer`]: the embedding server webhook routes are registered on

pub mod api;
pub mod auth;
pub mod http;
pub mod transport;

pub use api::{
    BootstrapOption, BootstrapRequest, BootstrapResponse, InvalidBootstrapOption, RequestApi,
};
pub use auth::{Authenticator, Credential};
pub use http::{
    ErrorHandler, HttpMethod, HttpResponse, HttpServer, RouteFuture, RouteHandler, WebhookRequest,
    normalize_path,
};
pub use transport::{Transport, TransportObserver, TransportSignal};
