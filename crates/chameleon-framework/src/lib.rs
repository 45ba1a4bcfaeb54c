//! # Chameleon Framework
//!
//! Service units and the dispatch fabric that feeds them.
//!
//! This layer provides:
//! - Capability traits services implement ([`ConnectionObserver`], [`EventObserver`],
//!   [`SlashCommandHandler`], ...)
//! - The [`ServiceRegistry`], which inspects each service once and keeps one list
//!   per capability
//! - The [`Dispatcher`], which walks those lists in registration order and
//!   reports failures instead of propagating them
//! - The [`ServiceContext`] handed to every handler

pub mod context;
pub mod dispatcher;
pub mod registry;
pub mod service;

pub use context::ServiceContext;
pub use dispatcher::{Dispatched, Dispatcher};
pub use registry::ServiceRegistry;
pub use service::{
    Capabilities, ConnectionObserver, DisconnectionObserver, ErrorObserver, EventObserver,
    InteractiveButtonHandler, Service, ServiceResult, SlashCommandHandler,
};

pub use async_trait::async_trait;
