//! # Chameleon Transport
//!
//! Concrete collaborator implementations for the Chameleon bot runtime.
//!
//! ## Features
//!
//! - `http-server` (default): [`AxumHttpServer`], an axum-backed
//!   [`HttpServer`](chameleon_core::HttpServer) for webhook callbacks
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  chameleon-runtime   │  (registers webhook routes)
//! ├──────────────────────┤
//! │  chameleon-core      │  (collaborator traits)
//! ├──────────────────────┤
//! │  chameleon-transport │  <- This crate (implementations)
//! ├──────────────────────┤
//! │  Network (TCP/HTTP)  │
//! └──────────────────────┘
//! ```

#[cfg(feature = "http-server")]
pub mod server;

#[cfg(feature = "http-server")]
pub use server::AxumHttpServer;
