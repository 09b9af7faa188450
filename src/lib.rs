//! Ghostwriter provider for Hemmer.
//!
//! Manages [Ghostwriter](https://github.com/GhostManager/Ghostwriter) records
//! (domains, servers, checkouts, oplogs and their associations) through its
//! Hasura GraphQL API, and exposes lookups for activity types, server
//! providers, server roles and projects.
//!
//! # Handshake Protocol
//!
//! The binary speaks the Hemmer provider protocol over gRPC. On start it
//! binds an ephemeral localhost port and prints the handshake on stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! All logging goes to stderr.
//!
//! # Layout
//!
//! - [`server`]: the [`ProviderService`] trait and the gRPC transport
//! - [`provider`]: [`GhostwriterProvider`], routing calls by type name
//! - [`resources`] and [`data_sources`]: one module per Ghostwriter type
//! - [`client`]: the GraphQL client
//! - [`schema`], [`validation`], [`plan`]: schema-driven validation and planning
//! - [`testing`]: an in-process harness for driving a [`ProviderService`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

/// Types generated from `proto/provider.proto`.
#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod proto {
    tonic::include_proto!("hemmer.provider.v1");
}

pub use client::GhostwriterClient;
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, try_init_logging};
pub use provider::GhostwriterProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_with_options, serve_with_shutdown, ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::validate;
