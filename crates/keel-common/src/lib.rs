//! ---
//! keel_section: "01-core-functionality"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Shared primitives and utilities for the service API."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Shared primitives for the Keel service API workspace.
//! This crate exposes configuration loading, logging setup, and the type
//! tokens used to key serializer registries and broker topics.

pub mod config;
pub mod logging;
pub mod types;

pub use config::{
    ApiConfig, IdentificationConfig, LoadedApiConfig, LoggingConfig, NegotiationConfig,
    ServiceDefaults,
};
pub use logging::{init_tracing, LogFormat};
pub use types::TypeKey;
