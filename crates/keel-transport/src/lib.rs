//! ---
//! keel_section: "02-transport-negotiation"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Message protocols, headers, and negotiation strategies."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Transport-facing value types for Keel services.
//!
//! Everything in this crate is an immutable value: message protocols, request
//! and response headers, principals, and the header transformers that rewrite
//! them while a call moves between client and server. The actual wire transport
//! lives elsewhere and drives these types through [`HeaderTransformer`].
#![warn(missing_docs)]

pub mod error;
pub mod header;
pub mod identification;
pub mod method;
pub mod negotiation;
pub mod principal;
pub mod protocol;
pub mod transformer;

pub use error::{ExceptionMessage, TransportError, TransportErrorCode};
pub use header::{Headers, MessageHeader, RequestHeader, ResponseHeader};
pub use identification::UserAgentServiceIdentificationStrategy;
pub use method::Method;
pub use negotiation::PathVersionedProtocolNegotiationStrategy;
pub use principal::Principal;
pub use protocol::MessageProtocol;
pub use transformer::{HeaderTransformer, HeaderTransformerChain};

/// Shared result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
