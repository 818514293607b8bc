//! ---
//! keel_section: "04-service-descriptors"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service descriptors, calls, ACLs, and serializers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Service descriptors for Keel.
//!
//! A service describes its interface with an immutable [`Descriptor`]: its
//! calls and how each is addressed, the serializers used for ids, messages
//! and errors, the ACLs it publishes, and the header strategies used to
//! negotiate protocol versions and identify callers. Routing, client
//! generation and service registration read descriptors; nothing in this
//! crate performs I/O.
#![warn(missing_docs)]

pub mod acl;
pub mod call;
pub mod descriptor;
pub mod deser;
pub mod paging;
pub mod path;
pub mod registry;
pub mod service;

pub use acl::{resolve_acls, ServiceAcl};
pub use call::{AnyCall, Call, CallId, CircuitBreakerId, ServiceCall, TopicCall};
pub use descriptor::Descriptor;
pub use paging::Page;
pub use path::{PathError, PathPattern};
pub use registry::{IdSerializers, MessageSerializers};
pub use service::{named, named_call, path_call, rest_call, topic, Service};

pub use keel_transport::{Method, TransportError};
