//! ---
//! keel_section: "02-transport-negotiation"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Message protocols, headers, and negotiation strategies."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    /// Another service calling on its own behalf.
    Service {
        /// Name the calling service is registered under.
        service_name: String,
    },
    /// An end user, identified by an opaque name.
    User {
        /// User name or subject.
        name: String,
    },
}

impl Principal {
    /// Principal for the service with the given name.
    pub fn service(service_name: impl Into<String>) -> Self {
        Principal::Service {
            service_name: service_name.into(),
        }
    }

    /// Principal for an end user.
    pub fn user(name: impl Into<String>) -> Self {
        Principal::User { name: name.into() }
    }

    /// Display name of the principal.
    pub fn name(&self) -> &str {
        match self {
            Principal::Service { service_name } => service_name,
            Principal::User { name } => name,
        }
    }

    /// Service name when this principal is a service.
    pub fn service_name(&self) -> Option<&str> {
        match self {
            Principal::Service { service_name } => Some(service_name),
            Principal::User { .. } => None,
        }
    }
}
