//! ---
//! keel_section: "02-transport-negotiation"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Message protocols, headers, and negotiation strategies."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use tracing::debug;

use crate::header::{MessageHeader, RequestHeader, ResponseHeader};
use crate::principal::Principal;
use crate::transformer::HeaderTransformer;
use crate::Result;

const USER_AGENT: &str = "User-Agent";

/// Identifies calling services through the `User-Agent` header.
///
/// The client writes the name of its service principal into the header; the
/// server turns the header back into a service principal. Responses pass
/// through untouched.
#[derive(Debug, Clone)]
pub struct UserAgentServiceIdentificationStrategy {
    header: String,
}

impl UserAgentServiceIdentificationStrategy {
    /// Strategy using a custom header name instead of `User-Agent`.
    pub fn with_header(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    /// Header carrying the service name.
    pub fn header(&self) -> &str {
        &self.header
    }
}

impl Default for UserAgentServiceIdentificationStrategy {
    fn default() -> Self {
        Self::with_header(USER_AGENT)
    }
}

impl HeaderTransformer for UserAgentServiceIdentificationStrategy {
    fn transform_client_request(&self, request: RequestHeader) -> Result<RequestHeader> {
        match request.principal().and_then(Principal::service_name) {
            Some(service_name) => {
                let service_name = service_name.to_owned();
                Ok(request.with_header(self.header.clone(), service_name))
            }
            None => Ok(request),
        }
    }

    fn transform_server_request(&self, request: RequestHeader) -> Result<RequestHeader> {
        if request.principal().is_some() {
            return Ok(request);
        }
        match request.header(&self.header).map(str::to_owned) {
            Some(service_name) if !service_name.trim().is_empty() => {
                debug!(service = %service_name, "identified calling service");
                Ok(request.with_principal(Principal::service(service_name)))
            }
            _ => Ok(request),
        }
    }

    fn transform_server_response(
        &self,
        response: ResponseHeader,
        _request: &RequestHeader,
    ) -> Result<ResponseHeader> {
        Ok(response)
    }

    fn transform_client_response(
        &self,
        response: ResponseHeader,
        _request: &RequestHeader,
    ) -> Result<ResponseHeader> {
        Ok(response)
    }
}
