//! ---
//! keel_section: "02-transport-negotiation"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Message protocols, headers, and negotiation strategies."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use crate::header::{RequestHeader, ResponseHeader};
use crate::Result;

/// Policy that rewrites headers as a call travels between client and server.
///
/// The transport invokes the hooks in a fixed order: `transform_client_request`
/// before the request leaves the client, `transform_server_request` before the
/// call is dispatched, `transform_server_response` after the call produced its
/// result and before the header is written, and `transform_client_response`
/// when the client receives it.
pub trait HeaderTransformer: Send + Sync + fmt::Debug {
    /// Rewrite an outgoing request on the client.
    fn transform_client_request(&self, request: RequestHeader) -> Result<RequestHeader>;

    /// Rewrite an incoming request on the server.
    fn transform_server_request(&self, request: RequestHeader) -> Result<RequestHeader>;

    /// Rewrite an outgoing response on the server.
    fn transform_server_response(
        &self,
        response: ResponseHeader,
        request: &RequestHeader,
    ) -> Result<ResponseHeader>;

    /// Rewrite an incoming response on the client.
    fn transform_client_response(
        &self,
        response: ResponseHeader,
        request: &RequestHeader,
    ) -> Result<ResponseHeader>;
}

/// Transformer that leaves every header untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransformer;

impl HeaderTransformer for IdentityTransformer {
    fn transform_client_request(&self, request: RequestHeader) -> Result<RequestHeader> {
        Ok(request)
    }

    fn transform_server_request(&self, request: RequestHeader) -> Result<RequestHeader> {
        Ok(request)
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

/// Ordered composition of transformers.
///
/// Requests pass through the transformers in declaration order and responses
/// in reverse, so that the first transformer sees the request first and the
/// response last.
#[derive(Debug, Clone, Default)]
pub struct HeaderTransformerChain {
    transformers: Vec<Arc<dyn HeaderTransformer>>,
}

impl HeaderTransformerChain {
    /// Chain over the given transformers.
    pub fn new(transformers: Vec<Arc<dyn HeaderTransformer>>) -> Self {
        Self { transformers }
    }

    /// Copy with `transformer` appended.
    pub fn with(mut self, transformer: Arc<dyn HeaderTransformer>) -> Self {
        self.transformers.push(transformer);
        self
    }

    /// Number of chained transformers.
    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }
}

impl HeaderTransformer for HeaderTransformerChain {
    fn transform_client_request(&self, request: RequestHeader) -> Result<RequestHeader> {
        self.transformers
            .iter()
            .try_fold(request, |request, t| t.transform_client_request(request))
    }

    fn transform_server_request(&self, request: RequestHeader) -> Result<RequestHeader> {
        self.transformers
            .iter()
            .try_fold(request, |request, t| t.transform_server_request(request))
    }

    fn transform_server_response(
        &self,
        response: ResponseHeader,
        request: &RequestHeader,
    ) -> Result<ResponseHeader> {
        self.transformers
            .iter()
            .rev()
            .try_fold(response, |response, t| {
                t.transform_server_response(response, request)
            })
    }

    fn transform_client_response(
        &self,
        response: ResponseHeader,
        request: &RequestHeader,
    ) -> Result<ResponseHeader> {
        self.transformers
            .iter()
            .rev()
            .try_fold(response, |response, t| {
                t.transform_client_response(response, request)
            })
    }
}
