//! ---
//! keel_section: "04-service-descriptors"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service descriptors, calls, ACLs, and serializers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Call descriptors: how one service operation is addressed and encoded.
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use keel_broker::TopicId;
use keel_common::TypeKey;
use keel_transport::{Method, TransportError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::deser::{IdSerializer, MessageSerializer};
use crate::path::{PathError, PathPattern};

/// How a call is addressed. The variant decides how incoming requests are
/// matched against it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CallId {
    /// Matched on method and path pattern.
    #[serde(rename_all = "camelCase")]
    Rest {
        /// HTTP method.
        method: Method,
        /// Path pattern, e.g. `/mocks/:id`.
        path_pattern: String,
    },
    /// Matched on the path pattern only.
    #[serde(rename_all = "camelCase")]
    Path {
        /// Path pattern.
        path_pattern: String,
    },
    /// Matched on a logical name, for transports without REST semantics.
    Named {
        /// Call name.
        name: String,
    },
}

impl CallId {
    /// REST call id.
    pub fn rest(method: Method, path_pattern: impl Into<String>) -> Self {
        CallId::Rest {
            method,
            path_pattern: path_pattern.into(),
        }
    }

    /// Path call id.
    pub fn path(path_pattern: impl Into<String>) -> Self {
        CallId::Path {
            path_pattern: path_pattern.into(),
        }
    }

    /// Named call id.
    pub fn named(name: impl Into<String>) -> Self {
        CallId::Named { name: name.into() }
    }

    /// Path pattern for REST and path calls.
    pub fn path_pattern(&self) -> Option<&str> {
        match self {
            CallId::Rest { path_pattern, .. } | CallId::Path { path_pattern } => {
                Some(path_pattern)
            }
            CallId::Named { .. } => None,
        }
    }

    /// Parse the path pattern, if the id has one.
    pub fn parsed_pattern(&self) -> Option<Result<PathPattern, PathError>> {
        self.path_pattern().map(PathPattern::parse)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallId::Rest {
                method,
                path_pattern,
            } => write!(f, "{method} {path_pattern}"),
            CallId::Path { path_pattern } => f.write_str(path_pattern),
            CallId::Named { name } => f.write_str(name),
        }
    }
}

/// Identifier of the circuit breaker guarding a call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircuitBreakerId(String);

impl CircuitBreakerId {
    /// Breaker with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id.
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CircuitBreakerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-side implementation of one call.
#[async_trait]
pub trait ServiceCall<Id, Req, Resp>: Send + Sync
where
    Id: Send + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Handle a request addressed to `id`.
    async fn invoke(&self, id: Id, request: Req) -> Result<Resp, TransportError>;
}

#[async_trait]
impl<Id, Req, Resp, F, Fut> ServiceCall<Id, Req, Resp> for F
where
    Id: Send + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
    F: Fn(Id, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, TransportError>> + Send + 'static,
{
    async fn invoke(&self, id: Id, request: Req) -> Result<Resp, TransportError> {
        (self)(id, request).await
    }
}

/// Descriptor of one service call.
///
/// Serializers left unset are resolved through the owning descriptor.
pub struct Call<Id, Req, Resp>
where
    Id: Send + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    call_id: CallId,
    handler: Arc<dyn ServiceCall<Id, Req, Resp>>,
    id_serializer: Option<Arc<dyn IdSerializer<Id>>>,
    request_serializer: Option<Arc<dyn MessageSerializer<Req>>>,
    response_serializer: Option<Arc<dyn MessageSerializer<Resp>>>,
    circuit_breaker: Option<CircuitBreakerId>,
    auto_acl: Option<bool>,
    pattern: Option<Arc<PathPattern>>,
}

/// Parsed pattern of `call_id`; unparsable patterns never match a request.
fn compile_pattern(call_id: &CallId) -> Option<Arc<PathPattern>> {
    match call_id.parsed_pattern()? {
        Ok(pattern) => Some(Arc::new(pattern)),
        Err(err) => {
            warn!(%call_id, error = %err, "call path pattern does not parse; it will not be routed");
            None
        }
    }
}

impl<Id, Req, Resp> Call<Id, Req, Resp>
where
    Id: Send + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Call addressed by `call_id` and served by `handler`.
    pub fn new(call_id: CallId, handler: impl ServiceCall<Id, Req, Resp> + 'static) -> Self {
        Self {
            pattern: compile_pattern(&call_id),
            call_id,
            handler: Arc::new(handler),
            id_serializer: None,
            request_serializer: None,
            response_serializer: None,
            circuit_breaker: None,
            auto_acl: None,
        }
    }

    /// How the call is addressed.
    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    /// Implementation of the call.
    pub fn handler(&self) -> &Arc<dyn ServiceCall<Id, Req, Resp>> {
        &self.handler
    }

    /// Run the handler.
    pub async fn invoke(&self, id: Id, request: Req) -> Result<Resp, TransportError> {
        self.handler.invoke(id, request).await
    }

    /// Id serializer set on this call.
    pub fn id_serializer(&self) -> Option<&Arc<dyn IdSerializer<Id>>> {
        self.id_serializer.as_ref()
    }

    /// Request serializer set on this call.
    pub fn request_serializer(&self) -> Option<&Arc<dyn MessageSerializer<Req>>> {
        self.request_serializer.as_ref()
    }

    /// Response serializer set on this call.
    pub fn response_serializer(&self) -> Option<&Arc<dyn MessageSerializer<Resp>>> {
        self.response_serializer.as_ref()
    }

    /// Circuit breaker guarding the call.
    pub fn circuit_breaker(&self) -> Option<&CircuitBreakerId> {
        self.circuit_breaker.as_ref()
    }

    /// Per-call override of the descriptor's auto-ACL flag.
    pub fn auto_acl(&self) -> Option<bool> {
        self.auto_acl
    }

    /// Path pattern parsed when the call id was set.
    pub fn path_pattern(&self) -> Option<&PathPattern> {
        self.pattern.as_deref()
    }

    /// Copy with another call id.
    pub fn with_call_id(&self, call_id: CallId) -> Self {
        Self {
            pattern: compile_pattern(&call_id),
            call_id,
            ..self.clone()
        }
    }

    /// Copy with another handler.
    pub fn with_handler(&self, handler: impl ServiceCall<Id, Req, Resp> + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            ..self.clone()
        }
    }

    /// Copy with an explicit id serializer.
    pub fn with_id_serializer(&self, serializer: impl IdSerializer<Id> + 'static) -> Self {
        Self {
            id_serializer: Some(Arc::new(serializer)),
            ..self.clone()
        }
    }

    /// Copy with an explicit request serializer.
    pub fn with_request_serializer(&self, serializer: impl MessageSerializer<Req> + 'static) -> Self {
        Self {
            request_serializer: Some(Arc::new(serializer)),
            ..self.clone()
        }
    }

    /// Copy with an explicit response serializer.
    pub fn with_response_serializer(
        &self,
        serializer: impl MessageSerializer<Resp> + 'static,
    ) -> Self {
        Self {
            response_serializer: Some(Arc::new(serializer)),
            ..self.clone()
        }
    }

    /// Copy guarded by `circuit_breaker`.
    pub fn with_circuit_breaker(&self, circuit_breaker: CircuitBreakerId) -> Self {
        Self {
            circuit_breaker: Some(circuit_breaker),
            ..self.clone()
        }
    }

    /// Copy overriding the descriptor's auto-ACL flag.
    pub fn with_auto_acl(&self, auto_acl: bool) -> Self {
        Self {
            auto_acl: Some(auto_acl),
            ..self.clone()
        }
    }

    /// Type-erased handle for storage in a descriptor.
    pub fn erased(&self) -> Arc<dyn AnyCall> {
        Arc::new(self.clone())
    }
}

impl<Id, Req, Resp> Clone for Call<Id, Req, Resp>
where
    Id: Send + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            call_id: self.call_id.clone(),
            handler: Arc::clone(&self.handler),
            id_serializer: self.id_serializer.clone(),
            request_serializer: self.request_serializer.clone(),
            response_serializer: self.response_serializer.clone(),
            circuit_breaker: self.circuit_breaker.clone(),
            auto_acl: self.auto_acl,
            pattern: self.pattern.clone(),
        }
    }
}

impl<Id, Req, Resp> fmt::Debug for Call<Id, Req, Resp>
where
    Id: Send + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("call_id", &self.call_id)
            .field("id", &std::any::type_name::<Id>())
            .field("request", &std::any::type_name::<Req>())
            .field("response", &std::any::type_name::<Resp>())
            .field("circuit_breaker", &self.circuit_breaker)
            .field("auto_acl", &self.auto_acl)
            .finish()
    }
}

/// Object-safe view of a [`Call`] used by descriptors and routing layers.
pub trait AnyCall: Send + Sync + fmt::Debug {
    /// How the call is addressed.
    fn call_id(&self) -> &CallId;

    /// Circuit breaker guarding the call.
    fn circuit_breaker(&self) -> Option<&CircuitBreakerId>;

    /// Per-call auto-ACL override.
    fn auto_acl(&self) -> Option<bool>;

    /// Parsed path pattern of REST and path calls.
    fn path_pattern(&self) -> Option<&PathPattern>;

    /// Type of the call id.
    fn id_type(&self) -> TypeKey;

    /// Type of the request message.
    fn request_type(&self) -> TypeKey;

    /// Type of the response message.
    fn response_type(&self) -> TypeKey;

    /// Access to the concrete [`Call`] for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<Id, Req, Resp> AnyCall for Call<Id, Req, Resp>
where
    Id: Send + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn call_id(&self) -> &CallId {
        &self.call_id
    }

    fn circuit_breaker(&self) -> Option<&CircuitBreakerId> {
        self.circuit_breaker.as_ref()
    }

    fn auto_acl(&self) -> Option<bool> {
        self.auto_acl
    }

    fn path_pattern(&self) -> Option<&PathPattern> {
        self.pattern.as_deref()
    }

    fn id_type(&self) -> TypeKey {
        TypeKey::of::<Id>()
    }

    fn request_type(&self) -> TypeKey {
        TypeKey::of::<Req>()
    }

    fn response_type(&self) -> TypeKey {
        TypeKey::of::<Resp>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Topic published by a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicCall {
    topic_id: TopicId,
    message_type: TypeKey,
}

impl TopicCall {
    /// Topic `topic_id` carrying messages of type `M`.
    pub fn of<M: 'static>(topic_id: TopicId) -> Self {
        Self {
            topic_id,
            message_type: TypeKey::of::<M>(),
        }
    }

    /// Topic id.
    pub fn topic_id(&self) -> &TopicId {
        &self.topic_id
    }

    /// Message type carried by the topic.
    pub fn message_type(&self) -> TypeKey {
        self.message_type
    }
}
