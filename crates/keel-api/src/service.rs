//! ---
//! keel_section: "04-service-descriptors"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service descriptors, calls, ACLs, and serializers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Entry points used when declaring a service.
use keel_broker::TopicId;
use keel_transport::Method;

use crate::call::{Call, CallId, ServiceCall, TopicCall};
use crate::descriptor::Descriptor;

/// A service declares its interface by returning a descriptor.
pub trait Service: Send + Sync {
    /// Describe the service.
    fn descriptor(&self) -> Descriptor;
}

/// Start a descriptor for the service `name`.
pub fn named(name: impl Into<String>) -> Descriptor {
    Descriptor::named(name)
}

/// Call matched on `method` and `path_pattern`.
pub fn rest_call<Id, Req, Resp>(
    method: Method,
    path_pattern: impl Into<String>,
    handler: impl ServiceCall<Id, Req, Resp> + 'static,
) -> Call<Id, Req, Resp>
where
    Id: Send + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    Call::new(CallId::rest(method, path_pattern), handler)
}

/// Call matched on `path_pattern` regardless of method.
pub fn path_call<Id, Req, Resp>(
    path_pattern: impl Into<String>,
    handler: impl ServiceCall<Id, Req, Resp> + 'static,
) -> Call<Id, Req, Resp>
where
    Id: Send + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    Call::new(CallId::path(path_pattern), handler)
}

/// Call matched on its logical name.
pub fn named_call<Id, Req, Resp>(
    name: impl Into<String>,
    handler: impl ServiceCall<Id, Req, Resp> + 'static,
) -> Call<Id, Req, Resp>
where
    Id: Send + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    Call::new(CallId::named(name), handler)
}

/// Topic `topic_id` carrying messages of type `M`.
pub fn topic<M: 'static>(topic_id: impl Into<String>) -> TopicCall {
    TopicCall::of::<M>(TopicId::of(topic_id))
}
