//! ---
//! keel_section: "04-service-descriptors"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service descriptors, calls, ACLs, and serializers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! The service descriptor: everything the routing and client layers need to
//! know about a service.
//!
//! A [`Descriptor`] is immutable. Every `with_*` and `replace_all_*` method
//! returns a new value with exactly one field replaced; the remaining fields
//! share their storage with the original.
use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use keel_common::ApiConfig;
use keel_transport::{
    HeaderTransformer, HeaderTransformerChain, Method, PathVersionedProtocolNegotiationStrategy,
    TransportError, UserAgentServiceIdentificationStrategy,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::acl::{resolve_acls, ServiceAcl};
use crate::call::{AnyCall, Call, CallId, TopicCall};
use crate::deser::{
    builtin_id_serializer, builtin_message_serializer, DefaultExceptionSerializer,
    ExceptionSerializer, IdSerializer, MessageSerializer, RawId, SerializerFactory,
};
use crate::registry::{IdSerializers, MessageSerializers};

/// Immutable description of a service.
#[derive(Clone)]
pub struct Descriptor {
    name: Arc<str>,
    calls: Arc<Vec<Arc<dyn AnyCall>>>,
    topics: Arc<Vec<TopicCall>>,
    id_serializers: IdSerializers,
    message_serializers: MessageSerializers,
    serializer_factory: Arc<SerializerFactory>,
    exception_serializer: Arc<dyn ExceptionSerializer>,
    auto_acl: bool,
    acls: Arc<Vec<ServiceAcl>>,
    protocol_negotiation_strategy: Arc<dyn HeaderTransformer>,
    service_identification_strategy: Arc<dyn HeaderTransformer>,
    locatable_service: bool,
}

fn appended<T: Clone>(existing: &Arc<Vec<T>>, more: impl IntoIterator<Item = T>) -> Arc<Vec<T>> {
    let mut items = Vec::clone(existing);
    items.extend(more);
    Arc::new(items)
}

impl Descriptor {
    /// Descriptor for `name` with framework defaults: no calls, JSON
    /// serializers, path-versioned negotiation, `User-Agent` identification,
    /// auto-ACL off, and locatable.
    pub fn named(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            calls: Arc::default(),
            topics: Arc::default(),
            id_serializers: IdSerializers::new(),
            message_serializers: MessageSerializers::new(),
            serializer_factory: Arc::new(SerializerFactory::default()),
            exception_serializer: Arc::new(DefaultExceptionSerializer),
            auto_acl: false,
            acls: Arc::default(),
            protocol_negotiation_strategy: Arc::new(
                PathVersionedProtocolNegotiationStrategy::default(),
            ),
            service_identification_strategy: Arc::new(
                UserAgentServiceIdentificationStrategy::default(),
            ),
            locatable_service: true,
        }
    }

    /// Descriptor for `name` with the defaults taken from `config`.
    pub fn named_with_config(name: impl Into<String>, config: &ApiConfig) -> anyhow::Result<Self> {
        let name = name.into();
        config
            .validate()
            .with_context(|| format!("invalid configuration for service {name}"))?;
        let negotiation = PathVersionedProtocolNegotiationStrategy::new(
            config.negotiation.compiled_pattern()?,
            config.negotiation.path_version_format.clone(),
        );
        let identification =
            UserAgentServiceIdentificationStrategy::with_header(config.identification.header.clone());
        debug!(service = %name, auto_acl = config.service.auto_acl, locatable = config.service.locatable, "descriptor configured");
        Ok(Self::named(name)
            .with_auto_acl(config.service.auto_acl)
            .with_locatable_service(config.service.locatable)
            .with_protocol_negotiation_strategy(negotiation)
            .with_service_identification_strategy(identification))
    }

    /// Service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls in declaration order.
    pub fn calls(&self) -> &[Arc<dyn AnyCall>] {
        &self.calls
    }

    /// Topics in declaration order.
    pub fn topics(&self) -> &[TopicCall] {
        &self.topics
    }

    /// Registered id serializers.
    pub fn id_serializers(&self) -> &IdSerializers {
        &self.id_serializers
    }

    /// Registered message serializers.
    pub fn message_serializers(&self) -> &MessageSerializers {
        &self.message_serializers
    }

    /// Factory for message types without a registration.
    pub fn serializer_factory(&self) -> &SerializerFactory {
        &self.serializer_factory
    }

    /// Serializer rendering errors.
    pub fn exception_serializer(&self) -> &Arc<dyn ExceptionSerializer> {
        &self.exception_serializer
    }

    /// Whether calls get ACLs generated unless they override it.
    pub fn auto_acl(&self) -> bool {
        self.auto_acl
    }

    /// Manually declared ACLs. See [`Descriptor::resolved_acls`] for the
    /// effective list.
    pub fn acls(&self) -> &[ServiceAcl] {
        &self.acls
    }

    /// Generated ACLs followed by the declared ones.
    pub fn resolved_acls(&self) -> Vec<ServiceAcl> {
        resolve_acls(self)
    }

    /// Strategy negotiating the protocol version.
    pub fn protocol_negotiation_strategy(&self) -> &Arc<dyn HeaderTransformer> {
        &self.protocol_negotiation_strategy
    }

    /// Strategy identifying calling services.
    pub fn service_identification_strategy(&self) -> &Arc<dyn HeaderTransformer> {
        &self.service_identification_strategy
    }

    /// Negotiation then identification, as a transport applies them.
    pub fn header_transformers(&self) -> HeaderTransformerChain {
        HeaderTransformerChain::new(vec![
            Arc::clone(&self.protocol_negotiation_strategy),
            Arc::clone(&self.service_identification_strategy),
        ])
    }

    /// Whether the service registers itself with the service locator.
    pub fn locatable_service(&self) -> bool {
        self.locatable_service
    }

    /// Copy with `call` appended.
    pub fn with_call<Id, Req, Resp>(&self, call: Call<Id, Req, Resp>) -> Self
    where
        Id: Send + 'static,
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        debug!(service = %self.name, call = %call.call_id(), "adding call");
        self.with_calls([call.erased()])
    }

    /// Copy with `calls` appended in order.
    pub fn with_calls(&self, calls: impl IntoIterator<Item = Arc<dyn AnyCall>>) -> Self {
        Self {
            calls: appended(&self.calls, calls),
            ..self.clone()
        }
    }

    /// Copy with the calls replaced.
    pub fn replace_all_calls(&self, calls: Vec<Arc<dyn AnyCall>>) -> Self {
        Self {
            calls: Arc::new(calls),
            ..self.clone()
        }
    }

    /// Copy with `topics` appended in order.
    pub fn with_topics(&self, topics: impl IntoIterator<Item = TopicCall>) -> Self {
        Self {
            topics: appended(&self.topics, topics),
            ..self.clone()
        }
    }

    /// Copy with `serializer` registered for id type `T`.
    pub fn with_id_serializer<T: 'static>(&self, serializer: impl IdSerializer<T> + 'static) -> Self {
        Self {
            id_serializers: self.id_serializers.with(serializer),
            ..self.clone()
        }
    }

    /// Copy with the id serializers replaced.
    pub fn replace_all_id_serializers(&self, id_serializers: IdSerializers) -> Self {
        Self {
            id_serializers,
            ..self.clone()
        }
    }

    /// Copy with `serializer` registered for message type `M`.
    pub fn with_message_serializer<M: 'static>(
        &self,
        serializer: impl MessageSerializer<M> + 'static,
    ) -> Self {
        Self {
            message_serializers: self.message_serializers.with(serializer),
            ..self.clone()
        }
    }

    /// Copy with the message serializers replaced.
    pub fn replace_all_message_serializers(&self, message_serializers: MessageSerializers) -> Self {
        Self {
            message_serializers,
            ..self.clone()
        }
    }

    /// Copy with another serializer factory.
    pub fn with_serializer_factory(&self, serializer_factory: SerializerFactory) -> Self {
        Self {
            serializer_factory: Arc::new(serializer_factory),
            ..self.clone()
        }
    }

    /// Copy with another exception serializer.
    pub fn with_exception_serializer(
        &self,
        exception_serializer: impl ExceptionSerializer + 'static,
    ) -> Self {
        Self {
            exception_serializer: Arc::new(exception_serializer),
            ..self.clone()
        }
    }

    /// Copy with the auto-ACL flag set.
    pub fn with_auto_acl(&self, auto_acl: bool) -> Self {
        Self {
            auto_acl,
            ..self.clone()
        }
    }

    /// Copy with `acls` appended in order.
    pub fn with_acls(&self, acls: impl IntoIterator<Item = ServiceAcl>) -> Self {
        Self {
            acls: appended(&self.acls, acls),
            ..self.clone()
        }
    }

    /// Copy with the declared ACLs replaced.
    pub fn replace_all_acls(&self, acls: Vec<ServiceAcl>) -> Self {
        Self {
            acls: Arc::new(acls),
            ..self.clone()
        }
    }

    /// Copy with another protocol negotiation strategy.
    pub fn with_protocol_negotiation_strategy(
        &self,
        strategy: impl HeaderTransformer + 'static,
    ) -> Self {
        Self {
            protocol_negotiation_strategy: Arc::new(strategy),
            ..self.clone()
        }
    }

    /// Copy with another service identification strategy.
    pub fn with_service_identification_strategy(
        &self,
        strategy: impl HeaderTransformer + 'static,
    ) -> Self {
        Self {
            service_identification_strategy: Arc::new(strategy),
            ..self.clone()
        }
    }

    /// Copy with the locatable flag set.
    pub fn with_locatable_service(&self, locatable_service: bool) -> Self {
        Self {
            locatable_service,
            ..self.clone()
        }
    }

    /// Typed call registered under `call_id`.
    pub fn call<Id, Req, Resp>(&self, call_id: &CallId) -> Option<Call<Id, Req, Resp>>
    where
        Id: Send + 'static,
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        self.calls
            .iter()
            .filter(|call| call.call_id() == call_id)
            .find_map(|call| call.as_any().downcast_ref::<Call<Id, Req, Resp>>())
            .cloned()
    }

    /// Id serializer for `call`: its own, else the registered one for `Id`,
    /// else a built-in.
    pub fn id_serializer_for<Id, Req, Resp>(
        &self,
        call: &Call<Id, Req, Resp>,
    ) -> Result<Arc<dyn IdSerializer<Id>>, TransportError>
    where
        Id: Send + 'static,
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        call.id_serializer()
            .cloned()
            .or_else(|| self.id_serializers.get::<Id>())
            .or_else(builtin_id_serializer::<Id>)
            .ok_or_else(|| {
                TransportError::serialization_failed(format!(
                    "no id serializer for {} on call {}",
                    std::any::type_name::<Id>(),
                    call.call_id()
                ))
            })
    }

    /// Message serializer for `M`: the registered one, else a built-in, else
    /// one from the serializer factory.
    pub fn message_serializer<M>(&self) -> Arc<dyn MessageSerializer<M>>
    where
        M: Serialize + DeserializeOwned + 'static,
    {
        self.message_serializers
            .get::<M>()
            .or_else(builtin_message_serializer::<M>)
            .unwrap_or_else(|| self.serializer_factory.message_serializer::<M>())
    }

    /// Request serializer for `call`.
    pub fn request_serializer_for<Id, Req, Resp>(
        &self,
        call: &Call<Id, Req, Resp>,
    ) -> Arc<dyn MessageSerializer<Req>>
    where
        Id: Send + 'static,
        Req: Serialize + DeserializeOwned + Send + 'static,
        Resp: Send + 'static,
    {
        call.request_serializer()
            .cloned()
            .unwrap_or_else(|| self.message_serializer::<Req>())
    }

    /// Response serializer for `call`.
    pub fn response_serializer_for<Id, Req, Resp>(
        &self,
        call: &Call<Id, Req, Resp>,
    ) -> Arc<dyn MessageSerializer<Resp>>
    where
        Id: Send + 'static,
        Req: Send + 'static,
        Resp: Serialize + DeserializeOwned + Send + 'static,
    {
        call.response_serializer()
            .cloned()
            .unwrap_or_else(|| self.message_serializer::<Resp>())
    }

    /// First call matching a request, with the raw id extracted from `uri`.
    ///
    /// REST calls match on method and pattern, path calls on the pattern,
    /// named calls on the path without its leading `/`.
    pub fn route(&self, method: Method, uri: &str) -> Option<(Arc<dyn AnyCall>, RawId)> {
        let path = uri.split_once('?').map_or(uri, |(path, _)| path);
        self.calls.iter().find_map(|call| {
            let raw_id = match call.call_id() {
                CallId::Rest { method: wanted, .. } if *wanted == method => {
                    call.path_pattern()?.extract(uri)
                }
                CallId::Rest { .. } => None,
                CallId::Path { .. } => call.path_pattern()?.extract(uri),
                CallId::Named { name } => {
                    (path.strip_prefix('/') == Some(name.as_str())).then(RawId::empty)
                }
            }?;
            Some((Arc::clone(call), raw_id))
        })
    }

    pub(crate) fn shares_calls_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.calls, &other.calls)
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("calls", &self.calls)
            .field("topics", &self.topics)
            .field("id_serializers", &self.id_serializers)
            .field("message_serializers", &self.message_serializers)
            .field("auto_acl", &self.auto_acl)
            .field("acls", &self.acls)
            .field("locatable_service", &self.locatable_service)
            .finish_non_exhaustive()
    }
}
