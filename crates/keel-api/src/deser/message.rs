//! ---
//! keel_section: "04-service-descriptors"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service descriptors, calls, ACLs, and serializers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Message body serializers and the protocol negotiation around them.
use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use keel_transport::{MessageProtocol, TransportError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Serializer bound to the protocol negotiated for one message.
pub trait NegotiatedSerializer<M>: Send + Sync {
    /// Protocol the bytes are written in.
    fn protocol(&self) -> &MessageProtocol;

    /// Encode `message`.
    fn serialize(&self, message: &M) -> Result<Bytes, TransportError>;
}

/// Deserializer bound to the protocol a message arrived in.
pub trait NegotiatedDeserializer<M>: Send + Sync {
    /// Decode `bytes`.
    fn deserialize(&self, bytes: Bytes) -> Result<M, TransportError>;
}

/// Negotiates how request and response bodies of type `M` are encoded.
pub trait MessageSerializer<M>: Send + Sync {
    /// Protocols this serializer asks for in responses. Empty means any.
    fn accepted_response_protocols(&self) -> Vec<MessageProtocol> {
        Vec::new()
    }

    /// Whether the message is actually carried. Unused messages have no body.
    fn is_used(&self) -> bool {
        true
    }

    /// Serializer for outgoing requests.
    fn serializer_for_request(&self) -> Box<dyn NegotiatedSerializer<M>>;

    /// Serializer for a response, given the protocols the caller accepts in
    /// preference order. Fails with [`TransportError::NotAcceptable`] when none
    /// can be produced.
    fn serializer_for_response(
        &self,
        accepted: &[MessageProtocol],
    ) -> Result<Box<dyn NegotiatedSerializer<M>>, TransportError>;

    /// Deserializer for a body in `protocol`. Fails with
    /// [`TransportError::UnsupportedMediaType`] for foreign protocols.
    fn deserializer(
        &self,
        protocol: &MessageProtocol,
    ) -> Result<Box<dyn NegotiatedDeserializer<M>>, TransportError>;
}

fn negotiate_response(
    accepted: &[MessageProtocol],
    produced: &MessageProtocol,
) -> Result<MessageProtocol, TransportError> {
    if accepted.is_empty() {
        return Ok(produced.clone());
    }
    match accepted.iter().find(|wanted| wanted.accepts(produced)) {
        Some(wanted) => {
            let protocol = match wanted.version() {
                Some(version) => produced.clone().with_version(version),
                None => produced.clone(),
            };
            Ok(protocol)
        }
        None => {
            debug!(produced = %produced, "no accepted protocol matches");
            Err(TransportError::not_acceptable(accepted, produced))
        }
    }
}

fn check_charset(received: &MessageProtocol, supported: &MessageProtocol) -> Result<(), TransportError> {
    if received.charset().is_some() && !received.is_utf8() {
        return Err(TransportError::unsupported_media_type(received, supported));
    }
    Ok(())
}

/// JSON bodies through serde.
pub struct JsonMessageSerializer<M> {
    protocol: MessageProtocol,
    _message: PhantomData<fn() -> M>,
}

impl<M> JsonMessageSerializer<M> {
    /// Serializer producing `application/json; charset=utf-8`.
    pub fn new() -> Self {
        Self::with_protocol(MessageProtocol::json())
    }

    /// Serializer producing a custom JSON media type, for example
    /// `application/vnd.orders+json`.
    pub fn with_protocol(protocol: MessageProtocol) -> Self {
        Self {
            protocol,
            _message: PhantomData,
        }
    }

    fn is_json(content_type: &str) -> bool {
        let content_type = content_type.to_ascii_lowercase();
        content_type == "application/json" || content_type.ends_with("+json")
    }
}

impl<M> Default for JsonMessageSerializer<M> {
    fn default() -> Self {
        Self::new()
    }
}

struct JsonCodec<M> {
    protocol: MessageProtocol,
    _message: PhantomData<fn() -> M>,
}

impl<M> JsonCodec<M> {
    fn boxed(protocol: MessageProtocol) -> Box<Self> {
        Box::new(Self {
            protocol,
            _message: PhantomData,
        })
    }
}

impl<M: Serialize> NegotiatedSerializer<M> for JsonCodec<M> {
    fn protocol(&self) -> &MessageProtocol {
        &self.protocol
    }

    fn serialize(&self, message: &M) -> Result<Bytes, TransportError> {
        serde_json::to_vec(message)
            .map(Bytes::from)
            .map_err(|err| TransportError::serialization_failed(err.to_string()))
    }
}

impl<M: DeserializeOwned> NegotiatedDeserializer<M> for JsonCodec<M> {
    fn deserialize(&self, bytes: Bytes) -> Result<M, TransportError> {
        serde_json::from_slice(&bytes)
            .map_err(|err| TransportError::deserialization_failed(err.to_string()))
    }
}

impl<M> MessageSerializer<M> for JsonMessageSerializer<M>
where
    M: Serialize + DeserializeOwned + 'static,
{
    fn accepted_response_protocols(&self) -> Vec<MessageProtocol> {
        vec![self.protocol.clone()]
    }

    fn serializer_for_request(&self) -> Box<dyn NegotiatedSerializer<M>> {
        JsonCodec::<M>::boxed(self.protocol.clone())
    }

    fn serializer_for_response(
        &self,
        accepted: &[MessageProtocol],
    ) -> Result<Box<dyn NegotiatedSerializer<M>>, TransportError> {
        let protocol = negotiate_response(accepted, &self.protocol)?;
        Ok(JsonCodec::<M>::boxed(protocol))
    }

    fn deserializer(
        &self,
        protocol: &MessageProtocol,
    ) -> Result<Box<dyn NegotiatedDeserializer<M>>, TransportError> {
        match protocol.content_type() {
            Some(content_type) if !Self::is_json(content_type) => {
                Err(TransportError::unsupported_media_type(protocol, &self.protocol))
            }
            _ => {
                check_charset(protocol, &self.protocol)?;
                Ok(JsonCodec::<M>::boxed(protocol.clone()))
            }
        }
    }
}

/// Plain UTF-8 text bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextMessageSerializer;

struct TextCodec {
    protocol: MessageProtocol,
}

impl NegotiatedSerializer<String> for TextCodec {
    fn protocol(&self) -> &MessageProtocol {
        &self.protocol
    }

    fn serialize(&self, message: &String) -> Result<Bytes, TransportError> {
        Ok(Bytes::copy_from_slice(message.as_bytes()))
    }
}

impl NegotiatedDeserializer<String> for TextCodec {
    fn deserialize(&self, bytes: Bytes) -> Result<String, TransportError> {
        String::from_utf8(bytes.to_vec())
            .map_err(|err| TransportError::deserialization_failed(err.to_string()))
    }
}

impl MessageSerializer<String> for TextMessageSerializer {
    fn serializer_for_request(&self) -> Box<dyn NegotiatedSerializer<String>> {
        Box::new(TextCodec {
            protocol: MessageProtocol::text(),
        })
    }

    fn serializer_for_response(
        &self,
        accepted: &[MessageProtocol],
    ) -> Result<Box<dyn NegotiatedSerializer<String>>, TransportError> {
        let protocol = negotiate_response(accepted, &MessageProtocol::text())?;
        Ok(Box::new(TextCodec { protocol }))
    }

    fn deserializer(
        &self,
        protocol: &MessageProtocol,
    ) -> Result<Box<dyn NegotiatedDeserializer<String>>, TransportError> {
        let supported = MessageProtocol::text();
        match protocol.content_type() {
            Some(content_type) if !content_type.to_ascii_lowercase().starts_with("text/") => {
                Err(TransportError::unsupported_media_type(protocol, &supported))
            }
            _ => {
                check_charset(protocol, &supported)?;
                Ok(Box::new(TextCodec {
                    protocol: protocol.clone(),
                }))
            }
        }
    }
}

/// Messages that carry no body at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitMessageSerializer;

struct UnitCodec {
    protocol: MessageProtocol,
}

impl NegotiatedSerializer<()> for UnitCodec {
    fn protocol(&self) -> &MessageProtocol {
        &self.protocol
    }

    fn serialize(&self, _message: &()) -> Result<Bytes, TransportError> {
        Ok(Bytes::new())
    }
}

impl NegotiatedDeserializer<()> for UnitCodec {
    fn deserialize(&self, _bytes: Bytes) -> Result<(), TransportError> {
        Ok(())
    }
}

impl MessageSerializer<()> for UnitMessageSerializer {
    fn is_used(&self) -> bool {
        false
    }

    fn serializer_for_request(&self) -> Box<dyn NegotiatedSerializer<()>> {
        Box::new(UnitCodec {
            protocol: MessageProtocol::empty(),
        })
    }

    fn serializer_for_response(
        &self,
        _accepted: &[MessageProtocol],
    ) -> Result<Box<dyn NegotiatedSerializer<()>>, TransportError> {
        Ok(Box::new(UnitCodec {
            protocol: MessageProtocol::empty(),
        }))
    }

    fn deserializer(
        &self,
        protocol: &MessageProtocol,
    ) -> Result<Box<dyn NegotiatedDeserializer<()>>, TransportError> {
        Ok(Box::new(UnitCodec {
            protocol: protocol.clone(),
        }))
    }
}

/// Serializer shipped for `M` regardless of the factory: `()` carries no
/// body and `String` is sent as plain text.
pub fn builtin_message_serializer<M: 'static>() -> Option<Arc<dyn MessageSerializer<M>>> {
    let requested = TypeId::of::<M>();
    let erased: Box<dyn Any> = if requested == TypeId::of::<()>() {
        let serializer: Arc<dyn MessageSerializer<()>> = Arc::new(UnitMessageSerializer);
        Box::new(serializer)
    } else if requested == TypeId::of::<String>() {
        let serializer: Arc<dyn MessageSerializer<String>> = Arc::new(TextMessageSerializer);
        Box::new(serializer)
    } else {
        return None;
    };
    erased
        .downcast::<Arc<dyn MessageSerializer<M>>>()
        .ok()
        .map(|serializer| *serializer)
}

/// Produces message serializers for types without an explicit registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializerFactory {
    protocol: MessageProtocol,
}

impl SerializerFactory {
    /// Factory producing JSON serializers for `protocol`.
    pub fn json(protocol: MessageProtocol) -> Self {
        Self { protocol }
    }

    /// Protocol of the serializers this factory produces.
    pub fn protocol(&self) -> &MessageProtocol {
        &self.protocol
    }

    /// Serializer for `M`.
    pub fn message_serializer<M>(&self) -> Arc<dyn MessageSerializer<M>>
    where
        M: Serialize + DeserializeOwned + 'static,
    {
        Arc::new(JsonMessageSerializer::<M>::with_protocol(self.protocol.clone()))
    }
}

impl Default for SerializerFactory {
    fn default() -> Self {
        Self::json(MessageProtocol::json())
    }
}
