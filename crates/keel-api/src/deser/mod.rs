//! ---
//! keel_section: "04-service-descriptors"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service descriptors, calls, ACLs, and serializers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Serializers for call identifiers, message bodies, and errors.

pub mod exception;
pub mod id;
pub mod message;
pub mod raw_id;

pub use exception::{DefaultExceptionSerializer, ExceptionSerializer, RawExceptionMessage};
pub use id::{
    builtin_id_serializer, FromStrIdSerializer, IdSerializationError, IdSerializer,
    PageIdSerializer, UnitIdSerializer,
};
pub use message::{
    builtin_message_serializer, JsonMessageSerializer, MessageSerializer, NegotiatedDeserializer,
    NegotiatedSerializer, SerializerFactory, TextMessageSerializer, UnitMessageSerializer,
};
pub use raw_id::{PathParam, RawId, RawIdDescriptor};
