//! ---
//! keel_section: "15-testing-qa"
//! keel_subsection: "integration-tests"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Integration tests for the Keel service API."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! A request travelling client -> server -> client through a descriptor's
//! header strategies and serializers.
use bytes::Bytes;
use keel_api::{named, rest_call, CallId, Descriptor, Method, TransportError};
use keel_transport::{
    HeaderTransformer, MessageHeader, MessageProtocol, Principal, RequestHeader, ResponseHeader,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Greeting {
    message: String,
}

async fn greet(name: String, _: ()) -> Result<Greeting, TransportError> {
    Ok(Greeting {
        message: format!("Hello {name}"),
    })
}

fn service() -> Descriptor {
    named("greeter").with_call(rest_call(Method::Get, "/greet/:name", greet))
}

#[tokio::test]
async fn versioned_request_is_routed_served_and_answered() {
    let descriptor = service();
    let transformers = descriptor.header_transformers();

    let outgoing = RequestHeader::new(Method::Get, "/greet/ann")
        .with_protocol(MessageProtocol::empty().with_version("2"))
        .with_accepted_response_protocols(vec![MessageProtocol::empty()
            .with_content_type("application/json")])
        .with_principal(Principal::service("frontend"));
    let wire = transformers
        .transform_client_request(outgoing)
        .expect("client request");
    assert_eq!(wire.path(), "/v2/greet/ann");
    assert_eq!(wire.header("user-agent"), Some("frontend"));

    let wire = wire.clear_principal().with_protocol(MessageProtocol::empty());
    let incoming = transformers
        .transform_server_request(wire)
        .expect("server request");
    assert_eq!(incoming.path(), "/greet/ann");
    assert_eq!(incoming.protocol().version(), Some("2"));
    assert_eq!(incoming.principal(), Some(&Principal::service("frontend")));

    let (erased, raw_id) = descriptor
        .route(incoming.method(), incoming.uri())
        .expect("routed");
    let call = descriptor
        .call::<String, (), Greeting>(erased.call_id())
        .expect("typed call");
    let id = descriptor
        .id_serializer_for(&call)
        .expect("id serializer")
        .deserialize(raw_id)
        .expect("id");
    let greeting = call.invoke(id, ()).await.expect("served");

    let negotiated = descriptor
        .response_serializer_for(&call)
        .serializer_for_response(incoming.accepted_response_protocols())
        .expect("acceptable");
    let body = negotiated.serialize(&greeting).expect("body");
    let response = transformers
        .transform_server_response(
            ResponseHeader::ok().with_protocol(negotiated.protocol().clone()),
            &incoming,
        )
        .expect("server response");
    assert_eq!(response.protocol().version(), Some("2"));

    let received = transformers
        .transform_client_response(response, &incoming)
        .expect("client response");
    let decoded = descriptor
        .response_serializer_for(&call)
        .deserializer(received.protocol())
        .expect("deserializer")
        .deserialize(body)
        .expect("decoded");
    assert_eq!(decoded.message, "Hello ann");
}

#[test]
fn unacceptable_response_protocol_is_reported() {
    let descriptor = service();
    let call = descriptor
        .call::<String, (), Greeting>(&CallId::rest(Method::Get, "/greet/:name"))
        .expect("typed call");
    let err = descriptor
        .response_serializer_for(&call)
        .serializer_for_response(&[MessageProtocol::text()])
        .err()
        .expect("not acceptable");
    assert_eq!(err.error_code().http(), 406);

    let raw = descriptor.exception_serializer().serialize(&err, &[]);
    assert_eq!(descriptor.exception_serializer().deserialize(&raw), err);
}

#[test]
fn undecodable_request_body_is_a_deserialization_failure() {
    let descriptor = service();
    let serializer = descriptor.message_serializer::<Greeting>();
    let err = serializer
        .deserializer(&MessageProtocol::json())
        .expect("json deserializer")
        .deserialize(Bytes::from_static(b"not json"))
        .expect_err("malformed");
    assert!(matches!(err, TransportError::DeserializationFailed(_)));
}

#[test]
fn malformed_version_token_fails_negotiation() {
    let outgoing = RequestHeader::new(Method::Get, "/greet/ann")
        .with_protocol(MessageProtocol::json().with_version("2/3"));
    let err = service()
        .protocol_negotiation_strategy()
        .transform_client_request(outgoing)
        .expect_err("bad version");
    assert!(matches!(err, TransportError::NegotiationFailed(_)));
}
