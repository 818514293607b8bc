//! ---
//! keel_section: "04-service-descriptors"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service descriptors, calls, ACLs, and serializers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use keel_transport::{ExceptionMessage, MessageProtocol, TransportError, TransportErrorCode};
use tracing::warn;

/// An error as it travels on the wire: code, body protocol, and body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExceptionMessage {
    error_code: TransportErrorCode,
    protocol: MessageProtocol,
    message: Bytes,
}

impl RawExceptionMessage {
    /// Wrap a rendered error.
    pub fn new(error_code: TransportErrorCode, protocol: MessageProtocol, message: Bytes) -> Self {
        Self {
            error_code,
            protocol,
            message,
        }
    }

    /// Error code to send.
    pub fn error_code(&self) -> TransportErrorCode {
        self.error_code
    }

    /// Protocol of the body.
    pub fn protocol(&self) -> &MessageProtocol {
        &self.protocol
    }

    /// Raw body.
    pub fn message(&self) -> &Bytes {
        &self.message
    }

    /// Body as text: decoded for textual protocols, base64 otherwise.
    pub fn message_as_text(&self) -> String {
        if self.protocol.is_text() {
            String::from_utf8_lossy(&self.message).into_owned()
        } else {
            STANDARD.encode(&self.message)
        }
    }
}

/// Renders transport errors into wire messages and back.
pub trait ExceptionSerializer: Send + Sync + fmt::Debug {
    /// Render `error` for a caller accepting `accept`.
    fn serialize(&self, error: &TransportError, accept: &[MessageProtocol]) -> RawExceptionMessage;

    /// Rebuild the error carried by `message`.
    fn deserialize(&self, message: &RawExceptionMessage) -> TransportError;
}

/// Renders errors as `{"name": ..., "detail": ...}` JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExceptionSerializer;

impl ExceptionSerializer for DefaultExceptionSerializer {
    fn serialize(&self, error: &TransportError, _accept: &[MessageProtocol]) -> RawExceptionMessage {
        let message = error.exception_message();
        match serde_json::to_vec(message) {
            Ok(body) => RawExceptionMessage::new(
                error.error_code(),
                MessageProtocol::json(),
                Bytes::from(body),
            ),
            Err(err) => {
                warn!(error = %err, code = %error.error_code(), "unable to encode error body as json");
                RawExceptionMessage::new(
                    error.error_code(),
                    MessageProtocol::text(),
                    Bytes::from(message.to_string()),
                )
            }
        }
    }

    fn deserialize(&self, message: &RawExceptionMessage) -> TransportError {
        let exception = serde_json::from_slice::<ExceptionMessage>(message.message())
            .unwrap_or_else(|err| {
                warn!(error = %err, code = %message.error_code(), "undecodable error body");
                ExceptionMessage::new("UndeserializableException", message.message_as_text())
            });
        TransportError::from_code(message.error_code(), exception)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_survive_the_wire() {
        let error = TransportError::not_found("no mock 7");
        let raw = DefaultExceptionSerializer.serialize(&error, &[]);
        assert_eq!(raw.error_code().http(), 404);
        assert_eq!(
            raw.message_as_text(),
            r#"{"name":"NotFound","detail":"no mock 7"}"#
        );
        assert_eq!(DefaultExceptionSerializer.deserialize(&raw), error);
    }

    #[test]
    fn plain_text_bodies_keep_the_detail() {
        let raw = RawExceptionMessage::new(
            TransportErrorCode::BAD_REQUEST,
            MessageProtocol::text(),
            Bytes::from("Bad: no body"),
        );
        let rebuilt = DefaultExceptionSerializer.deserialize(&raw);
        assert_eq!(rebuilt.exception_message().detail, "Bad: no body");
    }

    #[test]
    fn serialized_errors_always_carry_a_body() {
        for error in [
            TransportError::negotiation_failed(""),
            TransportError::not_found("\u{0}\u{feff}"),
            TransportError::Forbidden(ExceptionMessage::new("Forbidden", "line\nbreak")),
        ] {
            let raw = DefaultExceptionSerializer.serialize(&error, &[]);
            assert!(!raw.message().is_empty());
            assert_eq!(DefaultExceptionSerializer.deserialize(&raw), error);
        }
    }

    #[test]
    fn binary_bodies_render_as_base64() {
        let raw = RawExceptionMessage::new(
            TransportErrorCode::INTERNAL_SERVER_ERROR,
            MessageProtocol::empty().with_content_type("application/octet-stream"),
            Bytes::from_static(&[0xff, 0x00]),
        );
        assert_eq!(raw.message_as_text(), "/wA=");

        let rebuilt = DefaultExceptionSerializer.deserialize(&raw);
        assert_eq!(rebuilt.exception_message().name, "UndeserializableException");
        assert_eq!(rebuilt.error_code(), TransportErrorCode::INTERNAL_SERVER_ERROR);
    }
}
