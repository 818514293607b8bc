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

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::MessageProtocol;

/// Error code shared by the HTTP and WebSocket renderings of a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportErrorCode {
    http: u16,
    websocket: u16,
    description: &'static str,
}

impl TransportErrorCode {
    /// Malformed protocol data, e.g. an unparsable version token.
    pub const PROTOCOL_ERROR: Self = Self::new(400, 1002, "Protocol Error");
    /// Payload could not be processed.
    pub const UNSUPPORTED_DATA: Self = Self::new(400, 1003, "Unsupported Data");
    /// Generic client error.
    pub const BAD_REQUEST: Self = Self::new(400, 1008, "Bad Request");
    /// Caller is not allowed to perform the call.
    pub const FORBIDDEN: Self = Self::new(403, 1008, "Forbidden");
    /// A policy attached to the service rejected the call.
    pub const POLICY_VIOLATION: Self = Self::new(404, 1008, "Policy Violation");
    /// Resource does not exist.
    pub const NOT_FOUND: Self = Self::new(404, 1008, "Not Found");
    /// Method not supported by the call.
    pub const METHOD_NOT_ALLOWED: Self = Self::new(405, 1008, "Method Not Allowed");
    /// None of the accepted response protocols can be produced.
    pub const NOT_ACCEPTABLE: Self = Self::new(406, 1008, "Not Acceptable");
    /// Request body too large.
    pub const PAYLOAD_TOO_LARGE: Self = Self::new(413, 1009, "Payload Too Large");
    /// Request body encoded in a protocol nobody can read.
    pub const UNSUPPORTED_MEDIA_TYPE: Self = Self::new(415, 1003, "Unsupported Media Type");
    /// Unexpected server failure.
    pub const INTERNAL_SERVER_ERROR: Self = Self::new(500, 1011, "Internal Server Error");
    /// Service temporarily unable to serve the call.
    pub const SERVICE_UNAVAILABLE: Self = Self::new(503, 1011, "Service Unavailable");

    const KNOWN: [Self; 12] = [
        Self::BAD_REQUEST,
        Self::PROTOCOL_ERROR,
        Self::UNSUPPORTED_DATA,
        Self::FORBIDDEN,
        Self::NOT_FOUND,
        Self::POLICY_VIOLATION,
        Self::METHOD_NOT_ALLOWED,
        Self::NOT_ACCEPTABLE,
        Self::PAYLOAD_TOO_LARGE,
        Self::UNSUPPORTED_MEDIA_TYPE,
        Self::INTERNAL_SERVER_ERROR,
        Self::SERVICE_UNAVAILABLE,
    ];

    const fn new(http: u16, websocket: u16, description: &'static str) -> Self {
        Self {
            http,
            websocket,
            description,
        }
    }

    /// HTTP status code.
    pub fn http(&self) -> u16 {
        self.http
    }

    /// WebSocket close code.
    pub fn websocket(&self) -> u16 {
        self.websocket
    }

    /// Short human readable description.
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Look up the well-known code for an HTTP status.
    ///
    /// Several codes share a status; the first declared wins, so a bare 400
    /// is [`Self::BAD_REQUEST`] even when it was sent as a
    /// [`Self::PROTOCOL_ERROR`]. Use [`Self::from_codes`] when the WebSocket
    /// code is known. Unknown 4xx statuses map to [`Self::BAD_REQUEST`],
    /// everything else to [`Self::INTERNAL_SERVER_ERROR`].
    pub fn from_http(status: u16) -> Self {
        Self::KNOWN
            .iter()
            .find(|code| code.http == status)
            .copied()
            .unwrap_or(if (400..500).contains(&status) {
                Self::BAD_REQUEST
            } else {
                Self::INTERNAL_SERVER_ERROR
            })
    }

    /// Look up the code for an HTTP status and, when the transport carried
    /// one, its WebSocket close code.
    ///
    /// The pair singles out codes that share a status. Without a WebSocket
    /// code, or with a pair nobody declares, this is [`Self::from_http`].
    pub fn from_codes(http: u16, websocket: Option<u16>) -> Self {
        websocket
            .and_then(|ws| {
                Self::KNOWN
                    .iter()
                    .find(|code| code.http == http && code.websocket == ws)
                    .copied()
            })
            .unwrap_or_else(|| Self::from_http(http))
    }
}

impl fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.http, self.description)
    }
}

/// Structured error body: a short name plus human readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionMessage {
    /// Short identifier, e.g. `NotAcceptable`.
    pub name: String,
    /// Explanation for humans.
    pub detail: String,
}

impl ExceptionMessage {
    /// Construct a message.
    pub fn new(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ExceptionMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.detail)
    }
}

/// Transport-level failure raised while negotiating or (de)serializing a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// None of the requested response protocols can be produced.
    #[error("{0}")]
    NotAcceptable(ExceptionMessage),
    /// The request body is in a protocol without a matching deserializer.
    #[error("{0}")]
    UnsupportedMediaType(ExceptionMessage),
    /// A header transformer failed to extract or insert negotiation data.
    #[error("{0}")]
    NegotiationFailed(ExceptionMessage),
    /// A message body could not be decoded.
    #[error("{0}")]
    DeserializationFailed(ExceptionMessage),
    /// A message body could not be encoded.
    #[error("{0}")]
    SerializationFailed(ExceptionMessage),
    /// The addressed entity does not exist.
    #[error("{0}")]
    NotFound(ExceptionMessage),
    /// The caller is not allowed to perform the call.
    #[error("{0}")]
    Forbidden(ExceptionMessage),
    /// A service policy rejected the call.
    #[error("{0}")]
    PolicyViolated(ExceptionMessage),
    /// Any other transport failure with an explicit code.
    #[error("{message}")]
    Other {
        /// Code to render the error with.
        code: TransportErrorCode,
        /// Structured body.
        message: ExceptionMessage,
    },
}

impl TransportError {
    /// Build the error raised when no accepted protocol can be satisfied.
    pub fn not_acceptable(requested: &[MessageProtocol], supported: &MessageProtocol) -> Self {
        let requested = requested
            .iter()
            .map(MessageProtocol::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        TransportError::NotAcceptable(ExceptionMessage::new(
            "NotAcceptable",
            format!(
                "The requested protocol type/versions: ({requested}) could not be satisfied by the server, the default that the server uses is: {supported}"
            ),
        ))
    }

    /// Build the error raised when a request body cannot be deserialized.
    pub fn unsupported_media_type(received: &MessageProtocol, supported: &MessageProtocol) -> Self {
        TransportError::UnsupportedMediaType(ExceptionMessage::new(
            "UnsupportedMediaType",
            format!(
                "Could not negotiate a deserializer for type {received}, the default media type supported is {supported}"
            ),
        ))
    }

    /// Build a negotiation failure.
    pub fn negotiation_failed(detail: impl Into<String>) -> Self {
        TransportError::NegotiationFailed(ExceptionMessage::new("NegotiationFailed", detail))
    }

    /// Build a deserialization failure.
    pub fn deserialization_failed(detail: impl Into<String>) -> Self {
        TransportError::DeserializationFailed(ExceptionMessage::new(
            "DeserializationException",
            detail,
        ))
    }

    /// Build a serialization failure.
    pub fn serialization_failed(detail: impl Into<String>) -> Self {
        TransportError::SerializationFailed(ExceptionMessage::new("SerializationException", detail))
    }

    /// Build a not-found error.
    pub fn not_found(detail: impl Into<String>) -> Self {
        TransportError::NotFound(ExceptionMessage::new("NotFound", detail))
    }

    /// Rebuild an error from its rendered code and message.
    ///
    /// Used when an error crosses the wire: the receiving side only has the
    /// error code and the structured message to go on.
    pub fn from_code(code: TransportErrorCode, message: ExceptionMessage) -> Self {
        match code {
            c if c == TransportErrorCode::NOT_ACCEPTABLE => TransportError::NotAcceptable(message),
            c if c == TransportErrorCode::UNSUPPORTED_MEDIA_TYPE => {
                TransportError::UnsupportedMediaType(message)
            }
            c if c == TransportErrorCode::PROTOCOL_ERROR => {
                TransportError::NegotiationFailed(message)
            }
            c if c == TransportErrorCode::UNSUPPORTED_DATA => {
                TransportError::DeserializationFailed(message)
            }
            c if c == TransportErrorCode::NOT_FOUND => TransportError::NotFound(message),
            c if c == TransportErrorCode::FORBIDDEN => TransportError::Forbidden(message),
            c if c == TransportErrorCode::POLICY_VIOLATION => TransportError::PolicyViolated(message),
            code => TransportError::Other { code, message },
        }
    }

    /// Code the error is rendered with.
    pub fn error_code(&self) -> TransportErrorCode {
        match self {
            TransportError::NotAcceptable(_) => TransportErrorCode::NOT_ACCEPTABLE,
            TransportError::UnsupportedMediaType(_) => TransportErrorCode::UNSUPPORTED_MEDIA_TYPE,
            TransportError::NegotiationFailed(_) => TransportErrorCode::PROTOCOL_ERROR,
            TransportError::DeserializationFailed(_) => TransportErrorCode::UNSUPPORTED_DATA,
            TransportError::SerializationFailed(_) => TransportErrorCode::INTERNAL_SERVER_ERROR,
            TransportError::NotFound(_) => TransportErrorCode::NOT_FOUND,
            TransportError::Forbidden(_) => TransportErrorCode::FORBIDDEN,
            TransportError::PolicyViolated(_) => TransportErrorCode::POLICY_VIOLATION,
            TransportError::Other { code, .. } => *code,
        }
    }

    /// Structured message carried by the error.
    pub fn exception_message(&self) -> &ExceptionMessage {
        match self {
            TransportError::NotAcceptable(message)
            | TransportError::UnsupportedMediaType(message)
            | TransportError::NegotiationFailed(message)
            | TransportError::DeserializationFailed(message)
            | TransportError::SerializationFailed(message)
            | TransportError::NotFound(message)
            | TransportError::Forbidden(message)
            | TransportError::PolicyViolated(message)
            | TransportError::Other { message, .. } => message,
        }
    }
}
