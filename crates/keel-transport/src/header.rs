//! ---
//! keel_section: "02-transport-negotiation"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Message protocols, headers, and negotiation strategies."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::method::Method;
use crate::principal::Principal;
use crate::protocol::MessageProtocol;

/// Multi-valued header map.
///
/// Names keep the casing they were stored with and values keep their order.
/// Every lookup is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(IndexMap<String, Vec<String>>);

impl Headers {
    /// Empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a header map from `(name, value)` pairs, appending repeated names.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |headers, (name, value)| {
                headers.with_added(name, value)
            })
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.matching(name)
            .flat_map(|(_, values)| values.iter())
            .map(String::as_str)
            .next()
    }

    /// Every value stored under `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.matching(name)
            .flat_map(|(_, values)| values.iter())
            .map(String::as_str)
            .collect()
    }

    /// Whether any entry carries `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.matching(name).next().is_some()
    }

    /// Iterate entries with their original casing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Number of distinct stored names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no headers are stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy with every entry for `name` replaced by the single `value`.
    pub fn with(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let mut headers = self.without(&name);
        headers.0.insert(name, vec![value.into()]);
        headers
    }

    /// Copy with `value` appended to the entry for `name`.
    ///
    /// If an entry already exists under a different casing the value joins it.
    pub fn with_added(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let existing = self
            .0
            .keys()
            .find(|key| key.eq_ignore_ascii_case(&name))
            .cloned();
        self.0
            .entry(existing.unwrap_or(name))
            .or_default()
            .push(value.into());
        self
    }

    /// Copy with every entry for `name` removed.
    pub fn without(mut self, name: &str) -> Self {
        self.0.retain(|key, _| !key.eq_ignore_ascii_case(name));
        self
    }

    fn matching<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = (&'a String, &'a Vec<String>)> + use<'a, 'n> {
        self.0
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<String>)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, Vec<String>)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Behaviour shared by request and response headers.
pub trait MessageHeader: Sized {
    /// Protocol of the message body.
    fn protocol(&self) -> &MessageProtocol;

    /// All headers.
    fn headers(&self) -> &Headers;

    /// First value of the named header, matched case-insensitively.
    fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name)
    }

    /// Copy with the protocol replaced.
    fn with_protocol(self, protocol: MessageProtocol) -> Self;

    /// Copy with the whole header map replaced.
    fn replace_all_headers(self, headers: Headers) -> Self;

    /// Copy with the named header set to a single value.
    fn with_header(self, name: impl Into<String>, value: impl Into<String>) -> Self;
}

/// Header of an incoming or outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    method: Method,
    uri: String,
    protocol: MessageProtocol,
    accepted_response_protocols: Vec<MessageProtocol>,
    principal: Option<Principal>,
    headers: Headers,
}

impl RequestHeader {
    /// Request for `uri` (path plus optional query) with an empty protocol.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            protocol: MessageProtocol::empty(),
            accepted_response_protocols: Vec::new(),
            principal: None,
            headers: Headers::new(),
        }
    }

    /// Request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Full request URI as sent on the wire.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Path component of the URI.
    pub fn path(&self) -> &str {
        self.uri
            .split_once('?')
            .map_or(self.uri.as_str(), |(path, _)| path)
    }

    /// Raw query component of the URI, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    /// Response protocols the caller accepts, in preference order.
    pub fn accepted_response_protocols(&self) -> &[MessageProtocol] {
        &self.accepted_response_protocols
    }

    /// Authenticated principal, if any.
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Copy with the method replaced.
    pub fn with_method(self, method: Method) -> Self {
        Self { method, ..self }
    }

    /// Copy with the URI replaced.
    pub fn with_uri(self, uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..self
        }
    }

    /// Copy with the path replaced and the query kept.
    pub fn with_path(self, path: &str) -> Self {
        let uri = match self.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_owned(),
        };
        self.with_uri(uri)
    }

    /// Copy with the accepted response protocols replaced.
    pub fn with_accepted_response_protocols(self, protocols: Vec<MessageProtocol>) -> Self {
        Self {
            accepted_response_protocols: protocols,
            ..self
        }
    }

    /// Copy with the principal set.
    pub fn with_principal(self, principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            ..self
        }
    }

    /// Copy without a principal.
    pub fn clear_principal(self) -> Self {
        Self {
            principal: None,
            ..self
        }
    }
}

impl Default for RequestHeader {
    fn default() -> Self {
        Self::new(Method::Get, "/")
    }
}

impl MessageHeader for RequestHeader {
    fn protocol(&self) -> &MessageProtocol {
        &self.protocol
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn with_protocol(self, protocol: MessageProtocol) -> Self {
        Self { protocol, ..self }
    }

    fn replace_all_headers(self, headers: Headers) -> Self {
        Self { headers, ..self }
    }

    fn with_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let headers = self.headers.clone().with(name, value);
        Self { headers, ..self }
    }
}

/// Header of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    status: u16,
    protocol: MessageProtocol,
    headers: Headers,
}

impl ResponseHeader {
    /// Response with the given status, protocol and headers.
    pub fn new(status: u16, protocol: MessageProtocol, headers: Headers) -> Self {
        Self {
            status,
            protocol,
            headers,
        }
    }

    /// `200 OK` with an empty protocol.
    pub fn ok() -> Self {
        Self::new(200, MessageProtocol::empty(), Headers::new())
    }

    /// `204 No Content` with an empty protocol.
    pub fn no_content() -> Self {
        Self::new(204, MessageProtocol::empty(), Headers::new())
    }

    /// Status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Copy with the status replaced.
    pub fn with_status(self, status: u16) -> Self {
        Self { status, ..self }
    }
}

impl MessageHeader for ResponseHeader {
    fn protocol(&self) -> &MessageProtocol {
        &self.protocol
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn with_protocol(self, protocol: MessageProtocol) -> Self {
        Self { protocol, ..self }
    }

    fn replace_all_headers(self, headers: Headers) -> Self {
        Self { headers, ..self }
    }

    fn with_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let headers = self.headers.clone().with(name, value);
        Self { headers, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_but_storage_keeps_it() {
        let headers = Headers::from_pairs([("X-Trace-Id", "a"), ("x-trace-id", "b")]);
        assert_eq!(headers.get("X-TRACE-ID"), Some("a"));
        assert_eq!(headers.get_all("x-Trace-id"), vec!["a", "b"]);
        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["X-Trace-Id"]);
    }

    #[test]
    fn with_replaces_every_casing() {
        let headers = Headers::from_pairs([("Accept", "text/plain"), ("ACCEPT", "text/html")])
            .with("accept", "application/json");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_all("Accept"), vec!["application/json"]);
    }

    #[test]
    fn request_header_defaults_to_root_get() {
        let request = RequestHeader::default();
        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.uri(), "/");
        assert_eq!(request.protocol(), &MessageProtocol::empty());
        assert!(request.principal().is_none());
    }

    #[test]
    fn request_path_and_query_split() {
        let request = RequestHeader::new(Method::Get, "/blog/1?pageNo=2");
        assert_eq!(request.path(), "/blog/1");
        assert_eq!(request.query(), Some("pageNo=2"));
        let moved = request.with_path("/blog/2");
        assert_eq!(moved.uri(), "/blog/2?pageNo=2");
    }

    #[test]
    fn request_builders_touch_one_field() {
        let original = RequestHeader::new(Method::Post, "/mocks")
            .with_header("User-Agent", "caller")
            .with_principal(Principal::service("caller"));
        let changed = original.clone().with_method(Method::Put);
        assert_eq!(changed.uri(), original.uri());
        assert_eq!(changed.headers(), original.headers());
        assert_eq!(changed.principal(), original.principal());
        assert_eq!(changed.method(), Method::Put);
        assert!(changed.clear_principal().principal().is_none());
    }

    #[test]
    fn response_header_constants() {
        assert_eq!(ResponseHeader::ok().status(), 200);
        assert_eq!(ResponseHeader::no_content().status(), 204);
        let created = ResponseHeader::ok()
            .with_status(201)
            .with_header("Location", "/mocks/1");
        assert_eq!(created.status(), 201);
        assert_eq!(created.header("location"), Some("/mocks/1"));
    }
}
