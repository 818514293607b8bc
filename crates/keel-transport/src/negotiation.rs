//! ---
//! keel_section: "02-transport-negotiation"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Message protocols, headers, and negotiation strategies."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::header::{MessageHeader, RequestHeader, ResponseHeader};
use crate::protocol::MessageProtocol;
use crate::transformer::HeaderTransformer;
use crate::Result;

/// Pattern matching a leading `/v<digits>/` path segment.
pub const DEFAULT_PATH_VERSION_PATTERN: &str = r"^/v(\d+)/";

/// Format producing the leading path segment for a version.
pub const DEFAULT_PATH_VERSION_FORMAT: &str = "/v%s/";

const PLACEHOLDER: &str = "%s";

static DEFAULT_EXTRACTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(DEFAULT_PATH_VERSION_PATTERN).expect("default version pattern compiles")
});

/// Negotiates the protocol version through a token embedded in the path.
///
/// On the server the token is lifted out of the path into
/// `protocol.version`; on the client the version is written back into the
/// path in the position the extractor expects.
#[derive(Debug, Clone)]
pub struct PathVersionedProtocolNegotiationStrategy {
    extractor: Regex,
    format: String,
}

impl PathVersionedProtocolNegotiationStrategy {
    /// Strategy over a compiled extractor and a `%s` format string.
    pub fn new(extractor: Regex, format: impl Into<String>) -> Self {
        Self {
            extractor,
            format: format.into(),
        }
    }

    /// Compile `pattern` and build a strategy around it.
    pub fn from_pattern(
        pattern: &str,
        format: impl Into<String>,
    ) -> std::result::Result<Self, regex::Error> {
        Ok(Self::new(Regex::new(pattern)?, format))
    }

    /// Extraction pattern.
    pub fn extractor(&self) -> &Regex {
        &self.extractor
    }

    /// Format string for the versioned path segment.
    pub fn format(&self) -> &str {
        &self.format
    }

    fn versioned_prefix(&self, version: &str) -> String {
        self.format.replacen(PLACEHOLDER, version, 1)
    }
}

impl Default for PathVersionedProtocolNegotiationStrategy {
    fn default() -> Self {
        Self {
            extractor: DEFAULT_EXTRACTOR.clone(),
            format: DEFAULT_PATH_VERSION_FORMAT.to_owned(),
        }
    }
}

fn fill_version(protocol: &MessageProtocol, version: &str) -> MessageProtocol {
    match protocol.version() {
        Some(_) => protocol.clone(),
        None => protocol.clone().with_version(version),
    }
}

impl HeaderTransformer for PathVersionedProtocolNegotiationStrategy {
    fn transform_client_request(&self, request: RequestHeader) -> Result<RequestHeader> {
        let Some(version) = request.protocol().version().map(str::to_owned) else {
            return Ok(request);
        };
        if self.extractor.is_match(request.path()) {
            return Ok(request);
        }
        if version.is_empty() || version.contains('/') {
            return Err(TransportError::negotiation_failed(format!(
                "version `{version}` cannot be embedded in a path"
            )));
        }
        let prefix = self.versioned_prefix(&version);
        let path = format!(
            "{}/{}",
            prefix.trim_end_matches('/'),
            request.path().trim_start_matches('/')
        );
        if !self.extractor.is_match(&path) {
            return Err(TransportError::negotiation_failed(format!(
                "versioned path `{path}` does not match `{}`",
                self.extractor
            )));
        }
        debug!(%version, %path, "embedded protocol version in request path");
        Ok(request.with_path(&path))
    }

    fn transform_server_request(&self, request: RequestHeader) -> Result<RequestHeader> {
        if request.protocol().version().is_some() {
            return Ok(request);
        }
        let extracted = self.extractor.captures(request.path()).map(|captures| {
            let matched = captures.get(0).map_or(0..0, |m| m.range());
            let version = captures
                .get(1)
                .map(|m| m.as_str().to_owned())
                .unwrap_or_default();
            (matched, version)
        });
        let Some((matched, version)) = extracted else {
            return Ok(request);
        };
        if version.is_empty() {
            warn!(path = request.path(), "path matched without a version token");
            return Err(TransportError::negotiation_failed(format!(
                "no version token in `{}`",
                request.path()
            )));
        }

        // Keep whatever surrounds the token; only the matched span goes.
        let path = request.path();
        let stripped = format!(
            "{}/{}",
            path[..matched.start].trim_end_matches('/'),
            path[matched.end..].trim_start_matches('/')
        );
        let protocol = request.protocol().clone().with_version(version.as_str());
        let accepted = request
            .accepted_response_protocols()
            .iter()
            .map(|p| fill_version(p, &version))
            .collect();
        debug!(%version, path = %stripped, "extracted protocol version from request path");
        Ok(request
            .with_path(&stripped)
            .with_protocol(protocol)
            .with_accepted_response_protocols(accepted))
    }

    fn transform_server_response(
        &self,
        response: ResponseHeader,
        request: &RequestHeader,
    ) -> Result<ResponseHeader> {
        match request.protocol().version() {
            Some(version) if response.protocol().version().is_none() => {
                let protocol = fill_version(response.protocol(), version);
                Ok(response.with_protocol(protocol))
            }
            _ => Ok(response),
        }
    }

    fn transform_client_response(
        &self,
        response: ResponseHeader,
        request: &RequestHeader,
    ) -> Result<ResponseHeader> {
        self.transform_server_response(response, request)
    }
}
