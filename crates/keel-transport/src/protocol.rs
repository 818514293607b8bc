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

const UTF_8: &str = "utf-8";

/// How a message body is encoded: content type, charset and protocol version.
///
/// An empty field means "any" while negotiating. Once a protocol has been
/// negotiated the fields describe the message exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageProtocol {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    charset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

impl MessageProtocol {
    /// Build a protocol from its three optional parts.
    pub fn new(
        content_type: Option<String>,
        charset: Option<String>,
        version: Option<String>,
    ) -> Self {
        Self {
            content_type,
            charset,
            version,
        }
    }

    /// The protocol that accepts anything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `application/json; charset=utf-8`.
    pub fn json() -> Self {
        Self::empty()
            .with_content_type("application/json")
            .with_charset(UTF_8)
    }

    /// `text/plain; charset=utf-8`.
    pub fn text() -> Self {
        Self::empty()
            .with_content_type("text/plain")
            .with_charset(UTF_8)
    }

    /// Parse a `Content-Type` header value such as `application/json; charset=utf-8`.
    ///
    /// Only the media type and the `charset` parameter are retained. The version
    /// is left unset: it belongs to the negotiation strategy, not the header.
    pub fn from_content_type_header(header: Option<&str>) -> Self {
        let Some(header) = header else {
            return Self::empty();
        };
        let mut parts = header.split(';');
        let content_type = parts
            .next()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);
        let charset = parts.find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches('"').to_owned())
        });
        Self {
            content_type,
            charset,
            version: None,
        }
    }

    /// Render the content type and charset back into a `Content-Type` header value.
    pub fn to_content_type_header(&self) -> Option<String> {
        let content_type = self.content_type.as_ref()?;
        Some(match &self.charset {
            Some(charset) => format!("{content_type}; charset={charset}"),
            None => content_type.clone(),
        })
    }

    /// Media type, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Charset, if any.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Protocol version, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Copy with the content type replaced.
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..self
        }
    }

    /// Copy with the charset replaced.
    pub fn with_charset(self, charset: impl Into<String>) -> Self {
        Self {
            charset: Some(charset.into()),
            ..self
        }
    }

    /// Copy with the version replaced.
    pub fn with_version(self, version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..self
        }
    }

    /// A message is textual when it declares a charset.
    pub fn is_text(&self) -> bool {
        self.charset.is_some()
    }

    /// Whether the declared charset is UTF-8.
    pub fn is_utf8(&self) -> bool {
        self.charset
            .as_deref()
            .is_some_and(|charset| charset.eq_ignore_ascii_case(UTF_8))
    }

    /// Whether a message in `offered` satisfies this protocol used as a constraint.
    ///
    /// Every unset field of `self` accepts anything. A content type of `*/*` or a
    /// `type/*` range also matches.
    pub fn accepts(&self, offered: &MessageProtocol) -> bool {
        let content_type_ok = match (self.content_type(), offered.content_type()) {
            (None, _) => true,
            (Some("*/*"), _) => true,
            (Some(_), None) => false,
            (Some(wanted), Some(actual)) => match wanted.strip_suffix("/*") {
                Some(range) => actual
                    .split_once('/')
                    .is_some_and(|(top, _)| top.eq_ignore_ascii_case(range)),
                None => wanted.eq_ignore_ascii_case(actual),
            },
        };
        let charset_ok = match (self.charset(), offered.charset()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
        };
        let version_ok = match (self.version(), offered.version()) {
            (None, _) | (_, None) => true,
            (Some(wanted), Some(actual)) => wanted == actual,
        };
        content_type_ok && charset_ok && version_ok
    }
}

impl fmt::Display for MessageProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_content_type_header() {
            Some(header) => f.write_str(&header)?,
            None => f.write_str("*/*")?,
        }
        if let Some(version) = &self.version {
            write!(f, " (version {version})")?;
        }
        Ok(())
    }
}
