//! ---
//! keel_section: "04-service-descriptors"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service descriptors, calls, ACLs, and serializers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Path patterns such as `/blog/:blogId/post/:postId/comments?pageNo&pageSize`.
//!
//! A pattern is a sequence of segments (literal text, `:name` for one path
//! segment, or a trailing `*name` for the rest of the path) followed by an
//! optional list of declared query parameters.
use std::fmt;
use std::str::FromStr;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::form_urlencoded;

use crate::deser::{PathParam, RawId, RawIdDescriptor};

/// Bytes escaped inside one path segment. Besides the RFC 3986 path set this
/// covers `/` and `%` so a value always comes back as a single segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn decode_segment(part: &str) -> Option<String> {
    percent_decode_str(part)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Failures parsing a pattern or formatting an id into one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Patterns must start with `/`.
    #[error("path pattern `{0}` must start with `/`")]
    NotAbsolute(String),
    /// A `:` or `*` segment without a name.
    #[error("path pattern `{0}` declares a parameter without a name")]
    EmptyParamName(String),
    /// A `*name` segment followed by more segments.
    #[error("wildcard parameter must be the last segment of `{0}`")]
    WildcardNotLast(String),
    /// Not enough path values to fill the pattern.
    #[error("no value supplied for path parameter `{0}`")]
    MissingPathValue(String),
    /// A value that cannot be placed in its segment.
    #[error("value `{value}` is not valid for path parameter `{param}`")]
    InvalidPathValue {
        /// Parameter name.
        param: String,
        /// Rejected value.
        value: String,
    },
    /// More path values than parameters.
    #[error("pattern takes {expected} path values, got {actual}")]
    UnexpectedPathValues {
        /// Number of path parameters in the pattern.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard(String),
}

/// Parsed path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
    query_params: Vec<String>,
}

impl PathPattern {
    /// Parse a pattern.
    pub fn parse(pattern: &str) -> Result<Self, PathError> {
        let (path, query) = match pattern.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (pattern, None),
        };
        let Some(path) = path.strip_prefix('/') else {
            return Err(PathError::NotAbsolute(pattern.to_owned()));
        };

        let mut segments = Vec::new();
        if !path.is_empty() {
            for part in path.split('/') {
                if matches!(segments.last(), Some(Segment::Wildcard(_))) {
                    return Err(PathError::WildcardNotLast(pattern.to_owned()));
                }
                let segment = if let Some(name) = part.strip_prefix(':') {
                    Segment::Param(name.to_owned())
                } else if let Some(name) = part.strip_prefix('*') {
                    Segment::Wildcard(name.to_owned())
                } else {
                    Segment::Literal(part.to_owned())
                };
                if let Segment::Param(name) | Segment::Wildcard(name) = &segment {
                    if name.is_empty() {
                        return Err(PathError::EmptyParamName(pattern.to_owned()));
                    }
                }
                segments.push(segment);
            }
        }

        let query_params = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect();

        Ok(Self {
            raw: pattern.to_owned(),
            segments,
            query_params,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the path parameters in positional order.
    pub fn path_param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) | Segment::Wildcard(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Declared query parameter names.
    pub fn query_param_names(&self) -> &[String] {
        &self.query_params
    }

    /// Parameter names a call id for this pattern carries.
    pub fn raw_id_descriptor(&self) -> RawIdDescriptor {
        RawIdDescriptor::new(
            self.path_param_names().map(str::to_owned).collect(),
            self.query_params.clone(),
        )
    }

    /// Match `uri` (path plus optional query) against the pattern.
    ///
    /// Path parameters come back named after the pattern. Every declared
    /// query parameter is present in the result, with no values when the
    /// request did not carry it; undeclared ones are dropped.
    pub fn extract(&self, uri: &str) -> Option<RawId> {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, query),
            None => (uri, ""),
        };
        let rest = path.strip_prefix('/')?;
        let parts: Vec<String> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/')
                .map(decode_segment)
                .collect::<Option<_>>()?
        };
        let mut id = RawId::empty();
        let mut wildcard = false;

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard(name) => {
                    let tail = parts.get(index..).unwrap_or_default().join("/");
                    id = id.with_path_param(name.as_str(), tail);
                    wildcard = true;
                }
                Segment::Literal(literal) => {
                    if parts.get(index).map(String::as_str) != Some(literal.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => match parts.get(index) {
                    Some(part) if !part.is_empty() => {
                        id = id.with_path_param(name.as_str(), part.as_str());
                    }
                    _ => return None,
                },
            }
        }
        if !wildcard && parts.len() != self.segments.len() {
            return None;
        }

        let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        for name in &self.query_params {
            let values = pairs
                .iter()
                .filter(|(key, _)| key == name)
                .map(|(_, value)| value.clone());
            id = id.with_query_params(name.as_str(), values);
        }
        Some(id)
    }

    /// Render `id` into a URI, filling path parameters positionally and
    /// appending declared query parameters in declaration order.
    pub fn format(&self, id: &RawId) -> Result<String, PathError> {
        let mut values = id.path_params().iter().map(PathParam::raw_value);
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Param(name) => {
                    let value = values
                        .next()
                        .ok_or_else(|| PathError::MissingPathValue(name.clone()))?;
                    if value.is_empty() {
                        return Err(PathError::InvalidPathValue {
                            param: name.clone(),
                            value: value.to_owned(),
                        });
                    }
                    path.extend(utf8_percent_encode(value, SEGMENT));
                }
                Segment::Wildcard(name) => {
                    let value = values
                        .next()
                        .ok_or_else(|| PathError::MissingPathValue(name.clone()))?;
                    let pieces: Vec<String> = value
                        .trim_start_matches('/')
                        .split('/')
                        .map(|piece| utf8_percent_encode(piece, SEGMENT).to_string())
                        .collect();
                    path.push_str(&pieces.join("/"));
                }
            }
        }
        if path.is_empty() {
            path.push('/');
        }

        let supplied = id.path_params().len();
        let expected = self.path_param_names().count();
        if supplied > expected {
            return Err(PathError::UnexpectedPathValues {
                expected,
                actual: supplied,
            });
        }

        let mut query = form_urlencoded::Serializer::new(String::new());
        let mut has_query = false;
        for name in &self.query_params {
            for value in id.query_params().get(name).into_iter().flatten() {
                query.append_pair(name, value);
                has_query = true;
            }
        }
        if has_query {
            path.push('?');
            path.push_str(&query.finish());
        }
        Ok(path)
    }

    /// Regular expression matching request paths for this pattern, as used in
    /// generated ACLs. Literal text is escaped, the query part is dropped, and
    /// no anchors are added.
    pub fn acl_regex(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_owned();
        }
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(literal) => format!("/{}", regex::escape(literal)),
                Segment::Param(_) => "/[^/]+".to_owned(),
                Segment::Wildcard(_) => "/.*".to_owned(),
            })
            .collect()
    }
}

impl FromStr for PathPattern {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
