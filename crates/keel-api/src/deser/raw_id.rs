//! ---
//! keel_section: "04-service-descriptors"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service descriptors, calls, ACLs, and serializers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Untyped identifiers sitting between a request path and a typed call id.
use indexmap::IndexMap;

/// One positional path parameter, optionally carrying the name it was
/// declared with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathParam {
    name: Option<String>,
    value: String,
}

impl PathParam {
    /// Named path parameter.
    pub fn named(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }

    /// Positional path parameter without a name.
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }

    /// Name hint, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Raw value.
    pub fn raw_value(&self) -> &str {
        &self.value
    }
}

/// Ordered path parameters plus a query multimap.
///
/// Path parameter order is significant: position maps to the slot declared
/// in the path pattern, names are only hints. Builders append and never
/// reorder or deduplicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawId {
    path_params: Vec<PathParam>,
    query_params: IndexMap<String, Vec<String>>,
}

impl RawId {
    /// Id without any parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Id from path parameters and query parameters.
    pub fn of(path_params: Vec<PathParam>, query_params: IndexMap<String, Vec<String>>) -> Self {
        Self {
            path_params,
            query_params,
        }
    }

    /// Id carrying only path parameters.
    pub fn from_path_params(path_params: Vec<PathParam>) -> Self {
        Self::of(path_params, IndexMap::new())
    }

    /// Id carrying only query parameters.
    pub fn from_query_params(query_params: IndexMap<String, Vec<String>>) -> Self {
        Self::of(Vec::new(), query_params)
    }

    /// Id from unnamed positional path values.
    pub fn from_path_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_path_params(values.into_iter().map(PathParam::value).collect())
    }

    /// Path parameters in positional order.
    pub fn path_params(&self) -> &[PathParam] {
        &self.path_params
    }

    /// Query parameters in insertion order.
    pub fn query_params(&self) -> &IndexMap<String, Vec<String>> {
        &self.query_params
    }

    /// Value of the first path parameter whose name hint equals `name`.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|p| p.name() == Some(name))
            .map(PathParam::raw_value)
    }

    /// First value of the query parameter `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Copy with a named path parameter appended.
    pub fn with_path_param(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_path(PathParam::named(name, value))
    }

    /// Copy with an unnamed path value appended.
    pub fn with_path_value(self, value: impl Into<String>) -> Self {
        self.push_path(PathParam::value(value))
    }

    /// Copy with a query value appended after any existing values for `name`.
    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Copy with several query values appended for `name`. An empty list
    /// still declares the key.
    pub fn with_query_params<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_params
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Copy with the query value appended when present, or the key declared
    /// without values otherwise.
    pub fn with_optional_query_param(self, name: impl Into<String>, value: Option<String>) -> Self {
        self.with_query_params(name, value)
    }

    fn push_path(mut self, param: PathParam) -> Self {
        self.path_params.push(param);
        self
    }
}

/// Names of the parameters a call id is expected to carry.
///
/// Serializers for composite ids consume it one parameter at a time with
/// [`RawIdDescriptor::remove_next`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawIdDescriptor {
    path_params: Vec<String>,
    query_params: Vec<String>,
}

impl RawIdDescriptor {
    /// Descriptor from declared path and query parameter names.
    pub fn new(path_params: Vec<String>, query_params: Vec<String>) -> Self {
        Self {
            path_params,
            query_params,
        }
    }

    /// Declared path parameter names.
    pub fn path_params(&self) -> &[String] {
        &self.path_params
    }

    /// Declared query parameter names.
    pub fn query_params(&self) -> &[String] {
        &self.query_params
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.path_params.is_empty() && self.query_params.is_empty()
    }

    /// Copy without the first path parameter, or without the first query
    /// parameter once the path parameters are used up.
    pub fn remove_next(mut self) -> Self {
        if !self.path_params.is_empty() {
            self.path_params.remove(0);
        } else if !self.query_params.is_empty() {
            self.query_params.remove(0);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_param_lookup_uses_name_hints() {
        let id = RawId::empty()
            .with_path_param("blogId", "42")
            .with_path_value("7")
            .with_path_param("blogId", "shadowed");
        assert_eq!(id.path_param("blogId"), Some("42"));
        assert_eq!(id.path_param("postId"), None);

        let positional = RawId::from_path_values(["1", "2"]);
        assert_eq!(positional.path_param("1"), None);
        assert_eq!(positional.path_params()[1].raw_value(), "2");
    }

    #[test]
    fn query_param_returns_first_value() {
        let id = RawId::empty()
            .with_query_param("p", "a")
            .with_query_param("p", "b")
            .with_optional_query_param("q", None);
        assert_eq!(id.query_param("p"), Some("a"));
        assert_eq!(id.query_params()["p"], ["a", "b"]);
        assert_eq!(id.query_param("q"), None);
        assert!(id.query_params().contains_key("q"));
        assert_eq!(id.query_param("missing"), None);
    }

    #[test]
    fn builders_append_in_order() {
        let id = RawId::from_query_params(IndexMap::from([("z".to_owned(), vec!["1".to_owned()])]))
            .with_query_params("a", ["2", "3"])
            .with_query_param("z", "4");
        let keys: Vec<_> = id.query_params().keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a"]);
        assert_eq!(id.query_params()["z"], ["1", "4"]);
    }

    #[test]
    fn remove_next_consumes_path_before_query() {
        let descriptor = RawIdDescriptor::new(
            vec!["blogId".into(), "postId".into()],
            vec!["pageNo".into()],
        );
        let once = descriptor.remove_next();
        assert_eq!(once.path_params(), ["postId"]);
        let thrice = once.remove_next().remove_next();
        assert!(thrice.is_empty());
        assert!(thrice.clone().remove_next().is_empty());
    }
}
