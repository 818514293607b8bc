//! ---
//! keel_section: "04-service-descriptors"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service descriptors, calls, ACLs, and serializers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Access control entries published for a service.
use std::hash::{Hash, Hasher};

use keel_transport::Method;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::call::{AnyCall, CallId};
use crate::descriptor::Descriptor;

/// One access control entry: requests matching it are routed to the service.
/// Unset fields match anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceAcl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<Method>,
    #[serde(
        rename = "pathPattern",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    path_regex: Option<String>,
    /// Anchored `path_regex`, compiled on first match. `None` once compiling failed.
    #[serde(skip)]
    compiled: OnceCell<Option<Regex>>,
}

impl PartialEq for ServiceAcl {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method && self.path_regex == other.path_regex
    }
}

impl Eq for ServiceAcl {}

impl Hash for ServiceAcl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
        self.path_regex.hash(state);
    }
}

impl ServiceAcl {
    /// ACL with optional method and path regex.
    pub fn new(method: Option<Method>, path_regex: Option<String>) -> Self {
        Self {
            method,
            path_regex,
            compiled: OnceCell::new(),
        }
    }

    /// ACL matching any method on paths matching `path_regex`.
    pub fn path(path_regex: impl Into<String>) -> Self {
        Self::new(None, Some(path_regex.into()))
    }

    /// ACL matching `method` on paths matching `path_regex`.
    pub fn method_and_path(method: Method, path_regex: impl Into<String>) -> Self {
        Self::new(Some(method), Some(path_regex.into()))
    }

    /// ACL matching `method` on any path.
    pub fn method(method: Method) -> Self {
        Self::new(Some(method), None)
    }

    /// Method constraint.
    pub fn method_constraint(&self) -> Option<Method> {
        self.method
    }

    /// Path regex constraint.
    pub fn path_regex(&self) -> Option<&str> {
        self.path_regex.as_deref()
    }

    /// Whether a request with `method` and `path` passes this ACL. The path
    /// regex must match the whole path. An invalid regex matches nothing.
    pub fn matches(&self, method: Method, path: &str) -> bool {
        if self.method.is_some_and(|wanted| wanted != method) {
            return false;
        }
        let Some(path_regex) = &self.path_regex else {
            return true;
        };
        self.compiled
            .get_or_init(|| match Regex::new(&format!("^(?:{path_regex})$")) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    warn!(%path_regex, error = %err, "ignoring ACL with invalid path regex");
                    None
                }
            })
            .as_ref()
            .is_some_and(|regex| regex.is_match(path))
    }
}

fn generated_acl(call: &dyn AnyCall) -> Option<ServiceAcl> {
    let CallId::Rest { method, .. } = call.call_id() else {
        return None;
    };
    let pattern = call.path_pattern()?;
    Some(ServiceAcl::method_and_path(*method, pattern.acl_regex()))
}

/// Effective ACLs of a descriptor.
///
/// Each REST call whose auto-ACL setting (its own override, else the
/// descriptor's flag) is on contributes one generated ACL, in call order.
/// Manually declared ACLs follow, untouched.
pub fn resolve_acls(descriptor: &Descriptor) -> Vec<ServiceAcl> {
    let generated = descriptor
        .calls()
        .iter()
        .filter(|call| call.auto_acl().unwrap_or(descriptor.auto_acl()))
        .filter_map(|call| generated_acl(call.as_ref()));
    let acls: Vec<ServiceAcl> = generated.chain(descriptor.acls().iter().cloned()).collect();
    debug!(service = descriptor.name(), acls = acls.len(), "resolved service ACLs");
    acls
}

#[cfg(test)]
mod tests {
    use keel_transport::TransportError;

    use super::*;
    use crate::call::Call;

    fn get_mock() -> Call<String, (), ()> {
        Call::new(CallId::rest(Method::Get, "/mocks/:id"), |_: String, _: ()| async {
            Ok::<_, TransportError>(())
        })
    }

    fn add_mock() -> Call<(), (), ()> {
        Call::new(CallId::rest(Method::Post, "/mocks"), |_: (), _: ()| async {
            Ok::<_, TransportError>(())
        })
    }

    #[test]
    fn auto_acl_generates_method_and_regex() {
        let descriptor = Descriptor::named("mocks")
            .with_call(get_mock())
            .with_auto_acl(true);
        assert_eq!(
            resolve_acls(&descriptor),
            vec![ServiceAcl::method_and_path(Method::Get, "/mocks/[^/]+")]
        );
    }

    #[test]
    fn no_acls_without_auto_acl_unless_a_call_opts_in() {
        let descriptor = Descriptor::named("mocks")
            .with_call(get_mock())
            .with_call(add_mock());
        assert!(resolve_acls(&descriptor).is_empty());

        let opted_in = descriptor.with_call(add_mock().with_auto_acl(true));
        assert_eq!(
            resolve_acls(&opted_in),
            vec![ServiceAcl::method_and_path(Method::Post, "/mocks")]
        );
    }

    #[test]
    fn calls_can_opt_out_and_manual_acls_come_last() {
        let descriptor = Descriptor::named("mocks")
            .with_call(get_mock().with_auto_acl(false))
            .with_call(add_mock())
            .with_call(Call::new(CallId::named("ping"), |_: (), _: ()| async {
                Ok::<_, TransportError>(())
            }))
            .with_auto_acl(true)
            .with_acls([ServiceAcl::path("/admin/.*")]);
        assert_eq!(
            resolve_acls(&descriptor),
            vec![
                ServiceAcl::method_and_path(Method::Post, "/mocks"),
                ServiceAcl::path("/admin/.*"),
            ]
        );
    }

    #[test]
    fn matching_uses_the_whole_path() {
        let acl = ServiceAcl::method_and_path(Method::Get, "/mocks/[^/]+");
        assert!(acl.matches(Method::Get, "/mocks/1"));
        assert!(!acl.matches(Method::Get, "/mocks/1/more"));
        assert!(!acl.matches(Method::Post, "/mocks/1"));
        assert!(ServiceAcl::default().matches(Method::Delete, "/anything"));
        assert!(!ServiceAcl::path("(").matches(Method::Get, "/"));
    }

    #[test]
    fn path_regex_compiles_once_and_keeps_answering() {
        let acl = ServiceAcl::method_and_path(Method::Get, "/mocks/[0-9]+");
        assert!(acl.compiled.get().is_none());
        assert!(acl.matches(Method::Get, "/mocks/1"));
        let first = acl.compiled.get().and_then(Option::as_ref).map(|r| r as *const Regex);
        assert!(first.is_some());
        for _ in 0..3 {
            assert!(acl.matches(Method::Get, "/mocks/42"));
            assert!(!acl.matches(Method::Get, "/mocks/x"));
        }
        let again = acl.compiled.get().and_then(Option::as_ref).map(|r| r as *const Regex);
        assert_eq!(first, again);

        let broken = ServiceAcl::path("(");
        assert!(!broken.matches(Method::Get, "/"));
        assert!(matches!(broken.compiled.get(), Some(None)));
        assert!(!broken.matches(Method::Get, "("));
    }

    #[test]
    fn equality_ignores_the_compiled_regex() {
        let used = ServiceAcl::path("/x");
        assert!(used.matches(Method::Get, "/x"));
        assert_eq!(used, ServiceAcl::path("/x"));
        let deserialized: ServiceAcl =
            serde_json::from_value(serde_json::json!({"pathPattern": "/x"})).expect("acl");
        assert_eq!(deserialized, used);
        assert!(deserialized.matches(Method::Put, "/x"));
    }

    #[test]
    fn acls_serialize_with_path_pattern_key() {
        let json = serde_json::to_value(ServiceAcl::method_and_path(Method::Get, "/mocks")).expect("json");
        assert_eq!(json, serde_json::json!({"method": "GET", "pathPattern": "/mocks"}));
        let any = serde_json::to_value(ServiceAcl::path("/x")).expect("json");
        assert_eq!(any, serde_json::json!({"pathPattern": "/x"}));
    }
}
