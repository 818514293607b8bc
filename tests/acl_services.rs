//! ---
//! keel_section: "15-testing-qa"
//! keel_subsection: "integration-tests"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Integration tests for the Keel service API."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use keel_api::{named, resolve_acls, rest_call, Descriptor, Method, Service, ServiceAcl, TransportError};
use keel_tools::{render_json, service_details};

struct AclService;

impl AclService {
    async fn get_mock(_id: String, _: ()) -> Result<(), TransportError> {
        Ok(())
    }

    async fn add_mock(_id: (), _: ()) -> Result<(), TransportError> {
        Ok(())
    }
}

impl Service for AclService {
    fn descriptor(&self) -> Descriptor {
        named("/aclservice")
            .with_call(rest_call(Method::Get, "/mocks/:id", AclService::get_mock))
            .with_call(rest_call(Method::Post, "/mocks", AclService::add_mock))
            .with_auto_acl(true)
    }
}

struct NoAclService;

impl Service for NoAclService {
    fn descriptor(&self) -> Descriptor {
        named("/noaclservice")
            .with_call(rest_call(Method::Get, "/mocks/:id", AclService::get_mock))
            .with_call(rest_call(Method::Post, "/mocks", AclService::add_mock))
    }
}

#[test]
fn auto_acl_service_publishes_one_acl_per_rest_call() {
    let acls = resolve_acls(&AclService.descriptor());
    assert_eq!(
        acls,
        vec![
            ServiceAcl::method_and_path(Method::Get, "/mocks/[^/]+"),
            ServiceAcl::method_and_path(Method::Post, "/mocks"),
        ]
    );
    assert!(acls[0].matches(Method::Get, "/mocks/42"));
    assert!(!acls[0].matches(Method::Get, "/mocks"));
}

#[test]
fn service_without_auto_acl_publishes_nothing() {
    assert!(resolve_acls(&NoAclService.descriptor()).is_empty());
}

#[test]
fn service_details_cover_both_services() {
    let descriptors = [AclService.descriptor(), NoAclService.descriptor()];
    let details = service_details(&descriptors);
    assert_eq!(details.len(), 2);
    assert_eq!(details[0].name, "/aclservice");
    assert_eq!(details[0].acls.len(), 2);
    assert!(details[1].acls.is_empty());

    let json: serde_json::Value =
        serde_json::from_str(&render_json(&descriptors).expect("render")).expect("valid json");
    assert_eq!(json[1], serde_json::json!({"name": "/noaclservice", "acls": []}));
}
