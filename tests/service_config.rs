//! ---
//! keel_section: "15-testing-qa"
//! keel_subsection: "integration-tests"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Integration tests for the Keel service API."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use std::fs;

use keel_api::{rest_call, Descriptor, Method, TransportError};
use keel_common::ApiConfig;
use keel_tools::write_service_details;
use keel_transport::{HeaderTransformer, MessageHeader, MessageProtocol, Principal, RequestHeader};
use tempfile::tempdir;

const CONFIG: &str = r#"
[service]
auto_acl = true
locatable = true

[negotiation]
path_version_pattern = '^/api/(\d+)/'
path_version_format = "/api/%s/"

[identification]
header = "X-Keel-Service"
"#;

async fn lookup(id: u64, _: ()) -> Result<String, TransportError> {
    Ok(format!("record {id}"))
}

fn configured(config: &ApiConfig) -> Descriptor {
    Descriptor::named_with_config("records", config)
        .expect("descriptor")
        .with_call(rest_call(Method::Get, "/records/:id", lookup))
}

#[test]
fn config_file_drives_descriptor_defaults() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("keel.toml");
    fs::write(&path, CONFIG).expect("write config");

    let loaded = ApiConfig::load_with_source(&[&path]).expect("load");
    assert_eq!(loaded.source, path);
    let descriptor = configured(&loaded.config);
    assert!(descriptor.auto_acl());
    assert_eq!(descriptor.resolved_acls().len(), 1);

    let outgoing = RequestHeader::new(Method::Get, "/records/9")
        .with_protocol(MessageProtocol::json().with_version("4"))
        .with_principal(Principal::service("ledger"));
    let wire = descriptor
        .header_transformers()
        .transform_client_request(outgoing)
        .expect("client request");
    assert_eq!(wire.path(), "/api/4/records/9");
    assert_eq!(wire.header("x-keel-service"), Some("ledger"));
    assert_eq!(wire.header("user-agent"), None);
}

#[test]
fn invalid_config_is_rejected_before_use() {
    let mut config: ApiConfig = CONFIG.parse().expect("valid config");
    config.negotiation.path_version_format = "/api/".to_owned();
    let err = Descriptor::named_with_config("records", &config)
        .err()
        .expect("format without placeholder");
    assert!(format!("{err:#}").contains("records"));

    assert!("[negotiation]\npath_version_pattern = '^/api/'\n"
        .parse::<ApiConfig>()
        .is_err());
}

#[test]
fn service_details_are_written_for_locatable_services() {
    let config: ApiConfig = CONFIG.parse().expect("valid config");
    let hidden = configured(&config).with_locatable_service(false);
    let visible = configured(&config);

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("services.json");
    write_service_details(&[visible, hidden], &path).expect("write details");

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read details")).expect("json");
    assert_eq!(
        written,
        serde_json::json!([{
            "name": "records",
            "acls": [{"method": "GET", "pathPattern": "/records/[^/]+"}]
        }])
    );
}
