//! ---
//! keel_section: "05-service-tools"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service detail extraction for ACL publishers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Service details consumed by gateways and service registries.
//!
//! For every locatable service the publisher needs the service name and its
//! effective ACLs. Non-locatable services are not routed to from outside and
//! are left out.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use keel_api::{Descriptor, ServiceAcl};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Name and effective ACLs of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDetails {
    /// Service name.
    pub name: String,
    /// Generated ACLs followed by declared ones.
    pub acls: Vec<ServiceAcl>,
}

impl ServiceDetails {
    /// Details of `descriptor`.
    pub fn of(descriptor: &Descriptor) -> Self {
        Self {
            name: descriptor.name().to_owned(),
            acls: descriptor.resolved_acls(),
        }
    }
}

/// Details of every locatable service in `descriptors`, in order.
pub fn service_details(descriptors: &[Descriptor]) -> Vec<ServiceDetails> {
    descriptors
        .iter()
        .filter(|descriptor| {
            let locatable = descriptor.locatable_service();
            if !locatable {
                debug!(service = descriptor.name(), "skipping non-locatable service");
            }
            locatable
        })
        .map(ServiceDetails::of)
        .collect()
}

/// JSON array of the details of every locatable service.
pub fn render_json(descriptors: &[Descriptor]) -> serde_json::Result<String> {
    serde_json::to_string(&service_details(descriptors))
}

/// Write the details JSON to `path`.
pub fn write_service_details(descriptors: &[Descriptor], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = render_json(descriptors).context("failed to render service details")?;
    fs::write(path, json)
        .with_context(|| format!("unable to write service details to {}", path.display()))?;
    info!(path = %path.display(), services = descriptors.len(), "wrote service details");
    Ok(())
}

#[cfg(test)]
mod tests {
    use keel_api::{named, rest_call, Method, TransportError};

    use super::*;

    async fn noop(_: (), _: ()) -> Result<(), TransportError> {
        Ok(())
    }

    fn acl_service() -> Descriptor {
        named("/aclservice")
            .with_call(rest_call(Method::Get, "/mocks/:id", |_: String, _: ()| async {
                Ok::<_, TransportError>(())
            }))
            .with_call(rest_call(Method::Post, "/mocks", noop))
            .with_auto_acl(true)
    }

    #[test]
    fn renders_name_and_acls() {
        let json = render_json(&[acl_service()]).expect("json");
        assert_eq!(
            json,
            r#"[{"name":"/aclservice","acls":[{"method":"GET","pathPattern":"/mocks/[^/]+"},{"method":"POST","pathPattern":"/mocks"}]}]"#
        );
    }

    #[test]
    fn non_locatable_services_are_skipped() {
        let hidden = acl_service().with_locatable_service(false);
        assert!(service_details(&[hidden]).is_empty());
    }

    #[test]
    fn details_are_written_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("services.json");
        write_service_details(&[acl_service()], &path).expect("write");
        let parsed: Vec<ServiceDetails> =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(parsed, service_details(&[acl_service()]));
    }
}
