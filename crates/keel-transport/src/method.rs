//! ---
//! keel_section: "02-transport-negotiation"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Message protocols, headers, and negotiation strategies."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// HTTP request method used by REST call identifiers and ACLs.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
    /// `PATCH`
    Patch,
}

impl Method {
    /// Whether requests with this method conventionally carry a body.
    pub fn has_request_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn display_and_parse_are_uppercase() {
        for method in Method::iter() {
            let rendered = method.to_string();
            assert_eq!(rendered, rendered.to_uppercase());
            assert_eq!(Method::from_str(&rendered).expect("parse"), method);
        }
        assert_eq!(Method::from_str("get").expect("case insensitive"), Method::Get);
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&Method::Delete).expect("serialize");
        assert_eq!(json, "\"DELETE\"");
    }
}
