//! ---
//! keel_section: "04-service-descriptors"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service descriptors, calls, ACLs, and serializers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

/// Requested slice of a paged collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    page_no: Option<u32>,
    page_size: Option<u32>,
}

impl Page {
    /// Page with the given number and size.
    pub fn new(page_no: Option<u32>, page_size: Option<u32>) -> Self {
        Self { page_no, page_size }
    }

    /// Zero-based page number.
    pub fn page_no(&self) -> Option<u32> {
        self.page_no
    }

    /// Number of items per page.
    pub fn page_size(&self) -> Option<u32> {
        self.page_size
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<u32>| v.map_or_else(|| "-".to_owned(), |v| v.to_string());
        write!(f, "Page({}, {})", show(self.page_no), show(self.page_size))
    }
}
