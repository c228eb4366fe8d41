// src/search/query.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::certificate::Certificate;

/// Searchable certificate field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Field {
    /// Certificates by domain
    #[serde(rename = "domain")]
    #[value(name = "domain")]
    Domain,
    /// Certificates by subject organization
    #[serde(rename = "org")]
    #[value(name = "org")]
    Org,
    /// Certificates by SHA-256 fingerprint
    #[serde(rename = "fingerprint_sha256")]
    #[value(name = "fingerprint_sha256", alias = "fingerprint")]
    Fingerprint,
    /// Certificates by serial number
    #[serde(rename = "serial")]
    #[value(name = "serial")]
    Serial,
    /// Certificates by email address
    #[serde(rename = "emails")]
    #[value(name = "emails", alias = "email")]
    Emails,
    /// Certificates by common name or subject alternative name
    #[serde(rename = "ssl_names")]
    #[value(name = "ssl_names", alias = "names")]
    CertNames,
    /// Certificates by the ip:port they were served from
    #[serde(rename = "server")]
    #[value(name = "server")]
    Server,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Domain => "domain",
            Field::Org => "org",
            Field::Fingerprint => "fingerprint_sha256",
            Field::Serial => "serial",
            Field::Emails => "emails",
            Field::CertNames => "ssl_names",
            Field::Server => "server",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search request body. `page` is advanced by the pagination loop only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    pub field: Field,
    #[serde(rename = "term")]
    pub value: String,
    #[serde(skip_serializing_if = "is_first_page")]
    pub page: u64,
}

fn is_first_page(page: &u64) -> bool {
    *page == 0
}

impl Query {
    pub fn new(field: Field, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            page: 0,
        }
    }
}

/// One page of search results
#[derive(Debug, Deserialize)]
pub struct Response {
    #[serde(rename = "total_certificates", default)]
    pub total: u64,
    #[serde(rename = "total_pages", default)]
    pub pages: u64,
    #[serde(rename = "page", default)]
    pub current_page: u64,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
}
