// src/certificate.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A TLS certificate as returned by the certs.io API and as stored in
/// ingestion files (one JSON object per line).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    /// Ingestion timestamp for Elasticsearch data streams
    #[serde(rename = "@timestamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// host:port the certificate was observed on
    #[serde(default)]
    pub server: String,

    #[serde(default)]
    pub expired: bool,

    #[serde(default)]
    pub self_signed: bool,

    #[serde(default)]
    pub revoked: bool,

    #[serde(default)]
    pub not_before: Option<DateTime<Utc>>,

    #[serde(default)]
    pub not_after: Option<DateTime<Utc>>,

    /// Common name and subject alternative names
    #[serde(rename = "ssl_names", default, deserialize_with = "null_as_empty")]
    pub names: Vec<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub subject_org: Vec<String>,

    #[serde(default)]
    pub serial: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub issuer_names: Vec<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub issuer_org: Vec<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub emails: Vec<String>,

    #[serde(rename = "fingerprint_sha256", default)]
    pub fingerprint_sha256: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub parent_domains: Vec<String>,
}

impl Certificate {
    /// Host portion of `server` with any port stripped.
    ///
    /// Handles `ip:port`, `[v6]:port`, bare IPv4/IPv6 addresses and
    /// `hostname:port`.
    pub fn server_host(&self) -> &str {
        server_host(&self.server)
    }
}

pub(crate) fn server_host(server: &str) -> &str {
    let server = server.trim();

    if let Some(rest) = server.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }

    // More than one colon and no brackets: a bare IPv6 address
    if server.matches(':').count() > 1 {
        return server;
    }

    match server.rsplit_once(':') {
        Some((host, _port)) => host,
        None => server,
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
