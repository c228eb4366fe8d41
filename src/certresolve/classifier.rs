// src/certresolve/classifier.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::resolver::{Outcome, ResolveResult};

/// Something worth a look about a certificate name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// The name resolves somewhere other than the server the certificate
    /// was seen on
    PossibleOriginBypass {
        host: String,
        resolved_ips: Vec<IpAddr>,
        source_ip: String,
        fingerprint_sha256: String,
    },
    /// The name does not resolve publicly
    PossibleInternalHost {
        host: String,
        source: String,
        error: String,
        fingerprint_sha256: String,
    },
}

impl Finding {
    pub fn host(&self) -> &str {
        match self {
            Finding::PossibleOriginBypass { host, .. } => host,
            Finding::PossibleInternalHost { host, .. } => host,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Finding::PossibleOriginBypass { .. } => "Possible Origin Bypass",
            Finding::PossibleInternalHost { .. } => "Possible Internal Host",
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::PossibleOriginBypass {
                host,
                resolved_ips,
                source_ip,
                ..
            } => {
                let ips: Vec<String> = resolved_ips.iter().map(|ip| ip.to_string()).collect();
                write!(
                    f,
                    "[bypass] {} -> {} (certificate served from {})",
                    host,
                    ips.join(", "),
                    source_ip
                )
            }
            Finding::PossibleInternalHost { host, source, .. } => {
                write!(f, "[internal] {} (certificate served from {})", host, source)
            }
        }
    }
}

/// Classify one resolution. `None` means nothing unusual.
///
/// Each result is judged on its own; no state is kept between calls.
pub fn classify(result: &ResolveResult) -> Option<Finding> {
    let source = &result.task.source;

    match &result.outcome {
        Outcome::Alive(ips) => {
            let source_ip = source.server_host();
            if served_from(ips, source_ip) {
                return None;
            }
            Some(Finding::PossibleOriginBypass {
                host: result.task.host.clone(),
                resolved_ips: ips.clone(),
                source_ip: source_ip.to_string(),
                fingerprint_sha256: source.fingerprint_sha256.clone(),
            })
        }
        Outcome::Error(e) => Some(Finding::PossibleInternalHost {
            host: result.task.host.clone(),
            source: source.server.clone(),
            error: format!("{:#}", e),
            fingerprint_sha256: source.fingerprint_sha256.clone(),
        }),
    }
}

fn served_from(ips: &[IpAddr], source_ip: &str) -> bool {
    match source_ip.parse::<IpAddr>() {
        Ok(source) => ips.contains(&source),
        Err(_) => ips.iter().any(|ip| ip.to_string() == source_ip),
    }
}
