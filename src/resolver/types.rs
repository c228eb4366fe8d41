// src/resolver/types.rs
use std::net::IpAddr;
use std::sync::Arc;

use crate::certificate::Certificate;

/// A hostname taken from a certificate, queued for resolution
#[derive(Debug, Clone)]
pub struct HostEntry {
    pub host: String,
    /// Shared with the certificate list that produced it
    pub source: Arc<Certificate>,
}

impl HostEntry {
    pub fn new(host: impl Into<String>, source: Arc<Certificate>) -> Self {
        Self {
            host: host.into(),
            source,
        }
    }

    /// One entry per name in the certificate
    pub fn from_certificate(cert: &Arc<Certificate>) -> Vec<Self> {
        cert.names
            .iter()
            .map(|name| Self::new(name.clone(), Arc::clone(cert)))
            .collect()
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// The host resolved to at least one address
    Alive(Vec<IpAddr>),
    /// The lookup failed
    Error(anyhow::Error),
}

/// Resolution of one [`HostEntry`]
#[derive(Debug)]
pub struct ResolveResult {
    pub task: HostEntry,
    pub outcome: Outcome,
}

impl ResolveResult {
    pub fn alive(task: HostEntry, ips: Vec<IpAddr>) -> Self {
        Self {
            task,
            outcome: Outcome::Alive(ips),
        }
    }

    pub fn error(task: HostEntry, error: anyhow::Error) -> Self {
        Self {
            task,
            outcome: Outcome::Error(error),
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.outcome, Outcome::Alive(_))
    }
}
