// src/resolver/lookup.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{
    NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig as HickoryConfig, ResolverOpts,
};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::op::ResponseCode;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::debug;

/// Hostname to address resolution used by the resolver pool
#[async_trait]
pub trait Lookup: Send + Sync {
    /// An empty list means the name exists but has no address records.
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>>;
}

/// DNS lookups through hickory against an explicit set of upstream servers
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryLookup {
    pub fn new(nameservers: &[SocketAddr], attempts: usize, timeout: Duration) -> Result<Self> {
        if nameservers.is_empty() {
            anyhow::bail!("at least one nameserver is required");
        }

        let group: NameServerConfigGroup = nameservers
            .iter()
            .map(|addr| NameServerConfig::new(*addr, Protocol::Udp))
            .collect::<Vec<_>>()
            .into();

        let mut opts = ResolverOpts::default();
        opts.attempts = attempts.max(1);
        opts.timeout = timeout;

        debug!(
            "Using {} nameservers (attempts={}, timeout={:?})",
            nameservers.len(),
            opts.attempts,
            opts.timeout
        );

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(HickoryConfig::from_parts(None, vec![], group), opts),
        })
    }

    /// Parse `ip:port` strings into nameserver addresses
    pub fn parse_nameservers(nameservers: &[String]) -> Result<Vec<SocketAddr>> {
        nameservers
            .iter()
            .map(|ns| {
                ns.parse::<SocketAddr>()
                    .with_context(|| format!("invalid nameserver address: {}", ns))
            })
            .collect()
    }
}

#[async_trait]
impl Lookup for HickoryLookup {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>> {
        match self.resolver.lookup_ip(host).await {
            Ok(lookup) => Ok(lookup.iter().collect()),
            Err(e) => match e.kind() {
                // NOERROR with no records: the name exists
                ResolveErrorKind::NoRecordsFound { response_code, .. }
                    if *response_code == ResponseCode::NoError =>
                {
                    Ok(Vec::new())
                }
                _ => Err(anyhow::Error::new(e).context(format!("lookup of {} failed", host))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nameservers() {
        let parsed = HickoryLookup::parse_nameservers(&[
            "1.1.1.1:53".to_string(),
            "[2606:4700:4700::1111]:53".to_string(),
        ])
        .unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].port(), 53);
        assert!(parsed[1].is_ipv6());
    }

    #[test]
    fn test_parse_nameservers_rejects_missing_port() {
        let err = HickoryLookup::parse_nameservers(&["8.8.8.8".to_string()]).unwrap_err();
        assert!(err.to_string().contains("8.8.8.8"));
    }

    #[tokio::test]
    async fn test_requires_nameservers() {
        assert!(HickoryLookup::new(&[], 1, Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_ip_literal_resolves_to_itself() {
        let lookup = HickoryLookup::new(
            &["127.0.0.1:53".parse().unwrap()],
            1,
            Duration::from_millis(100),
        )
        .unwrap();

        let ips = lookup.lookup("192.0.2.7").await.unwrap();
        assert_eq!(ips, vec!["192.0.2.7".parse::<IpAddr>().unwrap()]);
    }
}
