//! Remote endpoint resolution.
//!
//! An explicit host always wins. Without one, a single best-effort discovery
//! attempt is made per process and its outcome cached, and loopback is the
//! last resort.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::config::RelayConfig;
use crate::ipc::Endpoint;

pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Upper bound on one discovery attempt.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Finds a companion app on the local network. Failures yield `None`.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn discover(&self) -> Option<Endpoint>;
}

/// Discovery switched off.
pub struct NoDiscovery;

#[async_trait]
impl Discovery for NoDiscovery {
    async fn discover(&self) -> Option<Endpoint> {
        None
    }
}

/// Browses mDNS through `avahi-browse` and takes the first resolved IPv4 record.
pub struct AvahiDiscovery {
    service_type: String,
    timeout: Duration,
}

impl AvahiDiscovery {
    pub fn new(service_type: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            timeout: DISCOVERY_TIMEOUT,
        }
    }
}

#[async_trait]
impl Discovery for AvahiDiscovery {
    async fn discover(&self) -> Option<Endpoint> {
        let output = tokio::process::Command::new("avahi-browse")
            .args(["--resolve", "--parsable", "--terminate", &self.service_type])
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::debug!("discovery unavailable: {}", e);
                return None;
            }
            Err(_) => {
                tracing::debug!("discovery timed out after {:?}", self.timeout);
                return None;
            }
        };

        parse_avahi_records(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Pick the first resolved IPv4 service from `avahi-browse -p -r` output.
///
/// Resolved lines look like
/// `=;eth0;IPv4;Nook on mac;_nook._tcp;local;mac.local;192.168.1.20;4851;""`.
pub fn parse_avahi_records(output: &str) -> Option<Endpoint> {
    output.lines().find_map(|line| {
        let fields: Vec<&str> = line.split(';').collect();
        if fields.len() < 9 || fields[0] != "=" || fields[2] != "IPv4" {
            return None;
        }
        let host = fields[7].trim();
        let port = fields[8].trim().parse().ok()?;
        if host.is_empty() {
            return None;
        }
        Some(Endpoint::new(host, port))
    })
}

/// Resolves the TCP endpoint for this run.
pub struct Resolver {
    host: Option<String>,
    port: u16,
    discovery: Box<dyn Discovery>,
    discovered: OnceCell<Option<Endpoint>>,
}

impl Resolver {
    pub fn new(host: Option<String>, port: u16, discovery: Box<dyn Discovery>) -> Self {
        Self {
            host: host.filter(|h| !h.is_empty()),
            port,
            discovery,
            discovered: OnceCell::new(),
        }
    }

    /// Resolver for `config`, using mDNS discovery unless it is disabled.
    pub fn from_config(config: &RelayConfig) -> Self {
        let discovery: Box<dyn Discovery> = if config.discovery {
            Box::new(AvahiDiscovery::new(config.service_type.clone()))
        } else {
            Box::new(NoDiscovery)
        };
        Self::new(config.host.clone(), config.port, discovery)
    }

    /// Configured host, else the discovered one, else loopback.
    pub async fn resolve(&self) -> Endpoint {
        if let Some(host) = &self.host {
            return Endpoint::new(host.clone(), self.port);
        }

        let discovered = self
            .discovered
            .get_or_init(|| async {
                let found = self.discovery.discover().await;
                if let Some(endpoint) = &found {
                    tracing::debug!("discovered companion at {}", endpoint);
                }
                found
            })
            .await;

        match discovered {
            Some(endpoint) => endpoint.clone(),
            None => Endpoint::new(LOOPBACK_HOST, self.port),
        }
    }
}
