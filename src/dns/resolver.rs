//! Forward DNS resolution

use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;
use std::sync::Arc;

/// Error type for forward DNS operations
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// DNS resolution failed
    #[error("DNS resolution failed for {domain}: {reason}")]
    ResolutionError {
        /// Domain that was looked up
        domain: String,
        /// Resolver error message
        reason: String,
    },

    /// The system resolver configuration could not be loaded
    #[error("failed to load system resolver configuration: {0}")]
    SystemConfig(String),
}

/// Resolves a domain to the addresses it points at.
///
/// Implementations may return an empty list; callers treat both that and an
/// error as "this domain contributes nothing".
#[async_trait]
pub trait DomainResolver: Send + Sync {
    /// Resolve `domain` to zero or more IP addresses
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, ResolveError>;
}

/// Upstream nameservers for [`HickoryResolver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Upstream {
    /// Cloudflare public DNS
    #[default]
    Cloudflare,
    /// Google public DNS
    Google,
    /// The host's resolver configuration (e.g. /etc/resolv.conf)
    System,
}

/// [`DomainResolver`] backed by hickory's tokio resolver
#[derive(Clone, Debug)]
pub struct HickoryResolver {
    inner: Arc<TokioResolver>,
}

impl HickoryResolver {
    /// Create a resolver for the given upstream
    pub fn new(upstream: Upstream) -> Result<Self, ResolveError> {
        Ok(Self::with_resolver(Arc::new(create_resolver(upstream)?)))
    }

    /// Wrap an existing hickory resolver
    pub fn with_resolver(inner: Arc<TokioResolver>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl DomainResolver for HickoryResolver {
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, ResolveError> {
        let lookup = self
            .inner
            .lookup_ip(domain)
            .await
            .map_err(|e| ResolveError::ResolutionError {
                domain: domain.to_string(),
                reason: e.to_string(),
            })?;

        let mut addrs: Vec<IpAddr> = Vec::new();
        for ip in lookup.iter() {
            if !addrs.contains(&ip) {
                addrs.push(ip);
            }
        }
        Ok(addrs)
    }
}

/// Build a hickory resolver for the given upstream
pub fn create_resolver(upstream: Upstream) -> Result<TokioResolver, ResolveError> {
    let config = match upstream {
        Upstream::Cloudflare => ResolverConfig::cloudflare(),
        Upstream::Google => ResolverConfig::google(),
        Upstream::System => {
            return TokioResolver::builder_tokio()
                .map(|builder| builder.build())
                .map_err(|e| ResolveError::SystemConfig(e.to_string()));
        }
    };
    Ok(TokioResolver::builder_with_config(config, TokioConnectionProvider::default()).build())
}
