//! Input normalization
//!
//! Builds the ordered query queue for a run: IP inputs, then ASN inputs, then
//! organization inputs, then the addresses resolved from each domain. Every
//! group keeps its input order; addresses from one domain keep resolver order.

use super::classify::Inputs;
use crate::asn::strip_asn_prefix;
use crate::dns::DomainResolver;
use futures::future::join_all;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// One query for the lookup client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    /// Normalized query string (IP, bare ASN digits or org fragment)
    pub value: String,
    /// Domain this query was resolved from, if any
    pub domain: Option<String>,
}

impl Query {
    /// A query that came straight from the input buckets
    pub fn direct(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            domain: None,
        }
    }

    /// A query for an address resolved from `domain`
    pub fn resolved(ip: IpAddr, domain: impl Into<String>) -> Self {
        Self {
            value: ip.to_string(),
            domain: Some(domain.into()),
        }
    }

    /// The token a user would recognize: the domain if any, else the query
    pub fn display_input(&self) -> &str {
        self.domain.as_deref().unwrap_or(&self.value)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain {
            Some(domain) => write!(f, "{} ({domain})", self.value),
            None => f.write_str(&self.value),
        }
    }
}

/// Output of one normalization pass
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Ordered query queue
    pub queries: Vec<Query>,
    /// Queries produced from IP, ASN and org buckets
    pub explicit_queries: usize,
    /// Tokens dropped because they were blank or malformed
    pub skipped_inputs: usize,
    /// Domains that failed to resolve or resolved to nothing
    pub unresolved_domains: Vec<String>,
}

/// Expands [`Inputs`] into queries, resolving domains on the way
#[derive(Clone)]
pub struct InputNormalizer {
    resolver: Arc<dyn DomainResolver>,
}

impl InputNormalizer {
    /// Create a normalizer using `resolver` for domain expansion
    pub fn new(resolver: Arc<dyn DomainResolver>) -> Self {
        Self { resolver }
    }

    /// Build the query queue for `inputs`
    pub async fn normalize(&self, inputs: &Inputs) -> Normalized {
        let mut out = Normalized::default();

        for ip in &inputs.ip {
            match non_blank(ip) {
                Some(ip) => out.queries.push(Query::direct(ip)),
                None => out.skipped_inputs += 1,
            }
        }

        for asn in &inputs.asn {
            let digits = strip_asn_prefix(asn);
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                out.queries.push(Query::direct(digits));
            } else {
                tracing::warn!(input = %asn, "skipping malformed ASN");
                out.skipped_inputs += 1;
            }
        }

        for org in &inputs.org {
            match non_blank(org) {
                Some(org) if org.contains(|c: char| c == '*' || c == '?') => {
                    tracing::warn!(input = %org, "wildcard organization queries are not supported");
                    out.skipped_inputs += 1;
                }
                Some(org) => out.queries.push(Query::direct(org)),
                None => out.skipped_inputs += 1,
            }
        }

        out.explicit_queries = out.queries.len();

        let domains: Vec<&str> = inputs
            .domain
            .iter()
            .filter_map(|d| {
                let d = non_blank(d);
                if d.is_none() {
                    out.skipped_inputs += 1;
                }
                d
            })
            .collect();

        // Resolved concurrently, collected in input order
        let resolved = join_all(domains.iter().map(|d| self.resolver.resolve(d))).await;

        for (domain, result) in domains.into_iter().zip(resolved) {
            match result {
                Ok(addrs) if !addrs.is_empty() => {
                    tracing::debug!(domain, count = addrs.len(), "resolved domain");
                    let mut seen: Vec<IpAddr> = Vec::with_capacity(addrs.len());
                    for ip in addrs {
                        if !seen.contains(&ip) {
                            seen.push(ip);
                            out.queries.push(Query::resolved(ip, domain));
                        }
                    }
                }
                Ok(_) => {
                    tracing::warn!(domain, "domain resolved to no addresses");
                    out.unresolved_domains.push(domain.to_string());
                }
                Err(e) => {
                    tracing::warn!(domain, error = %e, "could not resolve domain");
                    out.unresolved_domains.push(domain.to_string());
                }
            }
        }

        out
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}
