//! ASN ownership records returned by the lookup service

use ipnet::{IpNet, Ipv4Subnets, Ipv6Subnets};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// One ASN ownership range matched by a query.
///
/// Records are only built by a lookup client from parsed service output and are
/// treated as immutable afterwards. Equality covers every field, so two
/// overlapping ranges announced by the same ASN are distinct records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Response {
    /// First address of the matched range (empty when the server gave no range)
    #[serde(default)]
    pub first_ip: String,
    /// Last address of the matched range (empty when the server gave no range)
    #[serde(default)]
    pub last_ip: String,
    /// Normalized query string that produced this record
    #[serde(default, skip_deserializing)]
    pub input: String,
    /// Autonomous System Number
    #[serde(rename = "as_number", default)]
    pub asn: u32,
    /// Two-letter registration country code
    #[serde(rename = "as_country", default)]
    pub country: String,
    /// Lower-cased organization name, as returned by the server
    #[serde(rename = "as_name", default)]
    pub org: String,
}

impl Response {
    /// Parsed range bounds, if both are present and valid
    pub fn range(&self) -> Option<(IpAddr, IpAddr)> {
        if self.first_ip.is_empty() || self.last_ip.is_empty() {
            return None;
        }
        let first = self.first_ip.parse::<IpAddr>().ok()?;
        let last = self.last_ip.parse::<IpAddr>().ok()?;
        Some((first, last))
    }

    /// Whether the record has a well-formed range, or no range at all.
    ///
    /// A range is well-formed when both bounds share an address family and
    /// `first_ip <= last_ip`.
    pub fn has_valid_range(&self) -> bool {
        if self.first_ip.is_empty() && self.last_ip.is_empty() {
            return true;
        }
        match self.range() {
            Some((IpAddr::V4(a), IpAddr::V4(b))) => a <= b,
            Some((IpAddr::V6(a), IpAddr::V6(b))) => a <= b,
            _ => false,
        }
    }

    /// Whether this record describes an IPv6 range
    pub fn is_ipv6(&self) -> bool {
        matches!(self.range(), Some((IpAddr::V6(_), _)))
    }

    /// Minimal list of CIDR prefixes covering `[first_ip, last_ip]`
    pub fn cidrs(&self) -> Vec<IpNet> {
        match self.range() {
            Some((IpAddr::V4(first), IpAddr::V4(last))) if first <= last => {
                Ipv4Subnets::new(first, last, 0).map(IpNet::V4).collect()
            }
            Some((IpAddr::V6(first), IpAddr::V6(last))) if first <= last => {
                Ipv6Subnets::new(first, last, 0).map(IpNet::V6).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Remove records equal to an earlier record in the same batch.
///
/// First occurrence wins and the relative order of survivors is preserved.
pub fn dedup_batch(records: Vec<Response>) -> Vec<Response> {
    let mut unique: Vec<Response> = Vec::with_capacity(records.len());
    for record in records {
        if !unique.contains(&record) {
            unique.push(record);
        }
    }
    unique
}
