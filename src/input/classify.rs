//! Input buckets and free-form token classification

use crate::asn::strip_asn_prefix;
use std::net::IpAddr;

/// The bucket a raw token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// IPv4 or IPv6 literal
    Ip,
    /// ASN, with or without an `AS` prefix
    Asn,
    /// Organization name fragment
    Org,
    /// Domain name to be resolved to IPs
    Domain,
}

/// Classify a free-form token.
///
/// IP literals win, then `AS<digits>` or bare digits, then anything that looks
/// like a hostname. Everything else is treated as an organization name.
pub fn classify(token: &str) -> InputKind {
    let token = token.trim();
    if token.parse::<IpAddr>().is_ok() {
        InputKind::Ip
    } else if is_asn(token) {
        InputKind::Asn
    } else if is_domain(token) {
        InputKind::Domain
    } else {
        InputKind::Org
    }
}

fn is_asn(token: &str) -> bool {
    let digits = strip_asn_prefix(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_domain(token: &str) -> bool {
    let name = token.strip_suffix('.').unwrap_or(token);
    if name.len() > 253 || !name.contains('.') {
        return false;
    }
    let labels: Vec<&str> = name.split('.').collect();
    let valid_labels = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    });
    let tld_alpha = labels
        .last()
        .is_some_and(|tld| tld.len() >= 2 && tld.bytes().all(|b| b.is_ascii_alphabetic()));
    valid_labels && tld_alpha
}

/// Independent input buckets for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inputs {
    /// IP literals
    pub ip: Vec<String>,
    /// ASN identifiers, `AS14421` or `14421`
    pub asn: Vec<String>,
    /// Organization name fragments
    pub org: Vec<String>,
    /// Domain names
    pub domain: Vec<String>,
}

impl Inputs {
    /// Whether every bucket is empty
    pub fn is_empty(&self) -> bool {
        self.ip.is_empty() && self.asn.is_empty() && self.org.is_empty() && self.domain.is_empty()
    }

    /// Whether any non-domain bucket has an entry
    pub fn has_explicit(&self) -> bool {
        !(self.ip.is_empty() && self.asn.is_empty() && self.org.is_empty())
    }

    /// Total number of raw tokens across buckets
    pub fn len(&self) -> usize {
        self.ip.len() + self.asn.len() + self.org.len() + self.domain.len()
    }

    /// Add a token to the bucket of the given kind
    pub fn push(&mut self, kind: InputKind, token: impl Into<String>) {
        let token = token.into();
        match kind {
            InputKind::Ip => self.ip.push(token),
            InputKind::Asn => self.asn.push(token),
            InputKind::Org => self.org.push(token),
            InputKind::Domain => self.domain.push(token),
        }
    }

    /// Classify a free-form token and add it; blank tokens are ignored
    pub fn push_auto(&mut self, token: &str) -> Option<InputKind> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        let kind = classify(token);
        self.push(kind, token);
        Some(kind)
    }

    /// Classify every line of a text blob, skipping blanks and `#` comments
    pub fn extend_from_lines(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            self.push_auto(line);
        }
    }
}
