//! Lookup contract shared by every ASN data source

use super::response::Response;
use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;

/// Raw server message for a query with zero matches
pub const NO_RESULTS_MESSAGE: &str = "no results found";

/// Error type for ASN lookup operations
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The service found no record for the query.
    ///
    /// Holds the raw server body, e.g. `{"error":"no results found"}`.
    #[error("bad request: {0}")]
    NotFound(String),

    /// The service answered with a non-success status
    #[error("bad request: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The request could not be completed (connect, TLS, timeout, ...)
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The service answered with a body that could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LookupError {
    /// Whether the service reported zero matches
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound(_))
    }

    /// Whether this is an infrastructure failure rather than a data condition
    pub fn is_transport(&self) -> bool {
        !self.is_not_found()
    }
}

/// A source of ASN ownership records.
///
/// The pipeline only depends on this trait, so tests can drive it with an
/// in-memory fake and production code with [`crate::asn::AsnmapClient`].
#[async_trait]
pub trait AsnSource: Send + Sync {
    /// Look up every record matching `query`.
    ///
    /// Returns a non-empty list on success, [`LookupError::NotFound`] when the
    /// service has no match, and another [`LookupError`] variant otherwise.
    async fn get_data(&self, query: &str) -> Result<Vec<Response>, LookupError>;
}

/// Which request parameter a query maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// An IPv4 or IPv6 literal
    Ip,
    /// A bare ASN numeral
    Asn,
    /// An organization name fragment
    Org,
}

impl QueryKind {
    /// Classify an already normalized query
    pub fn of(query: &str) -> Self {
        if query.parse::<IpAddr>().is_ok() {
            QueryKind::Ip
        } else if !query.is_empty() && query.bytes().all(|b| b.is_ascii_digit()) {
            QueryKind::Asn
        } else {
            QueryKind::Org
        }
    }

    /// Name of the request parameter for this kind
    pub fn param(&self) -> &'static str {
        match self {
            QueryKind::Ip => "ip",
            QueryKind::Asn => "asn",
            QueryKind::Org => "org",
        }
    }
}

/// Strip a leading case-insensitive `AS` prefix from an ASN identifier
pub fn strip_asn_prefix(asn: &str) -> &str {
    let trimmed = asn.trim();
    match trimmed.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("as") => &trimmed[2..],
        _ => trimmed,
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Whether a non-success body is the service's "no results" payload
pub fn is_no_results_body(body: &str) -> bool {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error == NO_RESULTS_MESSAGE)
        .unwrap_or(false)
}

/// Parse a success body into records tagged with `query`.
///
/// Rows with ASN 0 carry no ownership information and are dropped. A body
/// with no remaining rows (`[]`, `null`) is reported as not found. A row with
/// a malformed range makes the whole body invalid.
pub fn parse_success_body(query: &str, body: &str) -> Result<Vec<Response>, LookupError> {
    let rows: Option<Vec<Response>> = serde_json::from_str(body)
        .map_err(|e| LookupError::InvalidResponse(format!("{e}: {body}")))?;

    let mut records = Vec::new();
    for mut row in rows.unwrap_or_default() {
        if row.asn == 0 {
            continue;
        }
        if !row.has_valid_range() {
            return Err(LookupError::InvalidResponse(format!(
                "malformed range {}-{} for AS{}",
                row.first_ip, row.last_ip, row.asn
            )));
        }
        row.input = query.to_string();
        records.push(row);
    }

    if records.is_empty() {
        return Err(LookupError::NotFound(format!(
            "{{\"error\":\"{NO_RESULTS_MESSAGE}\"}}"
        )));
    }
    Ok(records)
}
