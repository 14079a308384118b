//! Compile-time defaults
//!
//! Every tunable has a public constant here; builders and the CLI start from
//! these values and let callers override them.

use std::time::Duration;

/// Default asnmap service endpoint
pub const DEFAULT_SERVER_URL: &str = "https://asnmap.projectdiscovery.io/api/v1/asnmap";

/// Environment variable overriding the service endpoint
pub const SERVER_URL_ENV: &str = "ASNMAP_SERVER_URL";

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "PDCP_API_KEY";

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-PDCP-Key";

/// Default per-request timeout in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default number of lookups allowed in flight at once
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default user agent sent to the service
pub const DEFAULT_USER_AGENT: &str = concat!("asnmap-rs/", env!("CARGO_PKG_VERSION"));

/// Default request timeout as a [`Duration`]
pub fn request_timeout() -> Duration {
    Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)
}
