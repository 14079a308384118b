//! HTTP client for the asnmap lookup service
//!
//! This module provides the production [`AsnSource`] implementation. Each
//! query becomes one GET request; the status and body are mapped onto the
//! [`LookupError`] taxonomy.

use super::lookup::{is_no_results_body, parse_success_body, AsnSource, LookupError, QueryKind};
use super::response::Response;
use crate::config::defaults::API_KEY_HEADER;
use crate::config::{ClientConfig, ConfigError};
use async_trait::async_trait;
use reqwest::Url;

/// ASN lookup client backed by the asnmap HTTP API
///
/// # Examples
///
/// ```no_run
/// use asnmap::asn::{AsnSource, AsnmapClient};
/// use asnmap::config::ClientConfig;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = AsnmapClient::new(ClientConfig::from_env()?)?;
///
///     for record in client.get_data("14421").await? {
///         println!("AS{} {} {}-{}", record.asn, record.org, record.first_ip, record.last_ip);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct AsnmapClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl AsnmapClient {
    /// Create a client from a validated configuration
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let base_url = config.parsed_url()?;
        if config.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key,
        })
    }

    /// Request URL for a query
    pub fn request_url(&self, query: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair(QueryKind::of(query).param(), query);
        url
    }
}

#[async_trait]
impl AsnSource for AsnmapClient {
    async fn get_data(&self, query: &str) -> Result<Vec<Response>, LookupError> {
        let url = self.request_url(query);
        tracing::debug!(%url, "querying asnmap service");

        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LookupError::Http(format!("request timed out: {e}"))
            } else {
                LookupError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LookupError::Http(e.to_string()))?;
        let body = body.trim().to_string();

        if !status.is_success() {
            if is_no_results_body(&body) {
                return Err(LookupError::NotFound(body));
            }
            return Err(LookupError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_success_body(query, &body)
    }
}
