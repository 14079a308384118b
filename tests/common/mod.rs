//! Local stand-in for the asnmap lookup service
//!
//! An axum router answers `?ip=`, `?asn=` and `?org=` queries with canned
//! status codes and bodies that mirror the real service's answers.

#![allow(dead_code, clippy::unwrap_used)]

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;

/// Path the router serves lookups on
pub const LOOKUP_PATH: &str = "/api/v1/asnmap";

/// API key the `org=keycheck` route insists on
pub const TEST_API_KEY: &str = "secret";

pub const FOUND_14421: &str = r#"[{"first_ip":"216.101.17.0","last_ip":"216.101.17.255","as_number":14421,"as_country":"US","as_name":"theravance"}]"#;

pub const FOUND_7712: &str = r#"[{"first_ip":"118.67.200.0","last_ip":"118.67.203.255","as_number":7712,"as_country":"KH","as_name":"cne-as-ap cambodian network exchange co., ltd."},{"first_ip":"118.67.200.0","last_ip":"118.67.207.255","as_number":7712,"as_country":"KH","as_name":"cne-as-ap cambodian network exchange co., ltd."}]"#;

pub const FOUND_UUNET: &str = r#"[{"first_ip":"100.19.0.0","last_ip":"100.19.255.255","as_number":701,"as_country":"US","as_name":"uunet"}]"#;

pub const FOUND_MICROSOFT: &str = r#"[{"first_ip":"151.207.40.0","last_ip":"151.207.47.255","as_number":12076,"as_country":"US","as_name":"microsoft"},{"first_ip":"2608:1c1:6::","last_ip":"2608:1c1:8:ffff:ffff:ffff:ffff:ffff","as_number":12076,"as_country":"US","as_name":"microsoft"}]"#;

pub const NOT_FOUND: &str = r#"{"error":"no results found"}"#;

async fn lookup(
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    let ip = params.get("ip").map(String::as_str);
    let asn = params.get("asn").map(String::as_str);
    let org = params.get("org").map(String::as_str);

    let (status, body) = match (ip, asn, org) {
        (_, Some("14421"), _) => (StatusCode::OK, FOUND_14421),
        (_, Some("7712"), _) => (StatusCode::OK, FOUND_7712),
        (Some("100.19.12.21"), _, _) => (StatusCode::OK, FOUND_UUNET),
        (_, _, Some("microsoft")) => (StatusCode::OK, FOUND_MICROSOFT),
        (_, Some("1123"), _) | (Some("255.100.100.100"), _, _) | (_, _, Some("RANDOM_TEXT")) => {
            (StatusCode::BAD_REQUEST, NOT_FOUND)
        }
        (_, _, Some("empty")) => (StatusCode::OK, "null"),
        (_, _, Some("garbage")) => (StatusCode::OK, "<html>oops</html>"),
        (_, _, Some("keycheck")) => {
            let authorized = headers
                .get("x-pdcp-key")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|key| key == TEST_API_KEY);
            if authorized {
                (StatusCode::OK, FOUND_14421)
            } else {
                (StatusCode::UNAUTHORIZED, r#"{"error":"missing api key"}"#)
            }
        }
        (Some("10.0.0.1"), _, _) => (StatusCode::SERVICE_UNAVAILABLE, "upstream down"),
        _ => (StatusCode::NOT_FOUND, "unknown route"),
    };
    (status, body.to_string())
}

/// Router answering lookups on [`LOOKUP_PATH`]
pub fn router() -> Router {
    Router::new().route(LOOKUP_PATH, get(lookup))
}

/// Serve the router on a loopback port from the current runtime
pub async fn spawn_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router()).await });
    addr
}

/// Serve the router from a background thread, for tests without a runtime.
///
/// The thread lives until the test process exits.
pub fn spawn_background_server() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to create Tokio runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router()).await
        })
    });
    addr
}

/// Full lookup URL for a server address
pub fn lookup_url(addr: SocketAddr) -> String {
    format!("http://{addr}{LOOKUP_PATH}")
}
