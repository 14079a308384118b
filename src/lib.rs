//! asnmap - map network identifiers to their owning ASN ranges
//!
//! This library resolves IP addresses, ASNs, organization names and domain
//! names into ASN ownership records served by the asnmap lookup service, and
//! streams deduplicated results to a caller-supplied sink.

pub mod asn;
pub mod config;
pub mod dns;
pub mod input;
pub mod output;
pub mod runner;

// Re-export core types for library users
pub use asn::{AsnSource, AsnmapClient, LookupError, Response};
pub use config::{ClientConfig, ConfigError};
pub use dns::{DomainResolver, HickoryResolver, ResolveError, Upstream};
pub use input::{InputKind, Inputs, Query};
pub use runner::{Batch, ChannelSink, ResultSink, RunSummary, Runner, RunnerError, RunnerOptions};
