//! ASN (Autonomous System Number) records and lookup clients

pub mod lookup;
pub mod response;
pub mod service;

pub use lookup::{strip_asn_prefix, AsnSource, LookupError, QueryKind};
pub use response::{dedup_batch, Response};
pub use service::AsnmapClient;
