//! Turning user-supplied identifiers into lookup queries

pub mod classify;
pub mod normalizer;

pub use classify::{classify, InputKind, Inputs};
pub use normalizer::{InputNormalizer, Normalized, Query};
