//! Configuration for the lookup client and the resolution pipeline

pub mod client;
pub mod defaults;

pub use client::{ClientConfig, ClientConfigBuilder, ConfigError};
