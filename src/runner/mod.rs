//! The resolution pipeline
//!
//! A [`Runner`] owns the input normalizer and a lookup source. It builds the
//! query queue once, looks each query up with bounded concurrency, dedups each
//! batch and hands it to the configured [`ResultSink`].

pub mod error;
pub mod options;
pub mod pipeline;
pub mod sink;

pub use error::RunnerError;
pub use options::{RunnerOptions, RunnerOptionsBuilder};
pub use pipeline::{RunSummary, Runner, RunnerState};
pub use sink::{Batch, ChannelSink, ResultSink};
