//! Configuration for a pipeline run

use super::error::RunnerError;
use super::sink::{Batch, ResultSink};
use crate::config::defaults::DEFAULT_CONCURRENCY;
use crate::input::Inputs;
use std::fmt;
use std::sync::Arc;

/// Inputs, concurrency cap and result sink for one [`crate::runner::Runner`]
#[derive(Clone)]
pub struct RunnerOptions {
    /// Input buckets
    pub inputs: Inputs,
    /// Maximum lookups in flight at once
    pub concurrency: usize,
    /// Receiver of result batches
    pub sink: Arc<dyn ResultSink>,
}

impl fmt::Debug for RunnerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerOptions")
            .field("inputs", &self.inputs)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl RunnerOptions {
    /// Create a new RunnerOptions builder
    pub fn builder() -> RunnerOptionsBuilder {
        RunnerOptionsBuilder::new()
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.inputs.is_empty() {
            return Err(RunnerError::Configuration(
                "no input specified: provide at least one IP, ASN, organization or domain"
                    .to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(RunnerError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for RunnerOptions
pub struct RunnerOptionsBuilder {
    inputs: Inputs,
    concurrency: usize,
    sink: Option<Arc<dyn ResultSink>>,
}

impl RunnerOptionsBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            inputs: Inputs::default(),
            concurrency: DEFAULT_CONCURRENCY,
            sink: None,
        }
    }

    /// Replace all input buckets
    pub fn inputs(mut self, inputs: Inputs) -> Self {
        self.inputs = inputs;
        self
    }

    /// Add IP literals
    pub fn ip<I, S>(mut self, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.ip.extend(ips.into_iter().map(Into::into));
        self
    }

    /// Add ASN identifiers
    pub fn asn<I, S>(mut self, asns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.asn.extend(asns.into_iter().map(Into::into));
        self
    }

    /// Add organization name fragments
    pub fn org<I, S>(mut self, orgs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.org.extend(orgs.into_iter().map(Into::into));
        self
    }

    /// Add domain names
    pub fn domain<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.domain.extend(domains.into_iter().map(Into::into));
        self
    }

    /// Set the maximum number of lookups in flight
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the result sink
    pub fn sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Set a closure as the result sink
    pub fn on_result<F>(self, f: F) -> Self
    where
        F: Fn(Batch) + Send + Sync + 'static,
    {
        self.sink(f)
    }

    /// Build the options
    pub fn build(self) -> Result<RunnerOptions, RunnerError> {
        let sink = self.sink.ok_or_else(|| {
            RunnerError::Configuration("no result sink configured".to_string())
        })?;
        let options = RunnerOptions {
            inputs: self.inputs,
            concurrency: self.concurrency,
            sink,
        };
        options.validate()?;
        Ok(options)
    }
}

impl Default for RunnerOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
