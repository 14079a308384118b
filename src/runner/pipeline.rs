//! Runner state machine and query processing

use super::error::RunnerError;
use super::options::RunnerOptions;
use super::sink::{Batch, ResultSink};
use crate::asn::{dedup_batch, AsnSource, LookupError, Response};
use crate::dns::DomainResolver;
use crate::input::{InputNormalizer, Inputs, Query};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use tokio_util::sync::CancellationToken;

/// Lifecycle of a [`Runner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Constructed, inputs not yet normalized
    Created,
    /// Query queue built
    InputPrepared,
    /// Lookups in progress
    Processing,
    /// Every query was handled, or the run stopped on a transport error
    Completed,
    /// Closed; no further deliveries happen
    Closed,
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Queries in the queue
    pub queries: usize,
    /// Batches handed to the sink
    pub batches: usize,
    /// Records across delivered batches
    pub records: usize,
    /// Queries the service had no match for
    pub not_found: usize,
}

enum Outcome {
    Found(Vec<Response>),
    Failed(LookupError),
    Cancelled,
}

/// Resolution pipeline for one invocation
///
/// # Examples
///
/// ```no_run
/// use asnmap::asn::AsnmapClient;
/// use asnmap::config::ClientConfig;
/// use asnmap::dns::{HickoryResolver, Upstream};
/// use asnmap::runner::{Runner, RunnerOptions};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let options = RunnerOptions::builder()
///         .asn(["AS14421"])
///         .domain(["google.com"])
///         .on_result(|batch| {
///             for r in &batch.records {
///                 println!("{} AS{} {}", batch.query.display_input(), r.asn, r.org);
///             }
///         })
///         .build()?;
///
///     let client = Arc::new(AsnmapClient::new(ClientConfig::from_env()?)?);
///     let resolver = Arc::new(HickoryResolver::new(Upstream::default())?);
///     let runner = Runner::new(options, client, resolver)?;
///
///     runner.prepare_input().await?;
///     let summary = runner.process().await?;
///     runner.close();
///     println!("{} records", summary.records);
///     Ok(())
/// }
/// ```
pub struct Runner {
    inputs: Inputs,
    concurrency: usize,
    sink: Arc<dyn ResultSink>,
    source: Arc<dyn AsnSource>,
    normalizer: InputNormalizer,
    // Never held across a lookup, a DNS query or a sink call
    state: RwLock<RunnerState>,
    // Held for the duration of each sink call; close() waits on it
    delivery: Mutex<()>,
    queries: OnceLock<Vec<Query>>,
    cancel: CancellationToken,
}

impl Runner {
    /// Create a runner, validating the options
    pub fn new(
        options: RunnerOptions,
        source: Arc<dyn AsnSource>,
        resolver: Arc<dyn DomainResolver>,
    ) -> Result<Self, RunnerError> {
        options.validate()?;
        Ok(Self {
            inputs: options.inputs,
            concurrency: options.concurrency,
            sink: options.sink,
            source,
            normalizer: InputNormalizer::new(resolver),
            state: RwLock::new(RunnerState::Created),
            delivery: Mutex::new(()),
            queries: OnceLock::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunnerState {
        *self.state.read().expect("runner state lock poisoned")
    }

    /// Query queue, once [`Runner::prepare_input`] has succeeded
    pub fn queries(&self) -> &[Query] {
        self.queries.get().map(Vec::as_slice).unwrap_or_default()
    }

    /// Normalize the inputs into the query queue.
    ///
    /// Returns the number of queued queries. Fails with
    /// [`RunnerError::NoQueries`] when IP, ASN or org inputs were given but
    /// nothing could be queued. Domains that fail to resolve are skipped.
    pub async fn prepare_input(&self) -> Result<usize, RunnerError> {
        self.expect_state("prepare input", RunnerState::Created)?;

        let normalized = self.normalizer.normalize(&self.inputs).await;
        if normalized.queries.is_empty() && self.inputs.has_explicit() {
            return Err(RunnerError::NoQueries);
        }
        tracing::debug!(
            queries = normalized.queries.len(),
            skipped = normalized.skipped_inputs,
            unresolved_domains = normalized.unresolved_domains.len(),
            "prepared input"
        );

        let mut state = self.state.write().expect("runner state lock poisoned");
        match *state {
            RunnerState::Created => {}
            RunnerState::Closed => return Err(RunnerError::Closed),
            other => {
                return Err(RunnerError::InvalidState {
                    operation: "prepare input",
                    state: other,
                })
            }
        }
        let count = normalized.queries.len();
        // Only reachable once: the state check above runs under the write lock
        let _ = self.queries.set(normalized.queries);
        *state = RunnerState::InputPrepared;
        Ok(count)
    }

    /// Look up every queued query and deliver the results.
    ///
    /// Queries with no match are counted and skipped. The first transport
    /// failure stops the run and is returned; batches already delivered stay
    /// delivered.
    pub async fn process(&self) -> Result<RunSummary, RunnerError> {
        {
            let mut state = self.state.write().expect("runner state lock poisoned");
            match *state {
                RunnerState::InputPrepared => *state = RunnerState::Processing,
                RunnerState::Closed => return Err(RunnerError::Closed),
                other => {
                    return Err(RunnerError::InvalidState {
                        operation: "process",
                        state: other,
                    })
                }
            }
        }

        let result = self.process_queue().await;
        self.finish();
        let summary = result?;

        tracing::info!(
            queries = summary.queries,
            batches = summary.batches,
            records = summary.records,
            not_found = summary.not_found,
            "run finished"
        );
        Ok(summary)
    }

    /// Normalize and process in one call
    pub async fn run(&self) -> Result<RunSummary, RunnerError> {
        self.prepare_input().await?;
        self.process().await
    }

    /// Stop the run and release resources.
    ///
    /// Idempotent and valid in every state. Once this returns the sink is
    /// never called again; lookups still in flight are abandoned.
    ///
    /// Blocks until a sink call already under way returns, so it must not be
    /// called from inside the sink. The sink may read [`Runner::state`].
    pub fn close(&self) {
        {
            let mut state = self.state.write().expect("runner state lock poisoned");
            if *state != RunnerState::Closed {
                tracing::debug!(from = ?*state, "closing runner");
                *state = RunnerState::Closed;
            }
        }
        self.cancel.cancel();
        drop(self.delivery.lock().expect("runner delivery lock poisoned"));
    }

    async fn process_queue(&self) -> Result<RunSummary, RunnerError> {
        let queries = self.queries();
        let mut summary = RunSummary {
            queries: queries.len(),
            ..RunSummary::default()
        };

        let mut pending = queries.iter();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < self.concurrency && !self.cancel.is_cancelled() {
                match pending.next() {
                    Some(query) => in_flight.push(self.lookup(query)),
                    None => break,
                }
            }

            let Some((query, outcome)) = in_flight.next().await else {
                break;
            };

            match outcome {
                Outcome::Found(records) => {
                    let records = dedup_batch(records);
                    let count = records.len();
                    let batch = Batch {
                        query: query.clone(),
                        records,
                    };
                    if !self.deliver(batch) {
                        return Err(RunnerError::Closed);
                    }
                    summary.batches += 1;
                    summary.records += count;
                }
                Outcome::Failed(e) if e.is_not_found() => {
                    tracing::debug!(query = %query, "no results");
                    summary.not_found += 1;
                }
                Outcome::Failed(e) => {
                    tracing::warn!(query = %query, error = %e, "lookup failed, aborting run");
                    return Err(RunnerError::Transport {
                        query: query.value.clone(),
                        source: e,
                    });
                }
                Outcome::Cancelled => {}
            }
        }

        if self.cancel.is_cancelled() {
            return Err(RunnerError::Closed);
        }
        Ok(summary)
    }

    async fn lookup<'q>(&self, query: &'q Query) -> (&'q Query, Outcome) {
        tracing::debug!(query = %query, "looking up");
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => Outcome::Cancelled,
            result = self.source.get_data(&query.value) => match result {
                Ok(records) => Outcome::Found(records),
                Err(e) => Outcome::Failed(e),
            },
        };
        (query, outcome)
    }

    /// Hand a batch to the sink unless the runner has been closed
    fn deliver(&self, batch: Batch) -> bool {
        let _delivery = self.delivery.lock().expect("runner delivery lock poisoned");
        if self.state() == RunnerState::Closed {
            return false;
        }
        self.sink.deliver(batch);
        true
    }

    fn finish(&self) {
        let mut state = self.state.write().expect("runner state lock poisoned");
        if *state == RunnerState::Processing {
            *state = RunnerState::Completed;
        }
    }

    fn expect_state(&self, operation: &'static str, expected: RunnerState) -> Result<(), RunnerError> {
        match self.state() {
            s if s == expected => Ok(()),
            RunnerState::Closed => Err(RunnerError::Closed),
            other => Err(RunnerError::InvalidState {
                operation,
                state: other,
            }),
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
