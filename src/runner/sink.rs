//! Result delivery

use crate::asn::Response;
use crate::input::Query;
use tokio::sync::mpsc;

/// Deduplicated records for one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Query that produced the records
    pub query: Query,
    /// Records, without duplicates, in service order
    pub records: Vec<Response>,
}

/// Consumer of result batches.
///
/// Called at most once per query, possibly from different tasks, with no
/// ordering across queries. Implementations may read the delivering runner's
/// state but must not drive it (`prepare_input`, `process`, `close`).
pub trait ResultSink: Send + Sync {
    /// Receive the batch for one query
    fn deliver(&self, batch: Batch);
}

impl<F> ResultSink for F
where
    F: Fn(Batch) + Send + Sync,
{
    fn deliver(&self, batch: Batch) {
        self(batch)
    }
}

/// Sink forwarding batches into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Batch>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Batch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl From<mpsc::UnboundedSender<Batch>> for ChannelSink {
    fn from(tx: mpsc::UnboundedSender<Batch>) -> Self {
        Self { tx }
    }
}

impl ResultSink for ChannelSink {
    fn deliver(&self, batch: Batch) {
        if self.tx.send(batch).is_err() {
            tracing::debug!("result receiver dropped, discarding batch");
        }
    }
}
