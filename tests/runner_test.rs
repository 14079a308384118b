//! Pipeline tests against in-memory lookup and DNS fakes
//!
//! The fake service reproduces the payloads the real service returns for a
//! handful of well-known queries, so the pipeline's delivery, dedup and error
//! semantics can be checked without network access.

#![allow(clippy::unwrap_used)]

use asnmap::asn::{AsnSource, LookupError, Response};
use asnmap::dns::{DomainResolver, ResolveError};
use asnmap::runner::{Batch, ChannelSink, Runner, RunnerError, RunnerOptions, RunnerState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

const NOT_FOUND_BODY: &str = r#"{"error":"no results found"}"#;

fn rec(first: &str, last: &str, asn: u32, country: &str, org: &str) -> Response {
    Response {
        first_ip: first.to_string(),
        last_ip: last.to_string(),
        input: String::new(),
        asn,
        country: country.to_string(),
        org: org.to_string(),
    }
}

/// Fake lookup service keyed by query
#[derive(Default)]
struct FakeService {
    table: HashMap<String, Vec<Response>>,
    broken: Vec<String>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeService {
    fn known() -> Self {
        let cne = "cne-as-ap cambodian network exchange co., ltd.";
        let mut table = HashMap::new();
        table.insert(
            "104.16.99.52".to_string(),
            vec![rec("104.16.0.0", "104.20.63.255", 13335, "US", "cloudflarenet")],
        );
        table.insert(
            "14421".to_string(),
            vec![rec("216.101.17.0", "216.101.17.255", 14421, "US", "theravance")],
        );
        table.insert(
            "7712".to_string(),
            vec![
                rec("118.67.200.0", "118.67.203.255", 7712, "KH", cne),
                rec("118.67.200.0", "118.67.207.255", 7712, "KH", cne),
                // The service occasionally repeats a row verbatim
                rec("118.67.200.0", "118.67.203.255", 7712, "KH", cne),
            ],
        );
        table.insert(
            "microsoft".to_string(),
            vec![
                rec("151.207.40.0", "151.207.47.255", 12076, "US", "microsoft"),
                rec("170.110.229.0", "170.110.229.255", 12076, "US", "microsoft"),
                rec("2608:1c1:6::", "2608:1c1:8:ffff:ffff:ffff:ffff:ffff", 12076, "US", "microsoft"),
            ],
        );
        table.insert(
            "142.250.80.46".to_string(),
            vec![rec("142.250.0.0", "142.250.82.255", 15169, "US", "google")],
        );
        table.insert(
            "2607:f8b0:4006:80c::200e".to_string(),
            vec![rec("2607:f8b0::", "2607:f8b0:ffff:ffff:ffff:ffff:ffff:ffff", 15169, "US", "google")],
        );
        Self {
            table,
            ..Self::default()
        }
    }
}

#[async_trait]
impl AsnSource for FakeService {
    async fn get_data(&self, query: &str) -> Result<Vec<Response>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.broken.iter().any(|b| b == query) {
            return Err(LookupError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        match self.table.get(query) {
            Some(rows) => Ok(rows
                .iter()
                .cloned()
                .map(|mut r| {
                    r.input = query.to_string();
                    r
                })
                .collect()),
            None => Err(LookupError::NotFound(NOT_FOUND_BODY.to_string())),
        }
    }
}

/// Fake resolver keyed by domain
struct FakeDns(HashMap<String, Vec<IpAddr>>);

impl FakeDns {
    fn known() -> Self {
        let mut table = HashMap::new();
        table.insert(
            "google.com".to_string(),
            vec![
                "142.250.80.46".parse().unwrap(),
                "2607:f8b0:4006:80c::200e".parse().unwrap(),
            ],
        );
        table.insert("empty.example".to_string(), Vec::new());
        Self(table)
    }
}

#[async_trait]
impl DomainResolver for FakeDns {
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, ResolveError> {
        self.0
            .get(domain)
            .cloned()
            .ok_or_else(|| ResolveError::ResolutionError {
                domain: domain.to_string(),
                reason: "NXDOMAIN".to_string(),
            })
    }
}

/// Collects every batch the runner delivers
#[derive(Clone, Default)]
struct Collected(Arc<Mutex<Vec<Batch>>>);

impl Collected {
    fn batches(&self) -> Vec<Batch> {
        self.0.lock().unwrap().clone()
    }
}

fn build(
    builder: asnmap::runner::RunnerOptionsBuilder,
    service: Arc<FakeService>,
) -> (Runner, Collected) {
    let collected = Collected::default();
    let sink = collected.clone();
    let options = builder
        .on_result(move |b| sink.0.lock().unwrap().push(b))
        .build()
        .unwrap();
    let runner = Runner::new(options, service, Arc::new(FakeDns::known())).unwrap();
    (runner, collected)
}

fn contains(records: &[Response], expected: &Response) -> bool {
    records.iter().any(|r| r == expected)
}

#[tokio::test]
async fn test_ip_input() {
    let (runner, collected) = build(
        RunnerOptions::builder().ip(["104.16.99.52"]),
        Arc::new(FakeService::known()),
    );
    runner.prepare_input().await.unwrap();
    runner.process().await.unwrap();
    runner.close();

    let batches = collected.batches();
    assert_eq!(batches.len(), 1);
    let mut expected = rec("104.16.0.0", "104.20.63.255", 13335, "US", "cloudflarenet");
    expected.input = "104.16.99.52".to_string();
    assert_eq!(batches[0].records, vec![expected]);
}

#[tokio::test]
async fn test_asn_single_match() {
    let (runner, collected) = build(
        RunnerOptions::builder().asn(["AS14421"]),
        Arc::new(FakeService::known()),
    );
    runner.prepare_input().await.unwrap();
    let summary = runner.process().await.unwrap();
    runner.close();

    let expected = Response {
        first_ip: "216.101.17.0".to_string(),
        last_ip: "216.101.17.255".to_string(),
        input: "14421".to_string(),
        asn: 14421,
        country: "US".to_string(),
        org: "theravance".to_string(),
    };
    let batches = collected.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].query.value, "14421");
    assert_eq!(batches[0].records, vec![expected]);
    assert_eq!(summary.batches, 1);
    assert_eq!(summary.records, 1);
}

#[tokio::test]
async fn test_asn_multi_match_is_deduplicated() {
    let (runner, collected) = build(
        RunnerOptions::builder().asn(["7712"]),
        Arc::new(FakeService::known()),
    );
    runner.run().await.unwrap();
    runner.close();

    let batches = collected.batches();
    assert_eq!(batches.len(), 1);
    let records = &batches[0].records;
    assert_eq!(records.len(), 2);

    let cne = "cne-as-ap cambodian network exchange co., ltd.";
    for (first, last) in [
        ("118.67.200.0", "118.67.203.255"),
        ("118.67.200.0", "118.67.207.255"),
    ] {
        let mut expected = rec(first, last, 7712, "KH", cne);
        expected.input = "7712".to_string();
        assert!(contains(records, &expected), "missing {first}-{last}");
    }

    for (i, a) in records.iter().enumerate() {
        for b in &records[i + 1..] {
            assert_ne!(a, b, "duplicate record in batch");
        }
    }
}

#[tokio::test]
async fn test_org_input() {
    let (runner, collected) = build(
        RunnerOptions::builder().org(["microsoft"]),
        Arc::new(FakeService::known()),
    );
    runner.run().await.unwrap();
    runner.close();

    let batches = collected.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].records.len(), 3);
    assert!(batches[0].records.iter().all(|r| r.input == "microsoft"));
}

#[tokio::test]
async fn test_not_found_is_not_fatal() {
    let (runner, collected) = build(
        RunnerOptions::builder().org(["RANDOM_TEXT"]).asn(["1123"]),
        Arc::new(FakeService::known()),
    );
    runner.prepare_input().await.unwrap();
    let summary = runner.process().await.unwrap();
    runner.close();

    assert!(collected.batches().is_empty());
    assert_eq!(summary.queries, 2);
    assert_eq!(summary.not_found, 2);
    assert_eq!(summary.batches, 0);
}

#[tokio::test]
async fn test_mixed_found_and_not_found() {
    let (runner, collected) = build(
        RunnerOptions::builder()
            .ip(["255.100.100.100"])
            .asn(["14421", "1123"]),
        Arc::new(FakeService::known()),
    );
    let summary = runner.run().await.unwrap();
    runner.close();

    let batches = collected.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].query.value, "14421");
    assert_eq!(summary.not_found, 2);
}

#[tokio::test]
async fn test_domain_input() {
    let service = Arc::new(FakeService::known());
    let (runner, collected) = build(
        RunnerOptions::builder().domain(["google.com"]),
        Arc::clone(&service),
    );
    assert_eq!(runner.prepare_input().await.unwrap(), 2);
    runner.process().await.unwrap();
    runner.close();

    assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    let batches = collected.batches();
    assert_eq!(batches.len(), 2);
    assert!(batches
        .iter()
        .all(|b| b.query.domain.as_deref() == Some("google.com")));

    let found = batches.iter().flat_map(|b| &b.records).any(|r| {
        r.asn == 15169 && r.country == "US" && r.org == "google"
    });
    assert!(found);
}

#[tokio::test]
async fn test_unresolvable_domain_does_not_abort_batch() {
    let (runner, collected) = build(
        RunnerOptions::builder()
            .domain(["nxdomain.example", "empty.example"])
            .asn(["14421"]),
        Arc::new(FakeService::known()),
    );
    assert_eq!(runner.prepare_input().await.unwrap(), 1);
    runner.process().await.unwrap();
    runner.close();
    assert_eq!(collected.batches().len(), 1);
}

#[tokio::test]
async fn test_transport_error_is_fatal() {
    let service = FakeService {
        broken: vec!["99".to_string()],
        ..FakeService::known()
    };
    let (runner, _collected) = build(
        RunnerOptions::builder().asn(["99"]).concurrency(1),
        Arc::new(service),
    );
    runner.prepare_input().await.unwrap();
    let err = runner.process().await.unwrap_err();
    match err {
        RunnerError::Transport { query, source } => {
            assert_eq!(query, "99");
            assert!(source.is_transport());
            assert_eq!(source.to_string(), "bad request: service unavailable");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(runner.state(), RunnerState::Completed);
    runner.close();
}

#[tokio::test]
async fn test_transport_error_stops_remaining_queries() {
    let service = Arc::new(FakeService {
        broken: vec!["1".to_string()],
        ..FakeService::known()
    });
    let asns: Vec<String> = (1..=20).map(|n| n.to_string()).collect();
    let (runner, _collected) = build(
        RunnerOptions::builder().asn(asns).concurrency(1),
        Arc::clone(&service),
    );
    let result = runner.run().await;
    assert!(matches!(result, Err(RunnerError::Transport { .. })));
    assert_eq!(service.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bounded_concurrency_and_exactly_once_delivery() {
    let mut service = FakeService {
        delay: Duration::from_millis(5),
        ..FakeService::default()
    };
    let asns: Vec<String> = (1..=40).map(|n| format!("AS{n}")).collect();
    for n in 1..=40u32 {
        service.table.insert(
            n.to_string(),
            vec![rec("10.0.0.0", "10.0.0.255", n, "US", "test")],
        );
    }
    let service = Arc::new(service);
    let (runner, collected) = build(
        RunnerOptions::builder().asn(asns).concurrency(4),
        Arc::clone(&service),
    );
    let summary = runner.run().await.unwrap();
    runner.close();

    assert!(service.max_in_flight.load(Ordering::SeqCst) <= 4);
    assert_eq!(summary.batches, 40);

    let mut delivered: Vec<String> = collected
        .batches()
        .into_iter()
        .map(|b| b.query.value)
        .collect();
    delivered.sort_by_key(|v| v.parse::<u32>().unwrap());
    let expected: Vec<String> = (1..=40).map(|n| n.to_string()).collect();
    assert_eq!(delivered, expected);
}

#[tokio::test]
async fn test_channel_sink_delivery() {
    let (sink, mut rx) = ChannelSink::channel();
    let options = RunnerOptions::builder()
        .asn(["14421", "7712"])
        .org(["RANDOM_TEXT"])
        .sink(sink)
        .build()
        .unwrap();
    let runner = Runner::new(
        options,
        Arc::new(FakeService::known()),
        Arc::new(FakeDns::known()),
    )
    .unwrap();
    runner.run().await.unwrap();
    runner.close();
    drop(runner);

    let mut queries = Vec::new();
    while let Some(batch) = rx.recv().await {
        queries.push(batch.query.value);
    }
    queries.sort();
    assert_eq!(queries, vec!["14421", "7712"]);
}

#[tokio::test]
async fn test_close_is_idempotent_and_blocks_process() {
    let (runner, collected) = build(
        RunnerOptions::builder().asn(["14421"]),
        Arc::new(FakeService::known()),
    );
    runner.prepare_input().await.unwrap();
    runner.close();
    runner.close();

    assert!(matches!(runner.process().await, Err(RunnerError::Closed)));
    assert!(collected.batches().is_empty());
    assert_eq!(runner.state(), RunnerState::Closed);
}

#[tokio::test]
async fn test_close_after_process() {
    let (runner, collected) = build(
        RunnerOptions::builder().asn(["14421"]),
        Arc::new(FakeService::known()),
    );
    runner.run().await.unwrap();
    runner.close();
    runner.close();
    assert_eq!(collected.batches().len(), 1);
    assert!(matches!(runner.process().await, Err(RunnerError::Closed)));
    assert_eq!(collected.batches().len(), 1);
}

#[tokio::test]
async fn test_process_twice_is_rejected() {
    let (runner, _collected) = build(
        RunnerOptions::builder().asn(["14421"]),
        Arc::new(FakeService::known()),
    );
    runner.run().await.unwrap();
    assert!(matches!(
        runner.process().await,
        Err(RunnerError::InvalidState {
            state: RunnerState::Completed,
            ..
        })
    ));
}

#[tokio::test]
async fn test_no_delivery_after_close_during_processing() {
    let mut service = FakeService {
        delay: Duration::from_millis(20),
        ..FakeService::default()
    };
    for n in 1..=50u32 {
        service.table.insert(
            n.to_string(),
            vec![rec("10.0.0.0", "10.0.0.255", n, "US", "slow")],
        );
    }
    let asns: Vec<String> = (1..=50).map(|n| n.to_string()).collect();

    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    let options = RunnerOptions::builder()
        .asn(asns)
        .concurrency(1)
        .on_result(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let runner = Arc::new(
        Runner::new(options, Arc::new(service), Arc::new(FakeDns::known())).unwrap(),
    );
    runner.prepare_input().await.unwrap();

    let worker = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.process().await })
    };

    tokio::time::sleep(Duration::from_millis(70)).await;
    runner.close();
    let at_close = delivered.load(Ordering::SeqCst);

    let result = tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("process did not stop after close")
        .unwrap();
    assert!(matches!(result, Err(RunnerError::Closed)));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(delivered.load(Ordering::SeqCst), at_close);
    assert!(at_close < 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sink_may_read_state_while_close_waits() {
    let handle: Arc<OnceLock<Weak<Runner>>> = Arc::default();
    let observed: Arc<Mutex<Vec<RunnerState>>> = Arc::default();
    let (entered_tx, entered_rx) = tokio::sync::oneshot::channel::<()>();
    let entered_tx = Mutex::new(Some(entered_tx));

    let sink_handle = Arc::clone(&handle);
    let sink_observed = Arc::clone(&observed);
    let options = RunnerOptions::builder()
        .asn(["14421"])
        .on_result(move |_| {
            if let Some(tx) = entered_tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
            // Long enough for close() to start waiting on this delivery
            std::thread::sleep(Duration::from_millis(100));
            if let Some(runner) = sink_handle.get().and_then(Weak::upgrade) {
                sink_observed.lock().unwrap().push(runner.state());
            }
        })
        .build()
        .unwrap();
    let runner = Arc::new(
        Runner::new(
            options,
            Arc::new(FakeService::known()),
            Arc::new(FakeDns::known()),
        )
        .unwrap(),
    );
    handle.set(Arc::downgrade(&runner)).unwrap();
    runner.prepare_input().await.unwrap();

    let worker = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.process().await })
    };
    entered_rx.await.unwrap();

    let closer = {
        let runner = Arc::clone(&runner);
        tokio::task::spawn_blocking(move || runner.close())
    };
    tokio::time::timeout(Duration::from_secs(5), closer)
        .await
        .expect("close() did not return while the sink read the runner state")
        .unwrap();

    // close() returned, so the in-progress sink call has finished
    assert_eq!(observed.lock().unwrap().len(), 1);
    assert_eq!(runner.state(), RunnerState::Closed);

    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("process() did not finish")
        .unwrap()
        .ok();
}

#[test]
fn test_empty_configuration_rejected() {
    let err = RunnerOptions::builder().on_result(|_| {}).build().unwrap_err();
    assert!(err.is_configuration());
}
