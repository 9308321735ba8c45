use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sales_report::error::{AttemptError, LoadError, TransportError};
use sales_report::fetch::Transport;
use sales_report::loader::{Loader, Registry, Relay, NON_SLIP, PROCUREMENT, VEGETATION_MAT};

/// Answers from a fixed URL -> body table; anything else is a 500.
#[derive(Default)]
struct Scripted {
    bodies: HashMap<String, String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl Scripted {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for Scripted {
    async fn fetch_text(&self, url: &str) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(url.to_string());
        self.bodies.get(url).cloned().ok_or_else(|| TransportError::Status {
            url: url.to_string(),
            status: 500,
        })
    }
}

const DIRECT: &str = "https://sheets.test/a.csv";
const BODY: &str = "h1,h2\nx,1\ny,2\n";

fn relays(n: usize) -> Vec<Relay> {
    (0..n).map(|i| Relay::new(format!("https://relay{i}.test/?u="))).collect()
}

fn registry() -> Registry {
    let mut reg = Registry::empty();
    reg.insert("a", DIRECT);
    reg
}

#[tokio::test]
async fn direct_success_makes_one_call() {
    let transport = Arc::new(Scripted::default().with(DIRECT, BODY));
    let loader = Loader::new(registry(), transport.clone(), relays(3));

    let rows = loader.load("a").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("h1"), Some("x"));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn last_relay_wins_after_every_earlier_attempt() {
    let relays = relays(3);
    let last = relays[2].wrap(DIRECT);
    let transport = Arc::new(Scripted::default().with(&last, BODY));
    let loader = Loader::new(registry(), transport.clone(), relays.clone());

    let rows = loader.load("a").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(transport.calls(), 4);

    let seen = transport.seen.lock().unwrap().clone();
    let expected: Vec<String> = std::iter::once(DIRECT.to_string())
        .chain(relays.iter().map(|r| r.wrap(DIRECT)))
        .collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn empty_body_falls_through_to_next_route() {
    let relays = relays(2);
    let transport = Arc::new(
        Scripted::default()
            .with(DIRECT, "only,a,header\n")
            .with(&relays[0].wrap(DIRECT), "")
            .with(&relays[1].wrap(DIRECT), BODY),
    );
    let loader = Loader::new(registry(), transport.clone(), relays);

    let rows = loader.load("a").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn unknown_dataset_makes_no_request() {
    let transport = Arc::new(Scripted::default());
    let loader = Loader::new(registry(), transport.clone(), relays(2));

    let err = loader.load("missing").await.unwrap_err();
    assert!(matches!(err, LoadError::UnknownDataset(ref name) if name == "missing"));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn exhausted_lists_every_failure_in_order() {
    let relays = relays(2);
    let transport = Arc::new(Scripted::default().with(&relays[1].wrap(DIRECT), "h\n"));
    let loader = Loader::new(registry(), transport.clone(), relays);

    let err = loader.load("a").await.unwrap_err();
    assert_eq!(err.dataset(), "a");
    let LoadError::Exhausted { failures, .. } = err else {
        panic!("expected exhausted, got {err:?}");
    };
    assert_eq!(failures.len(), 3);
    assert_eq!(failures[0].0, "direct");
    assert!(matches!(failures[0].1, AttemptError::Transport(TransportError::Status { status: 500, .. })));
    assert!(matches!(failures[2].1, AttemptError::Empty));
    assert_eq!(transport.calls(), 3);
}

fn procurement_registry() -> Registry {
    let mut reg = Registry::empty();
    reg.insert(PROCUREMENT, "https://sheets.test/p.csv");
    reg.insert(VEGETATION_MAT, "https://sheets.test/v.csv");
    reg.insert(NON_SLIP, "https://sheets.test/n.csv");
    reg
}

#[tokio::test]
async fn unified_load_keeps_source_order() {
    let transport = Arc::new(
        Scripted::default()
            .with("https://sheets.test/p.csv", "k\np1\np2\n")
            .with("https://sheets.test/v.csv", "k\nv1\n")
            .with("https://sheets.test/n.csv", "k\nn1\n"),
    );
    let loader = Loader::new(procurement_registry(), transport, Vec::new());

    let rows = loader.load_procurement().await.unwrap();
    let keys: Vec<&str> = rows.iter().filter_map(|r| r.get("k")).collect();
    assert_eq!(keys, ["p1", "p2", "v1", "n1"]);
}

#[tokio::test]
async fn unified_load_fails_when_any_source_fails() {
    let transport = Arc::new(
        Scripted::default()
            .with("https://sheets.test/p.csv", "k\np1\n")
            .with("https://sheets.test/n.csv", "k\nn1\n"),
    );
    let loader = Loader::new(procurement_registry(), transport, relays(1));

    let err = loader.load_procurement().await.unwrap_err();
    assert_eq!(err.dataset(), VEGETATION_MAT);
}

/// Holds every answer until all three procurement sources have been requested.
struct Gate {
    barrier: tokio::sync::Barrier,
    inner: Scripted,
}

#[async_trait]
impl Transport for Gate {
    async fn fetch_text(&self, url: &str) -> Result<String, TransportError> {
        self.barrier.wait().await;
        self.inner.fetch_text(url).await
    }
}

#[tokio::test]
async fn unified_load_requests_sources_concurrently() {
    let transport = Arc::new(Gate {
        barrier: tokio::sync::Barrier::new(3),
        inner: Scripted::default()
            .with("https://sheets.test/p.csv", "k\np1\n")
            .with("https://sheets.test/v.csv", "k\nv1\n")
            .with("https://sheets.test/n.csv", "k\nn1\n"),
    });
    let loader = Loader::new(procurement_registry(), transport.clone(), Vec::new());

    let rows = tokio::time::timeout(std::time::Duration::from_secs(5), loader.load_procurement())
        .await
        .expect("sequential loading would leave the barrier waiting")
        .unwrap();
    let keys: Vec<&str> = rows.iter().filter_map(|r| r.get("k")).collect();
    assert_eq!(keys, ["p1", "v1", "n1"]);
    assert_eq!(transport.inner.calls(), 3);
}
