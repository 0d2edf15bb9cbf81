#![allow(dead_code)]
//! Scripted collection source and recording subscribers shared by the
//! integration tests.
use async_trait::async_trait;
use futures::StreamExt;
use kube::api::DynamicObject;
use snapwatch::error::{Error, Result};
use snapwatch::k8s::informer::{
    CollectionSource, Listing, NoticeStream, ObjectKey, RecycleBin, SearchIndex, TaggedObject,
    TypeTag, WatchNotice, WatcherConfig,
};
use snapwatch::k8s::snapshot::{Snapshot, SnapshotSpec};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

pub const NAMESPACE: &str = "demo";

/// Build a Snapshot the way the API server would hand it to a dynamic client
pub fn snapshot(name: &str, database: &str, labels: &[(&str, &str)], version: &str) -> DynamicObject {
    let mut snapshot = Snapshot::new(
        name,
        SnapshotSpec {
            database_name: database.to_string(),
            ..SnapshotSpec::default()
        },
    );
    snapshot.metadata.namespace = Some(NAMESPACE.to_string());
    snapshot.metadata.resource_version = Some(version.to_string());
    snapshot.metadata.labels = Some(
        labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<BTreeMap<_, _>>(),
    );
    serde_json::from_value(serde_json::to_value(&snapshot).unwrap()).unwrap()
}

pub fn fast_config() -> WatcherConfig {
    WatcherConfig::default()
        .with_backoff(Duration::from_millis(10), Duration::from_millis(50))
        .with_restart_delay(Duration::from_millis(10))
}

/// In-process list/watch source driven by pushed scripts.
///
/// A watch script yields its notices and then stays open. Once the scripts
/// run out, list and watch calls never complete.
#[derive(Default)]
pub struct FakeSource {
    unsupported: bool,
    panic_on_list: bool,
    lists: Mutex<VecDeque<Result<Listing>>>,
    watches: Mutex<VecDeque<Vec<Result<WatchNotice>>>>,
    pub discovery_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub watch_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unsupported() -> Self {
        Self {
            unsupported: true,
            ..Self::default()
        }
    }

    /// A source whose list call panics, as a buggy transport might
    pub fn panicking() -> Self {
        Self {
            panic_on_list: true,
            ..Self::default()
        }
    }

    pub fn push_list(&self, items: Vec<DynamicObject>, version: &str) {
        self.lists.lock().unwrap().push_back(Ok(Listing {
            items,
            resource_version: Some(version.to_string()),
        }));
    }

    pub fn push_list_error(&self, message: &str) {
        self.lists
            .lock()
            .unwrap()
            .push_back(Err(Error::Custom(message.to_string())));
    }

    pub fn push_watch(&self, notices: Vec<Result<WatchNotice>>) {
        self.watches.lock().unwrap().push_back(notices);
    }

    pub fn lists(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn watches(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollectionSource for FakeSource {
    async fn is_supported(&self) -> Result<bool> {
        self.discovery_calls.fetch_add(1, Ordering::SeqCst);
        Ok(!self.unsupported)
    }

    async fn list(&self) -> Result<Listing> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_list {
            panic!("list transport blew up");
        }
        let next = self.lists.lock().unwrap().pop_front();
        match next {
            Some(listing) => listing,
            None => futures::future::pending().await,
        }
    }

    async fn watch(&self, _resource_version: &str) -> Result<NoticeStream> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.watches.lock().unwrap().pop_front().unwrap_or_default();
        Ok(futures::stream::iter(script)
            .chain(futures::stream::pending())
            .boxed())
    }
}

/// Appends one line per call to a channel shared with `RecordingBin`
pub struct RecordingIndex {
    tx: mpsc::UnboundedSender<String>,
    fail_deletes: bool,
    panic_on: Option<String>,
}

impl RecordingIndex {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            tx,
            fail_deletes: false,
            panic_on: None,
        }
    }

    pub fn failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    pub fn panicking_on(mut self, name: &str) -> Self {
        self.panic_on = Some(name.to_string());
        self
    }

    fn record(&self, line: String, object: &TaggedObject<Snapshot>) {
        let _ = self.tx.send(line);
        if self.panic_on.as_deref() == Some(object.key.name.as_str()) {
            panic!("index cannot handle {}", object.key);
        }
    }
}

#[async_trait]
impl SearchIndex<Snapshot> for RecordingIndex {
    async fn on_add(&self, object: &TaggedObject<Snapshot>) -> Result<()> {
        self.record(format!("index add {}", object.key), object);
        Ok(())
    }

    async fn on_update(
        &self,
        previous: &TaggedObject<Snapshot>,
        current: &TaggedObject<Snapshot>,
    ) -> Result<()> {
        let line = format!(
            "index update {} {}->{}",
            current.key, previous.object.spec.database_name, current.object.spec.database_name
        );
        self.record(line, current);
        Ok(())
    }

    async fn on_delete(&self, object: &TaggedObject<Snapshot>) -> Result<()> {
        self.record(format!("index delete {}", object.key), object);
        if self.fail_deletes {
            return Err(Error::Subscriber("index offline".to_string()));
        }
        Ok(())
    }
}

pub struct RecordingBin {
    tx: mpsc::UnboundedSender<String>,
}

impl RecordingBin {
    pub const fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl RecycleBin<Snapshot> for RecordingBin {
    async fn on_delete(&self, type_tag: &TypeTag, key: &ObjectKey, _object: &Snapshot) {
        let _ = self.tx.send(format!("bin delete {} {}", type_tag.kind, key));
    }

    async fn on_update(&self, _type_tag: &TypeTag, key: &ObjectKey, _previous: &Snapshot, current: &Snapshot) {
        let _ = self
            .tx
            .send(format!("bin update {} {}", key, current.spec.database_name));
    }
}

/// Receive exactly `n` lines, failing the test if they do not arrive in time
pub async fn next_lines(rx: &mut mpsc::UnboundedReceiver<String>, n: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(n);
    for _ in 0..n {
        let line = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a subscriber call")
            .expect("subscriber channel closed");
        lines.push(line);
    }
    lines
}

/// Lines already delivered but not yet received
pub fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    lines
}
