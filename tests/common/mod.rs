//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use tokio::sync::oneshot;

use volkeeper::backend::{ActionRequest, Backend};
use volkeeper::error::{FetchError, VolError};
use volkeeper::events::{EventFilter, EventSource, EventStream};
use volkeeper::volume::{ActionMap, ActionRecord, Volume, VolumeSize};

type Gate<T> = oneshot::Receiver<Result<T, FetchError>>;

/// Backend whose responses are scripted by the test.
///
/// Calls consume queued gates in call order; each gated call suspends
/// until the test sends its result. Without a queued gate the current
/// default response is returned immediately.
#[derive(Default)]
pub struct ScriptedBackend {
    volumes: Mutex<Vec<Volume>>,
    list_failure: Mutex<Option<FetchError>>,
    list_gates: Mutex<VecDeque<Gate<Vec<Volume>>>>,
    progress: Mutex<ActionMap>,
    progress_failure: Mutex<Option<FetchError>>,
    progress_gates: Mutex<VecDeque<Gate<ActionMap>>>,
    sizes: Mutex<HashMap<String, Result<VolumeSize, FetchError>>>,
    size_gates: Mutex<VecDeque<Gate<VolumeSize>>>,
    submit_failure: Mutex<Option<FetchError>>,
    pub submitted: Mutex<Vec<(String, ActionRequest)>>,
    pub list_calls: AtomicUsize,
    pub progress_calls: AtomicUsize,
    pub size_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_volumes(&self, names: &[&str]) {
        *self.volumes.lock().unwrap() = names.iter().map(|n| volume(n)).collect();
    }

    pub fn set_volume_list(&self, volumes: Vec<Volume>) {
        *self.volumes.lock().unwrap() = volumes;
    }

    pub fn fail_list(&self, err: Option<FetchError>) {
        *self.list_failure.lock().unwrap() = err;
    }

    pub fn gate_list(&self) -> oneshot::Sender<Result<Vec<Volume>, FetchError>> {
        let (tx, rx) = oneshot::channel();
        self.list_gates.lock().unwrap().push_back(rx);
        tx
    }

    pub fn set_progress(&self, entries: &[(&str, &str)]) {
        *self.progress.lock().unwrap() = action_map(entries);
    }

    pub fn fail_progress(&self, err: Option<FetchError>) {
        *self.progress_failure.lock().unwrap() = err;
    }

    pub fn gate_progress(&self) -> oneshot::Sender<Result<ActionMap, FetchError>> {
        let (tx, rx) = oneshot::channel();
        self.progress_gates.lock().unwrap().push_back(rx);
        tx
    }

    pub fn set_size(&self, name: &str, result: Result<VolumeSize, FetchError>) {
        self.sizes.lock().unwrap().insert(name.to_string(), result);
    }

    pub fn gate_size(&self) -> oneshot::Sender<Result<VolumeSize, FetchError>> {
        let (tx, rx) = oneshot::channel();
        self.size_gates.lock().unwrap().push_back(rx);
        tx
    }

    pub fn fail_submit(&self, err: Option<FetchError>) {
        *self.submit_failure.lock().unwrap() = err;
    }

    pub fn submissions(&self) -> Vec<(String, ActionRequest)> {
        self.submitted.lock().unwrap().clone()
    }
}

async fn gated<T>(gate: Option<Gate<T>>) -> Option<Result<T, FetchError>> {
    match gate {
        Some(rx) => Some(rx.await.unwrap_or_else(|_| {
            Err(FetchError::Transport {
                endpoint: "gate".into(),
                reason: "gate dropped".into(),
            })
        })),
        None => None,
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn list_volumes(&self) -> Result<Vec<Volume>, FetchError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.list_gates.lock().unwrap().pop_front();
        if let Some(result) = gated(gate).await {
            return result;
        }
        if let Some(err) = self.list_failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.volumes.lock().unwrap().clone())
    }

    async fn fetch_progress(&self) -> Result<ActionMap, FetchError> {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.progress_gates.lock().unwrap().pop_front();
        if let Some(result) = gated(gate).await {
            return result;
        }
        if let Some(err) = self.progress_failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.progress.lock().unwrap().clone())
    }

    async fn volume_size(&self, name: &str) -> Result<VolumeSize, FetchError> {
        self.size_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.size_gates.lock().unwrap().pop_front();
        if let Some(result) = gated(gate).await {
            return result;
        }
        self.sizes
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::Status {
                    endpoint: format!("/volumes/{}/size", name),
                    status: 404,
                    body: "no such volume".into(),
                })
            })
    }

    async fn submit(&self, volume: &str, request: &ActionRequest) -> Result<(), FetchError> {
        if let Some(err) = self.submit_failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.submitted
            .lock()
            .unwrap()
            .push((volume.to_string(), request.clone()));
        Ok(())
    }
}

/// Event source fed by the test through per-stream channels.
#[derive(Default)]
pub struct ChannelEventSource {
    senders: Mutex<HashMap<String, mpsc::UnboundedSender<Result<String, VolError>>>>,
    opened: Mutex<HashMap<String, usize>>,
    refuse: Mutex<bool>,
    refused_streams: Mutex<HashSet<String>>,
}

impl ChannelEventSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Send a line on the most recently opened stream with this name.
    pub fn send(&self, stream: &str, line: &str) {
        let senders = self.senders.lock().unwrap();
        let tx = senders.get(stream).expect("stream not opened");
        tx.unbounded_send(Ok(line.to_string())).expect("stream receiver gone");
    }

    /// Like [`send`](Self::send), but reports instead of panicking when the
    /// subscription is already gone.
    pub fn try_send(&self, stream: &str, line: &str) -> bool {
        let senders = self.senders.lock().unwrap();
        match senders.get(stream) {
            Some(tx) => tx.unbounded_send(Ok(line.to_string())).is_ok(),
            None => false,
        }
    }

    pub fn fail(&self, stream: &str, reason: &str) {
        let senders = self.senders.lock().unwrap();
        if let Some(tx) = senders.get(stream) {
            let _ = tx.unbounded_send(Err(VolError::StreamClosed {
                stream: stream.to_string(),
                reason: reason.to_string(),
            }));
        }
    }

    /// End the stream cleanly.
    pub fn close(&self, stream: &str) {
        if let Some(tx) = self.senders.lock().unwrap().remove(stream) {
            tx.close_channel();
        }
    }

    pub fn opened(&self, stream: &str) -> usize {
        self.opened.lock().unwrap().get(stream).copied().unwrap_or(0)
    }

    pub fn refuse_opens(&self, refuse: bool) {
        *self.refuse.lock().unwrap() = refuse;
    }

    /// Refuse opens of one stream only.
    pub fn refuse_stream(&self, stream: &str) {
        self.refused_streams.lock().unwrap().insert(stream.to_string());
    }
}

impl EventSource for ChannelEventSource {
    fn open(&self, filter: &EventFilter) -> Result<EventStream, VolError> {
        if *self.refuse.lock().unwrap() || self.refused_streams.lock().unwrap().contains(&filter.name) {
            return Err(VolError::Io {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "engine not found"),
            });
        }
        let (tx, rx) = mpsc::unbounded();
        self.senders.lock().unwrap().insert(filter.name.clone(), tx);
        *self.opened.lock().unwrap().entry(filter.name.clone()).or_insert(0) += 1;
        Ok(rx.boxed())
    }
}

pub const PROJECT_LABEL: &str = "com.docker.compose.project=volumes-extension";
pub const REFRESH_LABEL: &str = "com.volumes-extension.trigger-ui-refresh=true";

pub fn volume(name: &str) -> Volume {
    let mut v = Volume::new(name);
    v.size = Some("1.0 kB".to_string());
    v
}

pub fn action_map(entries: &[(&str, &str)]) -> ActionMap {
    entries
        .iter()
        .map(|(v, k)| (v.to_string(), ActionRecord::new(*k)))
        .collect()
}

pub fn volume_event(name: &str) -> String {
    serde_json::json!({
        "Type": "volume",
        "Action": "create",
        "Actor": { "ID": name, "Attributes": { "driver": "local" } }
    })
    .to_string()
}

pub fn worker_event() -> String {
    serde_json::json!({
        "Type": "container",
        "Action": "die",
        "Actor": {
            "ID": "f00d",
            "Attributes": {
                "com.docker.compose.project": "volumes-extension",
                "com.volumes-extension.trigger-ui-refresh": "true"
            }
        }
    })
    .to_string()
}

pub fn unrelated_container_event() -> String {
    serde_json::json!({
        "Type": "container",
        "Action": "die",
        "Actor": {
            "ID": "beef",
            "Attributes": { "com.docker.compose.project": "someone-else" }
        }
    })
    .to_string()
}

/// Wait until `cond` holds, failing the test after two seconds.
pub async fn eventually<F: Fn() -> bool>(what: &str, cond: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
