// Shared fakes for the integration tests.
#![allow(dead_code)]

use futures::future::BoxFuture;
use locus_tui::credentials::{CredentialPrompt, PromptReason};
use locus_tui::device::{Position, PositionOptions, PositionSource, WatchId, WatchSink};
use locus_tui::error::PositionError;
use locus_tui::models::{ProviderId, WifiAccessPoint};
use locus_tui::provider::{ProviderEvent, UpdateSender};
use locus_tui::wifi::{WifiScanError, WifiScanner};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// Answers prompts from a fixed script and counts how often it was asked.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<Option<String>>>,
    pub reasons: Mutex<Vec<PromptReason>>,
}

impl ScriptedPrompt {
    pub fn answering(answers: &[Option<&str>]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.map(str::to_string)).collect()),
            reasons: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.reasons.lock().unwrap().len()
    }
}

impl CredentialPrompt for ScriptedPrompt {
    fn request_key(&self, reason: PromptReason) -> BoxFuture<'_, Option<String>> {
        self.reasons.lock().unwrap().push(reason);
        let answer = self.answers.lock().unwrap().pop_front().flatten();
        Box::pin(async move { answer })
    }
}

pub struct StaticWifi(pub Vec<WifiAccessPoint>);

impl WifiScanner for StaticWifi {
    fn scan(&self) -> BoxFuture<'_, Result<Vec<WifiAccessPoint>, WifiScanError>> {
        let aps = self.0.clone();
        Box::pin(async move { Ok(aps) })
    }
}

pub fn access_point(mac: &str, signal: i32) -> WifiAccessPoint {
    WifiAccessPoint {
        mac_address: mac.to_string(),
        signal_strength: signal,
        channel: Some(6),
        age: None,
    }
}

/// Position source whose single reading arrives after `delay`, and whose
/// watches can be fed by hand.
pub struct SlowSource {
    pub delay: Duration,
    pub fix: Position,
    pub sinks: Mutex<Vec<(WatchId, WatchSink)>>,
    pub cleared: Mutex<Vec<WatchId>>,
    next_id: AtomicU64,
    pub single_reads: AtomicUsize,
}

impl SlowSource {
    pub fn new(delay: Duration, latitude: f64, longitude: f64) -> Self {
        Self {
            delay,
            fix: Position {
                latitude,
                longitude,
                accuracy: 10.0,
            },
            sinks: Mutex::new(Vec::new()),
            cleared: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            single_reads: AtomicUsize::new(0),
        }
    }

    pub fn emit(&self, latitude: f64) {
        let position = Position {
            latitude,
            ..self.fix
        };
        for (_, sink) in self.sinks.lock().unwrap().iter() {
            let _ = sink.send(Ok(position));
        }
    }

    pub fn watch_count(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }
}

impl PositionSource for SlowSource {
    fn current_position(&self, _options: PositionOptions) -> BoxFuture<'_, Result<Position, PositionError>> {
        self.single_reads.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(self.fix)
        })
    }

    fn watch_position(&self, _options: PositionOptions, sink: WatchSink) -> WatchId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sinks.lock().unwrap().push((id, sink));
        id
    }

    fn clear_watch(&self, id: WatchId) {
        self.cleared.lock().unwrap().push(id);
        self.sinks.lock().unwrap().retain(|(w, _)| *w != id);
    }
}

pub fn updates(provider: ProviderId) -> (UpdateSender, mpsc::UnboundedReceiver<ProviderEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UpdateSender::new(tx, provider, 1), rx)
}
