//! Mock collaborators for testing
//!
//! Downloads, transport and prompts are answered from memory and every call
//! is recorded so tests can assert on what the code under test asked for.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use xext_core::{Error, Result};
use xext_extensions::confirm::{Confirmation, Prompt};
use xext_extensions::events::{ChangeAction, ChangeListener};
use xext_extensions::extension::{Extension, ExtensionModule, StaticModuleLoader};
use xext_extensions::net::{Downloader, ProgressFn};
use xext_extensions::transport::{Request, Response, Transport};
use xext_extensions::SharedExtension;

use super::constants::*;

/// Downloader serving registered payloads
#[derive(Default)]
pub struct MockDownloader {
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<String>>,
    stalled: AtomicBool,
}

impl MockDownloader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, bytes: Vec<u8>) {
        self.payloads.lock().unwrap().insert(url.to_string(), bytes);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Make later downloads hang after they are recorded
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    async fn download(&self, url: &str, dest: &Path, on_progress: ProgressFn<'_>) -> Result<()> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let bytes = self
            .payloads
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::download(url, "server responded with 404 Not Found"))?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        on_progress(0.5);
        tokio::fs::write(dest, bytes).await?;
        on_progress(1.0);
        Ok(())
    }
}

/// Transport answering the extension list and entry visit requests
#[derive(Default)]
pub struct MockTransport {
    extensions: Mutex<Value>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set the list returned for `chat/extensions`
    pub fn publish(&self, items: Vec<Value>) {
        *self.extensions.lock().unwrap() = Value::Array(items);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, route: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.route() == route)
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        self.requests.lock().unwrap().push(request.clone());
        let response = match request.route().as_str() {
            "chat/extensions" => Response::success(self.extensions.lock().unwrap().clone()),
            "entry/visit" => {
                let entry = request.params["entryID"].as_str().unwrap_or_default();
                let referer = request.params["referer"].as_str().unwrap_or_default();
                Response::success(json!(format!(
                    "{}/{}?referer={}",
                    TEST_VISIT_BASE, entry, referer
                )))
            }
            route => Response::failure(format!("unknown route {}", route)),
        };
        Ok(Response {
            rid: Some(request.rid),
            ..response
        })
    }
}

/// Confirmation recording every prompt
pub struct RecordingConfirm {
    answer: AtomicBool,
    prompts: Mutex<Vec<Prompt>>,
}

impl RecordingConfirm {
    pub fn new(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer: AtomicBool::new(answer),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn set_answer(&self, answer: bool) {
        self.answer.store(answer, Ordering::SeqCst);
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.prompts.lock().unwrap().clear();
    }
}

#[async_trait]
impl Confirmation for RecordingConfirm {
    async fn confirm(&self, prompt: &Prompt) -> bool {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.answer.load(Ordering::SeqCst)
    }
}

/// Listener recording change notifications as `(action, names)`
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<(ChangeAction, Vec<String>)>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(ChangeAction, Vec<String>)> {
        self.events.lock().unwrap().clone()
    }

    /// Actions raised for one extension, in order
    pub fn actions_for(&self, name: &str) -> Vec<ChangeAction> {
        self.events()
            .into_iter()
            .filter(|(_, names)| names.iter().any(|n| n == name))
            .map(|(action, _)| action)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl ChangeListener for RecordingListener {
    fn on_change(&self, extensions: &[SharedExtension], action: ChangeAction) {
        let names = extensions.iter().map(|ext| ext.name().to_string()).collect();
        self.events.lock().unwrap().push((action, names));
    }
}

/// Hook call counters shared with [`CountingModule`] instances
#[derive(Default, Debug)]
pub struct HookCounter {
    pub attach: AtomicUsize,
    pub ready: AtomicUsize,
    pub detach: AtomicUsize,
}

impl HookCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attach(&self) -> usize {
        self.attach.load(Ordering::SeqCst)
    }

    pub fn ready(&self) -> usize {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn detach(&self) -> usize {
        self.detach.load(Ordering::SeqCst)
    }
}

/// Module counting its hook calls
pub struct CountingModule(pub Arc<HookCounter>);

impl ExtensionModule for CountingModule {
    fn on_attach(&self, _extension: &Extension) -> anyhow::Result<()> {
        self.0.attach.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_ready(&self, _extension: &Extension) -> anyhow::Result<()> {
        self.0.ready.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_detach(&self, _extension: &Extension) -> anyhow::Result<()> {
        self.0.detach.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Register a [`CountingModule`] under `name` and return its counters
pub fn register_counting(loader: &StaticModuleLoader, name: &str) -> Arc<HookCounter> {
    let counter = HookCounter::new();
    let shared = counter.clone();
    loader.register(name, move || -> Arc<dyn ExtensionModule> {
        Arc::new(CountingModule(shared.clone()))
    });
    counter
}
