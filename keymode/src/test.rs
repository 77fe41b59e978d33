//! Test doubles for the host collaborators.
//!
//! Enabled for this crate's unit tests and, through the `test-support` feature, for integration
//! tests and downstream crates.

use crate::{
    bus::{EventBus, Handler, Payload, PubSub, SubscriptionId},
    handler::{KeyInterpreter, Mode},
    keymap::SharedKeymap,
    loader::{FetchError, KeymapSource},
    surface::{FocusTracker, SurfaceId, SurfaceSelector},
    system::InterpreterFactory,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::{io, sync::Arc};

/// [`EventBus`] that delivers like [`PubSub`] and records every publish.
#[derive(Default)]
pub struct RecordingBus {
    bus: PubSub,
    published: Mutex<Vec<(String, Payload)>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads published on `topic`, oldest first.
    pub fn published(&self, topic: &str) -> Vec<Payload> {
        self.published
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Every publish as `(topic, payload)`, oldest first.
    pub fn all_published(&self) -> Vec<(String, Payload)> {
        self.published.lock().clone()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.bus.subscriber_count(topic)
    }
}

impl EventBus for RecordingBus {
    fn subscribe(&self, topic: &str, handler: Handler) -> SubscriptionId {
        self.bus.subscribe(topic, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    fn publish(&self, topic: &str, payload: &Payload) -> usize {
        self.published
            .lock()
            .push((topic.to_string(), payload.clone()));
        self.bus.publish(topic, payload)
    }
}

/// A call made on a [`RecordingInterpreter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Start,
    Stop,
}

/// [`KeyInterpreter`] that records calls and tracks whether it is intercepting input.
#[derive(Default)]
pub struct RecordingInterpreter {
    state: Mutex<InterpreterState>,
}

#[derive(Default)]
struct InterpreterState {
    running: bool,
    calls: Vec<Call>,
}

impl RecordingInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Forget recorded calls; the running flag is kept.
    pub fn clear(&self) {
        self.state.lock().calls.clear();
    }
}

impl KeyInterpreter for RecordingInterpreter {
    fn start(&self) {
        let mut state = self.state.lock();
        state.running = true;
        state.calls.push(Call::Start);
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.running = false;
        state.calls.push(Call::Stop);
    }
}

/// [`InterpreterFactory`] handing out [`RecordingInterpreter`]s and remembering them.
#[derive(Default)]
pub struct RecordingFactory {
    created: Mutex<FxHashMap<(SurfaceId, Mode), Arc<RecordingInterpreter>>>,
    keymaps: Mutex<Vec<SharedKeymap>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interpreter(&self, surface: SurfaceId, mode: Mode) -> Option<Arc<RecordingInterpreter>> {
        self.created.lock().get(&(surface, mode)).cloned()
    }

    /// Keymaps handed to created interpreters, in creation order.
    pub fn keymaps(&self) -> Vec<SharedKeymap> {
        self.keymaps.lock().clone()
    }
}

impl InterpreterFactory for RecordingFactory {
    fn create(
        &self,
        mode: Mode,
        surface: SurfaceId,
        keymap: SharedKeymap,
    ) -> Arc<dyn KeyInterpreter> {
        let interpreter = Arc::new(RecordingInterpreter::new());
        self.created
            .lock()
            .insert((surface, mode), interpreter.clone());
        self.keymaps.lock().push(keymap);
        interpreter
    }
}

/// [`KeymapSource`] serving canned documents and failures by address.
///
/// Unknown addresses fail with [`io::ErrorKind::NotFound`].
#[derive(Default)]
pub struct StaticSource {
    documents: FxHashMap<String, String>,
    failures: Mutex<FxHashMap<String, FetchError>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, address: &str, document: &str) -> Self {
        self.documents
            .insert(address.to_string(), document.to_string());
        self
    }

    /// Fail the next fetch of `address` with `error`.
    pub fn with_failure(self, address: &str, error: FetchError) -> Self {
        self.failures.lock().insert(address.to_string(), error);
        self
    }
}

#[async_trait]
impl KeymapSource for StaticSource {
    async fn fetch(&self, address: &str) -> Result<String, FetchError> {
        if let Some(error) = self.failures.lock().remove(address) {
            return Err(error);
        }
        self.documents.get(address).cloned().ok_or_else(|| {
            FetchError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no document at {address}"),
            ))
        })
    }
}

/// [`FocusTracker`] reporting whatever surface the test sets.
#[derive(Default)]
pub struct FixedFocus {
    focused: Mutex<Option<SurfaceId>>,
}

impl FixedFocus {
    pub fn new(focused: Option<SurfaceId>) -> Self {
        Self {
            focused: Mutex::new(focused),
        }
    }

    pub fn set(&self, focused: Option<SurfaceId>) {
        *self.focused.lock() = focused;
    }
}

impl FocusTracker for FixedFocus {
    fn current_editable(&self) -> Option<SurfaceId> {
        *self.focused.lock()
    }
}

/// [`SurfaceSelector`] with a fixed selector to surfaces table.
#[derive(Default)]
pub struct StaticSelector {
    matches: FxHashMap<String, Vec<SurfaceId>>,
}

impl StaticSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: &str, surfaces: impl IntoIterator<Item = u64>) -> Self {
        self.matches.insert(
            selector.to_string(),
            surfaces.into_iter().map(SurfaceId).collect(),
        );
        self
    }
}

impl SurfaceSelector for StaticSelector {
    fn select(&self, selector: &str) -> Vec<SurfaceId> {
        self.matches.get(selector).cloned().unwrap_or_default()
    }
}
