//! Scripted host for driving the monitor in tests
//!
//! One [`ScriptedHost`] implements every host trait over shared state, so a
//! test can preload timing tables, emit observer batches, fire lifecycle
//! signals and inspect what each sink received.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use perf_telemetry::{
    ConnectionInfo, ConsoleOutput, EntryKind, Host, KeyValueStore, LifecycleEvent, MemoryUsage,
    MetricsRecord, NavigationTiming, PageEnvironment, PerformanceEntry, PerformanceSource,
    ResourceEntry, Result, Subscription, TelemetryError, Transport,
};
use perf_telemetry::host::{EntryCallback, LifecycleCallback};

/// How the scripted beacon behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconMode {
    Queue,
    Refuse,
    Missing,
}

#[derive(Default)]
pub struct HostState {
    pub navigation: RefCell<Option<NavigationTiming>>,
    pub resources: RefCell<Option<Vec<ResourceEntry>>>,
    pub memory: RefCell<Option<MemoryUsage>>,
    pub connection: RefCell<Option<ConnectionInfo>>,
    pub unsupported_kinds: RefCell<Vec<EntryKind>>,
    pub draw: Cell<f64>,
    pub now_ms: Cell<f64>,

    next_id: Cell<u64>,
    observers: RefCell<Vec<(u64, EntryKind, EntryCallback)>>,
    listeners: RefCell<Vec<(u64, LifecycleEvent, LifecycleCallback)>>,

    pub logs: RefCell<Vec<MetricsRecord>>,
    pub warnings: RefCell<Vec<String>>,

    pub storage: RefCell<HashMap<String, String>>,
    pub storage_full: Cell<bool>,

    pub beacon_mode: Cell<Option<BeaconMode>>,
    pub beacons: RefCell<Vec<(String, String)>>,
    pub posts: RefCell<Vec<(String, String)>>,
    pub network_down: Cell<bool>,
}

/// Cloneable handle over shared [`HostState`]
#[derive(Clone, Default)]
pub struct ScriptedHost {
    pub state: Rc<HostState>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        let host = Self::default();
        host.state.now_ms.set(1_700_000_000_000.0);
        host.state.beacon_mode.set(Some(BeaconMode::Queue));
        host
    }

    /// Bundle this host for a monitor
    pub fn host(&self) -> Host {
        let shared = Rc::new(self.clone());
        Host {
            performance: shared.clone(),
            page: shared.clone(),
            console: shared.clone(),
            storage: shared.clone(),
            transport: shared,
        }
    }

    pub fn with_navigation(self, timing: NavigationTiming) -> Self {
        *self.state.navigation.borrow_mut() = Some(timing);
        self
    }

    pub fn with_resources(self, resources: Vec<ResourceEntry>) -> Self {
        *self.state.resources.borrow_mut() = Some(resources);
        self
    }

    pub fn with_memory(self, memory: MemoryUsage) -> Self {
        *self.state.memory.borrow_mut() = Some(memory);
        self
    }

    pub fn with_connection(self, effective_type: Option<&str>) -> Self {
        *self.state.connection.borrow_mut() = Some(ConnectionInfo {
            effective_type: effective_type.map(str::to_string),
        });
        self
    }

    pub fn with_draw(self, draw: f64) -> Self {
        self.state.draw.set(draw);
        self
    }

    pub fn without_observer(self, kind: EntryKind) -> Self {
        self.state.unsupported_kinds.borrow_mut().push(kind);
        self
    }

    pub fn with_beacon(self, mode: BeaconMode) -> Self {
        self.state.beacon_mode.set(Some(mode));
        self
    }

    /// Deliver one batch to every subscriber of `kind`
    pub fn emit(&self, kind: EntryKind, batch: &[PerformanceEntry]) {
        for (_, observed, callback) in self.state.observers.borrow_mut().iter_mut() {
            if *observed == kind {
                callback(batch);
            }
        }
    }

    /// Fire a lifecycle signal
    pub fn fire(&self, event: LifecycleEvent) {
        for (_, registered, callback) in self.state.listeners.borrow_mut().iter_mut() {
            if *registered == event {
                callback();
            }
        }
    }

    pub fn observer_count(&self) -> usize {
        self.state.observers.borrow().len()
    }

    pub fn listener_count(&self) -> usize {
        self.state.listeners.borrow().len()
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.state.storage.borrow().get(key).cloned()
    }

    /// Number of times any sink touched the host
    pub fn sink_invocations(&self) -> usize {
        self.state.logs.borrow().len()
            + self.state.beacons.borrow().len()
            + self.state.posts.borrow().len()
            + self.state.storage.borrow().len()
    }

    fn next_id(&self) -> u64 {
        let id = self.state.next_id.get() + 1;
        self.state.next_id.set(id);
        id
    }
}

impl PerformanceSource for ScriptedHost {
    fn navigation_timing(&self) -> Result<NavigationTiming> {
        self.state
            .navigation
            .borrow()
            .ok_or_else(|| TelemetryError::unsupported("performance.timing"))
    }

    fn resource_entries(&self) -> Result<Vec<ResourceEntry>> {
        self.state
            .resources
            .borrow()
            .clone()
            .ok_or_else(|| TelemetryError::unsupported("performance.getEntriesByType"))
    }

    fn memory_usage(&self) -> Option<MemoryUsage> {
        *self.state.memory.borrow()
    }

    fn connection(&self) -> Option<ConnectionInfo> {
        self.state.connection.borrow().clone()
    }

    fn observe(&self, kind: EntryKind, callback: EntryCallback) -> Result<Subscription> {
        if self.state.unsupported_kinds.borrow().contains(&kind) {
            return Err(TelemetryError::unsupported(format!(
                "entry type {} not supported",
                kind
            )));
        }

        let id = self.next_id();
        self.state.observers.borrow_mut().push((id, kind, callback));

        let state = Rc::downgrade(&self.state);
        Ok(Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.observers.borrow_mut().retain(|(i, _, _)| *i != id);
            }
        }))
    }
}

impl PageEnvironment for ScriptedHost {
    fn url(&self) -> Option<String> {
        Some("https://playground.example.com/longList".to_string())
    }

    fn user_agent(&self) -> Option<String> {
        Some("Mozilla/5.0 (scripted)".to_string())
    }

    fn now_ms(&self) -> f64 {
        self.state.now_ms.get()
    }

    fn sample(&self) -> f64 {
        self.state.draw.get()
    }

    fn on_lifecycle(
        &self,
        event: LifecycleEvent,
        callback: LifecycleCallback,
    ) -> Result<Subscription> {
        let id = self.next_id();
        self.state.listeners.borrow_mut().push((id, event, callback));

        let state = Rc::downgrade(&self.state);
        Ok(Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.listeners.borrow_mut().retain(|(i, _, _)| *i != id);
            }
        }))
    }
}

impl ConsoleOutput for ScriptedHost {
    fn log(&self, _label: &str, record: &MetricsRecord) {
        self.state.logs.borrow_mut().push(record.clone());
    }

    fn warn(&self, message: &str) {
        self.state.warnings.borrow_mut().push(message.to_string());
    }
}

impl KeyValueStore for ScriptedHost {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.storage.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        if self.state.storage_full.get() {
            return Err(TelemetryError::Storage("QuotaExceededError".to_string()));
        }
        self.state
            .storage
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl Transport for ScriptedHost {
    fn send_beacon(&self, url: &str, body: &str) -> Result<bool> {
        match self.state.beacon_mode.get() {
            Some(BeaconMode::Queue) => {
                self.state
                    .beacons
                    .borrow_mut()
                    .push((url.to_string(), body.to_string()));
                Ok(true)
            }
            Some(BeaconMode::Refuse) => Ok(false),
            Some(BeaconMode::Missing) | None => {
                Err(TelemetryError::unsupported("navigator.sendBeacon"))
            }
        }
    }

    fn post_keepalive(&self, url: &str, body: &str) -> Result<()> {
        if self.state.network_down.get() {
            return Err(TelemetryError::Transport("endpoint unreachable".to_string()));
        }
        self.state
            .posts
            .borrow_mut()
            .push((url.to_string(), body.to_string()));
        Ok(())
    }
}

/// Route collector logs to the test output; repeated calls are harmless
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Navigation timing used by the end-to-end scenario
pub fn scenario_timing() -> NavigationTiming {
    NavigationTiming {
        navigation_start: 0.0,
        domain_lookup_start: 1.0,
        domain_lookup_end: 3.0,
        connect_start: 3.0,
        connect_end: 10.0,
        request_start: 10.0,
        response_start: 50.0,
        response_end: 60.0,
        dom_content_loaded_event_end: 120.0,
        load_event_end: 200.0,
        dom_interactive: None,
    }
}

pub fn layout_shift(value: f64, had_recent_input: bool) -> PerformanceEntry {
    PerformanceEntry::LayoutShift {
        value,
        had_recent_input,
    }
}

pub fn lcp(render_time: f64) -> PerformanceEntry {
    PerformanceEntry::LargestContentfulPaint {
        render_time,
        load_time: 0.0,
    }
}

pub fn first_input(start_time: f64, processing_start: f64) -> PerformanceEntry {
    PerformanceEntry::FirstInput {
        start_time,
        processing_start,
    }
}

pub fn paint(name: &str, start_time: f64) -> PerformanceEntry {
    PerformanceEntry::Paint {
        name: name.to_string(),
        start_time,
    }
}
