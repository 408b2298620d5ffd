//! Host collaborators the monitor runs on
//!
//! The monitor never talks to the browser directly. Every platform facility
//! it consumes (timing tables, performance observers, heap and connection
//! introspection, page lifecycle signals, the console, persistent storage
//! and the unload-safe transport) sits behind one of the traits below.
//! The web app implements them over `web-sys`; tests implement them with
//! scripted state.
//!
//! Everything here is single-threaded: handles are `Rc`, callbacks are
//! plain `FnMut`, and no trait requires `Send`.

use std::fmt;
use std::rc::Rc;

use crate::collector::NavigationTiming;
use crate::error::{Result, TelemetryError};
use crate::record::{MemoryUsage, MetricsRecord};

/// Observable performance entry streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Paint,
    LargestContentfulPaint,
    FirstInput,
    LayoutShift,
}

impl EntryKind {
    /// All streams the monitor subscribes to, in subscription order
    pub const ALL: [EntryKind; 4] = [
        EntryKind::Paint,
        EntryKind::LargestContentfulPaint,
        EntryKind::FirstInput,
        EntryKind::LayoutShift,
    ];

    /// The `entryType` string used by `PerformanceObserver`
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Paint => "paint",
            EntryKind::LargestContentfulPaint => "largest-contentful-paint",
            EntryKind::FirstInput => "first-input",
            EntryKind::LayoutShift => "layout-shift",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry delivered by an observation stream
#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceEntry {
    Paint {
        name: String,
        start_time: f64,
    },
    LargestContentfulPaint {
        /// Zero for cross-origin images without `Timing-Allow-Origin`
        render_time: f64,
        load_time: f64,
    },
    FirstInput {
        start_time: f64,
        processing_start: f64,
    },
    LayoutShift {
        value: f64,
        had_recent_input: bool,
    },
}

impl PerformanceEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            PerformanceEntry::Paint { .. } => EntryKind::Paint,
            PerformanceEntry::LargestContentfulPaint { .. } => EntryKind::LargestContentfulPaint,
            PerformanceEntry::FirstInput { .. } => EntryKind::FirstInput,
            PerformanceEntry::LayoutShift { .. } => EntryKind::LayoutShift,
        }
    }
}

/// One network resource timing entry
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry {
    pub name: String,
    /// `None` when the host does not expose the transfer size
    pub transfer_size: Option<f64>,
}

/// Network connection information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// `effectiveType`, e.g. "4g"
    pub effective_type: Option<String>,
}

/// Page lifecycle signals that trigger delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Visibility changed to hidden
    Hidden,
    /// The page is about to unload
    BeforeUnload,
}

/// Callback receiving one notification batch
pub type EntryCallback = Box<dyn FnMut(&[PerformanceEntry])>;

/// Callback fired on a lifecycle signal
pub type LifecycleCallback = Box<dyn FnMut()>;

/// Owned handle to a host observer or listener
///
/// The release action runs exactly once, either on [`Subscription::cancel`]
/// or on drop.
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release the underlying observer or listener
    pub fn cancel(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Performance timing and observation facilities
pub trait PerformanceSource {
    /// Navigation timing of the current document
    fn navigation_timing(&self) -> Result<NavigationTiming>;

    /// Resource timing entries recorded so far
    fn resource_entries(&self) -> Result<Vec<ResourceEntry>>;

    /// Heap usage, `None` when the host has no heap introspection
    fn memory_usage(&self) -> Option<MemoryUsage>;

    /// Connection info, `None` when the host has no connection API
    fn connection(&self) -> Option<ConnectionInfo>;

    /// Subscribe to one entry stream
    ///
    /// The callback runs later, on the host event loop, once per batch.
    fn observe(&self, kind: EntryKind, callback: EntryCallback) -> Result<Subscription>;
}

/// Page identity, clock, randomness and lifecycle signals
pub trait PageEnvironment {
    fn url(&self) -> Option<String>;

    fn user_agent(&self) -> Option<String>;

    /// Unix epoch milliseconds
    fn now_ms(&self) -> f64;

    /// Uniform draw in [0, 1)
    fn sample(&self) -> f64;

    fn on_lifecycle(
        &self,
        event: LifecycleEvent,
        callback: LifecycleCallback,
    ) -> Result<Subscription>;
}

/// Host console
pub trait ConsoleOutput {
    fn log(&self, label: &str, record: &MetricsRecord);

    fn warn(&self, message: &str);
}

/// Key-scoped persistent string store
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// One-way delivery to a remote endpoint
pub trait Transport {
    /// Queue `body` with the unload-safe primitive
    ///
    /// `Ok(false)` means the user agent refused to queue it.
    fn send_beacon(&self, url: &str, body: &str) -> Result<bool>;

    /// Issue a keep-alive POST without waiting for the response
    fn post_keepalive(&self, url: &str, body: &str) -> Result<()>;
}

/// Bundle of host collaborators
#[derive(Clone)]
pub struct Host {
    pub performance: Rc<dyn PerformanceSource>,
    pub page: Rc<dyn PageEnvironment>,
    pub console: Rc<dyn ConsoleOutput>,
    pub storage: Rc<dyn KeyValueStore>,
    pub transport: Rc<dyn Transport>,
}

impl Host {
    /// A host where every capability is missing
    ///
    /// Used outside a browser window: the monitor still constructs and
    /// every call degrades to "field absent".
    pub fn unsupported() -> Self {
        let host = Rc::new(Unsupported);
        Self {
            performance: host.clone(),
            page: host.clone(),
            console: host.clone(),
            storage: host.clone(),
            transport: host,
        }
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}

/// Host implementation with no capabilities
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupported;

impl PerformanceSource for Unsupported {
    fn navigation_timing(&self) -> Result<NavigationTiming> {
        Err(TelemetryError::unsupported("performance.timing"))
    }

    fn resource_entries(&self) -> Result<Vec<ResourceEntry>> {
        Err(TelemetryError::unsupported("performance.getEntriesByType"))
    }

    fn memory_usage(&self) -> Option<MemoryUsage> {
        None
    }

    fn connection(&self) -> Option<ConnectionInfo> {
        None
    }

    fn observe(&self, kind: EntryKind, _callback: EntryCallback) -> Result<Subscription> {
        Err(TelemetryError::unsupported(format!("PerformanceObserver ({})", kind)))
    }
}

impl PageEnvironment for Unsupported {
    fn url(&self) -> Option<String> {
        None
    }

    fn user_agent(&self) -> Option<String> {
        None
    }

    fn now_ms(&self) -> f64 {
        0.0
    }

    fn sample(&self) -> f64 {
        0.0
    }

    fn on_lifecycle(
        &self,
        event: LifecycleEvent,
        _callback: LifecycleCallback,
    ) -> Result<Subscription> {
        Err(TelemetryError::unsupported(format!("{:?} signal", event)))
    }
}

impl ConsoleOutput for Unsupported {
    fn log(&self, _label: &str, _record: &MetricsRecord) {}

    fn warn(&self, _message: &str) {}
}

impl KeyValueStore for Unsupported {
    fn get_item(&self, _key: &str) -> Result<Option<String>> {
        Err(TelemetryError::unsupported("localStorage"))
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
        Err(TelemetryError::unsupported("localStorage"))
    }
}

impl Transport for Unsupported {
    fn send_beacon(&self, _url: &str, _body: &str) -> Result<bool> {
        Err(TelemetryError::unsupported("navigator.sendBeacon"))
    }

    fn post_keepalive(&self, _url: &str, _body: &str) -> Result<()> {
        Err(TelemetryError::unsupported("fetch"))
    }
}
