//! The performance monitor
//!
//! [`PerformanceMonitor`] owns one [`MetricsRecord`] and fills it from five
//! independent sources once [`PerformanceMonitor::init`] admits the page
//! load:
//!
//! 1. navigation timing, read once
//! 2. web vitals, pushed by four observer subscriptions
//! 3. resource timing, snapshotted once
//! 4. heap usage, refreshed on every read
//! 5. connection type, read once
//!
//! Each source is fault-isolated: a failure is logged as a warning and the
//! remaining sources still run. Nothing on the public surface returns an
//! error.
//!
//! # Example
//!
//! ```
//! use perf_telemetry::{Host, PerformanceMonitor, TrackingConfig};
//!
//! let monitor = PerformanceMonitor::new(TrackingConfig::default(), Host::unsupported());
//! monitor.init();
//! let metrics = monitor.metrics();
//! assert_eq!(metrics.dns_time, None);
//! monitor.destroy();
//! ```

mod navigation;
mod vitals;

pub use navigation::NavigationTiming;
pub use vitals::VitalsTracker;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, instrument, trace};

use crate::config::TrackingConfig;
use crate::error::Result;
use crate::host::{EntryKind, Host, LifecycleEvent, PerformanceEntry, ResourceEntry, Subscription};
use crate::record::MetricsRecord;
use crate::sink::{warn_host, LocalCacheSink, Reporter};

/// Lifecycle state of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Constructed, `init` not called yet
    Idle,
    /// Observing
    Active,
    /// The sampling draw was not admitted; silent for the instance's lifetime
    SampledOut,
    /// Observation released
    Destroyed,
}

struct MonitorInner {
    config: TrackingConfig,
    host: Host,
    reporter: Reporter,
    record: Rc<RefCell<MetricsRecord>>,
    /// Shared with observer callbacks; cleared on destroy
    live: Rc<Cell<bool>>,
    state: Cell<MonitorState>,
    subscriptions: RefCell<Vec<Subscription>>,
}

/// Page performance monitor
///
/// Single-threaded: the record is mutated only from host callbacks and read
/// by [`metrics`](Self::metrics) and [`report`](Self::report), all on the
/// host event loop.
pub struct PerformanceMonitor {
    inner: Rc<MonitorInner>,
}

impl PerformanceMonitor {
    /// Create a monitor; nothing is observed until [`init`](Self::init)
    pub fn new(config: TrackingConfig, host: Host) -> Self {
        let reporter = Reporter::from_config(&config, &host);
        Self {
            inner: Rc::new(MonitorInner {
                config,
                host,
                reporter,
                record: Rc::new(RefCell::new(MetricsRecord::default())),
                live: Rc::new(Cell::new(false)),
                state: Cell::new(MonitorState::Idle),
                subscriptions: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.inner.config
    }

    pub fn state(&self) -> MonitorState {
        self.inner.state.get()
    }

    /// Number of live observer and listener subscriptions
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.borrow().len()
    }

    /// Start observing
    ///
    /// Draws once against the sampling rate. A page load that is not
    /// admitted stays silent for the lifetime of this instance. Only the
    /// first call from [`MonitorState::Idle`] has any effect.
    #[instrument(skip(self))]
    pub fn init(&self) {
        let state = self.inner.state.get();
        if state != MonitorState::Idle {
            debug!(?state, "init ignored");
            return;
        }

        let draw = self.inner.host.page.sample();
        if !self.inner.config.admits(draw) {
            debug!(
                draw,
                rate = self.inner.config.sampling_rate(),
                "page load sampled out"
            );
            self.inner.state.set(MonitorState::SampledOut);
            return;
        }

        self.inner.state.set(MonitorState::Active);
        self.inner.live.set(true);

        self.collect_context();
        self.isolate("navigation timing", || self.collect_navigation());
        self.collect_web_vitals();
        self.isolate("resource timing", || self.collect_resources());
        self.inner.refresh_memory();
        self.collect_network();
        self.register_delivery_triggers();

        debug!(
            subscriptions = self.subscription_count(),
            "performance monitor active"
        );
    }

    /// Current record with live memory figures
    ///
    /// Returns a copy; later updates do not reach it.
    pub fn metrics(&self) -> MetricsRecord {
        if self.inner.state.get() != MonitorState::SampledOut {
            self.inner.refresh_memory();
        }
        self.inner.record.borrow().clone()
    }

    /// Deliver `overrides`, or the current record, to every enabled sink
    ///
    /// Never fails and never waits on the network.
    pub fn report(&self, overrides: Option<MetricsRecord>) {
        self.inner.report(overrides);
    }

    /// Release every subscription
    ///
    /// Safe before `init` and safe to repeat. Batches the host already
    /// queued are ignored afterwards.
    #[instrument(skip(self))]
    pub fn destroy(&self) {
        if self.inner.state.get() != MonitorState::Active {
            trace!(state = ?self.inner.state.get(), "destroy is a no-op");
            return;
        }

        self.inner.live.set(false);
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.borrow_mut());
        let released = subscriptions.len();
        for subscription in subscriptions {
            subscription.cancel();
        }
        self.inner.state.set(MonitorState::Destroyed);
        debug!(released, "performance monitor destroyed");
    }

    /// Records persisted by the local cache sink, oldest first
    pub fn cached_records(&self) -> Vec<MetricsRecord> {
        match self.inner.local_cache().load() {
            Ok(records) => records,
            Err(e) => {
                self.inner.warn(&format!("Failed to read cached metrics: {}", e));
                Vec::new()
            }
        }
    }

    /// Empty the local cache
    pub fn clear_cached_records(&self) {
        if let Err(e) = self.inner.local_cache().clear() {
            self.inner.warn(&format!("Failed to clear cached metrics: {}", e));
        }
    }

    fn isolate(&self, source: &str, collect: impl FnOnce() -> Result<()>) {
        if let Err(e) = collect() {
            self.inner.warn(&format!("{} unavailable: {}", source, e));
        }
    }

    fn collect_context(&self) {
        let page = &self.inner.host.page;
        let mut record = self.inner.record.borrow_mut();
        record.url = page.url();
        record.user_agent = page.user_agent();
        record.timestamp = Some(page.now_ms().max(0.0) as u64);
    }

    fn collect_navigation(&self) -> Result<()> {
        let timing = self.inner.host.performance.navigation_timing()?;
        trace!(?timing, "navigation timing");
        timing.apply_to(&mut self.inner.record.borrow_mut());
        Ok(())
    }

    fn collect_web_vitals(&self) {
        for kind in EntryKind::ALL {
            let record = Rc::clone(&self.inner.record);
            let live = Rc::clone(&self.inner.live);
            let mut tracker = VitalsTracker::for_kind(kind);

            let callback = Box::new(move |batch: &[PerformanceEntry]| {
                if !live.get() {
                    trace!(%kind, "batch after destroy ignored");
                    return;
                }
                trace!(%kind, entries = batch.len(), "observer batch");
                tracker.apply(&mut record.borrow_mut(), batch);
            });

            match self.inner.host.performance.observe(kind, callback) {
                Ok(subscription) => self.inner.subscriptions.borrow_mut().push(subscription),
                Err(e) => self.inner.warn(&format!("{} observer failed: {}", kind, e)),
            }
        }
    }

    fn collect_resources(&self) -> Result<()> {
        let entries = self.inner.host.performance.resource_entries()?;
        let (count, size) = summarize_resources(&entries);

        let mut record = self.inner.record.borrow_mut();
        record.resource_count = Some(count);
        record.resource_size = Some(size);
        Ok(())
    }

    fn collect_network(&self) {
        if let Some(connection) = self.inner.host.performance.connection() {
            let effective_type = connection
                .effective_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "unknown".to_string());
            self.inner.record.borrow_mut().connection_type = Some(effective_type);
        }
    }

    fn register_delivery_triggers(&self) {
        for event in [LifecycleEvent::Hidden, LifecycleEvent::BeforeUnload] {
            let monitor: Weak<MonitorInner> = Rc::downgrade(&self.inner);
            let callback = Box::new(move || {
                if let Some(inner) = monitor.upgrade() {
                    debug!(?event, "delivery trigger");
                    inner.report(None);
                }
            });

            match self.inner.host.page.on_lifecycle(event, callback) {
                Ok(subscription) => self.inner.subscriptions.borrow_mut().push(subscription),
                Err(e) => self.inner.warn(&format!("{:?} trigger failed: {}", event, e)),
            }
        }
    }
}

impl MonitorInner {
    fn report(&self, overrides: Option<MetricsRecord>) {
        if self.state.get() == MonitorState::SampledOut {
            trace!("report skipped for sampled-out page load");
            return;
        }

        let record = match overrides {
            Some(record) => record,
            None => {
                self.refresh_memory();
                self.record.borrow().clone()
            }
        };

        let delivered = self.reporter.dispatch(&record);
        trace!(delivered, "report dispatched");
    }

    fn refresh_memory(&self) {
        if let Some(memory) = self.host.performance.memory_usage() {
            self.record.borrow_mut().memory_usage = Some(memory);
        }
    }

    fn local_cache(&self) -> LocalCacheSink {
        LocalCacheSink::new(self.host.storage.clone(), self.host.console.clone())
    }

    fn warn(&self, message: &str) {
        warn_host(self.host.console.as_ref(), message);
    }
}

impl Drop for PerformanceMonitor {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Count entries and sum transfer sizes, a missing size counting as zero
pub fn summarize_resources(entries: &[ResourceEntry]) -> (u64, u64) {
    let size = entries
        .iter()
        .filter_map(|entry| entry.transfer_size)
        .filter(|size| *size > 0.0)
        .map(|size| size as u64)
        .sum();
    (entries.len() as u64, size)
}
