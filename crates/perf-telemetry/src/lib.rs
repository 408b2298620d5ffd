//! Client-side page performance telemetry
//!
//! This crate collects page-load and runtime performance metrics into one
//! merged record and delivers it to configurable sinks.
//!
//! # Features
//!
//! - **Navigation timing**: DNS, TCP, request, response, TTFB, DOMContentLoaded,
//!   load and an approximate first-screen time
//! - **Web Vitals**: FCP, LCP, FID and CLS pushed by performance observers
//! - **Resources and memory**: resource count/transfer size and live JS heap usage
//! - **Sampling**: per-page-load admission against a configured rate
//! - **Sinks**: console, a capped local cache and an unload-safe remote beacon
//!
//! The browser is reached only through the traits in [`host`], so the
//! collector runs unchanged on top of `web-sys` or on scripted hosts in tests.
//!
//! # Example
//!
//! ```
//! use perf_telemetry::{Host, PerformanceMonitor, TrackingConfig};
//!
//! let config = TrackingConfig::default()
//!     .with_local_storage(true)
//!     .with_sampling_rate(0.5);
//!
//! let monitor = PerformanceMonitor::new(config, Host::unsupported());
//! monitor.init();
//!
//! // Pull the current snapshot, or push it to the sinks
//! let _snapshot = monitor.metrics();
//! monitor.report(None);
//!
//! monitor.destroy();
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod host;
pub mod record;
pub mod sink;

// Re-export main types for convenience
pub use collector::{MonitorState, NavigationTiming, PerformanceMonitor};
pub use config::TrackingConfig;
pub use error::{Result, TelemetryError};
pub use host::{
    ConnectionInfo, ConsoleOutput, EntryKind, Host, KeyValueStore, LifecycleEvent,
    PageEnvironment, PerformanceEntry, PerformanceSource, ResourceEntry, Subscription, Transport,
};
pub use record::{MemoryUsage, MetricsRecord};
pub use sink::{Reporter, Sink};
