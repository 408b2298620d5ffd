//! WASM bindings for page performance telemetry
//!
//! Runs the `perf-telemetry` collector in the browser. The page only
//! constructs the monitor and calls `init()`; observation, sampling and
//! delivery happen in Rust.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { PerformanceMonitor } from './pkg/perf_monitor_wasm.js';
//!
//! await init();
//!
//! const monitor = new PerformanceMonitor({
//!   apiUrl: 'https://collector.example.com/perf',
//!   enableLocalStorage: true,
//!   samplingRate: 0.25,
//! });
//! monitor.init();
//!
//! // Later, on demand
//! const snapshot = monitor.getMetrics();
//! monitor.report({ lcp: 1234 });
//! monitor.destroy();
//! ```

pub mod host;
pub mod monitor;

use wasm_bindgen::prelude::*;

// Re-export main types for JavaScript
pub use host::{browser_host, BrowserHost};
pub use monitor::WebPerformanceMonitor;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
