//! JavaScript-facing `PerformanceMonitor` class

use perf_telemetry::{Host, MetricsRecord, PerformanceMonitor, TrackingConfig};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::host::browser_host;

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value.serialize(&serializer)
}

/// Convert for JavaScript, warning and returning `fallback` instead of throwing
fn to_js_or<T: Serialize>(value: &T, what: &str, fallback: impl FnOnce() -> JsValue) -> JsValue {
    to_js(value).unwrap_or_else(|e| {
        warn(&format!("Failed to convert {}: {}", what, e));
        fallback()
    })
}

fn warn(message: &str) {
    web_sys::console::warn_1(&JsValue::from_str(message));
}

/// Parse the options object passed to the constructor
///
/// `undefined` and `null` give the defaults. An options object of the wrong
/// shape is warned about and also falls back to the defaults.
fn parse_config(options: JsValue) -> TrackingConfig {
    if options.is_undefined() || options.is_null() {
        return TrackingConfig::default();
    }
    match serde_wasm_bindgen::from_value(options) {
        Ok(config) => config,
        Err(e) => {
            warn(&format!("Invalid performance monitor options, using defaults: {}", e));
            TrackingConfig::default()
        }
    }
}

/// Page performance monitor exported to JavaScript
///
/// ```javascript
/// import init, { PerformanceMonitor } from './pkg/perf_monitor_wasm.js';
///
/// await init();
/// const monitor = new PerformanceMonitor({ apiUrl: '/api/perf', samplingRate: 0.1 });
/// monitor.init();
/// console.table(monitor.getMetrics());
/// ```
#[wasm_bindgen(js_name = PerformanceMonitor)]
pub struct WebPerformanceMonitor {
    inner: PerformanceMonitor,
}

#[wasm_bindgen(js_class = PerformanceMonitor)]
impl WebPerformanceMonitor {
    /// Create a monitor from a `{ apiUrl, enableConsole, enableLocalStorage, samplingRate }` object
    ///
    /// Never throws. Outside a browser window every capability is treated
    /// as missing.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> WebPerformanceMonitor {
        let config = parse_config(options);
        let host = browser_host().unwrap_or_else(|e| {
            warn(&format!("Performance monitor running without a browser host: {}", e));
            Host::unsupported()
        });

        Self {
            inner: PerformanceMonitor::new(config, host),
        }
    }

    /// Start observing, subject to the sampling rate
    pub fn init(&self) {
        self.inner.init();
    }

    /// Copy of the current metrics record
    #[wasm_bindgen(js_name = getMetrics)]
    pub fn get_metrics(&self) -> JsValue {
        to_js_or(&self.inner.metrics(), "metrics", || js_sys::Object::new().into())
    }

    /// Deliver `overrides` (a partial record) or the current record
    pub fn report(&self, overrides: JsValue) {
        if overrides.is_undefined() || overrides.is_null() {
            self.inner.report(None);
            return;
        }

        match serde_wasm_bindgen::from_value::<MetricsRecord>(overrides) {
            Ok(record) => self.inner.report(Some(record)),
            Err(e) => warn(&format!("Ignoring unparseable metrics override: {}", e)),
        }
    }

    /// Stop observing; safe to call repeatedly
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    /// Records kept by the local cache, oldest first
    #[wasm_bindgen(js_name = cachedMetrics)]
    pub fn cached_metrics(&self) -> JsValue {
        to_js_or(&self.inner.cached_records(), "cached metrics", || {
            js_sys::Array::new().into()
        })
    }

    /// Empty the local cache
    #[wasm_bindgen(js_name = clearCachedMetrics)]
    pub fn clear_cached_metrics(&self) {
        self.inner.clear_cached_records();
    }

    /// Configuration with defaults filled in
    #[wasm_bindgen(getter)]
    pub fn config(&self) -> JsValue {
        to_js_or(self.inner.config(), "config", || js_sys::Object::new().into())
    }
}
