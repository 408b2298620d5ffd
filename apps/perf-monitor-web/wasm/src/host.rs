//! Browser host for the performance monitor
//!
//! Implements the `perf_telemetry` host traits on top of `web-sys`. APIs that
//! `web-sys` does not model (the legacy `performance.timing` table,
//! `performance.memory`, `navigator.connection` and the per-type fields of
//! observer entries) are read through `js_sys::Reflect`.

use js_sys::{Array, Function, Reflect};
use perf_telemetry::host::{EntryCallback, LifecycleCallback};
use perf_telemetry::{
    ConnectionInfo, ConsoleOutput, EntryKind, Host, KeyValueStore, LifecycleEvent, MemoryUsage,
    MetricsRecord, NavigationTiming, PageEnvironment, PerformanceEntry, PerformanceSource,
    ResourceEntry, Result, Subscription, TelemetryError, Transport,
};
use serde::Serialize;
use std::rc::Rc;
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Blob, BlobPropertyBag, Document, EventTarget, Performance, PerformanceObserver,
    PerformanceObserverEntryList, Request, RequestInit, VisibilityState, Window,
};

/// Host collaborators backed by the current browser window
pub struct BrowserHost {
    window: Window,
    performance: Option<Performance>,
}

/// Build a [`Host`] over `window`
///
/// Fails outside a browser window (workers, server-side rendering).
pub fn browser_host() -> Result<Host> {
    let window = web_sys::window()
        .ok_or_else(|| TelemetryError::unsupported("window"))?;
    let performance = window.performance();

    let shared = Rc::new(BrowserHost {
        window,
        performance,
    });
    Ok(Host {
        performance: shared.clone(),
        page: shared.clone(),
        console: shared.clone(),
        storage: shared.clone(),
        transport: shared,
    })
}

fn js_error(context: &str, err: JsValue) -> TelemetryError {
    let detail = err
        .as_string()
        .or_else(|| {
            err.dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{:?}", err));
    TelemetryError::Host(format!("{}: {}", context, detail))
}

fn keepalive_failure(url: &str, err: JsValue) -> String {
    format!("Failed to send metrics: {}", js_error(url, err))
}

fn property(target: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

fn number(target: &JsValue, key: &str) -> Option<f64> {
    property(target, key).and_then(|value| value.as_f64())
}

/// Convert one observer entry to its typed form
fn to_entry(kind: EntryKind, entry: &JsValue) -> Option<PerformanceEntry> {
    match kind {
        EntryKind::Paint => Some(PerformanceEntry::Paint {
            name: property(entry, "name")?.as_string()?,
            start_time: number(entry, "startTime")?,
        }),
        EntryKind::LargestContentfulPaint => Some(PerformanceEntry::LargestContentfulPaint {
            render_time: number(entry, "renderTime").unwrap_or(0.0),
            load_time: number(entry, "loadTime").unwrap_or(0.0),
        }),
        EntryKind::FirstInput => Some(PerformanceEntry::FirstInput {
            start_time: number(entry, "startTime")?,
            processing_start: number(entry, "processingStart")?,
        }),
        EntryKind::LayoutShift => Some(PerformanceEntry::LayoutShift {
            value: number(entry, "value")?,
            had_recent_input: property(entry, "hadRecentInput")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        }),
    }
}

impl BrowserHost {
    fn performance(&self) -> Result<&Performance> {
        self.performance
            .as_ref()
            .ok_or_else(|| TelemetryError::unsupported("window.performance"))
    }

    fn document(&self) -> Result<Document> {
        self.window
            .document()
            .ok_or_else(|| TelemetryError::unsupported("document"))
    }

    /// `false` only when the browser lists supported types and `kind` is absent
    fn entry_type_supported(kind: EntryKind) -> bool {
        let supported = property(&js_sys::global(), "PerformanceObserver")
            .and_then(|observer| property(&observer, "supportedEntryTypes"));
        match supported {
            Some(types) => Array::from(&types).includes(&JsValue::from_str(kind.as_str()), 0),
            None => true,
        }
    }

    /// `domInteractive` of the navigation entry, when Navigation Timing 2 is present
    fn dom_interactive(performance: &Performance) -> Option<f64> {
        let entry = performance.get_entries_by_type("navigation").get(0);
        number(&entry, "domInteractive")
    }

    fn listen(
        target: EventTarget,
        event_name: &'static str,
        closure: Closure<dyn FnMut(web_sys::Event)>,
    ) -> Result<Subscription> {
        target
            .add_event_listener_with_callback(event_name, closure.as_ref().unchecked_ref())
            .map_err(|e| js_error(event_name, e))?;

        Ok(Subscription::new(move || {
            let _ = target
                .remove_event_listener_with_callback(event_name, closure.as_ref().unchecked_ref());
            drop(closure);
        }))
    }
}

impl PerformanceSource for BrowserHost {
    fn navigation_timing(&self) -> Result<NavigationTiming> {
        let performance = self.performance()?;
        let timing = property(performance, "timing")
            .ok_or_else(|| TelemetryError::unsupported("performance.timing"))?;
        let field = |key: &str| number(&timing, key).unwrap_or(0.0);

        Ok(NavigationTiming {
            navigation_start: field("navigationStart"),
            domain_lookup_start: field("domainLookupStart"),
            domain_lookup_end: field("domainLookupEnd"),
            connect_start: field("connectStart"),
            connect_end: field("connectEnd"),
            request_start: field("requestStart"),
            response_start: field("responseStart"),
            response_end: field("responseEnd"),
            dom_content_loaded_event_end: field("domContentLoadedEventEnd"),
            load_event_end: field("loadEventEnd"),
            dom_interactive: Self::dom_interactive(performance),
        })
    }

    fn resource_entries(&self) -> Result<Vec<ResourceEntry>> {
        let entries = self.performance()?.get_entries_by_type("resource");
        Ok(entries
            .iter()
            .map(|entry| ResourceEntry {
                name: property(&entry, "name")
                    .and_then(|v| v.as_string())
                    .unwrap_or_default(),
                transfer_size: number(&entry, "transferSize"),
            })
            .collect())
    }

    fn memory_usage(&self) -> Option<MemoryUsage> {
        let memory = property(self.performance.as_ref()?, "memory")?;
        let bytes = |key: &str| number(&memory, key).map(|v| v.max(0.0) as u64);
        Some(MemoryUsage {
            used_js_heap_size: bytes("usedJSHeapSize"),
            total_js_heap_size: bytes("totalJSHeapSize"),
            js_heap_size_limit: bytes("jsHeapSizeLimit"),
        })
    }

    fn connection(&self) -> Option<ConnectionInfo> {
        let navigator = self.window.navigator();
        let connection = ["connection", "mozConnection", "webkitConnection"]
            .into_iter()
            .find_map(|key| property(&navigator, key))?;
        Some(ConnectionInfo {
            effective_type: property(&connection, "effectiveType").and_then(|v| v.as_string()),
        })
    }

    fn observe(&self, kind: EntryKind, callback: EntryCallback) -> Result<Subscription> {
        if property(&js_sys::global(), "PerformanceObserver").is_none() {
            return Err(TelemetryError::unsupported("PerformanceObserver"));
        }
        if !Self::entry_type_supported(kind) {
            return Err(TelemetryError::unsupported(format!(
                "entry type {} not supported",
                kind
            )));
        }

        let mut callback = callback;
        let closure = Closure::wrap(Box::new(move |list: PerformanceObserverEntryList| {
            let batch: Vec<PerformanceEntry> = list
                .get_entries()
                .iter()
                .filter_map(|entry| to_entry(kind, &entry))
                .collect();
            if !batch.is_empty() {
                callback(batch.as_slice());
            }
        }) as Box<dyn FnMut(PerformanceObserverEntryList)>);

        let observer = PerformanceObserver::new(closure.as_ref().unchecked_ref())
            .map_err(|e| js_error("PerformanceObserver", e))?;

        let options = js_sys::Object::new();
        Reflect::set(&options, &"type".into(), &JsValue::from_str(kind.as_str()))
            .map_err(|e| js_error("observer options", e))?;
        Reflect::set(&options, &"buffered".into(), &JsValue::TRUE)
            .map_err(|e| js_error("observer options", e))?;

        let observe: Function = Reflect::get(&observer, &"observe".into())
            .and_then(|f| f.dyn_into())
            .map_err(|e| js_error("PerformanceObserver.observe", e))?;
        observe
            .call1(&observer, &options)
            .map_err(|e| js_error(kind.as_str(), e))?;

        debug!(%kind, "performance observer registered");
        Ok(Subscription::new(move || {
            observer.disconnect();
            drop(closure);
        }))
    }
}

impl PageEnvironment for BrowserHost {
    fn url(&self) -> Option<String> {
        self.window.location().href().ok()
    }

    fn user_agent(&self) -> Option<String> {
        self.window.navigator().user_agent().ok()
    }

    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }

    fn sample(&self) -> f64 {
        js_sys::Math::random()
    }

    fn on_lifecycle(
        &self,
        event: LifecycleEvent,
        callback: LifecycleCallback,
    ) -> Result<Subscription> {
        let mut callback = callback;
        match event {
            LifecycleEvent::Hidden => {
                let document = self.document()?;
                let observed = document.clone();
                let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
                    if observed.visibility_state() == VisibilityState::Hidden {
                        callback();
                    }
                }) as Box<dyn FnMut(web_sys::Event)>);
                Self::listen(document.into(), "visibilitychange", closure)
            }
            LifecycleEvent::BeforeUnload => {
                let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
                    callback();
                }) as Box<dyn FnMut(web_sys::Event)>);
                Self::listen(self.window.clone().into(), "beforeunload", closure)
            }
        }
    }
}

impl ConsoleOutput for BrowserHost {
    fn log(&self, label: &str, record: &MetricsRecord) {
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        match record.serialize(&serializer) {
            Ok(value) => web_sys::console::log_2(&JsValue::from_str(label), &value),
            Err(e) => web_sys::console::warn_1(&format!("{} {}", label, e).into()),
        }
    }

    fn warn(&self, message: &str) {
        web_sys::console::warn_1(&JsValue::from_str(message));
    }
}

impl KeyValueStore for BrowserHost {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let storage = self
            .window
            .local_storage()
            .map_err(|e| js_error("localStorage", e))?
            .ok_or_else(|| TelemetryError::unsupported("localStorage"))?;
        storage
            .get_item(key)
            .map_err(|e| TelemetryError::Storage(js_error(key, e).to_string()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let storage = self
            .window
            .local_storage()
            .map_err(|e| js_error("localStorage", e))?
            .ok_or_else(|| TelemetryError::unsupported("localStorage"))?;
        storage
            .set_item(key, value)
            .map_err(|e| TelemetryError::Storage(js_error(key, e).to_string()))
    }
}

impl Transport for BrowserHost {
    fn send_beacon(&self, url: &str, body: &str) -> Result<bool> {
        let navigator = self.window.navigator();
        if property(&navigator, "sendBeacon").is_none() {
            return Err(TelemetryError::unsupported("navigator.sendBeacon"));
        }

        let options = BlobPropertyBag::new();
        options.set_type("application/json");
        let parts = Array::of1(&JsValue::from_str(body));
        let blob = Blob::new_with_str_sequence_and_options(&parts, &options)
            .map_err(|e| js_error("Blob", e))?;

        navigator
            .send_beacon_with_opt_blob(url, Some(&blob))
            .map_err(|e| js_error("navigator.sendBeacon", e))
    }

    fn post_keepalive(&self, url: &str, body: &str) -> Result<()> {
        let opts = RequestInit::new();
        opts.set_method("POST");
        Reflect::set(&opts, &"keepalive".into(), &JsValue::TRUE)
            .map_err(|e| TelemetryError::Transport(js_error("keepalive", e).to_string()))?;
        opts.set_body(&JsValue::from_str(body));

        let request = Request::new_with_str_and_init(url, &opts)
            .map_err(|e| TelemetryError::Transport(js_error(url, e).to_string()))?;
        request
            .headers()
            .set("Content-Type", "application/json")
            .map_err(|e| TelemetryError::Transport(js_error("headers", e).to_string()))?;

        // Fire and forget; a rejected promise is warned on the console
        let pending = JsFuture::from(self.window.fetch_with_request(&request));
        let target = url.to_string();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = pending.await {
                let message = keepalive_failure(&target, e);
                debug!(url = %target, "{}", message);
                web_sys::console::warn_1(&JsValue::from_str(&message));
            }
        });
        Ok(())
    }
}

// WASM-specific tests that run in a browser environment
#[cfg(test)]
#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use std::cell::Cell;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_browser_host_reads_page_identity() {
        let host = browser_host().unwrap();
        assert!(host.page.url().unwrap().starts_with("http"));
        assert!(!host.page.user_agent().unwrap().is_empty());
        assert!(host.page.now_ms() > 0.0);

        let draw = host.page.sample();
        assert!((0.0..1.0).contains(&draw));
    }

    #[wasm_bindgen_test]
    fn test_navigation_timing_available() {
        let host = browser_host().unwrap();
        let timing = host.performance.navigation_timing().unwrap();
        assert!(timing.navigation_start > 0.0);
    }

    #[wasm_bindgen_test]
    fn test_local_storage_roundtrip() {
        let host = browser_host().unwrap();
        host.storage.set_item("perf_monitor_test", "[1]").unwrap();
        assert_eq!(
            host.storage.get_item("perf_monitor_test").unwrap().as_deref(),
            Some("[1]")
        );
    }

    #[wasm_bindgen_test]
    fn test_hidden_listener_released() {
        let host = browser_host().unwrap();
        let fired = std::rc::Rc::new(Cell::new(0));
        let counter = fired.clone();

        let subscription = host
            .page
            .on_lifecycle(
                LifecycleEvent::BeforeUnload,
                Box::new(move || counter.set(counter.get() + 1)),
            )
            .unwrap();

        let event = web_sys::Event::new("beforeunload").unwrap();
        let window = web_sys::window().unwrap();
        window.dispatch_event(&event).unwrap();
        assert_eq!(fired.get(), 1);

        subscription.cancel();
        window.dispatch_event(&event).unwrap();
        assert_eq!(fired.get(), 1);
    }

    #[wasm_bindgen_test]
    fn test_keepalive_failure_message() {
        let message = keepalive_failure(
            "https://collector.example.com/perf",
            js_sys::TypeError::new("Failed to fetch").into(),
        );
        assert!(message.starts_with("Failed to send metrics:"));
        assert!(message.contains("https://collector.example.com/perf"));
        assert!(message.contains("Failed to fetch"));
    }

    #[wasm_bindgen_test]
    fn test_unreachable_keepalive_does_not_throw() {
        let host = browser_host().unwrap();
        assert!(host
            .transport
            .post_keepalive("http://127.0.0.1:9/perf", "{}")
            .is_ok());
    }

    #[wasm_bindgen_test]
    fn test_layout_shift_entry_conversion() {
        let entry = js_sys::Object::new();
        Reflect::set(&entry, &"value".into(), &JsValue::from_f64(0.25)).unwrap();
        Reflect::set(&entry, &"hadRecentInput".into(), &JsValue::TRUE).unwrap();

        assert_eq!(
            to_entry(EntryKind::LayoutShift, &entry),
            Some(PerformanceEntry::LayoutShift {
                value: 0.25,
                had_recent_input: true,
            })
        );
    }

    #[wasm_bindgen_test]
    fn test_lcp_entry_without_render_time() {
        let entry = js_sys::Object::new();
        Reflect::set(&entry, &"loadTime".into(), &JsValue::from_f64(812.0)).unwrap();

        assert_eq!(
            to_entry(EntryKind::LargestContentfulPaint, &entry),
            Some(PerformanceEntry::LargestContentfulPaint {
                render_time: 0.0,
                load_time: 812.0,
            })
        );
    }
}
