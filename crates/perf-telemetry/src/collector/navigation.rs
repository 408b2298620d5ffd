//! Navigation timing
//!
//! Durations are derived from the legacy `performance.timing` table by
//! subtracting paired timestamps. The table is immutable once the load event
//! has finished, so it is read a single time.

use serde::{Deserialize, Serialize};

use crate::record::MetricsRecord;

/// Timestamps from the navigation timing table (ms)
///
/// A timestamp the page has not reached yet is reported by browsers as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationTiming {
    pub navigation_start: f64,
    pub domain_lookup_start: f64,
    pub domain_lookup_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub response_end: f64,
    pub dom_content_loaded_event_end: f64,
    pub load_event_end: f64,
    /// `domInteractive` of the navigation entry, relative to navigation start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_interactive: Option<f64>,
}

/// `end - start`, or `None` when `end` has not been reached
///
/// An unreached timestamp reads as 0, so `end == 0` is absent even when
/// `start` is 0 as well.
fn span(start: f64, end: f64) -> Option<f64> {
    (end > 0.0 && end >= start).then(|| end - start)
}

impl NavigationTiming {
    pub fn dns_time(&self) -> Option<f64> {
        span(self.domain_lookup_start, self.domain_lookup_end)
    }

    pub fn tcp_time(&self) -> Option<f64> {
        span(self.connect_start, self.connect_end)
    }

    pub fn request_time(&self) -> Option<f64> {
        span(self.request_start, self.response_start)
    }

    pub fn response_time(&self) -> Option<f64> {
        span(self.response_start, self.response_end)
    }

    pub fn ttfb(&self) -> Option<f64> {
        span(self.navigation_start, self.response_start)
    }

    pub fn dom_content_loaded(&self) -> Option<f64> {
        span(self.navigation_start, self.dom_content_loaded_event_end)
    }

    pub fn load_complete(&self) -> Option<f64> {
        span(self.navigation_start, self.load_event_end)
    }

    /// Approximate first-screen time
    ///
    /// Minimum of DOMContentLoaded, load complete and `domInteractive`; a
    /// missing or zero `domInteractive` counts as +infinity. This is a coarse
    /// heuristic, not a first-meaningful-paint measurement.
    pub fn first_screen_time(&self) -> Option<f64> {
        let dom_interactive = self.dom_interactive.filter(|v| *v > 0.0);

        [self.dom_content_loaded(), self.load_complete(), dom_interactive]
            .into_iter()
            .flatten()
            .reduce(f64::min)
    }

    /// Write every navigation field into the record
    pub fn apply_to(&self, record: &mut MetricsRecord) {
        record.dns_time = self.dns_time();
        record.tcp_time = self.tcp_time();
        record.request_time = self.request_time();
        record.response_time = self.response_time();
        record.ttfb = self.ttfb();
        record.dom_content_loaded = self.dom_content_loaded();
        record.load_complete = self.load_complete();
        record.first_screen_time = self.first_screen_time();
    }
}
