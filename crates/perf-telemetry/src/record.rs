//! The merged metrics record
//!
//! [`MetricsRecord`] is the single structure every collection source writes
//! into and every sink reads from. Its JSON form is the wire and cache
//! format, so field names are fixed.

use serde::{Deserialize, Serialize};

/// JS heap figures from the host's memory introspection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    #[serde(rename = "usedJSHeapSize", skip_serializing_if = "Option::is_none")]
    pub used_js_heap_size: Option<u64>,
    #[serde(rename = "totalJSHeapSize", skip_serializing_if = "Option::is_none")]
    pub total_js_heap_size: Option<u64>,
    #[serde(rename = "jsHeapSizeLimit", skip_serializing_if = "Option::is_none")]
    pub js_heap_size_limit: Option<u64>,
}

/// Page performance snapshot
///
/// Every field is optional: `None` means the value is not observable in this
/// environment (or not observed yet), never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRecord {
    // Navigation timing (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttfb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_content_loaded: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_complete: Option<f64>,
    /// Heuristic, see [`crate::collector::NavigationTiming::first_screen_time`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_screen_time: Option<f64>,

    // Web vitals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cls: Option<f64>,

    // Resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_count: Option<u64>,
    /// Sum of transfer sizes in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<MemoryUsage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,

    // Identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Unix epoch milliseconds at init
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl MetricsRecord {
    /// True when no field has been populated
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Serialize to the wire format
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
