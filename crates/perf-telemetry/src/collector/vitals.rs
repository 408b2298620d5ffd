//! Web Vitals update policies
//!
//! Each observation stream maps to one record field and one policy:
//!
//! | stream | field | policy |
//! |---|---|---|
//! | paint | `fcp` | `first-contentful-paint` entry, set once |
//! | largest-contentful-paint | `lcp` | last entry of each batch, always overwrite |
//! | first-input | `fid` | first entry ever seen, never overwrite |
//! | layout-shift | `cls` | running sum of shifts without recent input |

use crate::host::{EntryKind, PerformanceEntry};
use crate::record::MetricsRecord;

const FIRST_CONTENTFUL_PAINT: &str = "first-contentful-paint";

/// Per-stream state applied to each notification batch
#[derive(Debug, Clone, PartialEq)]
pub enum VitalsTracker {
    FirstContentfulPaint,
    LargestContentfulPaint,
    FirstInputDelay,
    CumulativeLayoutShift { total: f64 },
}

impl VitalsTracker {
    pub fn for_kind(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Paint => Self::FirstContentfulPaint,
            EntryKind::LargestContentfulPaint => Self::LargestContentfulPaint,
            EntryKind::FirstInput => Self::FirstInputDelay,
            EntryKind::LayoutShift => Self::CumulativeLayoutShift { total: 0.0 },
        }
    }

    /// Fold one batch into the record
    pub fn apply(&mut self, record: &mut MetricsRecord, batch: &[PerformanceEntry]) {
        match self {
            Self::FirstContentfulPaint => {
                if record.fcp.is_some() {
                    return;
                }
                record.fcp = batch.iter().find_map(|entry| match entry {
                    PerformanceEntry::Paint { name, start_time } if name == FIRST_CONTENTFUL_PAINT => {
                        Some(*start_time)
                    }
                    _ => None,
                });
            }
            Self::LargestContentfulPaint => {
                let last = batch.iter().rev().find_map(|entry| match entry {
                    PerformanceEntry::LargestContentfulPaint {
                        render_time,
                        load_time,
                    } => Some(if *render_time > 0.0 {
                        *render_time
                    } else {
                        *load_time
                    }),
                    _ => None,
                });
                if let Some(value) = last {
                    record.lcp = Some(value);
                }
            }
            Self::FirstInputDelay => {
                if record.fid.is_some() {
                    return;
                }
                record.fid = batch.iter().find_map(|entry| match entry {
                    PerformanceEntry::FirstInput {
                        start_time,
                        processing_start,
                    } => Some(processing_start - start_time),
                    _ => None,
                });
            }
            Self::CumulativeLayoutShift { total } => {
                for entry in batch {
                    if let PerformanceEntry::LayoutShift {
                        value,
                        had_recent_input: false,
                    } = entry
                    {
                        *total += value;
                    }
                }
                record.cls = Some(*total);
            }
        }
    }
}
