//! Local cache sink
//!
//! Keeps the most recent [`CACHE_CAPACITY`] records as a JSON array under
//! [`CACHE_KEY`] in the host's persistent string store. Every delivery reads
//! the array, appends, drops the oldest entries past capacity and writes it
//! back.

use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::host::{ConsoleOutput, KeyValueStore};
use crate::record::MetricsRecord;

use super::{warn_host, Sink};

/// Storage key of the cached array
pub const CACHE_KEY: &str = "performance_metrics";

/// Maximum number of cached records
pub const CACHE_CAPACITY: usize = 100;

/// Appends records to a capped array in persistent storage
pub struct LocalCacheSink {
    store: Rc<dyn KeyValueStore>,
    console: Rc<dyn ConsoleOutput>,
    capacity: usize,
}

impl LocalCacheSink {
    pub fn new(store: Rc<dyn KeyValueStore>, console: Rc<dyn ConsoleOutput>) -> Self {
        Self::with_capacity(store, console, CACHE_CAPACITY)
    }

    pub fn with_capacity(
        store: Rc<dyn KeyValueStore>,
        console: Rc<dyn ConsoleOutput>,
        capacity: usize,
    ) -> Self {
        Self {
            store,
            console,
            capacity,
        }
    }

    /// Cached records, oldest first
    ///
    /// Entries that do not parse as a record are skipped.
    pub fn load(&self) -> Result<Vec<MetricsRecord>> {
        let records = self
            .read_entries()?
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect();
        Ok(records)
    }

    /// Remove every cached record
    pub fn clear(&self) -> Result<()> {
        self.store.set_item(CACHE_KEY, "[]")
    }

    /// Raw cached entries; foreign shapes are preserved as-is
    fn read_entries(&self) -> Result<Vec<Value>> {
        let Some(stored) = self.store.get_item(CACHE_KEY)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<Value>>(&stored) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn_host(
                    self.console.as_ref(),
                    &format!("Discarding corrupted metrics cache: {}", e),
                );
                Ok(Vec::new())
            }
        }
    }
}

impl Sink for LocalCacheSink {
    fn name(&self) -> &'static str {
        "local-cache"
    }

    fn deliver(&self, record: &MetricsRecord) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.push(serde_json::to_value(record)?);

        if entries.len() > self.capacity {
            let overflow = entries.len() - self.capacity;
            entries.drain(..overflow);
        }

        let serialized = serde_json::to_string(&entries)?;
        self.store.set_item(CACHE_KEY, &serialized)?;
        debug!(cached = entries.len(), "metrics cached");
        Ok(())
    }
}
