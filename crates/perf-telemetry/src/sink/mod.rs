//! Report delivery
//!
//! A [`Reporter`] fans one [`MetricsRecord`] out to every sink enabled by the
//! [`TrackingConfig`]:
//!
//! - **Console**: logs the full record
//! - **Local cache**: appends to a capped JSON array in persistent storage
//! - **Remote**: one-way transmission to `apiUrl` that survives page unload
//!
//! Sinks fail independently. A failing sink is logged and skipped; the
//! others still run and nothing is returned to the caller.

mod console;
mod local_cache;
mod remote;

use std::rc::Rc;

use tracing::{trace, warn};

use crate::config::TrackingConfig;
use crate::error::Result;
use crate::host::{ConsoleOutput, Host};
use crate::record::MetricsRecord;

pub use console::{ConsoleSink, CONSOLE_LABEL};
pub use local_cache::{LocalCacheSink, CACHE_CAPACITY, CACHE_KEY};
pub use remote::{Delivery, RemoteSink};

/// A destination for metrics records
pub trait Sink {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Deliver one record
    fn deliver(&self, record: &MetricsRecord) -> Result<()>;
}

/// Fans records out to the enabled sinks
pub struct Reporter {
    sinks: Vec<Box<dyn Sink>>,
    console: Rc<dyn ConsoleOutput>,
}

impl Reporter {
    /// Assemble the sinks enabled by `config` on `host`
    pub fn from_config(config: &TrackingConfig, host: &Host) -> Self {
        let mut sinks: Vec<Box<dyn Sink>> = Vec::new();

        if config.enable_console {
            sinks.push(Box::new(ConsoleSink::new(host.console.clone())));
        }
        if config.enable_local_storage {
            sinks.push(Box::new(LocalCacheSink::new(
                host.storage.clone(),
                host.console.clone(),
            )));
        }
        if let Some(url) = config.api_url() {
            sinks.push(Box::new(RemoteSink::new(
                url,
                host.transport.clone(),
                host.console.clone(),
            )));
        }

        Self::new(sinks, host.console.clone())
    }

    /// Build a reporter from explicit sinks; failures are warned on `console`
    pub fn new(sinks: Vec<Box<dyn Sink>>, console: Rc<dyn ConsoleOutput>) -> Self {
        Self { sinks, console }
    }

    /// Names of the assembled sinks, in delivery order
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    /// Deliver to every sink, returning how many succeeded
    pub fn dispatch(&self, record: &MetricsRecord) -> usize {
        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.deliver(record) {
                Ok(()) => {
                    trace!(sink = sink.name(), "delivered");
                    delivered += 1;
                }
                Err(e) => {
                    let message = format!("Failed to deliver metrics to {} sink: {}", sink.name(), e);
                    warn_host(self.console.as_ref(), &message);
                }
            }
        }
        delivered
    }
}

/// Warn through `tracing` and on the host console
pub(crate) fn warn_host(console: &dyn ConsoleOutput, message: &str) {
    warn!("{}", message);
    console.warn(message);
}
