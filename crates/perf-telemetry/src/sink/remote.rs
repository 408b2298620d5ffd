//! Remote sink
//!
//! Sends the JSON record to the configured endpoint with the host's
//! unload-safe beacon, so delivery is still attempted while the page is
//! being torn down. When the beacon is missing, errors, or the user agent
//! refuses to queue the payload, a keep-alive POST is issued instead. No
//! response is awaited and nothing is retried.

use std::rc::Rc;

use tracing::debug;

use crate::error::Result;
use crate::host::{ConsoleOutput, Transport};
use crate::record::MetricsRecord;

use super::{warn_host, Sink};

/// How a record left the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued by the unload-safe beacon
    Beacon,
    /// Handed to a keep-alive request
    KeepAlive,
}

/// Posts records to `apiUrl`
pub struct RemoteSink {
    url: String,
    transport: Rc<dyn Transport>,
    console: Rc<dyn ConsoleOutput>,
}

impl RemoteSink {
    pub fn new(
        url: impl Into<String>,
        transport: Rc<dyn Transport>,
        console: Rc<dyn ConsoleOutput>,
    ) -> Self {
        Self {
            url: url.into(),
            transport,
            console,
        }
    }

    /// Transmit one record, reporting which path carried it
    pub fn send(&self, record: &MetricsRecord) -> Result<Delivery> {
        let body = record.to_json()?;

        match self.transport.send_beacon(&self.url, &body) {
            Ok(true) => {
                debug!(url = %self.url, bytes = body.len(), "metrics beacon queued");
                return Ok(Delivery::Beacon);
            }
            Ok(false) => {
                debug!(url = %self.url, bytes = body.len(), "beacon refused, using keep-alive request");
            }
            Err(e) if e.is_unsupported() => {
                debug!("beacon unavailable, using keep-alive request");
            }
            Err(e) => {
                warn_host(
                    self.console.as_ref(),
                    &format!("Beacon failed, using keep-alive request: {}", e),
                );
            }
        }

        self.transport.post_keepalive(&self.url, &body)?;
        Ok(Delivery::KeepAlive)
    }
}

impl Sink for RemoteSink {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn deliver(&self, record: &MetricsRecord) -> Result<()> {
        self.send(record).map(|_| ())
    }
}
