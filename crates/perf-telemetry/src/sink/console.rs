//! Console sink

use std::rc::Rc;

use crate::error::Result;
use crate::host::ConsoleOutput;
use crate::record::MetricsRecord;

use super::Sink;

/// Label printed ahead of every logged record
pub const CONSOLE_LABEL: &str = "📊 Performance Metrics:";

/// Logs the full record to the host console
pub struct ConsoleSink {
    console: Rc<dyn ConsoleOutput>,
}

impl ConsoleSink {
    pub fn new(console: Rc<dyn ConsoleOutput>) -> Self {
        Self { console }
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    fn deliver(&self, record: &MetricsRecord) -> Result<()> {
        self.console.log(CONSOLE_LABEL, record);
        Ok(())
    }
}
