/// Status Reporter - periodic diagnostic of the cached template
///
/// Holds only a `CacheReader`, so it cannot write the cache, fetch, or publish.

use std::sync::Arc;
use std::time::Duration;

use super::cache::CacheReader;
use super::clock::{Sleeper, TokioSleeper};
use crate::blockchain::TemplateSummary;

#[derive(Debug, Clone, PartialEq)]
pub enum StatusReport {
    Empty,
    Template(TemplateSummary),
}

pub struct StatusReporter {
    reader: CacheReader,
    interval: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl StatusReporter {
    pub fn new(reader: CacheReader, interval: Duration) -> Self {
        Self {
            reader,
            interval,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn report_once(&self) -> StatusReport {
        // Summary is built from our own Arc, after the cache lock is released
        match self.reader.get() {
            Some(template) => {
                let summary = template.summary();
                tracing::info!("current block template:\n{}\n---------------------------------------", summary);
                StatusReport::Template(summary)
            }
            None => {
                tracing::info!("No block template fetched yet.");
                StatusReport::Empty
            }
        }
    }

    pub async fn run(self) {
        loop {
            self.sleeper.sleep(self.interval).await;
            self.report_once();
        }
    }
}
