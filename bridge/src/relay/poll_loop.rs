/// Poll Loop - fetch templates from kaspad, cache them, publish them
///
/// One cycle: fetch -> cache -> publish -> sleep. A failed fetch skips
/// straight to the sleep; the next cycle is the retry. The cache is written
/// before the publish so local readers never depend on Redis being up.

use std::sync::Arc;
use std::time::Duration;

use super::cache::TemplateCache;
use super::clock::{Sleeper, TokioSleeper};
use crate::blockchain::TemplateSource;
use crate::bus::Publisher;
use crate::metrics::prometheus as metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published { receivers: usize },
    PublishFailed,
    FetchFailed,
}

pub struct PollLoop {
    source: Arc<dyn TemplateSource>,
    cache: Arc<TemplateCache>,
    publisher: Publisher,
    pay_address: String,
    channel: String,
    wait: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl PollLoop {
    pub fn new(
        source: Arc<dyn TemplateSource>,
        cache: Arc<TemplateCache>,
        publisher: Publisher,
        pay_address: String,
        channel: String,
        wait: Duration,
    ) -> Self {
        tracing::info!(
            "PollLoop: address={}, channel={}, interval={}s",
            pay_address,
            channel,
            wait.as_secs()
        );

        Self {
            source,
            cache,
            publisher,
            pay_address,
            channel,
            wait,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn wait_interval(&self) -> Duration {
        self.wait
    }

    /// Fetch, cache and publish once; does not sleep
    pub async fn run_cycle(&self) -> CycleOutcome {
        let template = match self.source.get_block_template(&self.pay_address).await {
            Ok(template) => Arc::new(template),
            Err(e) => {
                metrics::inc_template_fetch_errors();
                tracing::error!("error fetching block template: {}", e);
                return CycleOutcome::FetchFailed;
            }
        };

        metrics::inc_template_fetches();
        metrics::set_template_cached(template.block.header.daa_score);
        if !template.is_synced {
            tracing::warn!(
                "kaspad reports it is not synced (DAA score {})",
                template.block.header.daa_score
            );
        }
        self.cache.set(template.clone());

        match self.publisher.publish(&self.channel, &template).await {
            Ok(receivers) => {
                metrics::inc_template_publishes();
                tracing::info!(
                    "template published to Redis channel {} (DAA score {}, {} receivers)",
                    self.channel,
                    template.block.header.daa_score,
                    receivers
                );
                CycleOutcome::Published { receivers }
            }
            Err(e) => {
                metrics::inc_template_publish_errors();
                tracing::error!("error publishing template: {}", e);
                CycleOutcome::PublishFailed
            }
        }
    }

    /// One full cycle including the sleep
    pub async fn step(&self) -> CycleOutcome {
        let outcome = self.run_cycle().await;
        self.sleeper.sleep(self.wait).await;
        outcome
    }

    /// Run for the lifetime of the process
    pub async fn run(self) {
        loop {
            self.step().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::template::tests::tagged_template;
    use crate::blockchain::{BlockTemplate, FetchError};
    use crate::bus::tests::RecordingBus;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedSource {
        script: Mutex<VecDeque<Result<BlockTemplate, FetchError>>>,
        addresses: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<BlockTemplate, FetchError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                addresses: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TemplateSource for ScriptedSource {
        async fn get_block_template(&self, pay_address: &str) -> Result<BlockTemplate, FetchError> {
            self.addresses.lock().push(pay_address.to_string());
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Transport("script exhausted".to_string())))
        }
    }

    #[derive(Default)]
    struct CountingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for CountingSleeper {
        async fn sleep(&self, period: Duration) {
            self.sleeps.lock().push(period);
        }
    }

    fn poll_loop(source: Arc<ScriptedSource>, bus: Arc<RecordingBus>, cache: Arc<TemplateCache>) -> PollLoop {
        PollLoop::new(
            source,
            cache,
            Publisher::new(bus),
            "kaspa:qtest".to_string(),
            "templates".to_string(),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_cycle_caches_then_publishes() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(tagged_template(1))]));
        let bus = Arc::new(RecordingBus::default());
        let cache = Arc::new(TemplateCache::new());
        let poll = poll_loop(source.clone(), bus.clone(), cache.clone());

        assert_eq!(poll.run_cycle().await, CycleOutcome::Published { receivers: 1 });
        assert_eq!(*cache.get().unwrap(), tagged_template(1));
        assert_eq!(bus.published.lock().len(), 1);
        assert_eq!(source.addresses.lock().as_slice(), ["kaspa:qtest".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_cache_and_bus_untouched() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(tagged_template(1)),
            Err(FetchError::Http(503)),
        ]));
        let bus = Arc::new(RecordingBus::default());
        let cache = Arc::new(TemplateCache::new());
        let poll = poll_loop(source, bus.clone(), cache.clone());

        poll.run_cycle().await;
        assert_eq!(poll.run_cycle().await, CycleOutcome::FetchFailed);

        assert_eq!(cache.get().unwrap().block.header.daa_score, 1);
        assert_eq!(bus.published.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_cached_template() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(tagged_template(3))]));
        let bus = Arc::new(RecordingBus { fail_publish: true, ..Default::default() });
        let cache = Arc::new(TemplateCache::new());
        let poll = poll_loop(source, bus, cache.clone());

        assert_eq!(poll.run_cycle().await, CycleOutcome::PublishFailed);
        assert_eq!(*cache.get().unwrap(), tagged_template(3));
    }

    #[tokio::test]
    async fn test_every_cycle_sleeps_the_wait_interval() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(FetchError::Timeout(Duration::from_secs(30))),
            Ok(tagged_template(1)),
        ]));
        let bus = Arc::new(RecordingBus { fail_publish: true, ..Default::default() });
        let sleeper = Arc::new(CountingSleeper::default());
        let poll = poll_loop(source, bus, Arc::new(TemplateCache::new())).with_sleeper(sleeper.clone());

        assert_eq!(poll.step().await, CycleOutcome::FetchFailed);
        assert_eq!(poll.step().await, CycleOutcome::PublishFailed);

        assert_eq!(sleeper.sleeps.lock().as_slice(), [Duration::from_secs(2); 2]);
    }
}
