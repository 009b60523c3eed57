/// Startup sequence and task wiring
///
/// Order: config -> payout address -> node client -> bus health check ->
/// empty cache -> spawn loops. Nothing touches the network until the config
/// has fully validated.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use zeroize::Zeroizing;

use crate::api::{self, ApiState};
use crate::blockchain::{self, TemplateSource};
use crate::bus::{BusError, MessageBus, Publisher};
use crate::config::{BridgeConfig, ConfigError, Settings};
use crate::relay::{PollLoop, StatusReporter, TemplateCache};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not connect to Redis: {0}")]
    Bus(#[from] BusError),
}

/// Fully wired components, ready to spawn
pub struct Bridge {
    pub settings: Settings,
    pub cache: Arc<TemplateCache>,
    pub source: Arc<dyn TemplateSource>,
    pub bus: Arc<dyn MessageBus>,
}

pub struct BridgeTasks {
    poll: JoinHandle<()>,
    status: JoinHandle<()>,
    api: Option<JoinHandle<()>>,
    bus: Arc<dyn MessageBus>,
}

/// Run the startup sequence up to and including the bus health check.
///
/// `connect_bus` receives the normalized Redis URL.
pub async fn bootstrap<F, Fut>(
    config_path: &Path,
    private_key: Option<Zeroizing<String>>,
    connect_bus: F,
) -> Result<Bridge, StartupError>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<Arc<dyn MessageBus>, BusError>>,
{
    let settings = BridgeConfig::load(config_path)?.validate(private_key.as_ref())?;
    drop(private_key);

    tracing::info!(
        "Config: node={}, network={}, interval={}s, redis={}, channel={}",
        settings.node_url,
        settings.network,
        settings.block_wait_time.as_secs(),
        settings.redis_url,
        settings.redis_channel
    );
    tracing::info!("Address: {}", settings.payout_address);

    let source = blockchain::node_source(&settings.node_url, settings.rpc_timeout, settings.extra_data.clone());

    let bus = connect_bus(settings.redis_url.clone()).await?;
    bus.ping().await?;

    Ok(Bridge {
        settings,
        cache: Arc::new(TemplateCache::new()),
        source,
        bus,
    })
}

impl Bridge {
    pub fn poll_loop(&self) -> PollLoop {
        PollLoop::new(
            self.source.clone(),
            self.cache.clone(),
            Publisher::new(self.bus.clone()),
            self.settings.payout_address.clone(),
            self.settings.redis_channel.clone(),
            self.settings.block_wait_time,
        )
    }

    pub fn status_reporter(&self) -> StatusReporter {
        StatusReporter::new(self.cache.reader(), self.settings.status_interval)
    }

    /// Launch the poll loop, the status loop and, if configured, the API
    pub fn spawn(self) -> BridgeTasks {
        let poll = tokio::spawn(self.poll_loop().run());
        let status = tokio::spawn(self.status_reporter().run());

        let api = self.settings.metrics_listen.clone().map(|listen| {
            let state = ApiState {
                cache: self.cache.reader(),
                bus: self.bus.clone(),
            };
            tokio::spawn(async move {
                if let Err(e) = api::serve(listen, state).await {
                    tracing::error!("Bridge API stopped: {}", e);
                }
            })
        });

        BridgeTasks {
            poll,
            status,
            api,
            bus: self.bus,
        }
    }
}

impl BridgeTasks {
    /// Abandon in-flight work and close the bus connection
    pub async fn shutdown(self) {
        self.poll.abort();
        self.status.abort();
        if let Some(api) = self.api {
            api.abort();
        }
        self.bus.close().await;
    }
}
