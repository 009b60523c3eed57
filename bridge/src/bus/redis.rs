/// Redis pub/sub transport
///
/// Uses redis::aio::ConnectionManager, which reconnects on its own after a
/// dropped connection; a failed publish surfaces as an error for that one
/// call only.

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::RwLock;

use super::{BusError, MessageBus};
use crate::metrics::prometheus as metrics;

pub struct RedisBus {
    url: String,
    connection: RwLock<Option<redis::aio::ConnectionManager>>,
}

impl RedisBus {
    /// Open a managed connection to `url` (`redis://host:port/`)
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;

        tracing::info!("Connected to Redis at {}", url);

        Ok(Self {
            url: url.to_string(),
            connection: RwLock::new(Some(manager)),
        })
    }

    async fn connection(&self) -> Result<redis::aio::ConnectionManager, BusError> {
        self.connection.read().await.clone().ok_or(BusError::Closed)
    }

    async fn publish_inner(&self, channel: &str, payload: Vec<u8>) -> Result<usize, BusError> {
        let mut conn = self.connection().await?;
        let receivers: usize = conn.publish(channel, payload).await?;
        Ok(receivers)
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn ping(&self) -> Result<(), BusError> {
        let mut conn = self.connection().await?;
        let result = redis::cmd("PING").query_async::<_, String>(&mut conn).await;

        let pong = match result {
            Ok(pong) => pong,
            Err(e) => {
                metrics::set_redis_up(false);
                return Err(e.into());
            }
        };

        if pong != "PONG" {
            metrics::set_redis_up(false);
            return Err(BusError::UnexpectedPong(pong));
        }

        metrics::set_redis_up(true);
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<usize, BusError> {
        let result = self.publish_inner(channel, payload).await;
        metrics::set_redis_up(result.is_ok());
        result
    }

    async fn close(&self) {
        if self.connection.write().await.take().is_some() {
            tracing::info!("Closed Redis connection to {}", self.url);
        }
    }
}
