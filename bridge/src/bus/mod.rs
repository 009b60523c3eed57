/// Message bus - template serialization and pub/sub publication

pub mod redis;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::blockchain::BlockTemplate;

pub use self::redis::RedisBus;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("health check failed: got {0}")]
    UnexpectedPong(String),
    #[error("bus connection is closed")]
    Closed,
    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize template: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to publish template: {0}")]
    Transport(#[from] BusError),
}

/// Pub/sub transport the bridge publishes through
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Health check; must succeed before the relay starts
    async fn ping(&self) -> Result<(), BusError>;

    /// Publish `payload` on `channel`, returning the number of receivers
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<usize, BusError>;

    async fn close(&self);
}

/// Serializes templates and hands them to the bus
#[derive(Clone)]
pub struct Publisher {
    bus: Arc<dyn MessageBus>,
}

impl Publisher {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }

    pub async fn publish(&self, channel: &str, template: &BlockTemplate) -> Result<usize, PublishError> {
        let payload = encode_template(template)?;
        let receivers = self.bus.publish(channel, payload).await?;
        Ok(receivers)
    }
}

/// Canonical wire encoding of a template
pub fn encode_template(template: &BlockTemplate) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(template)
}
