//! Redis Pub/Sub support.
//!
//! Messages published through [`RedisService::send_message_to_channel`]
//! travel as a JSON [`ChannelMessage`] envelope carrying a unique id; plain
//! strings published by other producers are delivered untouched.
//!
//! [`RedisService::send_message_to_channel`]: crate::RedisService::send_message_to_channel

use futures::StreamExt;
use redis::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{RedisConfig, RedisError, Result};

const SUBSCRIPTION_BUFFER: usize = 100;

/// Envelope written by [`RedisService::send_message_to_channel`].
///
/// [`RedisService::send_message_to_channel`]: crate::RedisService::send_message_to_channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    /// Random v4 UUID identifying this message.
    pub message_id: String,
    /// Message body.
    pub message: String,
}

impl ChannelMessage {
    /// Wrap `message` in an envelope with a fresh id.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            message: message.into(),
        }
    }

    /// Serialize to the JSON wire form.
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A Redis Pub/Sub message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Channel name.
    pub channel: String,
    /// Message payload.
    pub payload: String,
    /// Pattern (for pattern subscriptions).
    pub pattern: Option<String>,
}

impl Message {
    /// Decode the payload as a [`ChannelMessage`] envelope.
    pub fn envelope(&self) -> Result<ChannelMessage> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// A subscription handle.
pub struct Subscription {
    receiver: mpsc::Receiver<Message>,
    channel: String,
}

impl Subscription {
    fn new(receiver: mpsc::Receiver<Message>, channel: String) -> Self {
        Self { receiver, channel }
    }

    /// Channel name or pattern this subscription listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Receive the next message.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }
}

/// Redis Pub/Sub client.
pub struct PubSub {
    client: Client,
}

impl PubSub {
    /// Create a new Pub/Sub client.
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.connection_url())
            .map_err(|e| RedisError::Connection(e.to_string()))?;
        Ok(Self { client })
    }

    async fn open(&self) -> Result<redis::aio::PubSub> {
        self.client
            .get_async_pubsub()
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))
    }

    /// Subscribe to a channel.
    pub async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let mut pubsub = self.open().await?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| RedisError::PubSub(e.to_string()))?;

        info!(channel = %channel, "Subscribed to Redis channel");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(forward(pubsub, tx, None));

        Ok(Subscription::new(rx, channel.to_string()))
    }

    /// Subscribe to a pattern.
    pub async fn psubscribe(&self, pattern: &str) -> Result<Subscription> {
        let mut pubsub = self.open().await?;
        pubsub
            .psubscribe(pattern)
            .await
            .map_err(|e| RedisError::PubSub(e.to_string()))?;

        info!(pattern = %pattern, "Subscribed to Redis pattern");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(forward(pubsub, tx, Some(pattern.to_string())));

        Ok(Subscription::new(rx, pattern.to_string()))
    }

    /// Publish a raw message to a channel, returning the receiver count.
    pub async fn publish(&self, channel: &str, message: &str) -> Result<u32> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))?;

        let receivers: u32 = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(message)
            .query_async(&mut conn)
            .await
            .map_err(|e| RedisError::Command(e.to_string()))?;

        debug!(channel = %channel, receivers = receivers, "Published message");

        Ok(receivers)
    }
}

async fn forward(
    mut pubsub: redis::aio::PubSub,
    tx: mpsc::Sender<Message>,
    pattern: Option<String>,
) {
    while let Some(msg) = pubsub.on_message().next().await {
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "Failed to get message payload");
                continue;
            }
        };

        let message = Message {
            channel: msg.get_channel_name().to_string(),
            payload,
            pattern: pattern.clone(),
        };

        debug!(channel = %message.channel, "Received pub/sub message");

        if tx.send(message).await.is_err() {
            debug!("Subscription receiver dropped");
            break;
        }
    }
}
