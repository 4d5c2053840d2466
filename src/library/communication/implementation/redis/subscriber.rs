use super::super::super::super::{BoxedError, EmptyResult};
use super::super::super::transport::{EventSubscriber, RawSubscription};
use super::super::json::JsonSubscription;
use super::RedisFactory;
use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use redis::aio::PubSub;
use std::sync::Arc;

/// Subscriber implementation using [`SUBSCRIBE`](https://redis.io/commands/subscribe)
///
/// Every subscription runs on its own PubSub connection so that it can be torn
/// down independently of all others.
pub struct RedisSubscriber<F: RedisFactory> {
    factory: Arc<F>,
}

impl<F> RedisSubscriber<F>
where
    F: RedisFactory,
{
    /// Creates a new instance from a shared [`RedisFactory`]
    pub fn new(factory: Arc<F>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl<F> EventSubscriber for RedisSubscriber<F>
where
    F: RedisFactory + Send + Sync,
{
    type Subscription = RedisSubscription;

    async fn subscribe(&self, channel: &str) -> Result<Self::Subscription, BoxedError> {
        let mut pubsub = self.factory.pubsub().await?;

        // Resolves once redis confirmed the subscription
        pubsub.subscribe(channel).await?;
        debug!("Subscribed to {}", channel);

        Ok(RedisSubscription {
            pubsub,
            channel: channel.to_owned(),
        })
    }

    async fn ready(&self) -> EmptyResult {
        self.factory.pubsub().await?;
        Ok(())
    }
}

/// Subscription to a single redis PubSub channel
pub struct RedisSubscription {
    pubsub: PubSub,
    channel: String,
}

#[async_trait]
impl RawSubscription for RedisSubscription {
    async fn next_raw(&mut self) -> Result<Option<Vec<u8>>, BoxedError> {
        let mut messages = Box::pin(self.pubsub.on_message());
        let message = messages.next().await;

        Ok(message.map(|message| message.get_payload_bytes().to_vec()))
    }

    async fn unsubscribe(&mut self) -> EmptyResult {
        self.pubsub.unsubscribe(&self.channel).await?;
        debug!("Unsubscribed from {}", self.channel);

        Ok(())
    }
}

impl JsonSubscription for RedisSubscription {}
