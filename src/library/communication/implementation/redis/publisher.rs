use super::super::super::super::EmptyResult;
use super::super::super::transport::RawEventPublisher;
use super::super::json::JsonEventPublisher;
use super::RedisFactory;
use async_trait::async_trait;
use log::trace;
use redis::AsyncCommands;
use std::sync::Arc;

/// Publisher implementation using [`PUBLISH`](https://redis.io/commands/publish)
pub struct RedisPublisher<F: RedisFactory> {
    factory: Arc<F>,
}

impl<F> RedisPublisher<F>
where
    F: RedisFactory,
{
    /// Creates a new instance from a shared [`RedisFactory`]
    pub fn new(factory: Arc<F>) -> Self {
        Self { factory }
    }
}

impl<F> Clone for RedisPublisher<F>
where
    F: RedisFactory,
{
    fn clone(&self) -> Self {
        Self::new(self.factory.clone())
    }
}

impl<F> JsonEventPublisher for RedisPublisher<F> where F: RedisFactory + Send + Sync {}

#[async_trait]
impl<F> RawEventPublisher for RedisPublisher<F>
where
    F: RedisFactory + Send + Sync,
{
    async fn publish_raw(&self, channel: &str, data: &[u8]) -> EmptyResult {
        let mut con = self.factory.connection().await?;
        let receivers: usize = con.publish(channel, data).await?;

        trace!("Published to {} reaching {} subscribers", channel, receivers);

        Ok(())
    }

    async fn ready(&self) -> EmptyResult {
        let mut con = self.factory.connection().await?;
        redis::cmd("PING").query_async::<_, ()>(&mut con).await?;

        Ok(())
    }
}
