use super::super::super::super::BoxedError;
use super::{RedisPublisher, RedisSubscriber};
use crate::library::communication::transport::TransportFactory;
use async_trait::async_trait;
use log::debug;
use redis::aio::{MultiplexedConnection, PubSub};
use redis::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Factory for the two kinds of redis connections used by the transport
#[async_trait]
pub trait RedisFactory {
    /// Creates a new, dedicated PubSub connection
    async fn pubsub(&self) -> Result<PubSub, BoxedError>;

    /// Retrieves a connection shared between all publishers, establishing it if necessary
    async fn connection(&self) -> Result<MultiplexedConnection, BoxedError>;
}

/// [`RedisFactory`] implementation opening connections with a [`redis::Client`]
pub struct ClientRedisFactory {
    client: Client,
    shared: Mutex<Option<MultiplexedConnection>>,
}

impl ClientRedisFactory {
    /// Creates a new factory opening connections to the given URL
    ///
    /// No connection is established until one is requested.
    pub fn open(url: &str) -> Result<Self, BoxedError> {
        Ok(Self {
            client: Client::open(url)?,
            shared: Mutex::new(None),
        })
    }
}

#[async_trait]
impl RedisFactory for ClientRedisFactory {
    async fn pubsub(&self) -> Result<PubSub, BoxedError> {
        let connection = self.client.get_async_connection().await?;
        Ok(connection.into_pubsub())
    }

    async fn connection(&self) -> Result<MultiplexedConnection, BoxedError> {
        let mut shared = self.shared.lock().await;

        if let Some(connection) = shared.as_ref() {
            return Ok(connection.clone());
        }

        debug!("Establishing shared redis connection");
        let connection = self.client.get_multiplexed_tokio_connection().await?;
        *shared = Some(connection.clone());

        Ok(connection)
    }
}

/// Transport factory based on [`ClientRedisFactory`]
#[derive(Clone)]
pub struct RedisTransport {
    factory: Arc<ClientRedisFactory>,
}

impl RedisTransport {
    /// Creates a new instance which connects to the given URL
    pub fn open(url: &str) -> Result<Self, BoxedError> {
        Ok(Self {
            factory: Arc::new(ClientRedisFactory::open(url)?),
        })
    }
}

impl TransportFactory for RedisTransport {
    type Publisher = RedisPublisher<ClientRedisFactory>;
    type Subscriber = RedisSubscriber<ClientRedisFactory>;

    fn publisher(&self) -> Self::Publisher {
        Self::Publisher::new(self.factory.clone())
    }

    fn subscriber(&self) -> Self::Subscriber {
        Self::Subscriber::new(self.factory.clone())
    }
}
