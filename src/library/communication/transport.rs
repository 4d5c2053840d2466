//! Seams to the external PubSub transport
//!
//! The raw traits move opaque bytes and are implemented by the transport backends in
//! [`implementation`](super::implementation). The typed traits deal in [`EventFrames`](EventFrame)
//! and are usually provided through the serialization marker traits in
//! [`json`](super::implementation::json).

use super::frame::EventFrame;
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use thiserror::Error;

/// Structure which allows publishing of serialized data on a channel
#[async_trait]
pub trait RawEventPublisher {
    /// Sends an opaque payload to everybody subscribed to the channel
    async fn publish_raw(&self, channel: &str, data: &[u8]) -> EmptyResult;

    /// Establishes the connection used for publishing, if it is not already
    async fn ready(&self) -> EmptyResult;
}

/// Publisher for [`EventFrames`](EventFrame)
#[async_trait]
pub trait EventPublisher: RawEventPublisher {
    /// Publishes a frame on the channel derived from its key
    async fn publish(&self, frame: &EventFrame) -> EmptyResult;
}

/// Errors that may occur while waiting for a message on a subscription
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// The transport failed to deliver a message
    #[error("receiving message failed")]
    Transport(#[source] BoxedError),
    /// A message arrived but it is not an event frame
    #[error("message is not a valid event frame")]
    Malformed(#[source] serde_json::Error),
}

/// Subscription to a single channel yielding raw payloads
#[async_trait]
pub trait RawSubscription {
    /// Waits for the next message on the channel, `None` if the subscription has been closed
    async fn next_raw(&mut self) -> Result<Option<Vec<u8>>, BoxedError>;

    /// Stops receiving messages from the channel
    async fn unsubscribe(&mut self) -> EmptyResult;
}

/// Subscription yielding [`EventFrames`](EventFrame)
#[async_trait]
pub trait EventSubscription: RawSubscription {
    /// Waits for the next frame on the channel, `None` if the subscription has been closed
    async fn next_frame(&mut self) -> Result<Option<EventFrame>, ReceiveError>;
}

/// Entity which creates [`EventSubscriptions`](EventSubscription)
#[async_trait]
pub trait EventSubscriber {
    /// Subscription type handed out by this subscriber
    type Subscription: EventSubscription + Send + 'static;

    /// Subscribes to a channel
    ///
    /// When this returns, the subscription is confirmed by the transport and every message
    /// published on the channel afterwards will be yielded by the subscription.
    async fn subscribe(&self, channel: &str) -> Result<Self::Subscription, BoxedError>;

    /// Verifies that subscriptions can be established
    async fn ready(&self) -> EmptyResult;
}

/// Factory to provide implementations for the traits from this module
pub trait TransportFactory {
    /// [`EventPublisher`] implementation type
    type Publisher: EventPublisher + Send + Sync;
    /// [`EventSubscriber`] implementation type
    type Subscriber: EventSubscriber + Send + Sync;

    /// Instantiates a new [`EventPublisher`]
    fn publisher(&self) -> Self::Publisher;
    /// Instantiates a new [`EventSubscriber`]
    fn subscriber(&self) -> Self::Subscriber;
}
