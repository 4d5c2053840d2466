//! Connects the [`TriggerRegistry`] to a PubSub transport
//!
//! The bridge publishes events on the channel of their key and, for every local wait,
//! subscribes to the corresponding channel until the first matching frame arrives or the
//! wait settles otherwise. Each subscription is used for exactly one wait.

use super::frame::EventFrame;
use super::transport::{
    EventPublisher, EventSubscriber, EventSubscription, RawSubscription, ReceiveError,
    TransportFactory,
};
use super::trigger::{
    EventId, EventKey, Signal, Trigger, TriggerConfig, TriggerError, TriggerRegistry,
};
use super::implementation::redis::{ClientRedisFactory, RedisPublisher, RedisSubscriber};
use super::RemoteError;
use crate::library::helpers::millis_to_duration;
use crate::library::BoxedError;
use log::{debug, trace, warn};
use serde_json::Value;
use std::error::Error;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tokio::time::{timeout_at, Instant};

const FAULT_CHANNEL_SIZE: usize = 32;

/// Errors reported by the [`EventBridge`]
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The transport did not confirm the subscription
    #[error("unable to subscribe to channel {channel}")]
    SubscriptionFailed {
        /// Channel that should have been subscribed to
        channel: String,
        /// Error reported by the transport
        #[source]
        source: BoxedError,
    },
    /// The transport did not accept the event
    #[error("unable to publish on channel {channel}")]
    PublishFailed {
        /// Channel the event should have been published on
        channel: String,
        /// Error reported by the transport
        #[source]
        source: BoxedError,
    },
    /// The transport could not establish its connections
    #[error("transport is not ready")]
    NotReady(#[source] BoxedError),
    /// The wait could not be registered
    #[error(transparent)]
    Trigger(#[from] TriggerError),
}

/// Side of the transport a [`TransportFault`] originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOrigin {
    /// Publishing events
    Publisher,
    /// Receiving events
    Subscriber,
}

/// Problem with the transport that could not be reported to a caller directly
#[derive(Debug, Clone)]
pub struct TransportFault {
    /// Side of the transport which failed
    pub origin: FaultOrigin,
    /// Channel that was being operated on
    pub channel: String,
    /// Error chain of the failure
    pub error: RemoteError,
}

/// [`EventBridge`] running on top of [`RedisTransport`](super::implementation::redis::RedisTransport)
pub type RedisEventBridge =
    EventBridge<RedisPublisher<ClientRedisFactory>, RedisSubscriber<ClientRedisFactory>>;

/// Publishes events and waits for them through a PubSub transport
pub struct EventBridge<P, S> {
    registry: TriggerRegistry,
    publisher: P,
    subscriber: S,
    faults: broadcast::Sender<TransportFault>,
}

impl<P, S> EventBridge<P, S>
where
    P: EventPublisher + Send + Sync,
    S: EventSubscriber + Send + Sync,
{
    /// Creates a new bridge from raw parts
    pub fn new(publisher: P, subscriber: S, config: TriggerConfig) -> Self {
        let (faults, _) = broadcast::channel(FAULT_CHANNEL_SIZE);

        Self {
            registry: TriggerRegistry::new(config),
            publisher,
            subscriber,
            faults,
        }
    }

    /// Creates a new bridge using the publisher and subscriber of a [`TransportFactory`]
    pub fn from_factory<F>(factory: &F, config: TriggerConfig) -> Self
    where
        F: TransportFactory<Publisher = P, Subscriber = S>,
    {
        Self::new(factory.publisher(), factory.subscriber(), config)
    }

    /// Registry used to correlate incoming events
    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    /// Default timeout for waits which don't specify their own
    pub fn timeout(&self) -> Duration {
        self.registry.default_timeout()
    }

    /// Overrides the default timeout in milliseconds
    ///
    /// Values which are not finite and positive are rejected and `false` is returned.
    pub fn set_timeout(&self, millis: f64) -> bool {
        self.registry.set_default_timeout_millis(millis)
    }

    /// Receives transport failures which occur outside of a call, e.g. while listening
    pub fn faults(&self) -> broadcast::Receiver<TransportFault> {
        self.faults.subscribe()
    }

    /// Establishes the connections of both publisher and subscriber
    pub async fn ready(&self) -> Result<(), BridgeError> {
        self.publisher.ready().await.map_err(BridgeError::NotReady)?;
        self.subscriber.ready().await.map_err(BridgeError::NotReady)?;

        debug!("Transport is ready");
        Ok(())
    }

    /// Publishes an event with the given arguments
    pub async fn emit(
        &self,
        name: &str,
        id: impl Into<EventId>,
        arguments: Vec<Value>,
    ) -> Result<(), BridgeError> {
        self.publish(&EventFrame::new(name, id, arguments)).await
    }

    /// Publishes a failure for an event which makes the waiting party fail with [`TriggerError::Remote`]
    pub async fn emit_error(
        &self,
        name: &str,
        id: impl Into<EventId>,
        error: RemoteError,
    ) -> Result<(), BridgeError> {
        self.publish(&EventFrame::new(name, id, error)).await
    }

    /// Publishes a frame on the channel of its key
    pub async fn publish(&self, frame: &EventFrame) -> Result<(), BridgeError> {
        let key = frame.key().map_err(TriggerError::from)?;

        if let Err(source) = self.publisher.publish(frame).await {
            report(&self.faults, FaultOrigin::Publisher, &key, source.as_ref());

            return Err(BridgeError::PublishFailed {
                channel: key.channel().to_owned(),
                source,
            });
        }

        trace!("Emitted {}", key);
        Ok(())
    }

    /// Waits for an event to be published by somebody
    ///
    /// The subscription is confirmed before the wait is armed, so any event published after this
    /// function returns will be received. Await the returned [`Trigger`] to obtain the arguments.
    /// Omitting the timeout uses the [default](EventBridge::timeout).
    pub async fn on(
        &self,
        name: &str,
        id: impl Into<EventId>,
        timeout: Option<Duration>,
    ) -> Result<Trigger, BridgeError> {
        let key = EventKey::new(name, &id.into()).map_err(TriggerError::from)?;

        if self.registry.is_pending_key(&key) {
            return Err(TriggerError::DuplicateWait(key).into());
        }

        let mut subscription = self
            .subscriber
            .subscribe(key.channel())
            .await
            .map_err(|source| BridgeError::SubscriptionFailed {
                channel: key.channel().to_owned(),
                source,
            })?;

        let mut trigger = match self.registry.wait_for(key.clone(), timeout) {
            Ok(trigger) => trigger,
            Err(e) => {
                subscription.unsubscribe().await.ok();
                return Err(e.into());
            }
        };

        let listener = Listener {
            key,
            deadline: trigger.deadline(),
            released: trigger.on_release(),
            registry: self.registry.clone(),
            faults: self.faults.clone(),
        };

        tokio::spawn(listener.run(subscription));

        Ok(trigger)
    }

    /// Same as [`on`](EventBridge::on) with the timeout given in milliseconds
    ///
    /// Values which are not finite and positive fall back to the default timeout.
    pub async fn on_millis(
        &self,
        name: &str,
        id: impl Into<EventId>,
        timeout: f64,
    ) -> Result<Trigger, BridgeError> {
        self.on(name, id, millis_to_duration(timeout).ok()).await
    }
}

/// Background task forwarding the first frame of a subscription into the registry
struct Listener {
    key: EventKey,
    deadline: Instant,
    released: oneshot::Receiver<()>,
    registry: TriggerRegistry,
    faults: broadcast::Sender<TransportFault>,
}

impl Listener {
    async fn run<S: EventSubscription + Send>(mut self, mut subscription: S) {
        loop {
            let received = tokio::select! {
                biased;
                _ = &mut self.released => {
                    trace!("Wait for {} settled, stop listening", self.key);
                    break;
                }
                received = timeout_at(self.deadline, subscription.next_frame()) => received,
            };

            match received {
                Err(_) => {
                    trace!("Deadline of {} passed, stop listening", self.key);
                    break;
                }
                Ok(Ok(Some(frame))) => {
                    if self.forward(frame) {
                        break;
                    }
                }
                Ok(Ok(None)) => {
                    warn!("Subscription to {} closed unexpectedly", self.key);
                    break;
                }
                Ok(Err(e @ ReceiveError::Malformed(_))) => {
                    report(&self.faults, FaultOrigin::Subscriber, &self.key, &e);
                }
                Ok(Err(e)) => {
                    report(&self.faults, FaultOrigin::Subscriber, &self.key, &e);
                    break;
                }
            }
        }

        if let Err(e) = subscription.unsubscribe().await {
            report(&self.faults, FaultOrigin::Subscriber, &self.key, e.as_ref());
        }
    }

    /// Hands a frame to the registry and returns whether the subscription is used up
    fn forward(&self, frame: EventFrame) -> bool {
        let (key, signal): (EventKey, Signal) = match frame.into_parts() {
            Ok(parts) => parts,
            Err(e) => {
                report(&self.faults, FaultOrigin::Subscriber, &self.key, &e);
                return false;
            }
        };

        if key != self.key {
            warn!("Ignoring frame for {} received on channel {}", key, self.key);
            return false;
        }

        if !self.registry.deliver(&key, signal) {
            debug!("Timeout exceeded for {}, discarding late event", key);
        }

        true
    }
}

fn report(
    faults: &broadcast::Sender<TransportFault>,
    origin: FaultOrigin,
    key: &EventKey,
    error: &(dyn Error + Send + Sync + 'static),
) {
    let error = RemoteError::from(error as &(dyn Error + 'static));
    warn!("Transport fault on {} ({:?}): {}", key, origin, error);

    // Nobody listening for faults is not a fault in itself
    faults
        .send(TransportFault {
            origin,
            channel: key.channel().to_owned(),
            error,
        })
        .ok();
}
