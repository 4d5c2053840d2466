//! Process-local transport
//!
//! Delivers published payloads to every subscription of the same channel within the
//! current process. Useful as a loopback for tests and for single-process deployments.

use super::super::transport::{
    EventSubscriber, RawEventPublisher, RawSubscription, TransportFactory,
};
use super::json::{JsonEventPublisher, JsonSubscription};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use log::trace;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

type Subscribers = HashMap<String, Vec<(u64, mpsc::UnboundedSender<Vec<u8>>)>>;

#[derive(Default)]
struct Hub {
    subscribers: Subscribers,
    next_id: u64,
}

/// In-memory PubSub hub acting as both publisher and subscriber
///
/// Clones share the same hub.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    hub: Arc<Mutex<Hub>>,
}

impl MemoryTransport {
    /// Creates a hub without any subscriptions
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active subscriptions on the given channel
    pub fn subscriptions(&self, channel: &str) -> usize {
        lock(&self.hub)
            .subscribers
            .get(channel)
            .map(Vec::len)
            .unwrap_or_default()
    }
}

fn lock(hub: &Mutex<Hub>) -> MutexGuard<'_, Hub> {
    hub.lock().unwrap_or_else(PoisonError::into_inner)
}

fn remove_subscription(hub: &Mutex<Hub>, channel: &str, id: u64) {
    let mut hub = lock(hub);

    if let Some(subscribers) = hub.subscribers.get_mut(channel) {
        subscribers.retain(|(subscriber, _)| *subscriber != id);

        if subscribers.is_empty() {
            hub.subscribers.remove(channel);
        }
    }
}

#[async_trait]
impl RawEventPublisher for MemoryTransport {
    async fn publish_raw(&self, channel: &str, data: &[u8]) -> EmptyResult {
        let mut hub = lock(&self.hub);

        if let Some(subscribers) = hub.subscribers.get_mut(channel) {
            subscribers.retain(|(_, sender)| sender.send(data.to_vec()).is_ok());
            trace!("Published to {} reaching {} subscribers", channel, subscribers.len());
        }

        Ok(())
    }

    async fn ready(&self) -> EmptyResult {
        Ok(())
    }
}

impl JsonEventPublisher for MemoryTransport {}

#[async_trait]
impl EventSubscriber for MemoryTransport {
    type Subscription = MemorySubscription;

    async fn subscribe(&self, channel: &str) -> Result<Self::Subscription, BoxedError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut hub = lock(&self.hub);
        let id = hub.next_id;
        hub.next_id += 1;

        hub.subscribers
            .entry(channel.to_owned())
            .or_default()
            .push((id, sender));

        Ok(MemorySubscription {
            hub: self.hub.clone(),
            channel: channel.to_owned(),
            id,
            receiver,
        })
    }

    async fn ready(&self) -> EmptyResult {
        Ok(())
    }
}

impl TransportFactory for MemoryTransport {
    type Publisher = MemoryTransport;
    type Subscriber = MemoryTransport;

    fn publisher(&self) -> Self::Publisher {
        self.clone()
    }

    fn subscriber(&self) -> Self::Subscriber {
        self.clone()
    }
}

/// Subscription to a channel of a [`MemoryTransport`]
pub struct MemorySubscription {
    hub: Arc<Mutex<Hub>>,
    channel: String,
    id: u64,
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

#[async_trait]
impl RawSubscription for MemorySubscription {
    async fn next_raw(&mut self) -> Result<Option<Vec<u8>>, BoxedError> {
        Ok(self.receiver.recv().await)
    }

    async fn unsubscribe(&mut self) -> EmptyResult {
        remove_subscription(&self.hub, &self.channel, self.id);
        self.receiver.close();
        Ok(())
    }
}

impl JsonSubscription for MemorySubscription {}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        remove_subscription(&self.hub, &self.channel, self.id);
    }
}
