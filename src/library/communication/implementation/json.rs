//! Serialization and deserialization provided by [`serde_json`] using marker traits
//!
//! Transport backends only move bytes. By implementing one of the marker traits in this
//! module they receive a default implementation of the corresponding typed trait which
//! translates between [`EventFrames`](EventFrame) and their JSON representation.

use super::super::frame::EventFrame;
use super::super::transport::{
    EventPublisher, EventSubscription, RawEventPublisher, RawSubscription, ReceiveError,
};
use crate::library::EmptyResult;
use async_trait::async_trait;

/// Marker trait providing a default [`EventPublisher`] implementation based on [`serde_json`]
pub trait JsonEventPublisher: RawEventPublisher + Send + Sync {}

#[async_trait]
impl<P> EventPublisher for P
where
    P: JsonEventPublisher,
{
    /// Serializes the frame using [`serde_json::to_vec`]
    async fn publish(&self, frame: &EventFrame) -> EmptyResult {
        let key = frame.key()?;
        let data = serde_json::to_vec(frame)?;
        self.publish_raw(key.channel(), &data).await
    }
}

/// Marker trait providing a default [`EventSubscription`] implementation based on [`serde_json`]
pub trait JsonSubscription: RawSubscription + Send {}

#[async_trait]
impl<S> EventSubscription for S
where
    S: JsonSubscription,
{
    /// Parses the payload using [`serde_json::from_slice`]
    async fn next_frame(&mut self) -> Result<Option<EventFrame>, ReceiveError> {
        match self.next_raw().await.map_err(ReceiveError::Transport)? {
            Some(payload) => serde_json::from_slice(&payload)
                .map(Some)
                .map_err(ReceiveError::Malformed),
            None => Ok(None),
        }
    }
}
