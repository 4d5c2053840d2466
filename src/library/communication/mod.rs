//! Correlation of events between processes
//!
//! A process waiting for something to happen elsewhere registers a wait for an event
//! identified by a name and id. Some other party, possibly on a different machine, later
//! publishes that event together with a list of arguments. The first matching event
//! settles the wait, and a wait that sees no event before its deadline fails with a timeout.
//!
//! Local correlation is handled by the [`TriggerRegistry`](trigger::TriggerRegistry) in
//! the [`trigger`] module. The [`EventBridge`](bridge::EventBridge) connects the registry
//! to a PubSub transport described by the traits in [`transport`], with implementations
//! living in [`implementation`]. Events travel as [`EventFrames`](frame::EventFrame).

mod error;

pub mod bridge;
pub mod frame;
pub mod implementation;
pub mod transport;
pub mod trigger;

pub use error::RemoteError;
