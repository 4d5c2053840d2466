//! Trait implementations using [`redis`](::redis)
//!
//! Events are sent with `PUBLISH` over a multiplexed connection shared by all publishers
//! and received on dedicated PubSub connections, one per subscription.

mod factory;
mod publisher;
mod subscriber;

pub use factory::*;
pub use publisher::*;
pub use subscriber::*;
