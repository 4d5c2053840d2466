//! This library crate correlates named events between processes connected through a PubSub server.
//!
//! The low-level building blocks live in [`library`]: a [`TriggerRegistry`](library::communication::trigger::TriggerRegistry)
//! matching signals with local waiters and an [`EventBridge`](library::communication::bridge::EventBridge) carrying
//! events over a transport like Redis. The [`options`] module provides command line options for binaries
//! built on top of it.

#![deny(missing_docs)]
#![allow(clippy::nonstandard_macro_braces)]

pub mod library;
pub mod options;
