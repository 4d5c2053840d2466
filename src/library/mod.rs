//! Independent and project agnostic libraries
//!
//! The [`communication`] module contains the trigger correlation engine and the
//! bridge connecting it to a PubSub transport. Everything in here is usable
//! without the binary and its option parsing.

pub mod communication;
pub mod helpers;

/// Generic error type
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result with no value and a [`BoxedError`]
pub type EmptyResult = Result<(), BoxedError>;
