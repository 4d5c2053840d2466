//! One-shot correlation of signals with local waiters
//!
//! A waiter registers interest in an event identified by a name and id through the
//! [`TriggerRegistry`] and receives a [`Trigger`]. The trigger settles exactly once: either
//! with the arguments of the first matching [`Signal`] or with a timeout once its deadline
//! passes. Afterwards the slot is free again and late signals are discarded.
//!
//! ```
//! # use server_events::library::communication::trigger::*;
//! # use serde_json::json;
//! # #[tokio::main]
//! # async fn main() -> Result<(), TriggerError> {
//! let registry = TriggerRegistry::default();
//! let trigger = registry.wait("session.created", 42, None)?;
//!
//! registry.set("session.created", 42, vec![json!("node-1")]);
//!
//! assert_eq!(trigger.await?, vec![json!("node-1")]);
//! # Ok(())
//! # }
//! ```

mod config;
mod key;
mod registry;
mod signal;

pub use config::*;
pub use key::*;
pub use registry::*;
pub use signal::*;
