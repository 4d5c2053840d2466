use super::super::RemoteError;
use super::{EventId, EventKey, KeyError, Signal, TriggerConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, trace};
use serde_json::Value;
use std::collections::HashMap;
use std::future::IntoFuture;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant};

/// Reasons why a wait did not yield a list of arguments
#[derive(Debug, Error)]
pub enum TriggerError {
    /// No signal arrived before the deadline
    #[error("Timeout exceeded after {timeout:?} waiting for {key}")]
    TimeoutExceeded {
        /// Key that has been waited for
        key: EventKey,
        /// Duration of the wait
        timeout: Duration,
    },
    /// The publisher reported a failure instead of a result
    #[error("remote failure reported for {key}")]
    Remote {
        /// Key of the failed event
        key: EventKey,
        /// Failure as reported by the publisher
        #[source]
        error: RemoteError,
    },
    /// Another wait for the same key is still pending
    #[error("a wait for {0} is already pending")]
    DuplicateWait(EventKey),
    /// Name and id do not form a valid key
    #[error("invalid event key")]
    InvalidKey(#[from] KeyError),
    /// The wait was claimed by a signal which then never arrived
    #[error("pending wait for {0} was abandoned")]
    Abandoned(EventKey),
}

/// Eventual result of a [`Trigger`]
pub type TriggerResult = Result<Vec<Value>, TriggerError>;

struct PendingWait {
    ticket: u64,
    deadline: Instant,
    sender: oneshot::Sender<Signal>,
}

impl PendingWait {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline <= now
    }
}

struct RegistryState {
    pending: HashMap<EventKey, PendingWait>,
    config: TriggerConfig,
    next_ticket: u64,
}

struct Shared {
    state: Mutex<RegistryState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // No operation leaves the state half-modified, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes the pending wait for `key` if it still belongs to the given ticket
    fn withdraw(&self, key: &EventKey, ticket: u64) -> Option<PendingWait> {
        let mut state = self.lock();

        match state.pending.get(key) {
            Some(wait) if wait.ticket == ticket => state.pending.remove(key),
            _ => None,
        }
    }
}

/// Correlates incoming signals with local waiters
///
/// Each [`EventKey`] may have at most one pending wait. Whichever comes first,
/// a matching [`set`](TriggerRegistry::set) or the deadline of the wait, settles it and removes
/// it from the registry. Signals for keys nobody waits for are discarded.
///
/// Clones share the same set of pending waits.
#[derive(Clone)]
pub struct TriggerRegistry {
    shared: Arc<Shared>,
}

impl TriggerRegistry {
    /// Creates an empty registry
    pub fn new(config: TriggerConfig) -> Self {
        let state = RegistryState {
            pending: HashMap::new(),
            config,
            next_ticket: 0,
        };

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
            }),
        }
    }

    /// Timeout applied to waits which don't specify their own
    pub fn default_timeout(&self) -> Duration {
        self.shared.lock().config.default_timeout()
    }

    /// Overrides the default timeout for subsequent waits, see [`TriggerConfig::set_default_timeout`]
    pub fn set_default_timeout(&self, timeout: Duration) -> bool {
        self.shared.lock().config.set_default_timeout(timeout)
    }

    /// Overrides the default timeout for subsequent waits, see [`TriggerConfig::set_default_timeout_millis`]
    pub fn set_default_timeout_millis(&self, millis: f64) -> bool {
        self.shared.lock().config.set_default_timeout_millis(millis)
    }

    /// Registers a wait for the given event and starts its deadline
    ///
    /// The wait is armed as soon as this function returns, a signal arriving before
    /// the returned [`Trigger`] is awaited will not be lost. Omitting the timeout or passing
    /// a zero duration uses the [default](TriggerRegistry::default_timeout).
    pub fn wait(
        &self,
        name: &str,
        id: impl Into<EventId>,
        timeout: Option<Duration>,
    ) -> Result<Trigger, TriggerError> {
        let key = EventKey::new(name, &id.into())?;
        self.wait_for(key, timeout)
    }

    /// Registers a wait for an already constructed key, see [`wait`](TriggerRegistry::wait)
    pub fn wait_for(
        &self,
        key: EventKey,
        timeout: Option<Duration>,
    ) -> Result<Trigger, TriggerError> {
        let (sender, receiver) = oneshot::channel();
        let now = Instant::now();
        let mut state = self.shared.lock();

        match state.pending.get(&key) {
            Some(wait) if !wait.is_expired(now) => return Err(TriggerError::DuplicateWait(key)),
            // Its handle has not observed the timeout yet but the slot is free again
            Some(_) => trace!("Replacing expired wait for {}", key),
            None => {}
        }

        let timeout = state.config.effective_timeout(timeout);
        let deadline = now + timeout;
        let ticket = state.next_ticket;
        state.next_ticket = state.next_ticket.wrapping_add(1);

        state.pending.insert(
            key.clone(),
            PendingWait {
                ticket,
                deadline,
                sender,
            },
        );
        drop(state);

        debug!("Waiting up to {:?} for {}", timeout, key);

        Ok(Trigger {
            key,
            ticket,
            timeout,
            deadline,
            receiver,
            release: None,
            shared: self.shared.clone(),
        })
    }

    /// Settles the pending wait for the given event, if there is one
    ///
    /// Returns whether the signal has been handed to a waiter. Without a waiter the
    /// signal is dropped, it is never buffered for future waits.
    pub fn set(&self, name: &str, id: impl Into<EventId>, signal: impl Into<Signal>) -> bool {
        match EventKey::new(name, &id.into()) {
            Ok(key) => self.deliver(&key, signal.into()),
            Err(e) => {
                debug!("Discarding signal with unusable key: {}", e);
                false
            }
        }
    }

    /// Settles the pending wait for an already constructed key, see [`set`](TriggerRegistry::set)
    ///
    /// A wait whose deadline has passed is removed without being signalled, even if its
    /// [`Trigger`] has not been awaited yet.
    pub fn deliver(&self, key: &EventKey, signal: Signal) -> bool {
        let now = Instant::now();
        let claimed = self.shared.lock().pending.remove(key);

        match claimed {
            Some(wait) if wait.is_expired(now) => {
                debug!("Discarding signal for {}: timeout exceeded", key);
                false
            }
            Some(wait) => {
                if wait.sender.send(signal).is_err() {
                    debug!("Waiter for {} went away before the signal arrived", key);
                    return false;
                }

                trace!("Settled wait for {}", key);
                true
            }
            None => {
                debug!(
                    "Discarding signal for {}: nobody is waiting (timeout exceeded or never registered)",
                    key
                );
                false
            }
        }
    }

    /// Number of waits that have neither been signalled nor timed out
    pub fn pending(&self) -> usize {
        let now = Instant::now();

        self.shared
            .lock()
            .pending
            .values()
            .filter(|wait| !wait.is_expired(now))
            .count()
    }

    /// Whether a wait for the given event is currently pending
    pub fn is_pending(&self, name: &str, id: impl Into<EventId>) -> bool {
        match EventKey::new(name, &id.into()) {
            Ok(key) => self.is_pending_key(&key),
            Err(_) => false,
        }
    }

    /// Whether a wait for an already constructed key is currently pending
    pub fn is_pending_key(&self, key: &EventKey) -> bool {
        let now = Instant::now();

        match self.shared.lock().pending.get(key) {
            Some(wait) => !wait.is_expired(now),
            None => false,
        }
    }
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::new(TriggerConfig::default())
    }
}

/// Handle to a single pending wait
///
/// Awaiting it yields the arguments of the signal or the reason why none arrived.
/// Dropping it before it settles withdraws the wait from the registry.
#[must_use = "a trigger has to be awaited to observe the signal"]
pub struct Trigger {
    key: EventKey,
    ticket: u64,
    timeout: Duration,
    deadline: Instant,
    receiver: oneshot::Receiver<Signal>,
    release: Option<oneshot::Sender<()>>,
    shared: Arc<Shared>,
}

impl Trigger {
    /// Key this trigger is waiting for
    pub fn key(&self) -> &EventKey {
        &self.key
    }

    /// Point in time at which the wait fails with [`TriggerError::TimeoutExceeded`]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns a receiver which completes once this trigger has been settled or dropped
    ///
    /// Only the most recently returned receiver is notified.
    pub(crate) fn on_release(&mut self) -> oneshot::Receiver<()> {
        let (sender, receiver) = oneshot::channel();
        self.release = Some(sender);
        receiver
    }

    /// Waits for the signal or the deadline, whichever comes first
    pub async fn outcome(mut self) -> TriggerResult {
        let signal = tokio::select! {
            biased;
            signal = &mut self.receiver => Some(signal),
            _ = sleep_until(self.deadline) => None,
        };

        match signal {
            Some(signal) => self.settle(signal),
            None => self.expire().await,
        }
    }

    async fn expire(&mut self) -> TriggerResult {
        if self.shared.withdraw(&self.key, self.ticket).is_some() {
            debug!("Wait for {} timed out after {:?}", self.key, self.timeout);
            return Err(self.timeout_exceeded());
        }

        // A signal claimed the wait right at the deadline and is being handed over
        let signal = (&mut self.receiver).await;
        self.settle(signal)
    }

    fn settle(&self, signal: Result<Signal, oneshot::error::RecvError>) -> TriggerResult {
        match signal {
            Ok(Signal::Arguments(arguments)) => Ok(arguments),
            Ok(Signal::Failure(error)) => Err(TriggerError::Remote {
                key: self.key.clone(),
                error,
            }),
            // The expired slot was cleared by a late signal or a newer wait
            Err(_) if self.deadline <= Instant::now() => Err(self.timeout_exceeded()),
            Err(_) => Err(TriggerError::Abandoned(self.key.clone())),
        }
    }

    fn timeout_exceeded(&self) -> TriggerError {
        TriggerError::TimeoutExceeded {
            key: self.key.clone(),
            timeout: self.timeout,
        }
    }
}

impl IntoFuture for Trigger {
    type Output = TriggerResult;
    type IntoFuture = BoxFuture<'static, TriggerResult>;

    fn into_future(self) -> Self::IntoFuture {
        self.outcome().boxed()
    }
}

impl Drop for Trigger {
    fn drop(&mut self) {
        if self.shared.withdraw(&self.key, self.ticket).is_some() {
            trace!("Withdrew unsettled wait for {}", self.key);
        }

        if let Some(release) = self.release.take() {
            release.send(()).ok();
        }
    }
}

#[cfg(test)]
mod does {
    use super::super::{DEFAULT_TIMEOUT, MAX_TIMEOUT};
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> TriggerRegistry {
        TriggerRegistry::default()
    }

    #[tokio::test]
    async fn resolve_with_arguments() {
        let registry = registry();
        let trigger = registry.wait("E", 1, None).unwrap();
        let arguments = vec![json!("arg 1"), json!({ "f": 1, "c": { "k": "a" } })];

        assert!(registry.set("E", 1, arguments.clone()));
        assert_eq!(trigger.await.unwrap(), arguments);
    }

    #[tokio::test]
    async fn match_textual_and_numeric_ids() {
        let registry = registry();
        let trigger = registry.wait("F", 150, None).unwrap();

        assert!(registry.set("F", "150", vec![json!("value1"), json!("value2")]));
        assert_eq!(
            trigger.await.unwrap(),
            vec![json!("value1"), json!("value2")]
        );
    }

    #[tokio::test]
    async fn resolve_from_another_task() {
        let registry = registry();
        let trigger = registry.wait("E", 2, None).unwrap();

        let setter = registry.clone();
        tokio::spawn(async move {
            setter.set("E", 2, vec![json!(true)]);
        });

        assert_eq!(trigger.await.unwrap(), vec![json!(true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn time_out_without_signal() {
        let registry = registry();
        let start = Instant::now();
        let trigger = registry
            .wait("timeout event", 1, Some(Duration::from_millis(2000)))
            .unwrap();

        let result = trigger.await;

        assert!(matches!(
            result,
            Err(TriggerError::TimeoutExceeded { timeout, .. }) if timeout == Duration::from_millis(2000)
        ));
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn discard_late_signal() {
        let registry = registry();
        let trigger = registry
            .wait("timeout event", 1, Some(Duration::from_millis(2000)))
            .unwrap();

        assert!(trigger.await.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!registry.set("timeout event", 1, vec![json!(1)]));
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn discard_signal_after_unobserved_deadline() {
        let registry = registry();
        let trigger = registry
            .wait("E", 1, Some(Duration::from_millis(100)))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(!registry.is_pending("E", 1));
        assert!(!registry.set("E", 1, vec![json!("late")]));
        assert!(matches!(
            trigger.await,
            Err(TriggerError::TimeoutExceeded { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn replace_expired_wait_before_it_is_awaited() {
        let registry = registry();
        let stale = registry
            .wait("E", 8, Some(Duration::from_millis(100)))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        let fresh = registry.wait("E", 8, None).unwrap();
        assert!(registry.set("E", 8, vec![json!("fresh")]));

        assert!(matches!(
            stale.await,
            Err(TriggerError::TimeoutExceeded { .. })
        ));
        assert_eq!(fresh.await.unwrap(), vec![json!("fresh")]);
    }

    #[tokio::test(start_paused = true)]
    async fn cap_oversized_timeouts() {
        let registry = registry();
        let start = Instant::now();

        let trigger = registry.wait("E", 2, Some(Duration::MAX)).unwrap();
        assert_eq!(trigger.deadline(), start + MAX_TIMEOUT);

        assert!(!registry.set_default_timeout_millis(1e300));
        assert_eq!(registry.default_timeout(), DEFAULT_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn use_configured_default_timeout() {
        let registry = registry();
        assert!(registry.set_default_timeout_millis(4000.0));

        let start = Instant::now();
        let result = registry.wait("B", 1, None).unwrap().await;

        assert!(matches!(result, Err(TriggerError::TimeoutExceeded { .. })));
        assert_eq!(start.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn keep_default_timeout_on_invalid_update() {
        let registry = TriggerRegistry::new(TriggerConfig::new(Duration::from_secs(3)));

        assert!(!registry.set_default_timeout_millis(-5.0));
        assert!(!registry.set_default_timeout_millis(f64::NAN));
        assert_eq!(registry.default_timeout(), Duration::from_secs(3));

        let start = Instant::now();
        assert!(registry.wait("B", 2, None).unwrap().await.is_err());
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn ignore_unmatched_signals() {
        let registry = registry();

        assert!(!registry.set("nobody", 1, vec![json!(1)]));
        assert!(!registry.set("", 1, vec![json!(1)]));
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test]
    async fn resolve_at_most_once() {
        let registry = registry();
        let trigger = registry.wait("E", 3, None).unwrap();

        assert!(registry.set("E", 3, vec![json!("first")]));
        assert!(!registry.set("E", 3, vec![json!("second")]));

        assert_eq!(trigger.await.unwrap(), vec![json!("first")]);
        assert!(!registry.is_pending("E", 3));
    }

    #[tokio::test]
    async fn reject_duplicate_waits() {
        let registry = registry();
        let _first = registry.wait("E", 4, None).unwrap();

        assert!(matches!(
            registry.wait("E", 4, None),
            Err(TriggerError::DuplicateWait(_))
        ));
        assert_eq!(registry.pending(), 1);
    }

    #[tokio::test]
    async fn reject_invalid_keys() {
        assert!(matches!(
            registry().wait("a:b", 1, None),
            Err(TriggerError::InvalidKey(KeyError::SeparatorInName(_)))
        ));
    }

    #[tokio::test]
    async fn propagate_remote_failures() {
        let registry = registry();
        let trigger = registry.wait("E", 5, None).unwrap();

        registry.set("E", 5, RemoteError::message("no capacity"));

        match trigger.await {
            Err(TriggerError::Remote { error, .. }) => {
                assert_eq!(error.causes(), ["no capacity"])
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn withdraw_dropped_waits() {
        let registry = registry();
        let trigger = registry.wait("E", 6, None).unwrap();
        assert!(registry.is_pending("E", 6));

        drop(trigger);

        assert!(!registry.is_pending("E", 6));
        assert!(!registry.set("E", 6, vec![json!(1)]));
    }

    #[tokio::test(start_paused = true)]
    async fn accept_new_wait_after_timeout() {
        let registry = registry();
        let first = registry
            .wait("E", 7, Some(Duration::from_millis(100)))
            .unwrap();
        assert!(first.await.is_err());

        let second = registry.wait("E", 7, None).unwrap();
        assert!(registry.set("E", 7, vec![json!("again")]));
        assert_eq!(second.await.unwrap(), vec![json!("again")]);
    }

    #[tokio::test]
    async fn keep_keys_independent() {
        let registry = registry();
        let a = registry.wait("E", "a", None).unwrap();
        let b = registry.wait("E", "b", None).unwrap();

        registry.set("E", "b", vec![json!("b")]);
        registry.set("E", "a", vec![json!("a")]);

        assert_eq!(a.await.unwrap(), vec![json!("a")]);
        assert_eq!(b.await.unwrap(), vec![json!("b")]);
    }
}
