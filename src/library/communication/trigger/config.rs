use crate::library::helpers::millis_to_duration;
use std::time::Duration;

/// Timeout applied to waits which don't specify their own
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest timeout a single wait may use, longer ones are capped
pub const MAX_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Construction parameters of a [`TriggerRegistry`](super::TriggerRegistry)
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerConfig {
    default_timeout: Duration,
}

impl TriggerConfig {
    /// Creates a configuration with the given default timeout
    ///
    /// A zero duration is not a usable timeout and falls back to [`DEFAULT_TIMEOUT`].
    pub fn new(default_timeout: Duration) -> Self {
        let mut config = Self::default();
        config.set_default_timeout(default_timeout);
        config
    }

    /// Timeout applied to waits which don't specify their own
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Overrides the default timeout, rejecting zero durations
    ///
    /// Durations above [`MAX_TIMEOUT`] are capped. Returns whether the value has been applied.
    pub fn set_default_timeout(&mut self, timeout: Duration) -> bool {
        if timeout.is_zero() {
            return false;
        }

        self.default_timeout = timeout.min(MAX_TIMEOUT);
        true
    }

    /// Overrides the default timeout with a number of milliseconds
    ///
    /// Values which are not finite or not positive are rejected and leave the previous value intact.
    pub fn set_default_timeout_millis(&mut self, millis: f64) -> bool {
        match millis_to_duration(millis) {
            Ok(timeout) => self.set_default_timeout(timeout),
            Err(e) => {
                log::warn!("Rejecting default timeout: {}", e);
                false
            }
        }
    }

    /// Timeout for a single wait, using the default when none or an unusable one is requested
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        match requested {
            Some(timeout) if !timeout.is_zero() => timeout.min(MAX_TIMEOUT),
            _ => self.default_timeout,
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}
