//! Runtime configuration shared by compilation, execution and transactions.

use crate::error::{DbError, DbResult};
use crate::monitor::Listener;
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

/// Largest transaction id before the sequence wraps back to 1 (2^53 − 1).
pub const MAX_TRANSACTION_ID: u64 = (1 << 53) - 1;

/// Bounds of the random back-off slept between transaction attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryDelay {
    /// Shortest delay, in milliseconds.
    #[serde(rename = "min_ms")]
    pub min: u64,
    /// Longest delay, in milliseconds.
    #[serde(rename = "max_ms")]
    pub max: u64,
}

impl RetryDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min: u64::try_from(min.as_millis()).unwrap_or(u64::MAX),
            max: u64::try_from(max.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max)
    }
}

impl Default for RetryDelay {
    fn default() -> Self {
        Self { min: 25, max: 250 }
    }
}

/// Monotonic transaction-id generator, wrapping at [`MAX_TRANSACTION_ID`].
///
/// Cloning a [`Config`] shares the same sequence.
#[derive(Debug, Default)]
pub struct TxnIdSequence {
    last: AtomicU64,
}

impl TxnIdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start so that the next id handed out is `next`.
    pub fn starting_at(next: u64) -> Self {
        Self {
            last: AtomicU64::new(next.saturating_sub(1)),
        }
    }

    /// The next id, starting at 1.
    pub fn next(&self) -> u64 {
        let prev = self
            .last
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
                Some(if last >= MAX_TRANSACTION_ID { 1 } else { last + 1 })
            })
            .unwrap_or_default();
        if prev >= MAX_TRANSACTION_ID { 1 } else { prev + 1 }
    }
}

/// Configuration for fragment compilation, `run` and the transaction controller.
#[derive(Clone)]
pub struct Config {
    /// Total attempts (first try included) before a retryable error is returned.
    pub transaction_attempts_max: u32,
    /// Back-off bounds between attempts.
    pub transaction_retry_delay: RetryDelay,
    /// Wrap JSON-array parameters in `CAST($n AS "json")`.
    pub cast_array_params_to_json: bool,
    /// Wrap JSON-object parameters in `CAST($n AS "json")`.
    pub cast_object_params_to_json: bool,
    listeners: Vec<Arc<dyn Listener>>,
    txn_ids: Arc<TxnIdSequence>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transaction_attempts_max: 5,
            transaction_retry_delay: RetryDelay::default(),
            cast_array_params_to_json: false,
            cast_object_params_to_json: false,
            listeners: Vec::new(),
            txn_ids: Arc::new(TxnIdSequence::new()),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("transaction_attempts_max", &self.transaction_attempts_max)
            .field("transaction_retry_delay", &self.transaction_retry_delay)
            .field("cast_array_params_to_json", &self.cast_array_params_to_json)
            .field("cast_object_params_to_json", &self.cast_object_params_to_json)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

static DEFAULT_CONFIG: LazyLock<Config> = LazyLock::new(Config::default);

impl Config {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default, used by clients that carry no configuration.
    pub fn shared_default() -> &'static Config {
        &DEFAULT_CONFIG
    }

    /// Set the maximum number of attempts per transaction.
    pub fn transaction_attempts_max(mut self, attempts: u32) -> Self {
        self.transaction_attempts_max = attempts;
        self
    }

    /// Set the back-off bounds between attempts.
    pub fn transaction_retry_delay(mut self, min: Duration, max: Duration) -> Self {
        self.transaction_retry_delay = RetryDelay::new(min, max);
        self
    }

    pub fn cast_array_params_to_json(mut self, enabled: bool) -> Self {
        self.cast_array_params_to_json = enabled;
        self
    }

    pub fn cast_object_params_to_json(mut self, enabled: bool) -> Self {
        self.cast_object_params_to_json = enabled;
        self
    }

    /// Register a listener for queries, results and transaction events.
    pub fn with_listener<L: Listener + 'static>(mut self, listener: L) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Register an already shared listener.
    pub fn with_shared_listener(mut self, listener: Arc<dyn Listener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Use a specific transaction-id sequence (e.g. one shared between configs).
    pub fn with_txn_ids(mut self, ids: Arc<TxnIdSequence>) -> Self {
        self.txn_ids = ids;
        self
    }

    pub fn listeners(&self) -> &[Arc<dyn Listener>] {
        &self.listeners
    }

    pub fn txn_ids(&self) -> &TxnIdSequence {
        &self.txn_ids
    }

    /// Reject settings the transaction controller cannot honor.
    pub fn validate(&self) -> DbResult<()> {
        if self.transaction_attempts_max < 1 {
            return Err(DbError::Config(
                "transaction_attempts_max must be at least 1".to_string(),
            ));
        }
        let delay = self.transaction_retry_delay;
        if delay.min > delay.max {
            return Err(DbError::Config(format!(
                "transaction retry delay min ({} ms) exceeds max ({} ms)",
                delay.min, delay.max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::new();
        assert_eq!(config.transaction_attempts_max, 5);
        assert_eq!(config.transaction_retry_delay, RetryDelay { min: 25, max: 250 });
        assert!(!config.cast_array_params_to_json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let err = Config::new().transaction_attempts_max(0).validate().unwrap_err();
        assert!(matches!(err, DbError::Config(_)));

        let err = Config::new()
            .transaction_retry_delay(Duration::from_millis(10), Duration::from_millis(5))
            .validate()
            .unwrap_err();
        assert!(matches!(err, DbError::Config(_)));

        assert!(
            Config::new()
                .transaction_retry_delay(Duration::ZERO, Duration::ZERO)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn txn_ids_are_monotonic_and_wrap() {
        let ids = TxnIdSequence::new();
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.next(), 2);

        let ids = TxnIdSequence::starting_at(MAX_TRANSACTION_ID);
        assert_eq!(ids.next(), MAX_TRANSACTION_ID);
        assert_eq!(ids.next(), 1);
    }

    #[test]
    fn clones_share_txn_ids() {
        let a = Config::new();
        let b = a.clone();
        assert_eq!(a.txn_ids().next(), 1);
        assert_eq!(b.txn_ids().next(), 2);
    }

    #[test]
    fn retry_delay_deserializes() {
        let delay: RetryDelay = serde_json::from_str(r#"{"min_ms": 10, "max_ms": 20}"#).unwrap();
        assert_eq!(delay.min(), Duration::from_millis(10));
        assert_eq!(delay.max(), Duration::from_millis(20));
    }
}
