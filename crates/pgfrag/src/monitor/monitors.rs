use super::types::{Listener, QueryKind, TxnEvent};
use crate::error::DbError;
use crate::query::CompiledQuery;
use crate::row::Row;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A listener that tracks query and transaction statistics.
#[derive(Debug, Default)]
pub struct StatsListener {
    total_queries: AtomicU64,
    failed_queries: AtomicU64,
    total_duration_nanos: AtomicU64,
    select_count: AtomicU64,
    insert_count: AtomicU64,
    update_count: AtomicU64,
    delete_count: AtomicU64,
    max_duration_nanos: AtomicU64,
    slowest_query: Mutex<Option<String>>,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    retries: AtomicU64,
}

/// Collected statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Queries that returned a result.
    pub total_queries: u64,
    /// Queries that failed.
    pub failed_queries: u64,
    /// Total execution time of successful queries.
    pub total_duration: Duration,
    pub select_count: u64,
    pub insert_count: u64,
    pub update_count: u64,
    pub delete_count: u64,
    /// Slowest query duration.
    pub max_duration: Duration,
    /// Slowest query SQL.
    pub slowest_query: Option<String>,
    /// Committed transaction attempts.
    pub commits: u64,
    /// Rolled back transaction attempts.
    pub rollbacks: u64,
    /// Retries after serialization failures or deadlocks.
    pub retries: u64,
}

impl StatsListener {
    /// Create a new stats listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current statistics.
    pub fn stats(&self) -> QueryStats {
        QueryStats {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.total_duration_nanos.load(Ordering::Relaxed)),
            select_count: self.select_count.load(Ordering::Relaxed),
            insert_count: self.insert_count.load(Ordering::Relaxed),
            update_count: self.update_count.load(Ordering::Relaxed),
            delete_count: self.delete_count.load(Ordering::Relaxed),
            max_duration: Duration::from_nanos(self.max_duration_nanos.load(Ordering::Relaxed)),
            slowest_query: self
                .slowest_query
                .lock()
                .map(|q| q.clone())
                .unwrap_or_default(),
            commits: self.commits.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        for counter in [
            &self.total_queries,
            &self.failed_queries,
            &self.total_duration_nanos,
            &self.select_count,
            &self.insert_count,
            &self.update_count,
            &self.delete_count,
            &self.max_duration_nanos,
            &self.commits,
            &self.rollbacks,
            &self.retries,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut slowest) = self.slowest_query.lock() {
            *slowest = None;
        }
    }
}

impl Listener for StatsListener {
    fn on_result(&self, query: &CompiledQuery, _rows: &[Row], _txn_id: Option<u64>, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);

        self.total_queries.fetch_add(1, Ordering::Relaxed);
        let prev_total = self.total_duration_nanos.fetch_add(nanos, Ordering::Relaxed);
        if prev_total.checked_add(nanos).is_none() {
            // Saturate instead of wrapping.
            self.total_duration_nanos.store(u64::MAX, Ordering::Relaxed);
        }

        let counter = match QueryKind::from_sql(query.text()) {
            QueryKind::Select => Some(&self.select_count),
            QueryKind::Insert => Some(&self.insert_count),
            QueryKind::Update => Some(&self.update_count),
            QueryKind::Delete => Some(&self.delete_count),
            QueryKind::Other => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        let prev_max = self.max_duration_nanos.fetch_max(nanos, Ordering::Relaxed);
        if nanos > prev_max {
            if let Ok(mut slowest) = self.slowest_query.lock() {
                *slowest = Some(query.text().to_string());
            }
        }
    }

    fn on_error(&self, _query: &CompiledQuery, _error: &DbError, _txn_id: Option<u64>) {
        self.failed_queries.fetch_add(1, Ordering::Relaxed);
    }

    fn on_transaction(&self, event: &TxnEvent, _txn_id: u64) {
        let counter = match event {
            TxnEvent::Begin { .. } => return,
            TxnEvent::Commit { .. } => &self.commits,
            TxnEvent::Rollback { .. } => &self.rollbacks,
            TxnEvent::Retry { .. } => &self.retries,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
