use super::truncate_sql_bytes;
use super::types::{Listener, TxnEvent};
use crate::error::DbError;
use crate::query::CompiledQuery;
use crate::row::Row;
use std::time::Duration;
use tracing::Level;

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN  => tracing::warn!($($field)*),
            Level::INFO  => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            _ => tracing::trace!($($field)*),
        }
    };
}

/// A `tracing`-based listener that emits the SQL actually sent to the server.
///
/// Events go to target `pgfrag.sql`; filter them with e.g.
/// `RUST_LOG=pgfrag.sql=debug`.
#[derive(Debug, Clone)]
pub struct TracingListener {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
    /// Also log the number of rows and elapsed time of each result.
    pub log_results: bool,
}

impl Default for TracingListener {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
            log_results: false,
        }
    }
}

impl TracingListener {
    /// Create a new listener with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    /// Log row counts and timings as well.
    pub fn log_results(mut self) -> Self {
        self.log_results = true;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl Listener for TracingListener {
    fn on_query(&self, query: &CompiledQuery, txn_id: Option<u64>) {
        let sql = self.truncate_sql(query.text());
        emit_at_level!(
            self.level,
            target: "pgfrag.sql",
            txn_id,
            prepared = query.name(),
            param_count = query.values().len(),
            sql = %sql,
        );
    }

    fn on_result(&self, _query: &CompiledQuery, rows: &[Row], txn_id: Option<u64>, elapsed: Duration) {
        if self.log_results {
            emit_at_level!(
                self.level,
                target: "pgfrag.sql",
                txn_id,
                rows = rows.len(),
                elapsed = ?elapsed,
            );
        }
    }

    fn on_error(&self, query: &CompiledQuery, error: &DbError, txn_id: Option<u64>) {
        let sql = self.truncate_sql(query.text());
        emit_at_level!(
            self.level,
            target: "pgfrag.sql",
            txn_id,
            error = %error,
            sql = %sql,
        );
    }

    fn on_transaction(&self, event: &TxnEvent, txn_id: u64) {
        emit_at_level!(self.level, target: "pgfrag.txn", txn_id, event = ?event);
    }
}
