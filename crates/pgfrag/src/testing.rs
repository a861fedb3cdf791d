//! In-crate mocks for driver-dependent tests.

use crate::client::Queryable;
use crate::config::Config;
use crate::error::{DbError, DbResult};
use crate::monitor::{Listener, TxnEvent};
use crate::query::CompiledQuery;
use crate::row::Row;
use crate::transaction::{Lease, TxnTarget};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_postgres::error::SqlState;

pub(crate) fn serialization_failure() -> DbError {
    DbError::database(
        SqlState::T_R_SERIALIZATION_FAILURE,
        "could not serialize access due to concurrent update",
    )
}

pub(crate) fn deadlock() -> DbError {
    DbError::database(SqlState::T_R_DEADLOCK_DETECTED, "deadlock detected")
}

/// Config with a short back-off so retry tests stay fast.
pub(crate) fn fast_config() -> Config {
    Config::new().transaction_retry_delay(Duration::from_millis(1), Duration::from_millis(3))
}

/// Shared state behind every [`MockConn`] handed out by one test.
#[derive(Default)]
pub(crate) struct MockState {
    pub sql: Mutex<Vec<String>>,
    pub queries: Mutex<Vec<CompiledQuery>>,
    /// Rows returned by successive non-control queries; empty when exhausted.
    pub results: Mutex<VecDeque<Vec<Row>>>,
    /// Errors returned by successive `COMMIT`s before they start succeeding.
    pub commit_errors: Mutex<VecDeque<DbError>>,
    pub fail_rollback: std::sync::atomic::AtomicBool,
    pub released: AtomicUsize,
    /// Pooled connections dropped from the pool instead of returned.
    pub detached: AtomicUsize,
    pub checked_out: AtomicUsize,
}

impl MockState {
    pub fn sql(&self) -> Vec<String> {
        self.sql.lock().unwrap().clone()
    }

    pub fn push_result(&self, rows: Vec<Row>) {
        self.results.lock().unwrap().push_back(rows);
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn detached(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }
}

/// A connection that records every query and answers from [`MockState`].
pub(crate) struct MockConn {
    pub state: Arc<MockState>,
    pub config: Config,
    pooled: bool,
}

impl MockConn {
    pub fn new() -> Self {
        Self::with_config(Config::new())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            state: Arc::default(),
            config,
            pooled: false,
        }
    }
}

impl Drop for MockConn {
    fn drop(&mut self) {
        if self.pooled {
            self.state.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Queryable for MockConn {
    async fn query(&self, query: &CompiledQuery) -> DbResult<Vec<Row>> {
        let text = query.text().to_string();
        self.state.sql.lock().unwrap().push(text.clone());
        self.state.queries.lock().unwrap().push(query.clone());

        if text == "COMMIT" {
            if let Some(err) = self.state.commit_errors.lock().unwrap().pop_front() {
                return Err(err);
            }
            return Ok(Vec::new());
        }
        if text == "ROLLBACK" && self.state.fail_rollback.load(Ordering::SeqCst) {
            return Err(DbError::Connection("connection reset".into()));
        }
        if text.starts_with("START TRANSACTION") || text == "ROLLBACK" {
            return Ok(Vec::new());
        }
        Ok(self
            .state
            .results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    fn config(&self) -> &Config {
        &self.config
    }
}

impl TxnTarget for MockConn {
    type Conn = MockConn;

    fn txn_config(&self) -> &Config {
        &self.config
    }

    async fn lease(&self) -> DbResult<Lease<'_, Self::Conn>> {
        Ok(Lease::Borrowed(self))
    }
}

/// A pool whose connections share one [`MockState`] and count their releases.
pub(crate) struct MockPool {
    pub state: Arc<MockState>,
    pub config: Config,
}

impl MockPool {
    pub fn new(config: Config) -> Self {
        Self {
            state: Arc::default(),
            config,
        }
    }
}

impl TxnTarget for MockPool {
    type Conn = MockConn;

    fn txn_config(&self) -> &Config {
        &self.config
    }

    async fn lease(&self) -> DbResult<Lease<'_, Self::Conn>> {
        self.state.checked_out.fetch_add(1, Ordering::SeqCst);
        let conn = MockConn {
            state: Arc::clone(&self.state),
            config: self.config.clone(),
            pooled: true,
        };
        Ok(Lease::detachable(conn, |mut conn| {
            conn.pooled = false;
            conn.state.detached.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// Listener that records transaction events and query texts.
#[derive(Default)]
pub(crate) struct Recorder {
    pub events: Mutex<Vec<(TxnEvent, u64)>>,
    pub queries: Mutex<Vec<(String, Option<u64>)>>,
    pub results: Mutex<Vec<usize>>,
    pub errors: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<TxnEvent> {
        self.events.lock().unwrap().iter().map(|(e, _)| *e).collect()
    }
}

impl Listener for Recorder {
    fn on_query(&self, query: &CompiledQuery, txn_id: Option<u64>) {
        self.queries
            .lock()
            .unwrap()
            .push((query.text().to_string(), txn_id));
    }

    fn on_result(&self, _query: &CompiledQuery, rows: &[Row], _txn_id: Option<u64>, _elapsed: Duration) {
        self.results.lock().unwrap().push(rows.len());
    }

    fn on_error(&self, _query: &CompiledQuery, error: &DbError, _txn_id: Option<u64>) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    fn on_transaction(&self, event: &TxnEvent, txn_id: u64) {
        self.events.lock().unwrap().push((*event, txn_id));
    }
}
