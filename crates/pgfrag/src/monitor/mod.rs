//! Observability hooks for fragment execution and transactions.
//!
//! A [`Listener`] registered on [`Config`](crate::Config) sees every compiled
//! query before it is sent, every result set with its elapsed time, and the
//! begin/commit/rollback/retry events of the transaction controller.
//!
//! # Example
//!
//! ```rust,ignore
//! use pgfrag::monitor::{StatsListener, TracingListener};
//! use pgfrag::{Config, PgClient};
//! use std::sync::Arc;
//!
//! let stats = Arc::new(StatsListener::new());
//! let config = Config::new()
//!     .with_listener(TracingListener::new().max_sql_length(500))
//!     .with_shared_listener(stats.clone());
//!
//! let client = PgClient::with_config(db_client, config);
//! // ... run fragments ...
//! println!("{:?}", stats.stats());
//! ```

mod monitors;
mod tracing_hook;
mod types;


pub use monitors::{QueryStats, StatsListener};
pub use tracing_hook::TracingListener;
pub use types::{Listener, QueryKind, TxnEvent};

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
