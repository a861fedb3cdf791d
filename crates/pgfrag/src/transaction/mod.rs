//! Transactions with automatic retry on serialization failures and deadlocks.
//!
//! [`transaction`] brackets a callback with `START TRANSACTION ISOLATION LEVEL
//! ...` and `COMMIT`. If anything in that block fails it issues `ROLLBACK`;
//! errors with SQLSTATE `40001` (serialization failure) or `40P01` (deadlock
//! detected) are retried after a random back-off, up to
//! [`Config::transaction_attempts_max`](crate::Config::transaction_attempts_max)
//! attempts in total. Every other error, and the last retryable one, is
//! returned unchanged.
//!
//! The callback may run more than once, so it should not have side effects
//! outside the database.
//!
//! # Example
//!
//! ```ignore
//! use pgfrag::{param, sql, transaction};
//!
//! let pool = pgfrag::create_pool("postgres://...")?;
//! let moved = transaction::serializable(&pool, async |txn| {
//!     sql!("UPDATE accounts SET balance = balance - " {param(100_i64)} " WHERE id = " {param(1_i64)})
//!         .run(txn)
//!         .await?;
//!     sql!("UPDATE accounts SET balance = balance + " {param(100_i64)} " WHERE id = " {param(2_i64)})
//!         .run(txn)
//!         .await?;
//!     Ok(100_i64)
//! })
//! .await?;
//! ```
//!
//! Passing the callback's [`TxnClient`] to another `transaction` call runs the
//! inner callback directly inside the outer transaction, so functions can be
//! written to work both standalone and composed.

mod handle;
mod isolation;


pub use handle::{Lease, TxnClient, TxnTarget};
pub use isolation::IsolationLevel;

use crate::client::Queryable;
use crate::config::RetryDelay;
use crate::error::{DbError, DbResult};
use crate::fragment::Fragment;
use crate::monitor::TxnEvent;
use rand::Rng;
use std::time::Duration;

/// Run `callback` in a transaction at `isolation`, retrying on serialization
/// failures and deadlocks.
///
/// - A pool target has a connection checked out for this call and returned
///   when it ends, on every path. A connection left inside a transaction
///   (the returned future was dropped mid-attempt, or `ROLLBACK` failed) is
///   detached from the pool instead.
/// - A connection target is borrowed and left open.
/// - A [`TxnClient`] target is an open transaction: `callback` runs directly,
///   with no `START TRANSACTION`/`COMMIT` and no retries of its own. The open
///   transaction must satisfy `isolation` (see [`IsolationLevel::satisfies`]),
///   otherwise [`DbError::IsolationMismatch`] is returned.
pub async fn transaction<T, F, R>(
    target: &T,
    isolation: IsolationLevel,
    mut callback: F,
) -> DbResult<R>
where
    T: TxnTarget,
    F: AsyncFnMut(&TxnClient<'_, T::Conn>) -> DbResult<R>,
{
    if let Some(active) = target.active_transaction() {
        if !active.isolation().satisfies(isolation) {
            return Err(DbError::IsolationMismatch {
                active: active.isolation(),
                requested: isolation,
            });
        }
        tracing::trace!(txn_id = active.id(), "joining open transaction");
        return callback(active).await;
    }

    let config = target.txn_config();
    config.validate()?;

    let txn_id = config.txn_ids().next();
    let mut guard = LeaseGuard {
        lease: Some(target.lease().await?),
        open: false,
        txn_id,
    };
    let Some(conn) = guard.lease.as_deref() else {
        return Err(DbError::Connection("connection lease already released".into()));
    };
    let txn = TxnClient::new(conn, config, isolation, txn_id);
    let max_attempts = config.transaction_attempts_max;

    let mut attempt = 1;
    loop {
        notify(&txn, TxnEvent::Begin { attempt });
        tracing::debug!(txn_id, attempt, isolation = %isolation, "transaction start");

        guard.open = true;
        match attempt_once(&txn, &mut callback).await {
            Ok(result) => {
                guard.open = false;
                notify(&txn, TxnEvent::Commit { attempt });
                tracing::debug!(txn_id, attempt, "transaction committed");
                return Ok(result);
            }
            Err(err) => {
                if rollback(&txn).await {
                    guard.open = false;
                }
                notify(&txn, TxnEvent::Rollback { attempt });

                if !err.is_retryable() || attempt >= max_attempts {
                    return Err(err);
                }

                let delay = retry_delay(config.transaction_retry_delay);
                tracing::warn!(
                    txn_id,
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "retrying transaction"
                );
                notify(&txn, TxnEvent::Retry { attempt, delay });
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Holds the lease for one controller call.
///
/// `open` is set from `START TRANSACTION` until `COMMIT` or `ROLLBACK` has
/// completed. Dropped while it is set (the caller's future was cancelled, or
/// `ROLLBACK` failed), the guard abandons the lease instead of releasing it.
struct LeaseGuard<'a, C> {
    lease: Option<Lease<'a, C>>,
    open: bool,
    txn_id: u64,
}

impl<C> Drop for LeaseGuard<'_, C> {
    fn drop(&mut self) {
        if self.open {
            if let Some(lease) = self.lease.take() {
                lease.abandon(self.txn_id);
            }
        }
    }
}

async fn attempt_once<C, F, R>(txn: &TxnClient<'_, C>, callback: &mut F) -> DbResult<R>
where
    C: Queryable,
    F: AsyncFnMut(&TxnClient<'_, C>) -> DbResult<R>,
{
    Fragment::literal(format!(
        "START TRANSACTION ISOLATION LEVEL {}",
        txn.isolation().as_sql()
    ))
    .run(txn)
    .await?;
    let result = callback(txn).await?;
    Fragment::literal("COMMIT").run(txn).await?;
    Ok(result)
}

/// Whether the connection is known to be outside a transaction afterwards.
async fn rollback<C: Queryable>(txn: &TxnClient<'_, C>) -> bool {
    // The attempt's own error is what the caller sees.
    match Fragment::literal("ROLLBACK").run(txn).await {
        Ok(_) => true,
        Err(err) => {
            tracing::error!(txn_id = txn.id(), error = %err, "ROLLBACK failed");
            false
        }
    }
}

fn notify<C: Queryable>(txn: &TxnClient<'_, C>, event: TxnEvent) {
    for listener in txn.config().listeners() {
        listener.on_transaction(&event, txn.id());
    }
}

/// Uniformly random delay in `[min, max]`.
fn retry_delay(bounds: RetryDelay) -> Duration {
    let ms = if bounds.min >= bounds.max {
        bounds.min
    } else {
        rand::thread_rng().gen_range(bounds.min..=bounds.max)
    };
    Duration::from_millis(ms)
}

macro_rules! isolation_wrappers {
    ($($(#[$doc:meta])* $name:ident => $level:ident;)*) => {$(
        $(#[$doc])*
        pub async fn $name<T, F, R>(target: &T, callback: F) -> DbResult<R>
        where
            T: TxnTarget,
            F: AsyncFnMut(&TxnClient<'_, T::Conn>) -> DbResult<R>,
        {
            transaction(target, IsolationLevel::$level, callback).await
        }
    )*};
}

isolation_wrappers! {
    /// [`transaction`] at `SERIALIZABLE`.
    serializable => Serializable;
    /// [`transaction`] at `REPEATABLE READ`.
    repeatable_read => RepeatableRead;
    /// [`transaction`] at `READ COMMITTED`.
    read_committed => ReadCommitted;
    /// [`transaction`] at `SERIALIZABLE, READ ONLY`.
    serializable_ro => SerializableReadOnly;
    /// [`transaction`] at `REPEATABLE READ, READ ONLY`.
    repeatable_read_ro => RepeatableReadReadOnly;
    /// [`transaction`] at `READ COMMITTED, READ ONLY`.
    read_committed_ro => ReadCommittedReadOnly;
    /// [`transaction`] at `SERIALIZABLE, READ ONLY, DEFERRABLE`.
    serializable_ro_deferrable => SerializableReadOnlyDeferrable;
}
