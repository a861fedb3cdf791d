use super::IsolationLevel;
use crate::client::{PgClient, Queryable};
use crate::config::Config;
use crate::error::DbResult;
use crate::query::CompiledQuery;
use crate::row::Row;
use std::future::Future;
use std::ops::Deref;

/// A connection held for the duration of one `transaction` call.
///
/// Owned leases (checked out of a pool) go back to the pool when dropped,
/// whichever way the call exits. If the call is abandoned while a transaction
/// is open on the connection, `detach` gets the connection instead, so that it
/// is never handed out again mid-transaction.
pub enum Lease<'a, C> {
    Borrowed(&'a C),
    Owned { conn: C, detach: fn(C) },
}

impl<'a, C> Lease<'a, C> {
    /// An owned connection that is simply dropped when abandoned.
    pub fn owned(conn: C) -> Self {
        Lease::Owned { conn, detach: drop }
    }

    /// An owned connection disposed of by `detach` when abandoned.
    pub fn detachable(conn: C, detach: fn(C)) -> Self {
        Lease::Owned { conn, detach }
    }

    /// Give up a connection whose transaction state is unknown.
    pub(crate) fn abandon(self, txn_id: u64) {
        match self {
            Lease::Borrowed(_) => {
                tracing::warn!(txn_id, "transaction abandoned on a borrowed connection");
            }
            Lease::Owned { conn, detach } => {
                tracing::warn!(txn_id, "transaction abandoned, detaching connection");
                detach(conn);
            }
        }
    }
}

impl<C> Deref for Lease<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        match self {
            Lease::Borrowed(conn) => conn,
            Lease::Owned { conn, .. } => conn,
        }
    }
}

/// A connection tagged as being inside a transaction.
///
/// Handed to transaction callbacks. Passing it back to
/// [`transaction`](super::transaction) runs the nested callback inside the same
/// transaction.
#[derive(Debug)]
pub struct TxnClient<'a, C> {
    conn: &'a C,
    config: &'a Config,
    isolation: IsolationLevel,
    id: u64,
}

impl<'a, C> TxnClient<'a, C> {
    pub(crate) fn new(conn: &'a C, config: &'a Config, isolation: IsolationLevel, id: u64) -> Self {
        Self {
            conn,
            config,
            isolation,
            id,
        }
    }

    /// Transaction id, unique per controller call (retries keep the same id).
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn config(&self) -> &'a Config {
        self.config
    }

    /// The underlying connection.
    pub fn connection(&self) -> &'a C {
        self.conn
    }
}

impl<C> Clone for TxnClient<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for TxnClient<'_, C> {}

impl<C: Queryable> Queryable for TxnClient<'_, C> {
    async fn query(&self, query: &CompiledQuery) -> DbResult<Vec<Row>> {
        self.conn.query(query).await
    }

    fn config(&self) -> &Config {
        self.config
    }

    fn transaction_id(&self) -> Option<u64> {
        Some(self.id)
    }

    fn isolation_level(&self) -> Option<IsolationLevel> {
        Some(self.isolation)
    }
}

/// Something a transaction can be started on: a connection, a pool, or an
/// already open transaction.
pub trait TxnTarget: Send + Sync {
    /// Connection type the callback's queries run on.
    type Conn: Queryable;

    /// Configuration for attempts, back-off and listeners.
    fn txn_config(&self) -> &Config;

    /// The open transaction this target already is, if any.
    fn active_transaction(&self) -> Option<&TxnClient<'_, Self::Conn>> {
        None
    }

    /// Borrow or check out a connection for the duration of one call.
    fn lease(&self) -> impl Future<Output = DbResult<Lease<'_, Self::Conn>>> + Send;
}

impl TxnTarget for tokio_postgres::Client {
    type Conn = tokio_postgres::Client;

    fn txn_config(&self) -> &Config {
        Config::shared_default()
    }

    async fn lease(&self) -> DbResult<Lease<'_, Self::Conn>> {
        Ok(Lease::Borrowed(self))
    }
}

#[cfg(feature = "pool")]
impl TxnTarget for deadpool_postgres::Client {
    type Conn = deadpool_postgres::Client;

    fn txn_config(&self) -> &Config {
        Config::shared_default()
    }

    async fn lease(&self) -> DbResult<Lease<'_, Self::Conn>> {
        Ok(Lease::Borrowed(self))
    }
}

#[cfg(feature = "pool")]
impl TxnTarget for deadpool_postgres::Pool {
    type Conn = deadpool_postgres::Client;

    fn txn_config(&self) -> &Config {
        Config::shared_default()
    }

    async fn lease(&self) -> DbResult<Lease<'_, Self::Conn>> {
        // Taking the object out of the pool closes it on drop, which makes the
        // server roll back whatever was left open.
        Ok(Lease::detachable(self.get().await?, |client| {
            drop(deadpool_postgres::Client::take(client));
        }))
    }
}

impl<T: TxnTarget> TxnTarget for PgClient<T> {
    type Conn = T::Conn;

    fn txn_config(&self) -> &Config {
        PgClient::config(self)
    }

    fn active_transaction(&self) -> Option<&TxnClient<'_, Self::Conn>> {
        self.inner().active_transaction()
    }

    fn lease(&self) -> impl Future<Output = DbResult<Lease<'_, Self::Conn>>> + Send {
        self.inner().lease()
    }
}

impl<C: Queryable> TxnTarget for TxnClient<'_, C> {
    type Conn = C;

    fn txn_config(&self) -> &Config {
        self.config
    }

    fn active_transaction(&self) -> Option<&TxnClient<'_, Self::Conn>> {
        Some(self)
    }

    async fn lease(&self) -> DbResult<Lease<'_, Self::Conn>> {
        Ok(Lease::Borrowed(self.conn))
    }
}
