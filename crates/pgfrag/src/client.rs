//! The driver seam: anything that can execute a [`CompiledQuery`] and return rows.

use crate::config::Config;
use crate::error::DbResult;
use crate::query::CompiledQuery;
use crate::row::Row;
use crate::transaction::IsolationLevel;
use std::future::Future;
use std::sync::Arc;

/// A connection, transaction or wrapper that can execute compiled queries.
///
/// Implemented for `tokio_postgres::Client`, `tokio_postgres::Transaction`,
/// `deadpool_postgres::Client` and `deadpool_postgres::Pool` (feature `pool`),
/// [`PgClient`] and [`TxnClient`](crate::TxnClient).
pub trait Queryable: Send + Sync {
    /// Execute a query and return all rows.
    fn query(&self, query: &CompiledQuery)
    -> impl Future<Output = DbResult<Vec<Row>>> + Send;

    /// Configuration used to compile and observe queries run on this client.
    fn config(&self) -> &Config {
        Config::shared_default()
    }

    /// Id of the transaction this client is tagged with, if any.
    fn transaction_id(&self) -> Option<u64> {
        None
    }

    /// Isolation level of the transaction this client is tagged with, if any.
    fn isolation_level(&self) -> Option<IsolationLevel> {
        None
    }
}

fn decode_rows(rows: &[tokio_postgres::Row]) -> DbResult<Vec<Row>> {
    rows.iter().map(Row::from_pg).collect()
}

impl Queryable for tokio_postgres::Client {
    async fn query(&self, query: &CompiledQuery) -> DbResult<Vec<Row>> {
        let rows = tokio_postgres::Client::query(self, query.text(), &query.params_ref()).await?;
        decode_rows(&rows)
    }
}

impl Queryable for tokio_postgres::Transaction<'_> {
    async fn query(&self, query: &CompiledQuery) -> DbResult<Vec<Row>> {
        let rows =
            tokio_postgres::Transaction::query(self, query.text(), &query.params_ref()).await?;
        decode_rows(&rows)
    }
}

#[cfg(feature = "pool")]
impl Queryable for deadpool_postgres::ClientWrapper {
    /// Named queries go through the connection's statement cache.
    async fn query(&self, query: &CompiledQuery) -> DbResult<Vec<Row>> {
        let params = query.params_ref();
        let rows = if query.name().is_some() {
            let stmt = self.prepare_cached(query.text()).await?;
            tokio_postgres::Client::query(self, &stmt, &params).await?
        } else {
            tokio_postgres::Client::query(self, query.text(), &params).await?
        };
        decode_rows(&rows)
    }
}

#[cfg(feature = "pool")]
impl Queryable for deadpool_postgres::Client {
    async fn query(&self, query: &CompiledQuery) -> DbResult<Vec<Row>> {
        // Delegate to the deref target (ClientWrapper).
        Queryable::query(&**self, query).await
    }
}

#[cfg(feature = "pool")]
impl Queryable for deadpool_postgres::Pool {
    /// Each query checks out its own connection, which goes back to the pool
    /// once the rows are decoded.
    async fn query(&self, query: &CompiledQuery) -> DbResult<Vec<Row>> {
        let client = self.get().await?;
        Queryable::query(&client, query).await
    }
}

/// A client paired with its own [`Config`].
///
/// Clients without a config compile and observe with
/// [`Config::shared_default`]; wrap them in `PgClient` to enable listeners,
/// JSON casting or custom retry settings.
///
/// # Example
///
/// ```ignore
/// use pgfrag::{Config, PgClient, monitor::TracingListener};
///
/// let client = PgClient::with_config(db_client, Config::new().with_listener(TracingListener::new()));
/// let books = pgfrag::shortcuts::select("books", pgfrag::ALL, Default::default()).run(&client).await?;
/// ```
#[derive(Debug, Clone)]
pub struct PgClient<C> {
    client: C,
    config: Arc<Config>,
}

impl<C> PgClient<C> {
    /// Wrap a client with the default configuration.
    pub fn new(client: C) -> Self {
        Self::with_config(client, Config::default())
    }

    /// Wrap a client with a custom configuration.
    pub fn with_config(client: C, config: Config) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    /// Wrap a client with a configuration shared with other wrappers.
    pub fn with_shared_config(client: C, config: Arc<Config>) -> Self {
        Self { client, config }
    }

    pub fn inner(&self) -> &C {
        &self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shared_config(&self) -> &Arc<Config> {
        &self.config
    }
}

impl<C: Queryable> Queryable for PgClient<C> {
    async fn query(&self, query: &CompiledQuery) -> DbResult<Vec<Row>> {
        self.client.query(query).await
    }

    fn config(&self) -> &Config {
        &self.config
    }
}
