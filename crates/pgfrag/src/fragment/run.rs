use super::Fragment;
use crate::client::Queryable;
use crate::error::DbResult;
use std::time::Instant;

impl<T> Fragment<T> {
    /// Compile, execute on `client` and apply the result transform.
    ///
    /// No-op fragments return their precomputed result without a round trip.
    pub async fn run<C: Queryable>(&self, client: &C) -> DbResult<T> {
        if let Some(noop) = &self.noop {
            tracing::trace!(
                target: "pgfrag.sql",
                txn_id = client.transaction_id(),
                "skipping no-op fragment"
            );
            return Ok(noop());
        }
        self.execute(client).await
    }

    /// Like [`Fragment::run`] but executes no-op fragments too.
    pub async fn run_forced<C: Queryable>(&self, client: &C) -> DbResult<T> {
        self.execute(client).await
    }

    async fn execute<C: Queryable>(&self, client: &C) -> DbResult<T> {
        let config = client.config();
        let query = self.compile_with(config)?;
        let txn_id = client.transaction_id();

        for listener in config.listeners() {
            listener.on_query(&query, txn_id);
        }

        let start = Instant::now();
        let rows = match client.query(&query).await {
            Ok(rows) => rows,
            Err(err) => {
                for listener in config.listeners() {
                    listener.on_error(&query, &err, txn_id);
                }
                return Err(err);
            }
        };
        let elapsed = start.elapsed();

        for listener in config.listeners() {
            listener.on_result(&query, &rows, txn_id, elapsed);
        }

        (self.transform)(rows, &query)
    }
}
