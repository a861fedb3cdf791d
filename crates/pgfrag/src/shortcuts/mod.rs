//! Ready-made statements built on fragments.
//!
//! Every shortcut returns a [`Fragment`](crate::Fragment) whose transform
//! unwraps the single `result` column PostgreSQL produces for it, so results
//! come back as `serde_json::Value` rows ready to deserialize.
//!
//! ```ignore
//! use pgfrag::{Record, shortcuts::{self, SelectOptions}};
//!
//! let book = shortcuts::insert("books", Record::new().set("title", "Dune").set("author_id", 1_i64))
//!     .run(&client)
//!     .await?;
//!
//! let books = shortcuts::select("books", Record::new().set("author_id", 1_i64), SelectOptions::new().limit(10))
//!     .run(&client)
//!     .await?;
//! ```

mod delete;
mod insert;
mod select;
mod update;


pub use delete::{TruncateOptions, delete, truncate};
pub use insert::{ConflictTarget, UpsertOptions, insert, insert_many, upsert};
pub use select::{
    Direction, Nulls, OrderBy, SelectOptions, count, select, select_exactly_one, select_one,
};
pub use update::update;

use crate::error::{DbError, DbResult};
use crate::fragment::{Expr, concat, ident, raw};
use crate::query::CompiledQuery;
use crate::row::Row;
use serde_json::Value;

const RESULT: &str = "result";

/// `to_jsonb("table".*)`
fn returning_json(table: &str) -> Expr {
    concat([raw("to_jsonb("), ident(table), raw(".*)")])
}

/// The `result` column of every row.
fn results(rows: Vec<Row>) -> DbResult<Vec<Value>> {
    rows.into_iter()
        .map(|mut row| {
            row.take(RESULT)
                .ok_or_else(|| DbError::decode(RESULT, "no such column"))
        })
        .collect()
}

/// The `result` column of the first row, if there is one.
fn first_result(rows: Vec<Row>) -> DbResult<Option<Value>> {
    Ok(results(rows)?.into_iter().next())
}

/// The `result` column of the first row, or [`DbError::NotExactlyOne`].
fn exactly_one_result(rows: Vec<Row>, query: &CompiledQuery) -> DbResult<Value> {
    first_result(rows)?.ok_or_else(|| DbError::NotExactlyOne(Box::new(query.clone())))
}
