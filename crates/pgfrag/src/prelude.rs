//! Convenient imports for typical `pgfrag` usage.
//!
//! ```ignore
//! use pgfrag::prelude::*;
//! ```

pub use crate::{
    ALL, Config, DEFAULT, DbError, DbResult, Fragment, IsolationLevel, PgClient, Queryable,
    Record, SELF, TxnClient, cols, ident, param, parent, raw, sql, table, transaction, vals,
};
pub use crate::conditions;
pub use crate::shortcuts::{self, SelectOptions};

#[cfg(feature = "pool")]
pub use crate::create_pool;
