use super::{results, returning_json};
use crate::fragment::{Expr, Fragment, ident, list, raw};
use crate::sql;
use serde_json::Value;

/// Delete the rows matching `where_` and return them as JSON.
pub fn delete(table: &str, where_: impl Into<Expr>) -> Fragment<Vec<Value>> {
    sql!("DELETE FROM " {ident(table)}
        " WHERE " {where_}
        " RETURNING " {returning_json(table)} " AS result")
    .with_transform(|rows, _| results(rows))
}

/// Options for [`truncate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TruncateOptions {
    /// `RESTART IDENTITY` (default is `CONTINUE IDENTITY`).
    pub restart_identity: bool,
    /// `CASCADE` (default is `RESTRICT`).
    pub cascade: bool,
}

impl TruncateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restart_identity(mut self) -> Self {
        self.restart_identity = true;
        self
    }

    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }
}

/// `TRUNCATE "a", "b" [RESTART IDENTITY] [CASCADE]`
pub fn truncate<S: AsRef<str>>(
    tables: impl IntoIterator<Item = S>,
    options: TruncateOptions,
) -> Fragment<()> {
    let tables = tables.into_iter().map(|t| ident(t.as_ref()));
    let identity = if options.restart_identity {
        " RESTART IDENTITY"
    } else {
        ""
    };
    let behavior = if options.cascade { " CASCADE" } else { "" };
    sql!("TRUNCATE " {list(tables)} {raw(identity)} {raw(behavior)}).map_rows(|_| ())
}
