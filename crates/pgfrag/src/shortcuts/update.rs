use super::{results, returning_json};
use crate::fragment::{Expr, Fragment, Record, cols_of, ident, vals};
use crate::sql;
use serde_json::Value;

/// Update the rows matching `where_` and return them as JSON.
///
/// Values are compiled with their column as the current column, so
/// `Record::new().set("views", sql!({SELF} " + 1"))` increments in place.
/// Nothing to set is a no-op returning `[]`.
pub fn update(table: &str, values: Record, where_: impl Into<Expr>) -> Fragment<Vec<Value>> {
    if values.is_empty() {
        return sql!("SELECT NULL WHERE false")
            .map_rows(|_| Vec::new())
            .noop(Vec::new());
    }
    sql!("UPDATE " {ident(table)}
        " SET (" {cols_of(&values)} ") = ROW(" {vals(values)} ")"
        " WHERE " {where_}
        " RETURNING " {returning_json(table)} " AS result")
    .with_transform(|rows, _| results(rows))
}
