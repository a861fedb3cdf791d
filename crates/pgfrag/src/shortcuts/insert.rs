//! INSERT and INSERT ... ON CONFLICT shortcuts.

use super::{exactly_one_result, results, returning_json};
use crate::fragment::{
    DEFAULT, Expr, Fragment, Record, cols, cols_of, concat, ident, list, param, raw, vals,
};
use crate::sql;
use serde_json::Value;
use std::collections::BTreeSet;

/// Insert one row and return it as JSON.
///
/// An empty record inserts a row of defaults (`DEFAULT VALUES`).
pub fn insert(table: &str, record: Record) -> Fragment<Value> {
    let body = if record.is_empty() {
        sql!(" DEFAULT VALUES")
    } else {
        sql!(" (" {cols_of(&record)} ") VALUES (" {vals(record)} ")")
    };
    sql!("INSERT INTO " {ident(table)} {body} " RETURNING " {returning_json(table)} " AS result")
        .with_transform(exactly_one_result)
}

/// Insert many rows in one statement and return them as JSON.
///
/// Columns missing from some records are filled with `DEFAULT`. An empty
/// `records` is a no-op returning `[]` without a round trip.
pub fn insert_many(table: &str, records: Vec<Record>) -> Fragment<Vec<Value>> {
    if records.is_empty() {
        return noop_insert(table);
    }
    sql!("INSERT INTO " {ident(table)} {values_clause(records)} " RETURNING " {returning_json(table)} " AS result")
        .with_transform(|rows, _| results(rows))
}

fn noop_insert(table: &str) -> Fragment<Vec<Value>> {
    sql!("INSERT INTO " {ident(table)} " SELECT null WHERE false")
        .map_rows(|_| Vec::new())
        .noop(Vec::new())
}

/// ` ("a", "b") VALUES ($1, $2), ($3, DEFAULT)`, or a defaults-only select
/// when no record has any column.
fn values_clause(records: Vec<Record>) -> Fragment {
    let columns: BTreeSet<String> = records
        .iter()
        .flat_map(|record| record.columns().map(str::to_string))
        .collect();

    if columns.is_empty() {
        let n = i32::try_from(records.len()).unwrap_or(i32::MAX);
        return sql!(" SELECT FROM generate_series(1, " {param(n)} ")");
    }

    let rows = records.into_iter().map(|mut record| {
        for column in &columns {
            if !record.contains(column) {
                record.insert(column.clone(), DEFAULT);
            }
        }
        concat([raw("("), vals(record), raw(")")])
    });
    sql!(" (" {cols(columns.iter().cloned())} ") VALUES " {list(rows)})
}

/// What the conflict clause of an upsert matches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictTarget {
    /// `ON CONFLICT ("a", "b")`
    Columns(Vec<String>),
    /// `ON CONFLICT ON CONSTRAINT "name"`
    Constraint(String),
}

impl ConflictTarget {
    pub fn columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self::Columns(columns.into_iter().map(Into::into).collect())
    }

    pub fn constraint(name: impl Into<String>) -> Self {
        Self::Constraint(name.into())
    }
}

impl<const N: usize> From<[&str; N]> for ConflictTarget {
    fn from(columns: [&str; N]) -> Self {
        Self::columns(columns)
    }
}

impl From<Vec<String>> for ConflictTarget {
    fn from(columns: Vec<String>) -> Self {
        Self::Columns(columns)
    }
}

/// Options for [`upsert`].
#[derive(Debug, Clone)]
pub struct UpsertOptions {
    /// Columns to overwrite on conflict. `None` means every inserted column;
    /// an empty list means `DO NOTHING`.
    pub update_columns: Option<Vec<String>>,
    /// Columns whose existing value is kept when the new value is NULL.
    pub no_null_update_columns: Vec<String>,
    /// Explicit values for updated columns, in place of `EXCLUDED."col"`.
    pub update_values: Record,
    /// Add `"$action": "INSERT" | "UPDATE"` to each returned row.
    pub report_action: bool,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            update_columns: None,
            no_null_update_columns: Vec::new(),
            update_values: Record::new(),
            report_action: true,
        }
    }
}

impl UpsertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.update_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// `ON CONFLICT ... DO NOTHING`
    pub fn do_nothing(mut self) -> Self {
        self.update_columns = Some(Vec::new());
        self
    }

    pub fn no_null_update_columns<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.no_null_update_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn update_value(mut self, column: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.update_values.insert(column, value);
        self
    }

    /// Leave out the `$action` key.
    pub fn suppress_action(mut self) -> Self {
        self.report_action = false;
        self
    }
}

/// Insert rows, updating those that conflict with existing ones.
///
/// Rows come back with an extra `"$action"` key (`"INSERT"` or `"UPDATE"`),
/// derived from `xmax` being zero for freshly inserted tuples. Rows skipped by
/// `DO NOTHING` are not returned. An empty `records` is a no-op returning `[]`.
pub fn upsert(
    table: &str,
    records: Vec<Record>,
    conflict: impl Into<ConflictTarget>,
    options: UpsertOptions,
) -> Fragment<Vec<Value>> {
    if records.is_empty() {
        return noop_insert(table);
    }

    let update_columns: Vec<String> = match options.update_columns {
        Some(columns) => columns,
        None => records
            .iter()
            .flat_map(|record| record.columns().map(str::to_string))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    let target = match conflict.into() {
        ConflictTarget::Columns(columns) => sql!("(" {cols(columns)} ")"),
        ConflictTarget::Constraint(name) => sql!("ON CONSTRAINT " {cols([name])}),
    };

    let action = if update_columns.is_empty() {
        sql!("DO NOTHING")
    } else {
        let mut values = Record::new();
        for column in &update_columns {
            let value: Expr = if let Some(value) = options.update_values.get(column) {
                value.clone()
            } else if options.no_null_update_columns.contains(column) {
                sql!("CASE WHEN EXCLUDED." {cols([column.as_str()])} " IS NULL THEN "
                    {ident(table)} "." {cols([column.as_str()])}
                    " ELSE EXCLUDED." {cols([column.as_str()])} " END")
                .into()
            } else {
                concat([raw("EXCLUDED."), cols([column.as_str()])])
            };
            values.insert(column.clone(), value);
        }
        // Compiled as a value list so SELF resolves to each updated column.
        sql!("DO UPDATE SET (" {cols_of(&values)} ") = ROW(" {vals(values)} ")")
    };

    let returning = if options.report_action {
        sql!({returning_json(table)}
            " || jsonb_build_object('$action', CASE xmax WHEN 0 THEN 'INSERT' ELSE 'UPDATE' END)")
    } else {
        sql!({returning_json(table)})
    };

    sql!("INSERT INTO " {ident(table)} {values_clause(records)}
        " ON CONFLICT " {target} " " {action}
        " RETURNING " {returning} " AS result")
    .with_transform(|rows, _| results(rows))
}
