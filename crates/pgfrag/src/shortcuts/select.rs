//! SELECT shortcuts returning JSON, with lateral sub-selects.

use super::{exactly_one_result, first_result};
use crate::error::{DbError, DbResult};
use crate::fragment::{Expr, Fragment, Marker, cols, concat, ident, join, list, param, raw};
use crate::param::Parameter;
use crate::row::Row;
use crate::sql;
use serde_json::Value;
use std::collections::BTreeMap;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Placement of NULLs in the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nulls {
    First,
    Last,
}

/// One `ORDER BY` item.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub by: Expr,
    pub direction: Direction,
    pub nulls: Option<Nulls>,
}

impl OrderBy {
    fn to_expr(&self) -> Expr {
        let direction = match self.direction {
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        };
        let nulls = match self.nulls {
            None => "",
            Some(Nulls::First) => " NULLS FIRST",
            Some(Nulls::Last) => " NULLS LAST",
        };
        concat([self.by.clone(), raw(direction), raw(nulls)])
    }
}

/// Options for [`select`] and friends.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// Only these columns, instead of the whole row.
    pub columns: Option<Vec<String>>,
    pub order: Vec<OrderBy>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Table alias; also the parent table seen by lateral sub-selects.
    pub alias: Option<String>,
    pub distinct: bool,
    /// Sub-selects joined laterally, keyed by the property they add to each row.
    lateral: BTreeMap<String, Expr>,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Order by a column.
    pub fn order_by(self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by_expr(cols([column.into()]), direction, None)
    }

    /// Order by an arbitrary expression, with optional NULLs placement.
    pub fn order_by_expr(
        mut self,
        by: impl Into<Expr>,
        direction: Direction,
        nulls: Option<Nulls>,
    ) -> Self {
        self.order.push(OrderBy {
            by: by.into(),
            direction,
            nulls,
        });
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Attach `subquery` as property `key` of every row.
    ///
    /// The sub-select is compiled with this select's table (or alias) as its
    /// parent table, so [`parent`](crate::parent) references inside it resolve
    /// to the outer row.
    pub fn lateral<T>(mut self, key: impl Into<String>, subquery: &Fragment<T>) -> Self {
        self.lateral.insert(key.into(), subquery.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Many,
    One,
    ExactlyOne,
    Count,
}

fn build(table: &str, where_: Expr, mut options: SelectOptions, mode: Mode) -> Fragment {
    if matches!(mode, Mode::One | Mode::ExactlyOne) {
        options.limit = Some(1);
    }
    let alias = options.alias.clone().unwrap_or_else(|| table.to_string());

    let columns = match (mode, &options.columns) {
        (Mode::Count, Some(columns)) => sql!("count(" {cols(columns.iter().cloned())} ")"),
        (Mode::Count, None) => sql!("count(" {ident(alias.as_str())} ".*)"),
        (_, Some(columns)) => {
            let pairs = columns.iter().map(|column| {
                concat([
                    Parameter::new(column.clone()).cast_as("text").into(),
                    raw(", "),
                    cols([column.as_str()]),
                ])
            });
            sql!("jsonb_build_object(" {list(pairs)} ")")
        }
        (_, None) => sql!("to_jsonb(" {ident(alias.as_str())} ".*)"),
    };

    let lateral_columns = if options.lateral.is_empty() || mode == Mode::Count {
        Fragment::literal("")
    } else {
        let pairs = options.lateral.keys().map(|key| {
            concat([
                Parameter::new(key.clone()).cast_as("text").into(),
                raw(", "),
                cols([format!("lateral_{key}")]),
                raw(".result"),
            ])
        });
        sql!(" || jsonb_build_object(" {list(pairs)} ")")
    };

    let joins = options.lateral.iter().map(|(key, subquery)| {
        let scoped = match subquery {
            Expr::Fragment(template) => Expr::Scoped {
                parent_table: alias.clone(),
                fragment: template.clone(),
            },
            other => other.clone(),
        };
        concat([
            raw(" LEFT JOIN LATERAL ("),
            scoped,
            raw(") AS "),
            cols([format!("lateral_{key}")]),
            raw(" ON true"),
        ])
    });

    let table_alias = match &options.alias {
        Some(alias) if alias != table => sql!(" AS " {cols([alias.as_str()])}),
        _ => Fragment::literal(""),
    };

    let where_clause = match where_ {
        Expr::Marker(Marker::All) => Fragment::literal(""),
        where_ => sql!(" WHERE " {where_}),
    };

    let order = if options.order.is_empty() {
        Fragment::literal("")
    } else {
        sql!(" ORDER BY " {list(options.order.iter().map(OrderBy::to_expr))})
    };
    let limit = match options.limit {
        Some(limit) => sql!(" LIMIT " {param(limit)}),
        None => Fragment::literal(""),
    };
    let offset = match options.offset {
        Some(offset) => sql!(" OFFSET " {param(offset)}),
        None => Fragment::literal(""),
    };
    let distinct = if options.distinct { " DISTINCT" } else { "" };

    let rows = sql!("SELECT" {raw(distinct)} " " {columns} {lateral_columns} " AS result FROM "
        {ident(table)} {table_alias} {join(joins, "")} {where_clause} {order} {limit} {offset});

    if mode == Mode::Many {
        sql!("SELECT coalesce(jsonb_agg(result), '[]') AS result FROM (" {rows} ") AS "
            {cols([format!("sq_{alias}")])})
    } else {
        rows
    }
}

fn json_array(value: Option<Value>) -> DbResult<Vec<Value>> {
    match value {
        Some(Value::Array(items)) => Ok(items),
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(other) => Err(DbError::decode(
            "result",
            format!("expected a JSON array, got {other}"),
        )),
    }
}

/// All rows matching `where_`, as JSON objects.
///
/// `where_` is typically a [`Record`](crate::Record) (column conditions),
/// a fragment, or [`ALL`](crate::ALL).
pub fn select(
    table: &str,
    where_: impl Into<Expr>,
    options: SelectOptions,
) -> Fragment<Vec<Value>> {
    build(table, where_.into(), options, Mode::Many)
        .with_transform(|rows, _| json_array(first_result(rows)?))
}

/// The first matching row, if any.
pub fn select_one(
    table: &str,
    where_: impl Into<Expr>,
    options: SelectOptions,
) -> Fragment<Option<Value>> {
    build(table, where_.into(), options, Mode::One).with_transform(|rows, _| first_result(rows))
}

/// The first matching row, or [`DbError::NotExactlyOne`] carrying the query.
pub fn select_exactly_one(
    table: &str,
    where_: impl Into<Expr>,
    options: SelectOptions,
) -> Fragment<Value> {
    build(table, where_.into(), options, Mode::ExactlyOne).with_transform(exactly_one_result)
}

/// Number of matching rows (or non-NULL values of `options.columns`).
pub fn count(table: &str, where_: impl Into<Expr>, options: SelectOptions) -> Fragment<i64> {
    build(table, where_.into(), options, Mode::Count).with_transform(|rows: Vec<Row>, _| {
        let value = first_result(rows)?;
        value
            .as_ref()
            .and_then(Value::as_i64)
            .ok_or_else(|| DbError::decode("result", format!("expected a count, got {value:?}")))
    })
}
