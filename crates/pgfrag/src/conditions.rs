//! Column conditions for whereables.
//!
//! Each function returns a fragment written against [`SELF`], the column it is
//! attached to. Used as a whereable value it compiles with that column:
//!
//! ```ignore
//! use pgfrag::{Record, conditions as c, shortcuts};
//!
//! let recent = shortcuts::select(
//!     "books",
//!     Record::new()
//!         .set("year", c::gt(1990))
//!         .set("title", c::ilike("%rust%")),
//!     Default::default(),
//! );
//! // ... WHERE (("title" ILIKE $1) AND ("year" > $2)) ...
//! ```
//!
//! Arguments are bound as parameters unless they already are expressions
//! (fragments, [`parent`](crate::parent) columns, raw SQL, ...).

use crate::fragment::{Expr, Fragment, SELF, list, raw};
use crate::sql;

macro_rules! postfix_conditions {
    ($($(#[$doc:meta])* $name:ident => $sql:literal;)*) => {$(
        $(#[$doc])*
        pub fn $name() -> Fragment {
            sql!({SELF} $sql)
        }
    )*};
}

macro_rules! binary_conditions {
    ($($(#[$doc:meta])* $name:ident => $op:literal;)*) => {$(
        $(#[$doc])*
        pub fn $name(value: impl Into<Expr>) -> Fragment {
            sql!({SELF} $op {value})
        }
    )*};
}

macro_rules! range_conditions {
    ($($(#[$doc:meta])* $name:ident => $op:literal;)*) => {$(
        $(#[$doc])*
        pub fn $name(low: impl Into<Expr>, high: impl Into<Expr>) -> Fragment {
            sql!({SELF} $op " (" {low} ") AND (" {high} ")")
        }
    )*};
}

postfix_conditions! {
    /// `col IS NULL`
    is_null => " IS NULL";
    /// `col IS NOT NULL`
    is_not_null => " IS NOT NULL";
    /// `col IS TRUE`
    is_true => " IS TRUE";
    /// `col IS NOT TRUE`
    is_not_true => " IS NOT TRUE";
    /// `col IS FALSE`
    is_false => " IS FALSE";
    /// `col IS NOT FALSE`
    is_not_false => " IS NOT FALSE";
    is_unknown => " IS UNKNOWN";
    is_not_unknown => " IS NOT UNKNOWN";
}

binary_conditions! {
    /// `col = value`
    eq => " = ";
    /// `col <> value`
    ne => " <> ";
    /// `col > value`
    gt => " > ";
    /// `col >= value`
    gte => " >= ";
    /// `col < value`
    lt => " < ";
    /// `col <= value`
    lte => " <= ";
    /// `col IS DISTINCT FROM value`: like `<>`, but NULL-aware.
    is_distinct_from => " IS DISTINCT FROM ";
    /// `col IS NOT DISTINCT FROM value`: like `=`, but NULL-aware.
    is_not_distinct_from => " IS NOT DISTINCT FROM ";
    like => " LIKE ";
    not_like => " NOT LIKE ";
    ilike => " ILIKE ";
    not_ilike => " NOT ILIKE ";
    similar_to => " SIMILAR TO ";
    not_similar_to => " NOT SIMILAR TO ";
    /// `col ~ pattern`
    re_match => " ~ ";
    /// `col ~* pattern`
    re_imatch => " ~* ";
    /// `col !~ pattern`
    not_re_match => " !~ ";
    /// `col !~* pattern`
    not_re_imatch => " !~* ";
    /// Alias of [`gt`] for timestamps.
    after => " > ";
    /// Alias of [`lt`] for timestamps.
    before => " < ";
}

range_conditions! {
    /// `col BETWEEN (low) AND (high)`
    between => " BETWEEN";
    not_between => " NOT BETWEEN";
    between_symmetric => " BETWEEN SYMMETRIC";
    not_between_symmetric => " NOT BETWEEN SYMMETRIC";
}

/// `col IN (v1, v2, ...)`; an empty set compiles to `false`.
pub fn is_in<E: Into<Expr>>(values: impl IntoIterator<Item = E>) -> Fragment {
    let values: Vec<Expr> = values.into_iter().map(Into::into).collect();
    if values.is_empty() {
        return Fragment::literal("false");
    }
    sql!({SELF} " IN (" {list(values)} ")")
}

/// `col NOT IN (v1, v2, ...)`; an empty set compiles to `true`.
pub fn is_not_in<E: Into<Expr>>(values: impl IntoIterator<Item = E>) -> Fragment {
    let values: Vec<Expr> = values.into_iter().map(Into::into).collect();
    if values.is_empty() {
        return Fragment::literal("true");
    }
    sql!({SELF} " NOT IN (" {list(values)} ")")
}

fn group<E: Into<Expr>>(conditions: impl IntoIterator<Item = E>, op: &'static str) -> Fragment {
    sql!("(" {crate::fragment::join(conditions, op)} ")")
}

/// `(a AND b AND ...)`. Nested conditions see the same current column.
pub fn and<E: Into<Expr>>(conditions: impl IntoIterator<Item = E>) -> Fragment {
    group(conditions, " AND ")
}

/// `(a OR b OR ...)`
pub fn or<E: Into<Expr>>(conditions: impl IntoIterator<Item = E>) -> Fragment {
    group(conditions, " OR ")
}

/// `(NOT condition)`
pub fn not(condition: impl Into<Expr>) -> Fragment {
    sql!("(NOT " {condition} ")")
}

/// `to_tsvector(col) @@ to_tsquery(query)`
pub fn full_text_match(query: impl Into<Expr>) -> Fragment {
    sql!("to_tsvector(" {SELF} ") @@ to_tsquery(" {query} ")")
}

/// The current column verbatim, for building conditions by hand:
/// `sql!({conditions::column()} " % 2 = 0")`.
pub fn column() -> Expr {
    SELF.into()
}

/// Raw SQL applied to the current column as a suffix: `suffix(" @> '{1}'")`.
pub fn suffix(text: impl Into<String>) -> Fragment {
    sql!({SELF} {raw(text)})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{Record, param, parent_self, scoped};

    fn compiled(record: Record) -> (String, usize) {
        let q = sql!("WHERE " {record}).compile().unwrap();
        (q.text().to_string(), q.values().len())
    }

    #[test]
    fn conditions_render_against_their_column() {
        let (text, n) = compiled(
            Record::new()
                .set("a", is_null())
                .set("b", gt(5))
                .set("c", between(1, 10)),
        );
        assert_eq!(
            text,
            r#"WHERE (("a" IS NULL) AND ("b" > $1) AND ("c" BETWEEN ($2) AND ($3)))"#
        );
        assert_eq!(n, 3);
    }

    #[test]
    fn in_lists() {
        let (text, n) = compiled(Record::new().set("id", is_in([1_i64, 2, 3])));
        assert_eq!(text, r#"WHERE (("id" IN ($1, $2, $3)))"#);
        assert_eq!(n, 3);

        let (text, n) = compiled(Record::new().set("id", is_in(Vec::<i64>::new())));
        assert_eq!(text, "WHERE ((false))");
        assert_eq!(n, 0);

        let (text, _) = compiled(Record::new().set("id", is_not_in(Vec::<i64>::new())));
        assert_eq!(text, "WHERE ((true))");
    }

    #[test]
    fn boolean_combinators_nest() {
        let (text, n) = compiled(Record::new().set(
            "year",
            or([and([gte(1990), lt(2000)]), not(is_null())]),
        ));
        assert_eq!(
            text,
            // Record entry, OR group, AND group.
            r#"WHERE (((("year" >= $1 AND "year" < $2) OR (NOT "year" IS NULL))))"#
        );
        assert_eq!(n, 2);
    }

    #[test]
    fn arguments_may_be_expressions() {
        let cond = eq(parent_self());
        let outer = sql!("SELECT " {scoped("authors", &sql!({Record::new().set("id", cond)}))});
        let q = outer.compile().unwrap();
        assert_eq!(q.text(), r#"SELECT (("id" = "authors"."id"))"#);
        assert!(q.values().is_empty());

        let (text, n) = compiled(Record::new().set("title", ilike(param("%rust%"))));
        assert_eq!(text, r#"WHERE (("title" ILIKE $1))"#);
        assert_eq!(n, 1);
    }

    #[test]
    fn condition_outside_whereable_fails() {
        assert!(gt(1).compile().is_err());
    }
}
