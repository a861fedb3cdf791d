use super::{Fragment, Template};
use crate::ident::Ident;
use crate::param::Parameter;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// Compile-time signals that render as a fixed keyword or a context-dependent column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// The `DEFAULT` keyword.
    Default,
    /// The column currently being processed (inside a whereable or value list).
    SelfColumn,
    /// Matches every row: renders `TRUE` in a condition position.
    All,
}

/// `DEFAULT`
pub const DEFAULT: Marker = Marker::Default;
/// The column currently being processed.
pub const SELF: Marker = Marker::SelfColumn;
/// Every row.
pub const ALL: Marker = Marker::All;

/// A column of the enclosing query's table.
///
/// `column: None` means "the same column name as the one currently being
/// processed", so `Record::new().set("author_id", parent_self())` compiles to
/// `"author_id" = "authors"."author_id"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentColumn {
    pub(crate) column: Option<String>,
}

/// One interpolated slot of a fragment.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A nested fragment, compiled inline with the inherited context.
    Fragment(Arc<Template>),
    /// A nested fragment whose parent table is `parent_table` (lateral/correlated sub-queries).
    Scoped {
        parent_table: String,
        fragment: Arc<Template>,
    },
    /// A bound value.
    Param(Parameter),
    /// SQL text emitted verbatim. Never escaped, never parameterized.
    Raw(String),
    /// A table or column name, possibly dotted.
    Ident(String),
    /// A column of the parent table.
    Parent(ParentColumn),
    /// `DEFAULT`, the current column, or "all rows".
    Marker(Marker),
    /// `"a", "b", ...`
    ColumnNames(Vec<String>),
    /// One expression per column, `, `-separated, each compiled with that column current.
    ColumnValues(Record),
    /// `("a" = $1 AND ("b" > $2))`
    Where(Record),
    /// Elements compiled in order, joined by `separator`.
    List {
        items: Vec<Expr>,
        separator: Cow<'static, str>,
    },
}

/// A column → expression map, iterated in column-name order.
///
/// Used as a condition set (`Expr::Where`), a value list (`vals`), or a column
/// list (`cols`).
#[derive(Debug, Clone, Default)]
pub struct Record {
    columns: BTreeMap<String, Expr>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column to an arbitrary expression.
    pub fn set(mut self, column: impl Into<String>, expr: impl Into<Expr>) -> Self {
        self.insert(column, expr);
        self
    }

    /// Set a column to a bound value.
    pub fn value<T>(self, column: impl Into<String>, value: T) -> Self
    where
        T: ToSql + Send + Sync + 'static,
    {
        self.set(column, Parameter::new(value))
    }

    pub fn insert(&mut self, column: impl Into<String>, expr: impl Into<Expr>) {
        self.columns.insert(column.into(), expr.into());
    }

    pub fn get(&self, column: &str) -> Option<&Expr> {
        self.columns.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Expr> {
        self.columns.remove(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>, E: Into<Expr>> FromIterator<(K, E)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, E)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(k, e)| (k.into(), e.into()))
                .collect(),
        }
    }
}

impl<T> From<Fragment<T>> for Expr {
    fn from(fragment: Fragment<T>) -> Self {
        Expr::Fragment(fragment.template)
    }
}

impl<T> From<&Fragment<T>> for Expr {
    fn from(fragment: &Fragment<T>) -> Self {
        Expr::Fragment(Arc::clone(&fragment.template))
    }
}

impl From<Parameter> for Expr {
    fn from(param: Parameter) -> Self {
        Expr::Param(param)
    }
}

impl From<ParentColumn> for Expr {
    fn from(parent: ParentColumn) -> Self {
        Expr::Parent(parent)
    }
}

impl From<Marker> for Expr {
    fn from(marker: Marker) -> Self {
        Expr::Marker(marker)
    }
}

impl From<Ident> for Expr {
    fn from(ident: Ident) -> Self {
        Expr::Ident(ident.to_sql())
    }
}

impl From<Record> for Expr {
    fn from(record: Record) -> Self {
        Expr::Where(record)
    }
}

macro_rules! impl_param_from {
    ($($ty:ty),* $(,)?) => {$(
        impl From<$ty> for Expr {
            fn from(value: $ty) -> Self {
                Expr::Param(Parameter::new(value))
            }
        }
    )*};
}

// Plain values are always bound, never spliced into the SQL text.
impl_param_from!(
    bool,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    &'static str,
    uuid::Uuid,
    chrono::NaiveDate,
    chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>,
);

impl<T: ToSql + Send + Sync + 'static> From<Option<T>> for Expr {
    fn from(value: Option<T>) -> Self {
        Expr::Param(Parameter::new(value))
    }
}

impl From<serde_json::Value> for Expr {
    fn from(value: serde_json::Value) -> Self {
        Expr::Param(Parameter::json_value(value))
    }
}

impl From<Vec<Expr>> for Expr {
    fn from(items: Vec<Expr>) -> Self {
        list(items)
    }
}

/// Bind a value: compiles to the next `$n`.
pub fn param<T: ToSql + Send + Sync + 'static>(value: T) -> Parameter {
    Parameter::new(value)
}

/// Emit `text` verbatim. The caller is responsible for its safety.
pub fn raw(text: impl Into<String>) -> Expr {
    Expr::Raw(text.into())
}

/// A table or column name, dotted notation allowed (`public.books`).
pub fn ident(name: impl Into<String>) -> Expr {
    Expr::Ident(name.into())
}

/// Alias of [`ident`] that reads better in `FROM` position.
pub fn table(name: impl Into<String>) -> Expr {
    ident(name)
}

/// A named column of the parent table.
pub fn parent(column: impl Into<String>) -> ParentColumn {
    ParentColumn {
        column: Some(column.into()),
    }
}

/// The parent table's column with the same name as the current column.
pub fn parent_self() -> ParentColumn {
    ParentColumn { column: None }
}

/// `"a", "b"` for the given names.
pub fn cols<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Expr {
    Expr::ColumnNames(names.into_iter().map(Into::into).collect())
}

/// `"a", "b"` for the columns of a record, in the same order as [`vals`].
pub fn cols_of(record: &Record) -> Expr {
    cols(record.columns())
}

/// The record's values, in column-name order.
pub fn vals(record: Record) -> Expr {
    Expr::ColumnValues(record)
}

/// Elements joined by `, `.
pub fn list(items: impl IntoIterator<Item = impl Into<Expr>>) -> Expr {
    join(items, ", ")
}

/// Elements concatenated with no separator.
pub fn concat(items: impl IntoIterator<Item = impl Into<Expr>>) -> Expr {
    join(items, "")
}

/// Elements joined by an arbitrary separator.
pub fn join(
    items: impl IntoIterator<Item = impl Into<Expr>>,
    separator: impl Into<Cow<'static, str>>,
) -> Expr {
    Expr::List {
        items: items.into_iter().map(Into::into).collect(),
        separator: separator.into(),
    }
}

/// Compile `fragment` with `parent_table` as the table that [`parent`] references resolve against.
pub fn scoped<T>(parent_table: impl Into<String>, fragment: &Fragment<T>) -> Expr {
    Expr::Scoped {
        parent_table: parent_table.into(),
        fragment: Arc::clone(&fragment.template),
    }
}
