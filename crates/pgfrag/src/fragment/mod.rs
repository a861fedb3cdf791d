//! SQL fragments: composable templates compiled to `$1, $2, ...` SQL.
//!
//! A [`Fragment`] is an immutable template of literal SQL segments interleaved
//! with [`Expr`] slots. Slots hold bound values, identifiers, raw SQL, nested
//! fragments and a few markers. Compiling walks the whole tree once and numbers
//! placeholders globally, so nested fragments never need to know where they
//! will end up.
//!
//! # Example
//!
//! ```ignore
//! use pgfrag::{param, sql, table};
//!
//! let author_filter = sql!(" AND author_id = " {param(42_i64)});
//! let q = sql!("SELECT * FROM " {table("books")} " WHERE year > " {param(1990_i32)} {author_filter});
//!
//! let compiled = q.compile()?;
//! assert_eq!(
//!     compiled.text(),
//!     r#"SELECT * FROM "books" WHERE year > $1 AND author_id = $2"#
//! );
//! ```

mod compile;
mod expr;
mod run;

#[cfg(test)]
mod tests;

pub use expr::{
    ALL, DEFAULT, Expr, Marker, ParentColumn, Record, SELF, concat, cols, cols_of, ident, join,
    list, param, parent, parent_self, raw, scoped, table, vals,
};

use crate::config::Config;
use crate::error::{DbError, DbResult};
use crate::query::CompiledQuery;
use crate::row::Row;
use compile::{Compiler, Scope};
use std::fmt;
use std::sync::Arc;

/// The literal segments and expression slots of a fragment.
///
/// Invariant: `literals.len() == exprs.len() + 1`.
#[derive(Debug)]
pub struct Template {
    literals: Vec<String>,
    exprs: Vec<Expr>,
}

impl Template {
    pub fn literals(&self) -> &[String] {
        &self.literals
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }
}

type Transform<T> = Arc<dyn Fn(Vec<Row>, &CompiledQuery) -> DbResult<T> + Send + Sync>;
type NoopResult<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// A SQL template plus what to do with its rows.
///
/// `T` is what [`Fragment::run`] returns; plain fragments return the rows
/// themselves. Fragments are immutable: [`Fragment::with_transform`],
/// [`Fragment::prepared`] and [`Fragment::noop`] return new fragments sharing
/// the same template.
#[must_use]
pub struct Fragment<T = Vec<Row>> {
    template: Arc<Template>,
    transform: Transform<T>,
    prepared: Option<String>,
    noop: Option<NoopResult<T>>,
}

impl<T> Clone for Fragment<T> {
    fn clone(&self) -> Self {
        Self {
            template: Arc::clone(&self.template),
            transform: Arc::clone(&self.transform),
            prepared: self.prepared.clone(),
            noop: self.noop.clone(),
        }
    }
}

impl<T> fmt::Debug for Fragment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("template", &self.template)
            .field("prepared", &self.prepared)
            .field("noop", &self.noop.is_some())
            .finish()
    }
}

impl Fragment {
    fn from_template(template: Template) -> Self {
        Self {
            template: Arc::new(template),
            transform: Arc::new(|rows, _| Ok(rows)),
            prepared: None,
            noop: None,
        }
    }

    /// Build a fragment from its literal segments and expression slots.
    ///
    /// Fails unless there is exactly one more literal than expressions.
    pub fn from_parts(literals: Vec<String>, exprs: Vec<Expr>) -> DbResult<Self> {
        if literals.len() != exprs.len() + 1 {
            return Err(DbError::validation(format!(
                "fragment needs {} literal segments for {} expressions, got {}",
                exprs.len() + 1,
                exprs.len(),
                literals.len()
            )));
        }
        Ok(Self::from_template(Template { literals, exprs }))
    }

    /// A fragment with no expressions.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::from_template(Template {
            literals: vec![text.into()],
            exprs: Vec::new(),
        })
    }

    /// Start a fragment that is assembled piece by piece.
    pub fn builder() -> FragmentBuilder {
        FragmentBuilder::new()
    }
}

impl<T> Fragment<T> {
    /// The template shared by every copy of this fragment.
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Compile with default settings.
    pub fn compile(&self) -> DbResult<CompiledQuery> {
        self.compile_with(Config::shared_default())
    }

    /// Compile using `config`'s JSON-casting flags.
    ///
    /// Compilation only reads the tree: compiling the same fragment twice
    /// yields identical text and values.
    pub fn compile_with(&self, config: &Config) -> DbResult<CompiledQuery> {
        let mut compiler = Compiler::new(config);
        compiler.fragment(&self.template, Scope::default())?;
        let mut query = compiler.finish();
        query.name = self.prepared.clone();
        Ok(query)
    }

    /// Replace the result transform. The no-op result (if any) is dropped since
    /// its type no longer matches.
    pub fn with_transform<U, F>(self, transform: F) -> Fragment<U>
    where
        F: Fn(Vec<Row>, &CompiledQuery) -> DbResult<U> + Send + Sync + 'static,
    {
        Fragment {
            template: self.template,
            transform: Arc::new(transform),
            prepared: self.prepared,
            noop: None,
        }
    }

    /// Replace the result transform with an infallible row mapping.
    pub fn map_rows<U, F>(self, f: F) -> Fragment<U>
    where
        F: Fn(Vec<Row>) -> U + Send + Sync + 'static,
    {
        self.with_transform(move |rows, _| Ok(f(rows)))
    }

    /// Ask the driver to treat repeated runs as one prepared statement.
    pub fn prepared(mut self, name: impl Into<String>) -> Self {
        self.prepared = Some(name.into());
        self
    }

    pub fn prepared_name(&self) -> Option<&str> {
        self.prepared.as_deref()
    }

    /// Mark this fragment as a no-op: [`Fragment::run`] returns `result`
    /// without touching the database.
    pub fn noop(mut self, result: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.noop = Some(Arc::new(move || result.clone()));
        self
    }

    pub fn is_noop(&self) -> bool {
        self.noop.is_some()
    }
}

/// Assembles a [`Fragment`] while keeping the literal/expression invariant.
#[derive(Debug)]
pub struct FragmentBuilder {
    literals: Vec<String>,
    exprs: Vec<Expr>,
}

impl Default for FragmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentBuilder {
    pub fn new() -> Self {
        Self {
            literals: vec![String::new()],
            exprs: Vec::new(),
        }
    }

    /// Append literal SQL to the current segment.
    pub fn push_text(&mut self, text: &str) -> &mut Self {
        if let Some(last) = self.literals.last_mut() {
            last.push_str(text);
        }
        self
    }

    /// Append an expression slot and open a new literal segment.
    pub fn push_expr(&mut self, expr: impl Into<Expr>) -> &mut Self {
        self.exprs.push(expr.into());
        self.literals.push(String::new());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.push_text(text);
        self
    }

    pub fn expr(mut self, expr: impl Into<Expr>) -> Self {
        self.push_expr(expr);
        self
    }

    pub fn build(self) -> Fragment {
        Fragment::from_template(Template {
            literals: self.literals,
            exprs: self.exprs,
        })
    }
}

/// Build a [`Fragment`] from string literals and `{expr}` slots.
///
/// ```ignore
/// let q = pgfrag::sql!("SELECT * FROM " {pgfrag::table("books")} " WHERE id = " {pgfrag::param(1_i64)});
/// ```
#[macro_export]
macro_rules! sql {
    ($($parts:tt)*) => {{
        #[allow(unused_mut)]
        let mut __pgfrag_builder = $crate::fragment::FragmentBuilder::new();
        $crate::__sql_parts!(__pgfrag_builder; $($parts)*);
        __pgfrag_builder.build()
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __sql_parts {
    ($b:ident;) => {};
    ($b:ident; $text:literal $($rest:tt)*) => {
        $b.push_text($text);
        $crate::__sql_parts!($b; $($rest)*);
    };
    ($b:ident; { $expr:expr } $($rest:tt)*) => {
        $b.push_expr($expr);
        $crate::__sql_parts!($b; $($rest)*);
    };
}
