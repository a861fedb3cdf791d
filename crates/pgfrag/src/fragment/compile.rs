use super::{Expr, Marker, ParentColumn, Record, Template};
use crate::config::Config;
use crate::error::{DbError, DbResult};
use crate::ident::{self, Ident};
use crate::param::{Cast, Parameter};
use crate::query::CompiledQuery;
use std::fmt::Write;

/// Context threaded through the recursive walk.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Scope<'a> {
    /// Table that parent-column references resolve against.
    pub parent_table: Option<&'a str>,
    /// Column currently being processed (whereables, value lists).
    pub column: Option<&'a str>,
}

impl<'a> Scope<'a> {
    fn with_column(self, column: &'a str) -> Self {
        Self {
            column: Some(column),
            ..self
        }
    }
}

/// The shared accumulator: SQL text plus the values bound so far.
pub(super) struct Compiler {
    text: String,
    values: Vec<crate::param::Param>,
    cast_arrays: bool,
    cast_objects: bool,
}

impl Compiler {
    pub fn new(config: &Config) -> Self {
        Self {
            text: String::new(),
            values: Vec::new(),
            cast_arrays: config.cast_array_params_to_json,
            cast_objects: config.cast_object_params_to_json,
        }
    }

    pub fn finish(self) -> CompiledQuery {
        CompiledQuery::new(self.text, self.values)
    }

    pub fn fragment(&mut self, template: &Template, scope: Scope<'_>) -> DbResult<()> {
        let mut literals = template.literals.iter();
        if let Some(first) = literals.next() {
            self.text.push_str(first);
        }
        for (expr, literal) in template.exprs.iter().zip(literals) {
            self.expr(expr, scope)?;
            self.text.push_str(literal);
        }
        Ok(())
    }

    pub fn expr(&mut self, expr: &Expr, scope: Scope<'_>) -> DbResult<()> {
        match expr {
            Expr::Fragment(template) => self.fragment(template, scope),
            Expr::Scoped {
                parent_table,
                fragment,
            } => self.fragment(
                fragment,
                Scope {
                    parent_table: Some(parent_table),
                    ..scope
                },
            ),
            Expr::Param(param) => {
                self.param(param);
                Ok(())
            }
            Expr::Raw(text) => {
                self.text.push_str(text);
                Ok(())
            }
            Expr::Ident(name) => {
                Ident::parse(name)?.write_sql(&mut self.text);
                Ok(())
            }
            Expr::Parent(parent) => self.parent(parent, scope),
            Expr::Marker(marker) => self.marker(*marker, scope),
            Expr::ColumnNames(names) => {
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        self.text.push_str(", ");
                    }
                    self.column(name)?;
                }
                Ok(())
            }
            Expr::ColumnValues(record) => {
                for (i, (column, value)) in record.iter().enumerate() {
                    if i > 0 {
                        self.text.push_str(", ");
                    }
                    self.expr(value, scope.with_column(column))?;
                }
                Ok(())
            }
            Expr::Where(record) => self.whereable(record, scope),
            Expr::List { items, separator } => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.text.push_str(separator);
                    }
                    self.expr(item, scope)?;
                }
                Ok(())
            }
        }
    }

    fn param(&mut self, param: &Parameter) {
        self.values.push(param.value.clone());
        let n = self.values.len();
        if param.casts_to_json(self.cast_arrays, self.cast_objects) {
            let _ = write!(self.text, "CAST(${n} AS \"json\")");
        } else if let Cast::Type(type_name) = &param.cast {
            let _ = write!(self.text, "CAST(${n} AS ");
            ident::write_quoted(&mut self.text, type_name);
            self.text.push(')');
        } else {
            let _ = write!(self.text, "${n}");
        }
    }

    fn column(&mut self, name: &str) -> DbResult<()> {
        // Column names are single identifiers: dots stay part of the name.
        Ident::new(name)?.write_sql(&mut self.text);
        Ok(())
    }

    fn parent(&mut self, parent: &ParentColumn, scope: Scope<'_>) -> DbResult<()> {
        let Some(table) = scope.parent_table else {
            return Err(DbError::invalid_expression(
                "Parent column referenced outside a scoped fragment",
            ));
        };
        let column = match (&parent.column, scope.column) {
            (Some(column), _) => column.as_str(),
            (None, Some(current)) => current,
            (None, None) => {
                return Err(DbError::invalid_expression(
                    "Unnamed parent column used with no current column",
                ));
            }
        };
        Ident::parse(table)?.write_sql(&mut self.text);
        self.text.push('.');
        self.column(column)
    }

    fn marker(&mut self, marker: Marker, scope: Scope<'_>) -> DbResult<()> {
        match marker {
            Marker::Default => self.text.push_str("DEFAULT"),
            Marker::All => self.text.push_str("TRUE"),
            Marker::SelfColumn => {
                let Some(column) = scope.column else {
                    return Err(DbError::invalid_expression(
                        "SELF used with no current column",
                    ));
                };
                self.column(column)?;
            }
        }
        Ok(())
    }

    fn whereable(&mut self, record: &Record, scope: Scope<'_>) -> DbResult<()> {
        if record.is_empty() {
            self.text.push_str("TRUE");
            return Ok(());
        }
        self.text.push('(');
        for (i, (column, value)) in record.iter().enumerate() {
            if i > 0 {
                self.text.push_str(" AND ");
            }
            let scope = scope.with_column(column);
            match value {
                Expr::Fragment(_) | Expr::Scoped { .. } => {
                    self.text.push('(');
                    self.expr(value, scope)?;
                    self.text.push(')');
                }
                _ => {
                    self.column(column)?;
                    self.text.push_str(" = ");
                    self.expr(value, scope)?;
                }
            }
        }
        self.text.push(')');
        Ok(())
    }
}
