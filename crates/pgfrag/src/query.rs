//! The compiled form of a fragment: SQL text with `$1, $2, ...` plus its values.

use crate::param::Param;
use tokio_postgres::types::ToSql;

/// A SQL string with numbered placeholders and the values that fill them.
///
/// This is the boundary object handed to the driver. Placeholders are
/// contiguous from `$1` and `values[i]` fills `$(i + 1)`.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub(crate) text: String,
    pub(crate) values: Vec<Param>,
    pub(crate) name: Option<String>,
}

impl CompiledQuery {
    /// Build a query from pre-numbered SQL and its values.
    pub fn new(text: impl Into<String>, values: Vec<Param>) -> Self {
        Self {
            text: text.into(),
            values,
            name: None,
        }
    }

    /// Access the SQL string.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The positional values.
    pub fn values(&self) -> &[Param] {
        &self.values
    }

    /// Prepared-statement name, if the fragment asked for one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Attach a prepared-statement name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Parameter refs compatible with `tokio-postgres`.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values.iter().map(Param::as_ref).collect()
    }
}
