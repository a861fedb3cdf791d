//! Parameter storage and cast directives.

use crate::error::DbResult;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// A clone-friendly bound value using Arc.
///
/// Fragments are cloned and compiled repeatedly; sharing the value keeps that
/// cheap and leaves the original untouched.
#[derive(Clone)]
pub struct Param(pub(crate) Arc<dyn ToSql + Send + Sync>);

impl Param {
    /// Create a new parameter from any ToSql value.
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Param(Arc::new(value))
    }

    /// Get a reference to the inner value as a ToSql trait object.
    pub fn as_ref(&self) -> &(dyn ToSql + Sync) {
        &*self.0 as &(dyn ToSql + Sync)
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// How a [`Parameter`] placeholder is cast in the compiled SQL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cast {
    /// No explicit directive; JSON casting follows the config flags.
    #[default]
    Auto,
    /// Always cast to `json`.
    Json,
    /// Never cast to `json`, whatever the config says.
    NoJson,
    /// `CAST($n AS "<type>")`.
    Type(String),
}

/// Shape of a parameter value, as far as JSON casting is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueShape {
    Scalar,
    Array,
    Object,
}

/// A value destined to become a `$n` placeholder plus an entry in the value array.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub(crate) value: Param,
    pub(crate) shape: ValueShape,
    pub(crate) cast: Cast,
}

impl Parameter {
    /// Wrap a plain value.
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Param::new(value),
            shape: ValueShape::Scalar,
            cast: Cast::Auto,
        }
    }

    /// Wrap a JSON value. Arrays and objects are eligible for `json` casting.
    pub fn json_value(value: serde_json::Value) -> Self {
        let shape = match &value {
            serde_json::Value::Array(_) => ValueShape::Array,
            serde_json::Value::Object(_) => ValueShape::Object,
            _ => ValueShape::Scalar,
        };
        Self {
            value: Param::new(value),
            shape,
            cast: Cast::Auto,
        }
    }

    /// Serialize `value` to JSON and wrap it with a forced `json` cast.
    pub fn json<T: Serialize>(value: &T) -> DbResult<Self> {
        Ok(Self::json_value(serde_json::to_value(value)?).cast(Cast::Json))
    }

    /// Replace the cast directive.
    pub fn cast(mut self, cast: Cast) -> Self {
        self.cast = cast;
        self
    }

    /// Cast the placeholder to the named type.
    pub fn cast_as(self, type_name: impl Into<String>) -> Self {
        self.cast(Cast::Type(type_name.into()))
    }

    /// The cast directive of this parameter.
    pub fn cast_directive(&self) -> &Cast {
        &self.cast
    }

    /// Whether compiling this parameter under the given flags wraps it in a `json` cast.
    ///
    /// An explicit [`Cast::Json`] always does, whatever the value's shape; the
    /// flags only apply to JSON arrays and objects without a directive.
    pub(crate) fn casts_to_json(&self, arrays: bool, objects: bool) -> bool {
        match (&self.cast, self.shape) {
            (Cast::Json, _) => true,
            (Cast::Auto, ValueShape::Array) => arrays,
            (Cast::Auto, ValueShape::Object) => objects,
            _ => false,
        }
    }
}
