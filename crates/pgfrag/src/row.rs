//! Rows as handed to result transforms.
//!
//! A [`Row`] is a column-name → JSON value map. Rows coming from
//! `tokio-postgres` are decoded by column type; shortcut queries return a single
//! `jsonb` column named `result`, so most transforms only ever call
//! [`Row::get`] on that.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;
use std::net::IpAddr;
use tokio_postgres::types::{FromSql, Kind, Type};

/// One result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Map<String, Value>,
}

impl Row {
    /// Build a row from a JSON object.
    pub fn from_map(columns: Map<String, Value>) -> Self {
        Self { columns }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self {
            columns: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Raw JSON value of a column.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Take a column's value out of the row.
    pub fn take(&mut self, column: &str) -> Option<Value> {
        self.columns.remove(column)
    }

    /// Deserialize a column into `T`.
    pub fn get<T: DeserializeOwned>(&self, column: &str) -> DbResult<T> {
        let value = self
            .columns
            .get(column)
            .ok_or_else(|| DbError::decode(column, "no such column"))?;
        T::deserialize(value).map_err(|e| DbError::decode(column, e.to_string()))
    }

    /// Deserialize the whole row into `T`, treating columns as struct fields.
    pub fn deserialize<T: DeserializeOwned>(&self) -> DbResult<T> {
        T::deserialize(&Value::Object(self.columns.clone()))
            .map_err(|e| DbError::decode("*", e.to_string()))
    }

    /// Column names, sorted.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.columns
    }

    /// Decode a `tokio-postgres` row by column type.
    ///
    /// `numeric` becomes a JSON string, so no precision is lost; enum labels
    /// become strings. Columns of a type with no decoder come back as `null`
    /// rather than failing the whole result set.
    pub fn from_pg(row: &tokio_postgres::Row) -> DbResult<Self> {
        let mut columns = Map::with_capacity(row.len());
        for (idx, column) in row.columns().iter().enumerate() {
            let value = decode_column(row, idx, column.type_())
                .map_err(|message| DbError::decode(column.name(), message))?
                .unwrap_or_else(|| {
                    tracing::warn!(
                        column = column.name(),
                        column_type = column.type_().name(),
                        "no decoder for column type, returning null"
                    );
                    Value::Null
                });
            columns.insert(column.name().to_string(), value);
        }
        Ok(Self { columns })
    }
}

fn get<'a, T>(row: &'a tokio_postgres::Row, idx: usize) -> Result<Option<T>, String>
where
    T: FromSql<'a>,
{
    row.try_get::<_, Option<T>>(idx).map_err(|e| e.to_string())
}

fn json_of<T: serde::Serialize>(value: Option<T>) -> Result<Value, String> {
    match value {
        Some(v) => serde_json::to_value(v).map_err(|e| e.to_string()),
        None => Ok(Value::Null),
    }
}

fn text_of<T: ToString>(value: Option<T>) -> Value {
    value.map_or(Value::Null, |v| Value::String(v.to_string()))
}

fn text_array<T: ToString>(values: Option<Vec<Option<T>>>) -> Value {
    match values {
        Some(values) => Value::Array(values.into_iter().map(text_of).collect()),
        None => Value::Null,
    }
}

/// Label of a user-defined enum value; the wire format is the label's text.
struct EnumLabel(String);

impl<'a> FromSql<'a> for EnumLabel {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Self(std::str::from_utf8(raw)?.to_owned()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_))
    }
}

impl fmt::Display for EnumLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An `interval`, kept as the three fields Postgres stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub microseconds: i64,
}

impl Interval {
    fn from_be_bytes(raw: &[u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        if raw.len() != 16 {
            return Err(format!("invalid interval length {}", raw.len()).into());
        }
        Ok(Self {
            microseconds: i64::from_be_bytes(raw[..8].try_into()?),
            days: i32::from_be_bytes(raw[8..12].try_into()?),
            months: i32::from_be_bytes(raw[12..].try_into()?),
        })
    }
}

impl<'a> FromSql<'a> for Interval {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Self::from_be_bytes(raw)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::INTERVAL
    }
}

/// `Ok(None)` when there is no decoder for `ty`.
fn decode_column(
    row: &tokio_postgres::Row,
    idx: usize,
    ty: &Type,
) -> Result<Option<Value>, String> {
    let value = match *ty {
        Type::BOOL => json_of(get::<bool>(row, idx)?)?,
        Type::CHAR => json_of(get::<i8>(row, idx)?)?,
        Type::INT2 => json_of(get::<i16>(row, idx)?)?,
        Type::INT4 => json_of(get::<i32>(row, idx)?)?,
        Type::INT8 => json_of(get::<i64>(row, idx)?)?,
        Type::OID => json_of(get::<u32>(row, idx)?)?,
        Type::FLOAT4 => json_of(get::<f32>(row, idx)?)?,
        Type::FLOAT8 => json_of(get::<f64>(row, idx)?)?,
        Type::NUMERIC => text_of(get::<Decimal>(row, idx)?),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            json_of(get::<String>(row, idx)?)?
        }
        Type::JSON | Type::JSONB => get::<Value>(row, idx)?.unwrap_or(Value::Null),
        Type::UUID => json_of(get::<uuid::Uuid>(row, idx)?)?,
        Type::INET => json_of(get::<IpAddr>(row, idx)?)?,
        Type::TIMESTAMPTZ => json_of(get::<DateTime<Utc>>(row, idx)?)?,
        Type::TIMESTAMP => json_of(get::<NaiveDateTime>(row, idx)?)?,
        Type::DATE => json_of(get::<NaiveDate>(row, idx)?)?,
        Type::TIME => json_of(get::<NaiveTime>(row, idx)?)?,
        Type::INTERVAL => json_of(get::<Interval>(row, idx)?)?,
        Type::BYTEA => json_of(get::<Vec<u8>>(row, idx)?)?,
        Type::BOOL_ARRAY => json_of(get::<Vec<Option<bool>>>(row, idx)?)?,
        Type::INT2_ARRAY => json_of(get::<Vec<Option<i16>>>(row, idx)?)?,
        Type::INT4_ARRAY => json_of(get::<Vec<Option<i32>>>(row, idx)?)?,
        Type::INT8_ARRAY => json_of(get::<Vec<Option<i64>>>(row, idx)?)?,
        Type::OID_ARRAY => json_of(get::<Vec<Option<u32>>>(row, idx)?)?,
        Type::FLOAT4_ARRAY => json_of(get::<Vec<Option<f32>>>(row, idx)?)?,
        Type::FLOAT8_ARRAY => json_of(get::<Vec<Option<f64>>>(row, idx)?)?,
        Type::NUMERIC_ARRAY => text_array(get::<Vec<Option<Decimal>>>(row, idx)?),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::BPCHAR_ARRAY | Type::NAME_ARRAY => {
            json_of(get::<Vec<Option<String>>>(row, idx)?)?
        }
        Type::JSONB_ARRAY | Type::JSON_ARRAY => json_of(get::<Vec<Option<Value>>>(row, idx)?)?,
        Type::UUID_ARRAY => json_of(get::<Vec<Option<uuid::Uuid>>>(row, idx)?)?,
        Type::INET_ARRAY => json_of(get::<Vec<Option<IpAddr>>>(row, idx)?)?,
        Type::TIMESTAMPTZ_ARRAY => json_of(get::<Vec<Option<DateTime<Utc>>>>(row, idx)?)?,
        Type::TIMESTAMP_ARRAY => json_of(get::<Vec<Option<NaiveDateTime>>>(row, idx)?)?,
        Type::DATE_ARRAY => json_of(get::<Vec<Option<NaiveDate>>>(row, idx)?)?,
        Type::TIME_ARRAY => json_of(get::<Vec<Option<NaiveTime>>>(row, idx)?)?,
        Type::INTERVAL_ARRAY => json_of(get::<Vec<Option<Interval>>>(row, idx)?)?,
        Type::BYTEA_ARRAY => json_of(get::<Vec<Option<Vec<u8>>>>(row, idx)?)?,
        _ => match ty.kind() {
            Kind::Enum(_) => text_of(get::<EnumLabel>(row, idx)?),
            Kind::Array(inner) if matches!(inner.kind(), Kind::Enum(_)) => {
                text_array(get::<Vec<Option<EnumLabel>>>(row, idx)?)
            }
            _ => return Ok(None),
        },
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Book {
        id: i64,
        title: String,
    }

    #[test]
    fn get_deserializes_column() {
        let row = Row::from_pairs([("result", json!({"id": 1, "title": "Dune"}))]);
        let book: Book = row.get("result").unwrap();
        assert_eq!(
            book,
            Book {
                id: 1,
                title: "Dune".into()
            }
        );
    }

    #[test]
    fn deserialize_whole_row() {
        let row = Row::from_pairs([("id", json!(7)), ("title", json!("Emma"))]);
        let book: Book = row.deserialize().unwrap();
        assert_eq!(book.id, 7);
    }

    #[test]
    fn interval_fields_from_wire_bytes() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&90_000_000_i64.to_be_bytes());
        raw.extend_from_slice(&3_i32.to_be_bytes());
        raw.extend_from_slice(&14_i32.to_be_bytes());

        let interval = Interval::from_be_bytes(&raw).unwrap();
        assert_eq!(
            serde_json::to_value(interval).unwrap(),
            json!({"months": 14, "days": 3, "microseconds": 90_000_000})
        );
        assert!(Interval::from_be_bytes(&raw[..12]).is_err());
    }

    #[test]
    fn text_arrays_keep_nulls() {
        let decimals = Some(vec![Some(Decimal::new(15, 1)), None]);
        assert_eq!(text_array(decimals), json!(["1.5", null]));
        assert_eq!(text_array::<Decimal>(None), Value::Null);
    }

    #[test]
    fn missing_column_is_decode_error() {
        let row = Row::default();
        let err = row.get::<i64>("count").unwrap_err();
        assert!(matches!(err, DbError::Decode { ref column, .. } if column == "count"));
    }
}
