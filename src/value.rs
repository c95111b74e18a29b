//! Column values and parameter binding.
//!
//! `Value` is the dynamic value type carried between mapped entities and the
//! database: entity attributes dump to values, values bind to statement
//! placeholders, and result rows decode back into values. Keeping one enum
//! for all of these means the CRUD core never needs to know a model's
//! concrete field types.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::Row;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, query::Query};
use uuid::Uuid;

use crate::error::{ActiveError, ActiveResult};

/// Declared SQL type of a mapped column. Drives row decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Text,
    Uuid,
    Timestamp,
    Json,
}

/// A dynamically-typed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Text(String),
    /// UUID value
    Uuid(Uuid),
    /// Timestamp with time zone, kept in UTC
    Timestamp(DateTime<Utc>),
    /// JSON value
    Json(JsonValue),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamp",
            Self::Json(_) => "json",
        }
    }

    /// Convert to a JSON-representable value (timestamps as RFC 3339 strings,
    /// UUIDs as hyphenated strings).
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(v) => JsonValue::Bool(*v),
            Self::Int(v) => JsonValue::from(*v),
            Self::Float(v) => {
                serde_json::Number::from_f64(*v).map_or(JsonValue::Null, JsonValue::Number)
            }
            Self::Text(v) => JsonValue::String(v.clone()),
            Self::Uuid(v) => JsonValue::String(v.to_string()),
            Self::Timestamp(v) => JsonValue::String(v.to_rfc3339()),
            Self::Json(v) => v.clone(),
        }
    }

    /// Reconstruct a value from its JSON representation, guided by the
    /// declared column type. Inverse of [`Value::to_json`].
    pub fn from_json(ty: ColumnType, json: &JsonValue) -> ActiveResult<Self> {
        if json.is_null() {
            return Ok(Self::Null);
        }
        let mismatch = || {
            ActiveError::invalid_input(format!(
                "cannot load {json} as {ty:?}"
            ))
        };
        match ty {
            ColumnType::Bool => json.as_bool().map(Self::Bool).ok_or_else(mismatch),
            ColumnType::Int => json.as_i64().map(Self::Int).ok_or_else(mismatch),
            ColumnType::Float => json.as_f64().map(Self::Float).ok_or_else(mismatch),
            ColumnType::Text => json
                .as_str()
                .map(|s| Self::Text(s.to_string()))
                .ok_or_else(mismatch),
            ColumnType::Uuid => {
                let s = json.as_str().ok_or_else(mismatch)?;
                Uuid::parse_str(s).map(Self::Uuid).map_err(|_| mismatch())
            }
            ColumnType::Timestamp => {
                let s = json.as_str().ok_or_else(mismatch)?;
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| Self::Timestamp(dt.with_timezone(&Utc)))
                    .map_err(|_| mismatch())
            }
            ColumnType::Json => Ok(Self::Json(json.clone())),
        }
    }

    /// Decode a named column from a result row into a value.
    pub fn decode(row: &PgRow, name: &str, ty: ColumnType) -> ActiveResult<Self> {
        let value = match ty {
            ColumnType::Bool => row.try_get::<Option<bool>, _>(name)?.map(Self::Bool),
            ColumnType::Int => row.try_get::<Option<i64>, _>(name)?.map(Self::Int),
            ColumnType::Float => row.try_get::<Option<f64>, _>(name)?.map(Self::Float),
            ColumnType::Text => row.try_get::<Option<String>, _>(name)?.map(Self::Text),
            ColumnType::Uuid => row.try_get::<Option<Uuid>, _>(name)?.map(Self::Uuid),
            ColumnType::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(name)?
                .map(Self::Timestamp),
            ColumnType::Json => row
                .try_get::<Option<Json<JsonValue>>, _>(name)?
                .map(|j| Self::Json(j.0)),
        };
        Ok(value.unwrap_or(Self::Null))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Uuid(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Bind a value to a PostgreSQL query placeholder.
pub(crate) fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
        Value::Uuid(v) => query.bind(*v),
        Value::Timestamp(v) => query.bind(*v),
        Value::Json(v) => query.bind(Json(v.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_preserves_typed_values() {
        let id = Uuid::new_v4();
        let ts = Utc::now();
        let cases = [
            (ColumnType::Bool, Value::Bool(true)),
            (ColumnType::Int, Value::Int(42)),
            (ColumnType::Float, Value::Float(2.5)),
            (ColumnType::Text, Value::Text("hello".to_string())),
            (ColumnType::Uuid, Value::Uuid(id)),
            (ColumnType::Timestamp, Value::Timestamp(ts)),
            (ColumnType::Json, Value::Json(serde_json::json!({"a": 1}))),
        ];
        for (ty, value) in cases {
            let restored = Value::from_json(ty, &value.to_json()).unwrap();
            assert_eq!(restored, value, "round trip failed for {ty:?}");
        }
    }

    #[test]
    fn null_loads_as_null_for_any_type() {
        for ty in [ColumnType::Bool, ColumnType::Int, ColumnType::Uuid] {
            assert_eq!(
                Value::from_json(ty, &JsonValue::Null).unwrap(),
                Value::Null
            );
        }
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let err = Value::from_json(ColumnType::Int, &JsonValue::String("nope".into()));
        assert!(err.is_err());
        let err = Value::from_json(ColumnType::Uuid, &JsonValue::String("not-a-uuid".into()));
        assert!(err.is_err());
    }

    #[test]
    fn option_conversion_maps_none_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(7i64)), Value::Int(7));
    }
}
