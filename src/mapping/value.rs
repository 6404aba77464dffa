//! Semantic column types and the runtime value carrier.
//!
//! Every persisted field has one of six semantic types. Binding and reading are pure
//! functions of that type, implemented through [`SqlValue`] for the supported Rust
//! carriers (`i32`, `i64`, `bool`, `f64`, `String`, `DateTime<Utc>` and `Option`s of
//! each).

use crate::error::{OrmError, OrmResult};
use chrono::{DateTime, Utc};

/// Semantic type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int32,
    Int64,
    Bool,
    Float64,
    String,
    Timestamp,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Bool => "bool",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Timestamp => "timestamp",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A bindable/readable value.
///
/// `Null` carries the semantic type so that the driver can bind a typed NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null(FieldType),
    Int32(i32),
    Int64(i64),
    Bool(bool),
    Float64(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Semantic type of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Null(ty) => *ty,
            Self::Int32(_) => FieldType::Int32,
            Self::Int64(_) => FieldType::Int64,
            Self::Bool(_) => FieldType::Bool,
            Self::Float64(_) => FieldType::Float64,
            Self::String(_) => FieldType::String,
            Self::Timestamp(_) => FieldType::Timestamp,
        }
    }

    /// Integer view used for id columns.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            Self::Int32(v) => Some(i64::from(*v)),
            _ => None,
        }
    }
}

/// Conversion between a Rust field type and [`Value`].
pub trait SqlValue: Sized {
    const FIELD_TYPE: FieldType;
    const NULLABLE: bool = false;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> OrmResult<Self>;
}

fn mismatch(expected: FieldType, value: &Value) -> OrmError {
    match value {
        Value::Null(_) => OrmError::mapping(format!(
            "NULL cannot be assigned to a non-nullable {} field",
            expected
        )),
        other => OrmError::mapping(format!(
            "Expected a {} value but found {}",
            expected,
            other.field_type()
        )),
    }
}

impl SqlValue for i32 {
    const FIELD_TYPE: FieldType = FieldType::Int32;

    fn to_value(&self) -> Value {
        Value::Int32(*self)
    }

    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Int32(v) => Ok(v),
            Value::Int64(v) => i32::try_from(v)
                .map_err(|_| OrmError::mapping(format!("Value {} does not fit in int32", v))),
            other => Err(mismatch(Self::FIELD_TYPE, &other)),
        }
    }
}

impl SqlValue for i64 {
    const FIELD_TYPE: FieldType = FieldType::Int64;

    fn to_value(&self) -> Value {
        Value::Int64(*self)
    }

    fn from_value(value: Value) -> OrmResult<Self> {
        match value.as_i64() {
            Some(v) => Ok(v),
            None => Err(mismatch(Self::FIELD_TYPE, &value)),
        }
    }
}

impl SqlValue for bool {
    const FIELD_TYPE: FieldType = FieldType::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(mismatch(Self::FIELD_TYPE, &other)),
        }
    }
}

impl SqlValue for f64 {
    const FIELD_TYPE: FieldType = FieldType::Float64;

    fn to_value(&self) -> Value {
        Value::Float64(*self)
    }

    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Float64(v) => Ok(v),
            other => Err(mismatch(Self::FIELD_TYPE, &other)),
        }
    }
}

impl SqlValue for String {
    const FIELD_TYPE: FieldType = FieldType::String;

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::String(v) => Ok(v),
            other => Err(mismatch(Self::FIELD_TYPE, &other)),
        }
    }
}

impl SqlValue for DateTime<Utc> {
    const FIELD_TYPE: FieldType = FieldType::Timestamp;

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Timestamp(v) => Ok(v),
            other => Err(mismatch(Self::FIELD_TYPE, &other)),
        }
    }
}

impl<T: SqlValue> SqlValue for Option<T> {
    const FIELD_TYPE: FieldType = T::FIELD_TYPE;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null(T::FIELD_TYPE),
        }
    }

    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Null(_) => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: SqlValue + Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null(T::FIELD_TYPE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_value_field_type() {
        assert_eq!(Value::from(3_i32).field_type(), FieldType::Int32);
        assert_eq!(Value::from("x").field_type(), FieldType::String);
        assert_eq!(Value::Null(FieldType::Bool).field_type(), FieldType::Bool);
        assert_eq!(Value::from(None::<f64>), Value::Null(FieldType::Float64));
    }

    #[test]
    fn test_int_widening_and_narrowing() {
        assert_eq!(i64::from_value(Value::Int32(7)).unwrap(), 7);
        assert_eq!(i32::from_value(Value::Int64(7)).unwrap(), 7);
        assert!(matches!(
            i32::from_value(Value::Int64(i64::MAX)),
            Err(OrmError::Mapping { .. })
        ));
    }

    #[test]
    fn test_null_into_non_nullable_is_mapping_error() {
        let err = String::from_value(Value::Null(FieldType::String)).unwrap_err();
        assert!(matches!(err, OrmError::Mapping { .. }));
        assert!(err.to_string().contains("non-nullable"));
    }

    #[test]
    fn test_option_round_trip() {
        let some: Option<bool> = Some(true);
        assert_eq!(some.to_value(), Value::Bool(true));
        let none: Option<bool> = None;
        assert_eq!(none.to_value(), Value::Null(FieldType::Bool));
        assert_eq!(Option::<bool>::from_value(Value::Null(FieldType::Bool)).unwrap(), None);
        assert!(<Option<i32> as SqlValue>::NULLABLE);
        assert!(!<i32 as SqlValue>::NULLABLE);
    }

    #[test]
    fn test_type_mismatch() {
        let err = bool::from_value(Value::String("yes".to_string())).unwrap_err();
        assert!(err.to_string().contains("Expected a bool value but found string"));
    }

    #[test]
    fn test_timestamp_value() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(DateTime::<Utc>::from_value(ts.to_value()).unwrap(), ts);
    }
}
