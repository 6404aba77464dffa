//! Row decoding into semantic values.
//!
//! # Architecture
//!
//! The caller knows the semantic type of every selected column (from the record's
//! field descriptors), so decoding is driven by [`FieldType`] rather than by the
//! driver's type name. Each type tries its natural Rust carrier first and then a
//! compatible neighbour, because backends disagree on integer widths, float widths and
//! whether timestamps carry a zone:
//!
//! | FieldType | first try        | fallback                 |
//! |-----------|------------------|--------------------------|
//! | Int32     | `i32`            | `i64`, range-checked     |
//! | Int64     | `i64`            | `i32`, widened           |
//! | Bool      | `bool`           | `i64 != 0`               |
//! | Float64   | `f64`            | `f32`, widened           |
//! | String    | `String`         |                          |
//! | Timestamp | `DateTime<Utc>`  | `NaiveDateTime` as UTC   |
//!
//! NULL decodes to `Value::Null(ty)` regardless of the column's driver type.

use crate::error::{OrmError, OrmResult};
use crate::mapping::{FieldType, Value};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{ColumnIndex, Decode, Row, Type};

/// Decode a MySQL row into values of the given types.
pub(crate) fn decode_mysql_row(row: &MySqlRow, types: &[FieldType]) -> OrmResult<Vec<Value>> {
    decode_row(row, types)
}

/// Decode a PostgreSQL row into values of the given types.
pub(crate) fn decode_postgres_row(row: &PgRow, types: &[FieldType]) -> OrmResult<Vec<Value>> {
    decode_row(row, types)
}

/// Decode a SQLite row into values of the given types.
pub(crate) fn decode_sqlite_row(row: &SqliteRow, types: &[FieldType]) -> OrmResult<Vec<Value>> {
    decode_row(row, types)
}

fn decode_row<R>(row: &R, types: &[FieldType]) -> OrmResult<Vec<Value>>
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> i32: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> i64: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> bool: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> f32: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> f64: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> String: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> DateTime<Utc>: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> NaiveDateTime: Decode<'r, R::Database> + Type<R::Database>,
{
    if row.len() != types.len() {
        return Err(OrmError::mapping(format!(
            "Row has {} columns but {} were expected",
            row.len(),
            types.len()
        )));
    }

    types
        .iter()
        .enumerate()
        .map(|(idx, ty)| decode_column(row, idx, *ty))
        .collect()
}

fn decode_column<R>(row: &R, idx: usize, ty: FieldType) -> OrmResult<Value>
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> i32: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> i64: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> bool: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> f32: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> f64: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> String: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> DateTime<Utc>: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> NaiveDateTime: Decode<'r, R::Database> + Type<R::Database>,
{
    let null = Value::Null(ty);

    let value = match ty {
        FieldType::Int32 => match row.try_get::<Option<i32>, _>(idx) {
            Ok(v) => v.map(Value::Int32),
            Err(first) => match row.try_get::<Option<i64>, _>(idx) {
                Ok(Some(wide)) => Some(Value::Int32(i32::try_from(wide).map_err(|_| {
                    OrmError::mapping(format!(
                        "Column {} value {} does not fit in int32",
                        idx, wide
                    ))
                })?)),
                Ok(None) => None,
                Err(_) => return Err(first.into()),
            },
        },
        FieldType::Int64 => match row.try_get::<Option<i64>, _>(idx) {
            Ok(v) => v.map(Value::Int64),
            Err(first) => row
                .try_get::<Option<i32>, _>(idx)
                .map_err(|_| OrmError::from(first))?
                .map(|v| Value::Int64(i64::from(v))),
        },
        FieldType::Bool => match row.try_get::<Option<bool>, _>(idx) {
            Ok(v) => v.map(Value::Bool),
            Err(first) => row
                .try_get::<Option<i64>, _>(idx)
                .map_err(|_| OrmError::from(first))?
                .map(|v| Value::Bool(v != 0)),
        },
        FieldType::Float64 => match row.try_get::<Option<f64>, _>(idx) {
            Ok(v) => v.map(Value::Float64),
            Err(first) => row
                .try_get::<Option<f32>, _>(idx)
                .map_err(|_| OrmError::from(first))?
                .map(|v| Value::Float64(f64::from(v))),
        },
        FieldType::String => row
            .try_get::<Option<String>, _>(idx)
            .map_err(OrmError::from)?
            .map(Value::String),
        FieldType::Timestamp => match row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            Ok(v) => v.map(Value::Timestamp),
            Err(first) => row
                .try_get::<Option<NaiveDateTime>, _>(idx)
                .map_err(|_| OrmError::from(first))?
                .map(|v| Value::Timestamp(v.and_utc())),
        },
    };

    Ok(value.unwrap_or(null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> sqlx::SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_decode_sqlite_scalars() {
        let pool = memory_pool().await;
        let row = sqlx::query("SELECT 7, 9000000000, 1, 2.5, 'txt'")
            .fetch_one(&pool)
            .await
            .unwrap();

        let values = decode_sqlite_row(
            &row,
            &[
                FieldType::Int32,
                FieldType::Int64,
                FieldType::Bool,
                FieldType::Float64,
                FieldType::String,
            ],
        )
        .unwrap();

        assert_eq!(
            values,
            vec![
                Value::Int32(7),
                Value::Int64(9_000_000_000),
                Value::Bool(true),
                Value::Float64(2.5),
                Value::from("txt"),
            ]
        );
    }

    #[tokio::test]
    async fn test_decode_sqlite_nulls_keep_type() {
        let pool = memory_pool().await;
        let row = sqlx::query("SELECT NULL, NULL")
            .fetch_one(&pool)
            .await
            .unwrap();

        let values = decode_sqlite_row(&row, &[FieldType::Timestamp, FieldType::Int32]).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null(FieldType::Timestamp),
                Value::Null(FieldType::Int32)
            ]
        );
    }

    #[tokio::test]
    async fn test_decode_column_count_mismatch() {
        let pool = memory_pool().await;
        let row = sqlx::query("SELECT 1").fetch_one(&pool).await.unwrap();
        let err = decode_sqlite_row(&row, &[FieldType::Int32, FieldType::Int32]).unwrap_err();
        assert!(matches!(err, OrmError::Mapping { .. }));
    }
}
