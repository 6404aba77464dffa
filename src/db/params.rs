//! Parameter binding utilities for database queries.
//!
//! This module binds [`Value`]s to database-specific query objects. A typed NULL is
//! bound as `None` of the column's Rust carrier so the driver sends the right SQL type.

use crate::mapping::{FieldType, Value};
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Postgres, Sqlite};

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q Value,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        Value::Null(ty) => match ty {
            FieldType::Int32 => query.bind(None::<i32>),
            FieldType::Int64 => query.bind(None::<i64>),
            FieldType::Bool => query.bind(None::<bool>),
            FieldType::Float64 => query.bind(None::<f64>),
            FieldType::String => query.bind(None::<String>),
            FieldType::Timestamp => query.bind(None::<DateTime<Utc>>),
        },
        Value::Int32(v) => query.bind(*v),
        Value::Int64(v) => query.bind(*v),
        Value::Bool(v) => query.bind(*v),
        Value::Float64(v) => query.bind(*v),
        Value::String(v) => query.bind(v.as_str()),
        Value::Timestamp(v) => query.bind(*v),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        Value::Null(ty) => match ty {
            FieldType::Int32 => query.bind(None::<i32>),
            FieldType::Int64 => query.bind(None::<i64>),
            FieldType::Bool => query.bind(None::<bool>),
            FieldType::Float64 => query.bind(None::<f64>),
            FieldType::String => query.bind(None::<String>),
            FieldType::Timestamp => query.bind(None::<DateTime<Utc>>),
        },
        Value::Int32(v) => query.bind(*v),
        Value::Int64(v) => query.bind(*v),
        Value::Bool(v) => query.bind(*v),
        Value::Float64(v) => query.bind(*v),
        Value::String(v) => query.bind(v.as_str()),
        Value::Timestamp(v) => query.bind(*v),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q Value,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        Value::Null(ty) => match ty {
            FieldType::Int32 => query.bind(None::<i32>),
            FieldType::Int64 => query.bind(None::<i64>),
            FieldType::Bool => query.bind(None::<bool>),
            FieldType::Float64 => query.bind(None::<f64>),
            FieldType::String => query.bind(None::<String>),
            FieldType::Timestamp => query.bind(None::<DateTime<Utc>>),
        },
        Value::Int32(v) => query.bind(*v),
        Value::Int64(v) => query.bind(*v),
        Value::Bool(v) => query.bind(*v),
        Value::Float64(v) => query.bind(*v),
        Value::String(v) => query.bind(v.as_str()),
        Value::Timestamp(v) => query.bind(*v),
    }
}

/// Build a MySQL query with every parameter bound in order.
pub(crate) fn mysql_query<'q>(
    sql: &'q str,
    params: &'q [Value],
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| bind_mysql_param(query, param))
}

/// Build a PostgreSQL query with every parameter bound in order.
pub(crate) fn postgres_query<'q>(
    sql: &'q str,
    params: &'q [Value],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| bind_postgres_param(query, param))
}

/// Build a SQLite query with every parameter bound in order.
pub(crate) fn sqlite_query<'q>(
    sql: &'q str,
    params: &'q [Value],
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| bind_sqlite_param(query, param))
}
