//! Open transactions and the statements executed inside them.
//!
//! A [`DbTransaction`] holds one pooled connection with autocommit disabled. It is
//! only ever handed out by the [`TransactionalExecutor`](crate::db::TransactionalExecutor),
//! which owns its commit/rollback.

use crate::db::DatabaseType;
use crate::db::params::{mysql_query, postgres_query, sqlite_query};
use crate::db::types::{decode_mysql_row, decode_postgres_row, decode_sqlite_row};
use crate::error::{OrmError, OrmResult};
use crate::mapping::{FieldType, Value};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use sqlx::{MySql, Postgres, Row, Sqlite, Transaction};
use tracing::debug;

/// Database-specific transaction wrapper.
///
/// This enum wraps database-specific transaction types to provide
/// a unified interface for statement execution.
pub enum DbTransaction {
    /// MySQL transaction
    MySql(Transaction<'static, MySql>),
    /// PostgreSQL transaction
    Postgres(Transaction<'static, Postgres>),
    /// SQLite transaction
    SQLite(Transaction<'static, Sqlite>),
}

impl std::fmt::Debug for DbTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbTransaction")
            .field("db_type", &self.db_type())
            .finish_non_exhaustive()
    }
}

impl DbTransaction {
    /// Get the database type for this transaction.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbTransaction::MySql(_) => DatabaseType::MySQL,
            DbTransaction::Postgres(_) => DatabaseType::PostgreSQL,
            DbTransaction::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Execute a prepared statement with positional parameters. Returns rows affected.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        let rows_affected = match self {
            DbTransaction::MySql(tx) => mysql_query(sql, params)
                .execute(&mut **tx)
                .await?
                .rows_affected(),
            DbTransaction::Postgres(tx) => postgres_query(sql, params)
                .execute(&mut **tx)
                .await?
                .rows_affected(),
            DbTransaction::SQLite(tx) => sqlite_query(sql, params)
                .execute(&mut **tx)
                .await?
                .rows_affected(),
        };

        debug!(
            sql = %sql,
            params = params.len(),
            rows_affected,
            "Executed statement"
        );

        Ok(rows_affected)
    }

    /// Execute raw SQL without preparing it. May contain several statements.
    ///
    /// Some DDL cannot be prepared (e.g. `CREATE PROCEDURE` on MySQL), so migration
    /// bodies go through here.
    pub async fn execute_raw(&mut self, sql: &str) -> OrmResult<u64> {
        use sqlx::Executor;

        let rows_affected = for_each_backend!(DbTransaction, self, |tx| {
            (&mut **tx).execute(sql).await?.rows_affected()
        });

        debug!(sql = %sql, rows_affected, "Executed raw SQL");
        Ok(rows_affected)
    }

    /// Run a query and decode every row with the given column types.
    pub async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[Value],
        types: &[FieldType],
    ) -> OrmResult<Vec<Vec<Value>>> {
        let rows = match self {
            DbTransaction::MySql(tx) => mysql_query(sql, params)
                .fetch_all(&mut **tx)
                .await?
                .iter()
                .map(|row| decode_mysql_row(row, types))
                .collect::<OrmResult<Vec<_>>>()?,
            DbTransaction::Postgres(tx) => postgres_query(sql, params)
                .fetch_all(&mut **tx)
                .await?
                .iter()
                .map(|row| decode_postgres_row(row, types))
                .collect::<OrmResult<Vec<_>>>()?,
            DbTransaction::SQLite(tx) => sqlite_query(sql, params)
                .fetch_all(&mut **tx)
                .await?
                .iter()
                .map(|row| decode_sqlite_row(row, types))
                .collect::<OrmResult<Vec<_>>>()?,
        };

        debug!(sql = %sql, params = params.len(), rows = rows.len(), "Fetched rows");
        Ok(rows)
    }

    /// Run a query and stream decoded rows one at a time.
    ///
    /// Rows are pulled from the server as the stream is polled; nothing is buffered
    /// beyond what the driver reads ahead. The stream borrows the transaction, so no
    /// other statement can run on it until the stream is dropped.
    pub fn fetch<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [Value],
        types: &'a [FieldType],
    ) -> BoxStream<'a, OrmResult<Vec<Value>>> {
        debug!(sql = %sql, params = params.len(), "Opening row stream");

        match self {
            DbTransaction::MySql(tx) => mysql_query(sql, params)
                .fetch(&mut **tx)
                .map(move |row| -> OrmResult<Vec<Value>> { decode_mysql_row(&row?, types) })
                .boxed(),
            DbTransaction::Postgres(tx) => postgres_query(sql, params)
                .fetch(&mut **tx)
                .map(move |row| -> OrmResult<Vec<Value>> { decode_postgres_row(&row?, types) })
                .boxed(),
            DbTransaction::SQLite(tx) => sqlite_query(sql, params)
                .fetch(&mut **tx)
                .map(move |row| -> OrmResult<Vec<Value>> { decode_sqlite_row(&row?, types) })
                .boxed(),
        }
    }

    /// Execute a multi-row insert of `rows` rows and return the generated keys in
    /// submission order.
    ///
    /// MySQL reports the first id of the statement and SQLite the last one; both assign
    /// consecutive ids within a single multi-row insert. PostgreSQL returns the keys
    /// through `RETURNING`. Fewer keys than rows means the insert did not behave as
    /// expected; the caller turns that into a data integrity error.
    pub async fn insert_returning_keys(
        &mut self,
        sql: &str,
        params: &[Value],
        id_column: &str,
        rows: usize,
    ) -> OrmResult<Vec<i64>> {
        let keys = match self {
            DbTransaction::MySql(tx) => {
                let result = mysql_query(sql, params).execute(&mut **tx).await?;
                let first = i64::try_from(result.last_insert_id()).map_err(|_| {
                    OrmError::data_integrity(format!(
                        "Generated key {} does not fit in int64",
                        result.last_insert_id()
                    ))
                })?;
                let count = key_count(result.rows_affected(), rows);
                if first == 0 {
                    Vec::new()
                } else {
                    (first..first + count).collect()
                }
            }
            DbTransaction::SQLite(tx) => {
                let result = sqlite_query(sql, params).execute(&mut **tx).await?;
                let last = result.last_insert_rowid();
                let count = key_count(result.rows_affected(), rows);
                if last == 0 {
                    Vec::new()
                } else {
                    (last - count + 1..=last).collect()
                }
            }
            DbTransaction::Postgres(tx) => {
                let returning = format!(
                    "{} RETURNING {}",
                    sql,
                    DatabaseType::PostgreSQL.quote_identifier(id_column)
                );
                postgres_query(&returning, params)
                    .fetch_all(&mut **tx)
                    .await?
                    .iter()
                    .map(|row| row.try_get::<i64, _>(0).map_err(OrmError::from))
                    .collect::<OrmResult<Vec<_>>>()?
            }
        };

        debug!(
            sql = %sql,
            params = params.len(),
            rows,
            keys = keys.len(),
            "Executed key-generating insert"
        );

        Ok(keys)
    }

    /// Commit the transaction.
    pub async fn commit(self) -> OrmResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await.map_err(OrmError::from),
            DbTransaction::Postgres(tx) => tx.commit().await.map_err(OrmError::from),
            DbTransaction::SQLite(tx) => tx.commit().await.map_err(OrmError::from),
        }
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> OrmResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await.map_err(OrmError::from),
            DbTransaction::Postgres(tx) => tx.rollback().await.map_err(OrmError::from),
            DbTransaction::SQLite(tx) => tx.rollback().await.map_err(OrmError::from),
        }
    }
}

/// Number of keys the driver vouches for: never more than were requested.
fn key_count(rows_affected: u64, requested: usize) -> i64 {
    let requested = i64::try_from(requested).unwrap_or(i64::MAX);
    i64::try_from(rows_affected)
        .unwrap_or(i64::MAX)
        .min(requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn sqlite_tx() -> (sqlx::SqlitePool, DbTransaction) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let tx = DbTransaction::SQLite(pool.begin().await.unwrap());
        (pool, tx)
    }

    #[test]
    fn test_key_count_caps_at_requested() {
        assert_eq!(key_count(5, 5), 5);
        assert_eq!(key_count(3, 5), 3);
        assert_eq!(key_count(9, 5), 5);
    }

    #[tokio::test]
    async fn test_execute_and_fetch_all() {
        let (_pool, mut tx) = sqlite_tx().await;
        tx.execute_raw(
            "CREATE TABLE item (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT); \
             INSERT INTO item (name) VALUES ('a');",
        )
        .await
        .unwrap();

        let affected = tx
            .execute("INSERT INTO item (name) VALUES (?)", &[Value::from("b")])
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = tx
            .fetch_all(
                "SELECT id, name FROM item ORDER BY id",
                &[],
                &[FieldType::Int64, FieldType::String],
            )
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Int64(1), Value::from("a")],
                vec![Value::Int64(2), Value::from("b")],
            ]
        );
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_streams_rows() {
        let (_pool, mut tx) = sqlite_tx().await;
        tx.execute_raw("CREATE TABLE n (v INTEGER); INSERT INTO n VALUES (1), (2), (3);")
            .await
            .unwrap();

        let params = [Value::Int32(1)];
        let types = [FieldType::Int32];
        let mut seen = Vec::new();
        {
            let mut stream = tx.fetch("SELECT v FROM n WHERE v > ? ORDER BY v", &params, &types);
            while let Some(row) = stream.next().await {
                seen.push(row.unwrap());
            }
        }
        assert_eq!(seen, vec![vec![Value::Int32(2)], vec![Value::Int32(3)]]);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_returning_keys_sqlite() {
        let (_pool, mut tx) = sqlite_tx().await;
        tx.execute_raw("CREATE TABLE k (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT)")
            .await
            .unwrap();

        let keys = tx
            .insert_returning_keys(
                "INSERT INTO k (v) VALUES (?), (?), (?)",
                &[Value::from("x"), Value::from("y"), Value::from("z")],
                "id",
                3,
            )
            .await
            .unwrap();
        assert_eq!(keys, vec![1, 2, 3]);

        let more = tx
            .insert_returning_keys("INSERT INTO k (v) VALUES (?)", &[Value::from("w")], "id", 1)
            .await
            .unwrap();
        assert_eq!(more, vec![4]);
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_statement_error_is_database_error() {
        let (_pool, mut tx) = sqlite_tx().await;
        let err = tx.execute("SELECT * FROM missing", &[]).await.unwrap_err();
        assert!(matches!(err, OrmError::Database { .. }));
        tx.rollback().await.unwrap();
    }
}
