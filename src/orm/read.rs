//! Read pipeline: eager reads and the scoped streaming cursor.

use crate::error::{OrmError, OrmResult};
use crate::mapping::{Mapping, Record, Value};
use crate::orm::Database;
use crate::orm::statements::select_sql;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tracing::debug;

/// Forward-only cursor over the rows of one query.
///
/// A cursor only exists inside [`Database::stream_all`], which keeps its transaction open
/// while the consumer runs and closes the cursor on every exit path. Each call to
/// [`Cursor::next`] pulls and maps exactly one row. Reaching the end, or any error,
/// closes the cursor; [`Cursor::close`] may also be called early and is idempotent.
pub struct Cursor<'a, T> {
    rows: Option<BoxStream<'a, OrmResult<Vec<Value>>>>,
    mapping: &'a Mapping<T>,
    rows_read: usize,
}

impl<'a, T: Record> Cursor<'a, T> {
    fn open(rows: BoxStream<'a, OrmResult<Vec<Value>>>, mapping: &'a Mapping<T>) -> Self {
        debug!(table = %mapping.table(), "Cursor opened");
        Self {
            rows: Some(rows),
            mapping,
            rows_read: 0,
        }
    }

    /// Next record, or `None` once the rows are exhausted or the cursor is closed.
    pub async fn next(&mut self) -> OrmResult<Option<T>> {
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };

        let next = match rows.next().await {
            Some(Ok(row)) => self.mapping.construct(row).map(Some),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        };

        match next {
            Ok(Some(record)) => {
                self.rows_read += 1;
                Ok(Some(record))
            }
            other => {
                self.close();
                other
            }
        }
    }

    /// Release the underlying result stream. Safe to call more than once.
    pub fn close(&mut self) {
        if self.rows.take().is_some() {
            debug!(
                table = %self.mapping.table(),
                rows_read = self.rows_read,
                "Cursor closed"
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.rows.is_none()
    }

    /// Records returned so far.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }
}

impl<T> std::fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("open", &self.rows.is_some())
            .field("rows_read", &self.rows_read)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Read every record of `T` matching `clause` (e.g. `"WHERE age > ? ORDER BY id"`).
    ///
    /// Rows are fully materialized and the connection released before returning.
    pub async fn read_all<T: Record>(&self, clause: &str, args: Vec<Value>) -> OrmResult<Vec<T>> {
        let mapping = self.mapper().mapping::<T>()?;
        let sql = select_sql(
            self.db_type(),
            mapping.table(),
            &mapping.column_names(true),
            clause,
        );
        let types = mapping.column_types(true);

        let rows = self
            .run_in_transaction("read", async |tx| tx.fetch_all(&sql, &args, &types).await)
            .await?;

        rows.into_iter().map(|row| mapping.construct(row)).collect()
    }

    /// Read at most one record. More than one match is an [`OrmError::Cardinality`].
    pub async fn read_one<T: Record>(&self, clause: &str, args: Vec<Value>) -> OrmResult<Option<T>> {
        let mut records = self.read_all::<T>(clause, args).await?;
        match records.len() {
            0 | 1 => Ok(records.pop()),
            count => Err(OrmError::cardinality(T::table_name(), count)),
        }
    }

    /// Stream the records of `T` matching `clause` through `consume`.
    ///
    /// The transaction stays open exactly as long as `consume` runs; afterwards the
    /// cursor is closed and the transaction committed (or rolled back if `consume`
    /// failed). The result of `consume` is returned.
    ///
    /// ```ignore
    /// let adults = db
    ///     .stream_all::<Person, _, _>("WHERE age >= ?", args![18], async |cursor| {
    ///         let mut n = 0;
    ///         while let Some(_person) = cursor.next().await? {
    ///             n += 1;
    ///         }
    ///         Ok(n)
    ///     })
    ///     .await?;
    /// ```
    pub async fn stream_all<T, R, F>(&self, clause: &str, args: Vec<Value>, consume: F) -> OrmResult<R>
    where
        T: Record,
        F: AsyncFnOnce(&mut Cursor<'_, T>) -> OrmResult<R>,
    {
        let mapping = self.mapper().mapping::<T>()?;
        let sql = select_sql(
            self.db_type(),
            mapping.table(),
            &mapping.column_names(true),
            clause,
        );
        let types = mapping.column_types(true);

        self.run_in_transaction("stream", async |tx| {
            let mut cursor = Cursor::open(tx.fetch(&sql, &args, &types), &mapping);
            let result = consume(&mut cursor).await;
            cursor.close();
            result
        })
        .await
    }
}
