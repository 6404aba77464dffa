//! Write pipeline: batched inserts with generated keys, updates, upserts and deletes.

use crate::db::{DatabaseType, DbTransaction};
use crate::error::{OrmError, OrmResult};
use crate::mapping::{FieldType, ID_FIELD, Mapping, Record, Value};
use crate::orm::Database;
use crate::orm::statements::{
    delete_sql, insert_sql, select_sql, update_by_id_sql, update_matching_params,
    update_matching_sql, update_where_sql,
};
use std::ops::Range;
use tracing::{debug, warn};

/// Outcome of [`Database::insert_or_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// No row matched; the record was inserted (with its generated key, if any).
    Inserted(Option<i64>),
    /// Exactly one row matched and was updated in place (its id, if the type has one).
    Updated(Option<i64>),
}

/// Split `len` rows into consecutive flushes of at most `batch_size` rows.
pub fn batch_ranges(len: usize, batch_size: usize) -> Vec<Range<usize>> {
    let batch_size = batch_size.max(1);
    (0..len)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(len))
        .collect()
}

/// Everything an insert needs, resolved before the transaction starts.
struct InsertPlan<'a> {
    db_type: DatabaseType,
    table: &'a str,
    columns: Vec<&'static str>,
    rows: Vec<Vec<Value>>,
    generate_id: bool,
    batch_size: usize,
}

impl<'a> InsertPlan<'a> {
    fn new<T: Record>(
        db: &Database,
        mapping: &'a Mapping<T>,
        records: &[T],
        generate_id: bool,
    ) -> OrmResult<Self> {
        // Without an id field there are no keys to generate.
        let generate_id = generate_id && mapping.has_id();
        let rows = records
            .iter()
            .map(|r| mapping.values_of(r, !generate_id))
            .collect::<OrmResult<Vec<_>>>()?;

        Ok(Self {
            db_type: db.db_type(),
            table: mapping.table(),
            columns: mapping.column_names(!generate_id),
            rows,
            generate_id,
            batch_size: db.batch_size(),
        })
    }

    /// Flush every batch inside `tx`. Returns generated keys in submission order.
    async fn run(&self, tx: &mut DbTransaction) -> OrmResult<Vec<i64>> {
        let mut keys = Vec::with_capacity(if self.generate_id { self.rows.len() } else { 0 });

        for range in batch_ranges(self.rows.len(), self.batch_size) {
            let chunk = &self.rows[range.clone()];
            let sql = insert_sql(self.db_type, self.table, &self.columns, chunk.len());
            let params: Vec<Value> = chunk.iter().flatten().cloned().collect();

            debug!(
                table = %self.table,
                start = range.start,
                end = range.end,
                generate_id = self.generate_id,
                "Flushing insert batch"
            );

            if self.generate_id {
                let chunk_keys = tx
                    .insert_returning_keys(&sql, &params, ID_FIELD, chunk.len())
                    .await?;
                if chunk_keys.len() != chunk.len() {
                    return Err(OrmError::data_integrity(format!(
                        "Inserted rows {}..{} into '{}' but received {} generated keys instead of {}",
                        range.start,
                        range.end,
                        self.table,
                        chunk_keys.len(),
                        chunk.len()
                    )));
                }
                keys.extend(chunk_keys);
            } else {
                let affected = tx.execute(&sql, &params).await?;
                if affected != chunk.len() as u64 {
                    warn!(
                        table = %self.table,
                        expected = chunk.len(),
                        affected,
                        "Insert batch affected an unexpected number of rows"
                    );
                }
            }
        }

        Ok(keys)
    }
}

impl Database {
    /// Insert records in batches of [`Database::batch_size`] rows.
    ///
    /// With `generate_id` (and an `id` field on the type) the id column is left to the
    /// database and every record receives its generated key, positionally. Returns the
    /// keys, or an empty list when no keys were generated.
    pub async fn insert<T: Record>(&self, records: &mut [T], generate_id: bool) -> OrmResult<Vec<i64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mapping = self.mapper().mapping::<T>()?;
        let plan = InsertPlan::new(self, &mapping, records, generate_id)?;

        let keys = self
            .run_in_transaction("insert", async |tx| plan.run(tx).await)
            .await?;

        for (record, key) in records.iter_mut().zip(&keys) {
            record.set_id(*key);
        }
        Ok(keys)
    }

    /// Insert one record with a generated key. Returns the key when the type has an id.
    pub async fn insert_one<T: Record>(&self, record: &mut T) -> OrmResult<Option<i64>> {
        let keys = self.insert(std::slice::from_mut(record), true).await?;
        Ok(keys.first().copied())
    }

    /// Update every non-id column of the row identified by the record's id.
    pub async fn update<T: Record>(&self, record: &T) -> OrmResult<u64> {
        let mapping = self.mapper().mapping::<T>()?;
        mapping.require_id()?;
        let id = record.id().ok_or_else(|| {
            OrmError::invalid_input(format!(
                "Cannot update a '{}' record that has no id",
                mapping.table()
            ))
        })?;

        let sql = update_by_id_sql(
            self.db_type(),
            mapping.table(),
            &mapping.column_names(false),
            ID_FIELD,
        );
        let mut params = mapping.values_of(record, false)?;
        params.push(Value::Int64(id));

        self.run_in_transaction("update", async |tx| tx.execute(&sql, &params).await)
            .await
    }

    /// Update every non-id column of the rows matching `clause`.
    ///
    /// Column values are bound first, then `args`.
    pub async fn update_where<T: Record>(
        &self,
        record: &T,
        clause: &str,
        args: Vec<Value>,
    ) -> OrmResult<u64> {
        let mapping = self.mapper().mapping::<T>()?;
        let sql = update_where_sql(
            self.db_type(),
            mapping.table(),
            &mapping.column_names(false),
            clause,
        );
        let mut params = mapping.values_of(record, false)?;
        params.extend(args);

        self.run_in_transaction("update", async |tx| tx.execute(&sql, &params).await)
            .await
    }

    /// Insert the record unless `clause` matches an existing row, in which case that row
    /// is updated in place.
    ///
    /// Matching and writing run in one transaction, but two concurrent callers can
    /// still both see no match and both insert; use a unique constraint where that
    /// matters. More than one match is an [`OrmError::AmbiguousMatch`].
    ///
    /// `clause` is numbered from the first placeholder on every backend; it is used
    /// as written for both the match and, for records without an id, the update.
    pub async fn insert_or_update<T: Record>(
        &self,
        record: &mut T,
        clause: &str,
        args: Vec<Value>,
    ) -> OrmResult<Upsert> {
        let mapping = self.mapper().mapping::<T>()?;
        let db_type = self.db_type();
        let table = mapping.table();

        let match_columns = if mapping.has_id() {
            vec![ID_FIELD]
        } else {
            mapping.column_names(true)
        };
        let match_types = if mapping.has_id() {
            vec![FieldType::Int64]
        } else {
            mapping.column_types(true)
        };
        let select = select_sql(db_type, table, &match_columns, clause);

        let insert_plan = InsertPlan::new(self, &mapping, std::slice::from_ref(&*record), true)?;
        let set_columns = mapping.column_names(false);
        let set_values = mapping.values_of(record, false)?;

        let outcome = self
            .run_in_transaction("insert_or_update", async |tx| {
                let matches = tx.fetch_all(&select, &args, &match_types).await?;
                match matches.len() {
                    0 => {
                        let keys = insert_plan.run(tx).await?;
                        Ok(Upsert::Inserted(keys.first().copied()))
                    }
                    1 if mapping.has_id() => {
                        let id = matches[0].first().and_then(Value::as_i64).ok_or_else(|| {
                            OrmError::data_integrity(format!("Matched row in '{}' has no id", table))
                        })?;
                        let sql = update_by_id_sql(db_type, table, &set_columns, ID_FIELD);
                        let mut params = set_values.clone();
                        params.push(Value::Int64(id));
                        tx.execute(&sql, &params).await?;
                        Ok(Upsert::Updated(Some(id)))
                    }
                    1 => {
                        let sql =
                            update_matching_sql(db_type, table, &set_columns, clause, args.len());
                        let params = update_matching_params(db_type, &set_values, &args);
                        tx.execute(&sql, &params).await?;
                        Ok(Upsert::Updated(None))
                    }
                    count => Err(OrmError::ambiguous_match(table, count)),
                }
            })
            .await?;

        if let Upsert::Inserted(Some(id)) | Upsert::Updated(Some(id)) = outcome {
            record.set_id(id);
        }
        debug!(table = %table, outcome = ?outcome, "Insert-or-update finished");
        Ok(outcome)
    }

    /// Delete the rows of `T`'s table matching `clause`. Returns rows affected.
    pub async fn delete<T: Record>(&self, clause: &str, args: Vec<Value>) -> OrmResult<u64> {
        let mapping = self.mapper().mapping::<T>()?;
        let sql = delete_sql(self.db_type(), mapping.table(), clause);
        self.run_in_transaction("delete", async |tx| tx.execute(&sql, &args).await)
            .await
    }

    /// Delete every row of `T`'s table.
    pub async fn delete_all<T: Record>(&self) -> OrmResult<u64> {
        self.delete::<T>("", Vec::new()).await
    }
}
