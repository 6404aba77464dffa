//! Transactional execution of units of work.
//!
//! This is the only place that begins, commits and rolls back transactions. Callers
//! hand in an async closure that receives the open [`DbTransaction`]; the executor owns
//! everything around it.

use crate::db::DatabaseType;
use crate::db::pool::DbPool;
use crate::db::transaction::DbTransaction;
use crate::error::{OrmError, OrmResult};
use tracing::{debug, error};

/// Runs units of work inside managed transactions on a shared pool.
#[derive(Debug, Clone)]
pub struct TransactionalExecutor {
    pool: DbPool,
}

impl TransactionalExecutor {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn db_type(&self) -> DatabaseType {
        self.pool.db_type()
    }

    /// Run `work` inside one transaction.
    ///
    /// On success the transaction is committed and the connection returns to the pool.
    /// On failure a rollback is attempted; a failing rollback is logged and never
    /// replaces the original error, which is returned wrapped as
    /// [`OrmError::Execution`] tagged with `operation`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let moved = executor
    ///     .run_in_transaction("transfer", async |tx| {
    ///         tx.execute("UPDATE account SET balance = balance - ? WHERE id = ?", &debit).await?;
    ///         tx.execute("UPDATE account SET balance = balance + ? WHERE id = ?", &credit).await
    ///     })
    ///     .await?;
    /// ```
    pub async fn run_in_transaction<R, F>(&self, operation: &str, work: F) -> OrmResult<R>
    where
        F: AsyncFnOnce(&mut DbTransaction) -> OrmResult<R>,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| OrmError::execution(operation, e))?;

        match work(&mut tx).await {
            Ok(value) => {
                tx.commit()
                    .await
                    .map_err(|e| OrmError::execution(operation, e))?;
                debug!(operation = %operation, "Transaction committed");
                Ok(value)
            }
            Err(err) => {
                debug!(operation = %operation, error = %err, "Unit of work failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    error!(
                        operation = %operation,
                        error = %rollback_err,
                        "Failed to roll back transaction"
                    );
                }
                Err(OrmError::execution(operation, err))
            }
        }
    }
}
