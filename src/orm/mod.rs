//! Typed persistence over a pooled database.
//!
//! [`Database`] ties the pieces together: a [`TransactionalExecutor`] over the pool, a
//! [`TypeMapper`] owned by this instance, and the insert batch size. The write pipeline
//! lives in [`write`], the read pipeline and cursor in [`read`].

pub mod read;
pub mod statements;
pub mod write;

pub use read::Cursor;
pub use write::{Upsert, batch_ranges};

use crate::config::{DEFAULT_INSERT_BATCH_SIZE, DatabaseSettings};
use crate::db::{DatabaseType, DbPool, DbTransaction, TransactionalExecutor};
use crate::error::OrmResult;
use crate::mapping::TypeMapper;
use std::sync::Arc;
use tracing::info;

/// Entry point for typed reads, writes and custom units of work.
///
/// Cloning is cheap: clones share the pool and the type mapper.
#[derive(Debug, Clone)]
pub struct Database {
    executor: TransactionalExecutor,
    mapper: Arc<TypeMapper>,
    batch_size: usize,
}

impl Database {
    /// Connect using resolved settings.
    pub async fn connect(settings: &DatabaseSettings) -> OrmResult<Self> {
        let pool = DbPool::connect(settings).await?;
        Ok(Self::from_pool(pool).with_batch_size(settings.batch_size))
    }

    /// Connect using a connection URL.
    pub async fn connect_url(url: &str) -> OrmResult<Self> {
        Self::connect(&DatabaseSettings::parse(url)?).await
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: DbPool) -> Self {
        Self {
            executor: TransactionalExecutor::new(pool),
            mapper: Arc::new(TypeMapper::new()),
            batch_size: DEFAULT_INSERT_BATCH_SIZE,
        }
    }

    /// Rows per low-level insert execution. Values below 1 are treated as 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn db_type(&self) -> DatabaseType {
        self.executor.db_type()
    }

    pub fn executor(&self) -> &TransactionalExecutor {
        &self.executor
    }

    pub fn mapper(&self) -> &TypeMapper {
        &self.mapper
    }

    /// Run a custom unit of work in one transaction.
    ///
    /// See [`TransactionalExecutor::run_in_transaction`].
    pub async fn run_in_transaction<R, F>(&self, operation: &str, work: F) -> OrmResult<R>
    where
        F: AsyncFnOnce(&mut DbTransaction) -> OrmResult<R>,
    {
        self.executor.run_in_transaction(operation, work).await
    }

    /// Execute raw SQL in its own transaction. Returns rows affected.
    pub async fn execute(&self, sql: &str) -> OrmResult<u64> {
        self.executor
            .run_in_transaction("execute", async |tx| tx.execute_raw(sql).await)
            .await
    }

    /// Close the pool. Outstanding clones become unusable.
    pub async fn close(&self) {
        info!(db_type = %self.db_type(), "Closing database");
        self.executor.pool().close().await;
    }
}
