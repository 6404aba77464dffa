//! Migrations and the collections that supply them.

use crate::db::{DatabaseType, DbTransaction};
use crate::error::OrmResult;
use futures_util::future::BoxFuture;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Hex characters of the statement digest used as a [`SimpleMigration`] id.
const CONTENT_ID_LEN: usize = 16;
const DESCRIPTION_LEN: usize = 40;

/// One schema change. Its id must be stable: derived from content or assigned once.
pub trait Migration: Send + Sync {
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    /// Apply the change inside the engine's transaction for this migration.
    fn execute<'a>(&'a self, tx: &'a mut DbTransaction) -> BoxFuture<'a, OrmResult<()>>;
}

/// A migration consisting of raw SQL, executed unprepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleMigration {
    id: String,
    description: String,
    sql: String,
}

impl SimpleMigration {
    /// Migration whose id is a digest of `sql`, so editing the statement changes the id.
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let id = content_id(&sql);
        Self::with_id(id, sql)
    }

    /// Migration with an explicitly assigned id.
    pub fn with_id(id: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        Self {
            id: id.into(),
            description: sql.trim().chars().take(DESCRIPTION_LEN).collect(),
            sql,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

fn content_id(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..CONTENT_ID_LEN].to_string()
}

impl Migration for SimpleMigration {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn execute<'a>(&'a self, tx: &'a mut DbTransaction) -> BoxFuture<'a, OrmResult<()>> {
        Box::pin(async move {
            tx.execute_raw(&self.sql).await?;
            Ok(())
        })
    }
}

/// An ordered, append-only source of migrations.
///
/// The engine flattens its collections in order, so an application can split its
/// migrations (or serve different SQL per backend) without losing a single global order.
pub trait MigrationCollection: Send + Sync {
    fn migrations(&self, db_type: DatabaseType) -> OrmResult<Vec<Arc<dyn Migration>>>;
}

impl MigrationCollection for Vec<SimpleMigration> {
    fn migrations(&self, _db_type: DatabaseType) -> OrmResult<Vec<Arc<dyn Migration>>> {
        Ok(self
            .iter()
            .cloned()
            .map(|m| Arc::new(m) as Arc<dyn Migration>)
            .collect())
    }
}

impl MigrationCollection for Vec<Arc<dyn Migration>> {
    fn migrations(&self, _db_type: DatabaseType) -> OrmResult<Vec<Arc<dyn Migration>>> {
        Ok(self.clone())
    }
}
