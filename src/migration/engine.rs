//! The migration engine: a single persisted version marker and an ordered list.
//!
//! The marker lives in a one-row table. It holds the id of the last applied migration,
//! or [`INITIAL_VERSION`] when none has been applied. Every run re-evaluates the state:
//!
//! ```text
//! Uninitialized -> Initialized (INITIAL_VERSION) -> Applying (v_i) -> UpToDate (v_n)
//! ```
//!
//! Each pending migration runs in its own transaction together with the marker update,
//! so an interrupted run leaves the marker at the last fully applied migration and the
//! next run resumes from there.

use crate::db::{DatabaseType, DbTransaction, TransactionalExecutor};
use crate::error::{OrmError, OrmResult};
use crate::mapping::{FieldType, Value};
use crate::migration::simple::{Migration, MigrationCollection};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const VERSION_TABLE: &str = "migration";
pub const VERSION_COLUMN: &str = "version";
/// Marker value meaning "no migration applied yet".
pub const INITIAL_VERSION: &str = "00000000000";
/// Width of the version column.
pub const MAX_VERSION_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// No version table, or one without a marker row.
    Uninitialized,
    /// Marker present, nothing applied yet, migrations pending.
    Initialized,
    /// Some migrations applied, more pending.
    Applying,
    UpToDate,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Uninitialized => write!(f, "uninitialized"),
            MigrationState::Initialized => write!(f, "initialized"),
            MigrationState::Applying => write!(f, "applying"),
            MigrationState::UpToDate => write!(f, "up-to-date"),
        }
    }
}

/// Read-only view of the marker against the current migration list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub state: MigrationState,
    /// Last applied migration id; `None` when nothing has been applied.
    pub current_version: Option<String>,
    pub pending: Vec<String>,
}

/// Outcome of [`MigrationEngine::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub previous_version: Option<String>,
    pub current_version: Option<String>,
    /// Ids applied by this run, in order.
    pub applied: Vec<String>,
    pub state: MigrationState,
}

/// Applies the migrations of its collections, flattened in order.
pub struct MigrationEngine {
    executor: TransactionalExecutor,
    collections: Vec<Box<dyn MigrationCollection>>,
}

impl fmt::Debug for MigrationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationEngine")
            .field("executor", &self.executor)
            .field("collections", &self.collections.len())
            .finish()
    }
}

impl MigrationEngine {
    pub fn new(executor: TransactionalExecutor) -> Self {
        Self {
            executor,
            collections: Vec::new(),
        }
    }

    /// Append a collection; its migrations come after those already added.
    pub fn with_collection(mut self, collection: impl MigrationCollection + 'static) -> Self {
        self.collections.push(Box::new(collection));
        self
    }

    /// The full ordered list for the connected backend, validated.
    pub fn migrations(&self) -> OrmResult<Vec<Arc<dyn Migration>>> {
        let db_type = self.executor.db_type();
        let mut migrations = Vec::new();
        for collection in &self.collections {
            migrations.extend(collection.migrations(db_type)?);
        }
        validate_ids(&migrations)?;
        Ok(migrations)
    }

    /// Report the current version and pending migrations without writing anything.
    pub async fn status(&self) -> OrmResult<MigrationStatus> {
        let migrations = self.migrations()?;

        let marker = self
            .executor
            .run_in_transaction("migration status", async |tx| -> OrmResult<Option<String>> {
                if !version_table_exists(tx).await? {
                    return Ok(None);
                }
                let mut versions = read_versions(tx).await?;
                match versions.len() {
                    0 | 1 => Ok(versions.pop()),
                    count => Err(too_many_markers(count)),
                }
            })
            .await?;

        let Some(version) = marker else {
            return Ok(MigrationStatus {
                state: MigrationState::Uninitialized,
                current_version: None,
                pending: migrations.iter().map(|m| m.id().to_string()).collect(),
            });
        };

        let start = locate(&migrations, &version)?;
        Ok(MigrationStatus {
            state: state_of(&version, migrations.len() - start),
            current_version: applied_version(&version),
            pending: migrations[start..].iter().map(|m| m.id().to_string()).collect(),
        })
    }

    /// Apply every pending migration, each in its own transaction.
    ///
    /// Stops at the first failing migration, leaving the marker at the last one that
    /// was applied. With nothing pending, nothing is written.
    pub async fn run(&self) -> OrmResult<MigrationReport> {
        let migrations = self.migrations()?;

        let (initial_state, version) = self
            .executor
            .run_in_transaction("migration setup", async |tx| ensure_version_table(tx).await)
            .await?;

        let start = locate(&migrations, &version)?;
        let pending = migrations.len() - start;
        let state = if initial_state == MigrationState::Uninitialized {
            initial_state
        } else {
            state_of(&version, pending)
        };
        let previous_version = applied_version(&version);

        match &previous_version {
            Some(v) => info!(version = %v, state = %state, "Current version of database migrations"),
            None => info!(state = %state, "Starting from zero migrations"),
        }

        if pending == 0 {
            info!("Migrations up-to-date");
            return Ok(MigrationReport {
                current_version: previous_version.clone(),
                previous_version,
                applied: Vec::new(),
                state: MigrationState::UpToDate,
            });
        }

        info!(count = pending, "Executing migrations");
        let mut applied = Vec::with_capacity(pending);

        for migration in &migrations[start..] {
            let id = migration.id();
            info!(
                id = %id,
                description = %migration.description(),
                "Executing migration"
            );

            let operation = format!("migration {}", id);
            self.executor
                .run_in_transaction(&operation, async |tx| {
                    migration.execute(tx).await?;
                    write_version(tx, id).await
                })
                .await?;

            applied.push(id.to_string());
            debug!(id = %id, state = %MigrationState::Applying, "Version marker advanced");
        }

        let current_version = applied.last().cloned();
        info!(
            applied = applied.len(),
            version = current_version.as_deref().unwrap_or(INITIAL_VERSION),
            "Migrations finished"
        );

        Ok(MigrationReport {
            previous_version,
            current_version,
            applied,
            state: MigrationState::UpToDate,
        })
    }
}

/// Ids must be usable as marker values and identify exactly one migration.
fn validate_ids(migrations: &[Arc<dyn Migration>]) -> OrmResult<()> {
    let mut seen = HashSet::with_capacity(migrations.len());
    for migration in migrations {
        let id = migration.id();
        if id.is_empty() {
            return Err(OrmError::configuration("Migration id cannot be empty"));
        }
        if id.chars().count() > MAX_VERSION_LEN {
            return Err(OrmError::configuration(format!(
                "Migration id '{}' is longer than {} characters",
                id, MAX_VERSION_LEN
            )));
        }
        if id == INITIAL_VERSION {
            return Err(OrmError::configuration(format!(
                "Migration id '{}' is reserved for the initial version",
                id
            )));
        }
        if !seen.insert(id) {
            return Err(OrmError::configuration(format!(
                "Duplicate migration id '{}'",
                id
            )));
        }
    }
    Ok(())
}

/// Index of the first pending migration for the persisted `version`.
fn locate(migrations: &[Arc<dyn Migration>], version: &str) -> OrmResult<usize> {
    if version == INITIAL_VERSION {
        return Ok(0);
    }
    migrations
        .iter()
        .position(|m| m.id() == version)
        .map(|i| i + 1)
        .ok_or_else(|| OrmError::version_mismatch(version))
}

fn state_of(version: &str, pending: usize) -> MigrationState {
    if pending == 0 {
        MigrationState::UpToDate
    } else if version == INITIAL_VERSION {
        MigrationState::Initialized
    } else {
        MigrationState::Applying
    }
}

fn applied_version(version: &str) -> Option<String> {
    (version != INITIAL_VERSION).then(|| version.to_string())
}

fn too_many_markers(count: usize) -> OrmError {
    OrmError::data_integrity(format!(
        "The version table '{}' must contain a single row but has {}",
        VERSION_TABLE, count
    ))
}

fn table_exists_sql(db: DatabaseType) -> &'static str {
    match db {
        DatabaseType::MySQL => {
            "SELECT COUNT(*) FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
        }
        DatabaseType::PostgreSQL => {
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = $1"
        }
        DatabaseType::SQLite => "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
    }
}

async fn version_table_exists(tx: &mut DbTransaction) -> OrmResult<bool> {
    let sql = table_exists_sql(tx.db_type());
    let rows = tx
        .fetch_all(sql, &[Value::from(VERSION_TABLE)], &[FieldType::Int64])
        .await?;
    let count = rows
        .first()
        .and_then(|row| row.first())
        .and_then(Value::as_i64)
        .unwrap_or(0);
    Ok(count > 0)
}

async fn read_versions(tx: &mut DbTransaction) -> OrmResult<Vec<String>> {
    let db = tx.db_type();
    let sql = format!(
        "SELECT {} FROM {}",
        db.quote_identifier(VERSION_COLUMN),
        db.quote_identifier(VERSION_TABLE)
    );

    tx.fetch_all(&sql, &[], &[FieldType::String])
        .await?
        .into_iter()
        .map(|row| match row.into_iter().next() {
            Some(Value::String(version)) => Ok(version),
            _ => Err(OrmError::data_integrity(format!(
                "The version table '{}' holds a NULL version",
                VERSION_TABLE
            ))),
        })
        .collect()
}

async fn insert_initial_version(tx: &mut DbTransaction) -> OrmResult<()> {
    let db = tx.db_type();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        db.quote_identifier(VERSION_TABLE),
        db.quote_identifier(VERSION_COLUMN),
        db.placeholder(1)
    );
    tx.execute(&sql, &[Value::from(INITIAL_VERSION)]).await?;
    Ok(())
}

/// Create the version table and its marker row where missing. Returns the state before
/// this call and the persisted version.
async fn ensure_version_table(tx: &mut DbTransaction) -> OrmResult<(MigrationState, String)> {
    let db = tx.db_type();
    let mut state = MigrationState::Initialized;

    if !version_table_exists(tx).await? {
        info!(table = VERSION_TABLE, "Version table does not exist yet, creating it");
        let ddl = format!(
            "CREATE TABLE {} ({} VARCHAR({}))",
            db.quote_identifier(VERSION_TABLE),
            db.quote_identifier(VERSION_COLUMN),
            MAX_VERSION_LEN
        );
        tx.execute_raw(&ddl).await?;
        state = MigrationState::Uninitialized;
    }

    let mut versions = read_versions(tx).await?;
    match versions.len() {
        0 => {
            if state != MigrationState::Uninitialized {
                warn!(table = VERSION_TABLE, "Version table has no row, inserting initial version");
            }
            insert_initial_version(tx).await?;
            Ok((MigrationState::Uninitialized, INITIAL_VERSION.to_string()))
        }
        1 => {
            let version = versions.pop().unwrap_or_else(|| INITIAL_VERSION.to_string());
            Ok((state, version))
        }
        count => Err(too_many_markers(count)),
    }
}

async fn write_version(tx: &mut DbTransaction, version: &str) -> OrmResult<()> {
    let db = tx.db_type();
    let sql = format!(
        "UPDATE {} SET {} = {}",
        db.quote_identifier(VERSION_TABLE),
        db.quote_identifier(VERSION_COLUMN),
        db.placeholder(1)
    );
    let affected = tx.execute(&sql, &[Value::from(version)]).await?;
    if affected != 1 {
        return Err(OrmError::data_integrity(format!(
            "Updating the version marker to '{}' changed {} rows instead of 1",
            version, affected
        )));
    }
    Ok(())
}
