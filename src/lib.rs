//! Mini ORM Library
//!
//! A lightweight persistence layer for SQL databases (SQLite, PostgreSQL, MySQL):
//! typed records mapped to tables, units of work in managed transactions, batched
//! inserts with generated keys, eager and streaming reads, and ordered schema
//! migrations tracked by a single version marker.

pub mod config;
pub mod db;
pub mod error;
pub mod mapping;
pub mod migration;
pub mod orm;

pub use config::{Config, DatabaseSettings};
pub use db::{DatabaseType, DbTransaction, TransactionalExecutor};
pub use error::{OrmError, OrmResult};
pub use mapping::{FieldType, Record, Value};
pub use migration::{MigrationEngine, SimpleMigration, SqlDirectory};
pub use orm::{Cursor, Database, Upsert};
