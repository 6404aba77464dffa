//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Backend identification, identifier quoting and placeholder style
//! - Connection pool management
//! - Transactions and the statements executed inside them
//! - Parameter binding and row decoding
//! - The transactional executor that owns transaction lifetime
//! - Database dispatch macros for reducing code duplication

pub mod dialect;
pub mod executor;
#[macro_use]
pub mod macros;
pub mod params;
pub mod pool;
pub mod transaction;
pub mod types;

pub use dialect::DatabaseType;
pub use executor::TransactionalExecutor;
pub use pool::DbPool;
pub use transaction::DbTransaction;
