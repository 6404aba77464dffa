//! Ordered, resumable schema migrations.

pub mod directory;
pub mod engine;
pub mod simple;

pub use directory::SqlDirectory;
pub use engine::{
    INITIAL_VERSION, MigrationEngine, MigrationReport, MigrationState, MigrationStatus,
    VERSION_TABLE,
};
pub use simple::{Migration, MigrationCollection, SimpleMigration};
