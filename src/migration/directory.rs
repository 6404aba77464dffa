//! Migrations loaded from a directory of `.sql` files.

use crate::db::DatabaseType;
use crate::error::{OrmError, OrmResult};
use crate::migration::simple::{Migration, MigrationCollection, SimpleMigration};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A directory of `.sql` files, applied in file name order.
///
/// The id of each migration is its file stem, e.g. `003_add_email.sql` has id
/// `003_add_email`. A file named `<stem>.<backend>.sql` (backend being `mysql`,
/// `postgres` or `sqlite`) only applies to that backend and keeps the id `<stem>`, so one
/// logical migration can carry different SQL per backend.
#[derive(Debug, Clone)]
pub struct SqlDirectory {
    path: PathBuf,
}

impl SqlDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Split a file name into (id, backend scheme) or `None` if it is not a migration.
fn parse_file_name(name: &str) -> Option<(&str, Option<&str>)> {
    let stem = name.strip_suffix(".sql")?;
    for scheme in ["mysql", "postgres", "sqlite"] {
        if let Some(id) = stem
            .strip_suffix(scheme)
            .and_then(|s| s.strip_suffix('.'))
        {
            return Some((id, Some(scheme)));
        }
    }
    Some((stem, None))
}

impl MigrationCollection for SqlDirectory {
    fn migrations(&self, db_type: DatabaseType) -> OrmResult<Vec<Arc<dyn Migration>>> {
        let entries = std::fs::read_dir(&self.path).map_err(|e| {
            OrmError::configuration(format!(
                "Cannot read migration directory {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                OrmError::configuration(format!(
                    "Cannot read migration directory {}: {}",
                    self.path.display(),
                    e
                ))
            })?;
            if entry.path().is_file() {
                files.push(entry.path());
            }
        }
        files.sort();

        let mut migrations: Vec<Arc<dyn Migration>> = Vec::new();
        for file in files {
            let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((id, scheme)) = parse_file_name(name) else {
                continue;
            };
            if scheme.is_some_and(|s| s != db_type.scheme()) {
                debug!(file = %file.display(), db_type = %db_type, "Skipping migration for other backend");
                continue;
            }

            let sql = std::fs::read_to_string(&file).map_err(|e| {
                OrmError::configuration(format!("Cannot read migration {}: {}", file.display(), e))
            })?;
            migrations.push(Arc::new(SimpleMigration::with_id(id, sql)));
        }

        debug!(
            dir = %self.path.display(),
            count = migrations.len(),
            "Loaded migrations from directory"
        );
        Ok(migrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn ids(migrations: &[Arc<dyn Migration>]) -> Vec<&str> {
        migrations.iter().map(|m| m.id()).collect()
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(parse_file_name("001_init.sql"), Some(("001_init", None)));
        assert_eq!(
            parse_file_name("002_seq.postgres.sql"),
            Some(("002_seq", Some("postgres")))
        );
        assert_eq!(parse_file_name("README.md"), None);
        assert_eq!(parse_file_name("mysql.sql"), Some(("mysql", None)));
    }

    #[test]
    fn test_sorted_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("002_b.sql"), "CREATE TABLE b (x INTEGER)").unwrap();
        fs::write(dir.path().join("001_a.sql"), "CREATE TABLE a (x INTEGER)").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let migrations = SqlDirectory::new(dir.path())
            .migrations(DatabaseType::SQLite)
            .unwrap();
        assert_eq!(ids(&migrations), ["001_a", "002_b"]);
        assert_eq!(migrations[0].description(), "CREATE TABLE a (x INTEGER)");
    }

    #[test]
    fn test_backend_specific_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("001_a.sql"), "CREATE TABLE a (x INTEGER)").unwrap();
        fs::write(dir.path().join("002_b.mysql.sql"), "CREATE TABLE b (x INT)").unwrap();
        fs::write(dir.path().join("002_b.sqlite.sql"), "CREATE TABLE b (x INTEGER)").unwrap();

        let sqlite = SqlDirectory::new(dir.path())
            .migrations(DatabaseType::SQLite)
            .unwrap();
        assert_eq!(ids(&sqlite), ["001_a", "002_b"]);
        assert_eq!(sqlite[1].description(), "CREATE TABLE b (x INTEGER)");

        let postgres = SqlDirectory::new(dir.path())
            .migrations(DatabaseType::PostgreSQL)
            .unwrap();
        assert_eq!(ids(&postgres), ["001_a"]);
    }

    #[test]
    fn test_missing_directory_is_configuration_error() {
        let err = SqlDirectory::new("/nonexistent/migrations")
            .migrations(DatabaseType::SQLite)
            .err()
            .unwrap();
        assert!(matches!(err, OrmError::Configuration { .. }));
    }
}
