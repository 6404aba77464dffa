//! Backend identification and the small dialect surface the core needs.
//!
//! Only identifier quoting and the placeholder style of generated statements differ
//! between backends. Caller-supplied clauses are never rewritten.

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Parse a driver name as found in connection properties (`mysql`, `postgresql`, ...).
    pub fn from_driver_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(Self::PostgreSQL),
            "mysql" | "mariadb" => Some(Self::MySQL),
            "sqlite" | "sqlite3" => Some(Self::SQLite),
            _ => None,
        }
    }

    /// URL scheme used when assembling a connection string.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgres",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Quote a table or column name.
    ///
    /// Embedded quote characters are doubled.
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Self::MySQL => format!("`{}`", name.replace('`', "``")),
            Self::PostgreSQL | Self::SQLite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Placeholder for the `n`-th (1-based) parameter of a generated statement.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::PostgreSQL => format!("${}", n),
            Self::MySQL | Self::SQLite => "?".to_string(),
        }
    }

    /// Whether placeholders carry their parameter position (`$n`) rather than binding
    /// in textual order (`?`).
    pub fn numbered_placeholders(&self) -> bool {
        matches!(self, Self::PostgreSQL)
    }

    /// Comma-separated placeholders `start..start+count` (1-based).
    pub fn placeholders(&self, start: usize, count: usize) -> String {
        (start..start + count)
            .map(|n| self.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_from_connection_string() {
        assert_eq!(
            DatabaseType::from_connection_string("postgres://localhost/db"),
            Some(DatabaseType::PostgreSQL)
        );
        assert_eq!(
            DatabaseType::from_connection_string("postgresql://localhost/db"),
            Some(DatabaseType::PostgreSQL)
        );
        assert_eq!(
            DatabaseType::from_connection_string("mariadb://localhost/db"),
            Some(DatabaseType::MySQL)
        );
        assert_eq!(
            DatabaseType::from_connection_string("sqlite:test.db"),
            Some(DatabaseType::SQLite)
        );
        assert_eq!(
            DatabaseType::from_connection_string("unknown://localhost"),
            None
        );
    }

    #[test]
    fn test_from_driver_name() {
        assert_eq!(
            DatabaseType::from_driver_name("MySQL"),
            Some(DatabaseType::MySQL)
        );
        assert_eq!(
            DatabaseType::from_driver_name("postgresql"),
            Some(DatabaseType::PostgreSQL)
        );
        assert_eq!(DatabaseType::from_driver_name("oracle"), None);
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(DatabaseType::MySQL.quote_identifier("order"), "`order`");
        assert_eq!(DatabaseType::PostgreSQL.quote_identifier("order"), "\"order\"");
        assert_eq!(DatabaseType::SQLite.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(DatabaseType::MySQL.quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(DatabaseType::MySQL.placeholders(1, 3), "?, ?, ?");
        assert_eq!(DatabaseType::PostgreSQL.placeholders(4, 2), "$4, $5");
        assert_eq!(DatabaseType::SQLite.placeholders(1, 0), "");
        assert!(DatabaseType::PostgreSQL.numbered_placeholders());
        assert!(!DatabaseType::MySQL.numbered_placeholders());
        assert!(!DatabaseType::SQLite.numbered_placeholders());
    }

    #[test]
    fn test_display() {
        assert_eq!(DatabaseType::PostgreSQL.to_string(), "PostgreSQL");
        assert_eq!(DatabaseType::SQLite.to_string(), "SQLite");
    }
}
