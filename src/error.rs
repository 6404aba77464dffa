//! Error types for the persistence layer.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Every failure inside a unit of work surfaces as [`OrmError::Execution`] wrapping
//! the original error; use [`OrmError::root_cause`] to inspect what actually failed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrmError {
    /// No usable construction strategy, malformed connection string, bad settings.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A value did not fit the semantic type of its field or column.
    #[error("Mapping error: {message}")]
    Mapping { message: String },

    #[error("Data integrity error: {message}")]
    DataIntegrity { message: String },

    /// A single-result read matched more than one row.
    #[error("Expected zero or one row from '{table}' but {count} rows matched")]
    Cardinality { table: String, count: usize },

    /// An insert-or-update predicate matched more than one row.
    #[error("Insert-or-update on '{table}' is ambiguous: {count} rows matched the predicate")]
    AmbiguousMatch { table: String, count: usize },

    #[error(
        "Database version '{version}' could not be found in the list of migrations. Migrations were reordered or removed."
    )]
    VersionMismatch { version: String },

    #[error("Execution of {operation} failed: {source}")]
    Execution {
        operation: String,
        #[source]
        source: Box<OrmError>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "23505" for a unique violation
        sql_state: Option<String>,
    },

    #[error("Timeout: {operation} timed out")]
    Timeout { operation: String },
}

impl OrmError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a mapping error.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    /// Create a data integrity error.
    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity {
            message: message.into(),
        }
    }

    /// Create a cardinality error for a single-result read.
    pub fn cardinality(table: impl Into<String>, count: usize) -> Self {
        Self::Cardinality {
            table: table.into(),
            count,
        }
    }

    /// Create an ambiguous match error for insert-or-update.
    pub fn ambiguous_match(table: impl Into<String>, count: usize) -> Self {
        Self::AmbiguousMatch {
            table: table.into(),
            count,
        }
    }

    /// Create a version mismatch error.
    pub fn version_mismatch(version: impl Into<String>) -> Self {
        Self::VersionMismatch {
            version: version.into(),
        }
    }

    /// Wrap a unit-of-work failure. Errors that are already wrapped pass through.
    pub fn execution(operation: impl Into<String>, source: OrmError) -> Self {
        match source {
            wrapped @ Self::Execution { .. } => wrapped,
            other => Self::Execution {
                operation: operation.into(),
                source: Box::new(other),
            },
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// The innermost error, looking through [`OrmError::Execution`] wrappers.
    pub fn root_cause(&self) -> &OrmError {
        let mut current = self;
        while let Self::Execution { source, .. } = current {
            current = source;
        }
        current
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self.root_cause() {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Timeout { .. } => Some(
                "Raise the acquire_timeout or max_connections pool options, or finish open transactions sooner",
            ),
            Self::VersionMismatch { .. } => {
                Some("Migrations must be append-only; restore the removed or reordered entries")
            }
            _ => None,
        }
    }
}

/// Convert sqlx errors to OrmError.
impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => OrmError::configuration(msg.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                OrmError::database(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => OrmError::database("No rows returned", None),
            sqlx::Error::PoolTimedOut => OrmError::timeout("connection pool acquire"),
            sqlx::Error::PoolClosed => {
                OrmError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => OrmError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => OrmError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => OrmError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => {
                OrmError::mapping(format!("Type not found: {}", type_name))
            }
            sqlx::Error::ColumnNotFound(col) => {
                OrmError::mapping(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => OrmError::mapping(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                OrmError::mapping(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => OrmError::mapping(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => {
                OrmError::connection("Database worker crashed", "Reconnect to the database")
            }
            _ => OrmError::database(format!("Unknown database error: {}", err), None),
        }
    }
}

/// Result type alias for persistence operations.
pub type OrmResult<T> = Result<T, OrmError>;
