/// Error taxonomy for libsql_dbc
///
/// Every fallible operation in the crate returns [`Result`]. Engine failures keep
/// the numeric result code reported by LibSQL so callers can tell busy/locked
/// conditions (retryable) apart from constraint, I/O or corruption failures.
use thiserror::Error;

/// Primary result code for a generic engine error.
pub const SQLITE_ERROR: i32 = 1;
/// Primary result code for a busy database file.
pub const SQLITE_BUSY: i32 = 5;
/// Primary result code for a locked table.
pub const SQLITE_LOCKED: i32 = 6;
/// Primary result code for a constraint violation.
pub const SQLITE_CONSTRAINT: i32 = 19;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Caller misuse: closed handle or cursor, bad index, savepoint in auto-commit, ...
    #[error("{0}")]
    Usage(String),

    /// Failure reported by the engine, code preserved verbatim.
    #[error("[code {code}] {message}")]
    Engine { code: i32, message: String },

    /// The catalog has no table or view with this name.
    #[error("Table not found: '{0}'")]
    TableNotFound(String),

    /// A blank or otherwise unusable table name was passed to a metadata call.
    #[error("Invalid table name: '{0}'")]
    InvalidTableName(String),

    /// A batch stopped at `index`; `update_counts` holds the entries applied before it.
    #[error("batch entry {index}: {source}")]
    BatchUpdate {
        index: usize,
        update_counts: Vec<i64>,
        #[source]
        source: Box<Error>,
    },

    /// A shared lock was poisoned by a panicking holder.
    #[error("Mutex poisoned in {0}")]
    Poisoned(String),

    /// A connection property could not be parsed.
    #[error("Invalid connection property '{key}': {reason}")]
    Config { key: String, reason: String },
}

impl Error {
    pub fn usage(message: impl Into<String>) -> Self {
        Error::Usage(message.into())
    }

    pub fn engine(code: i32, message: impl Into<String>) -> Self {
        Error::Engine {
            code,
            message: message.into(),
        }
    }

    /// Engine result code, if this error came from the engine.
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            Error::Engine { code, .. } => Some(*code),
            Error::BatchUpdate { source, .. } => source.engine_code(),
            _ => None,
        }
    }

    /// True for busy/locked conditions that a caller may choose to retry.
    ///
    /// Extended result codes carry the primary code in their low byte.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.engine_code().map(|code| code & 0xff),
            Some(SQLITE_BUSY) | Some(SQLITE_LOCKED)
        )
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_))
    }
}

impl From<libsql::Error> for Error {
    fn from(err: libsql::Error) -> Self {
        match err {
            libsql::Error::SqliteFailure(code, message) => Error::Engine { code, message },
            other => {
                let message = other.to_string();
                // Some paths only surface the engine's message text
                let code = if message.contains("database table is locked") {
                    SQLITE_LOCKED
                } else if message.contains("database is locked") {
                    SQLITE_BUSY
                } else {
                    SQLITE_ERROR
                };
                Error::Engine { code, message }
            }
        }
    }
}
