use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::db::DatabaseError;

pub type Result<T> = std::result::Result<T, ImportError>;

/// Classification used by the error collector when summarizing a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The run cannot usefully continue.
    Fatal,
    /// Transient; the whole unit may be retried later by the caller.
    Retryable,
    /// Bad input shape, always a local unit failure.
    Validation,
    /// Unit-level data problem that is safe to ignore.
    Skippable,
    /// Untyped or foreign errors, e.g. from the storage driver.
    Other,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Fatal,
        ErrorKind::Retryable,
        ErrorKind::Validation,
        ErrorKind::Skippable,
        ErrorKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Fatal => "fatal",
            ErrorKind::Retryable => "retryable",
            ErrorKind::Validation => "validation",
            ErrorKind::Skippable => "skippable",
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("No inputs found under '{root}'")]
    NoInputs { root: PathBuf },

    #[error("Import cancelled")]
    Cancelled,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Row {row} has {actual} values, expected {expected}")]
    ColumnMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to parse '{path}' at line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Skipped: {reason}")]
    Skipped { reason: String },

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// An error raised by a collaborator that already knows its kind.
    #[error("{message}")]
    Classified { kind: ErrorKind, message: String },

    /// Wraps another error with the file and table it originated from.
    #[error("{}{source}", context_prefix(.file, .table))]
    Contextual {
        file: Option<String>,
        table: Option<String>,
        #[source]
        source: Box<ImportError>,
    },
}

fn context_prefix(file: &Option<String>, table: &Option<String>) -> String {
    match (file, table) {
        (Some(file), Some(table)) => format!("[{} -> {}] ", file, table),
        (Some(file), None) => format!("[{}] ", file),
        (None, Some(table)) => format!("[-> {}] ", table),
        (None, None) => String::new(),
    }
}

impl ImportError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn skipped<S: Into<String>>(reason: S) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn classified<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self::Classified {
            kind,
            message: message.into(),
        }
    }

    /// Tags the error with its originating file and/or table.
    ///
    /// Tags already present on a contextual error are kept unless replaced.
    pub fn with_context(self, file: Option<&str>, table: Option<&str>) -> Self {
        match self {
            ImportError::Contextual {
                file: old_file,
                table: old_table,
                source,
            } => ImportError::Contextual {
                file: file.map(str::to_string).or(old_file),
                table: table.map(str::to_string).or(old_table),
                source,
            },
            other => ImportError::Contextual {
                file: file.map(str::to_string),
                table: table.map(str::to_string),
                source: Box::new(other),
            },
        }
    }

    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::NoInputs { .. }
            | ImportError::Cancelled
            | ImportError::Config(_)
            | ImportError::Signal(_) => ErrorKind::Fatal,
            ImportError::Validation(_)
            | ImportError::ColumnMismatch { .. }
            | ImportError::Parse { .. } => ErrorKind::Validation,
            ImportError::Io { .. } => ErrorKind::Retryable,
            ImportError::Database(e) if e.is_busy() => ErrorKind::Retryable,
            ImportError::Database(_) => ErrorKind::Other,
            ImportError::Skipped { .. } => ErrorKind::Skippable,
            ImportError::Worker(WorkerError::Cancelled { .. }) => ErrorKind::Fatal,
            ImportError::Worker(_) => ErrorKind::Other,
            ImportError::Classified { kind, .. } => *kind,
            ImportError::Contextual { source, .. } => source.kind(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            ImportError::Cancelled | ImportError::Worker(WorkerError::Cancelled { .. }) => true,
            ImportError::Contextual { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    pub fn file(&self) -> Option<&str> {
        match self {
            ImportError::Contextual { file, .. } => file.as_deref(),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<&str> {
        match self {
            ImportError::Contextual { table, .. } => table.as_deref(),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(e: rusqlite::Error) -> Self {
        ImportError::Database(DatabaseError::Sqlite(e))
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Job '{job_id}' was cancelled before it ran")]
    Cancelled { job_id: String },

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}
