//! Thread-safe collection of non-fatal import errors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::{ErrorKind, ImportError};

/// Rendered by [`ErrorSummary`] when nothing was collected.
pub const NO_ERRORS: &str = "No errors collected.";

/// A detached copy of a collected error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectedError {
    pub kind: ErrorKind,
    pub message: String,
    pub file: Option<String>,
    pub table: Option<String>,
}

#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Mutex<Vec<ImportError>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ImportError>> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn collect(&self, err: ImportError) {
        self.lock().push(err);
    }

    /// Like [`collect`](Self::collect), ignoring `None`.
    pub fn collect_opt(&self, err: Option<ImportError>) {
        if let Some(err) = err {
            self.collect(err);
        }
    }

    /// Returns copies of every collected error, oldest first.
    pub fn get_errors(&self) -> Vec<CollectedError> {
        self.lock()
            .iter()
            .map(|e| CollectedError {
                kind: e.kind(),
                message: e.to_string(),
                file: e.file().map(str::to_string),
                table: e.table().map(str::to_string),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn has_fatal(&self) -> bool {
        self.lock().iter().any(|e| e.kind() == ErrorKind::Fatal)
    }

    pub fn summary(&self) -> ErrorSummary {
        let errors = self.lock();
        let mut summary = ErrorSummary {
            total: errors.len(),
            by_kind: ErrorKind::ALL.iter().map(|k| (*k, 0)).collect(),
            by_file: BTreeMap::new(),
            by_table: BTreeMap::new(),
        };

        for err in errors.iter() {
            *summary.by_kind.entry(err.kind()).or_insert(0) += 1;
            if let Some(file) = err.file() {
                *summary.by_file.entry(file.to_string()).or_insert(0) += 1;
            }
            if let Some(table) = err.table() {
                *summary.by_table.entry(table.to_string()).or_insert(0) += 1;
            }
        }

        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSummary {
    pub total: usize,
    /// Every kind is present, including those with a zero count.
    pub by_kind: BTreeMap<ErrorKind, usize>,
    pub by_file: BTreeMap<String, usize>,
    pub by_table: BTreeMap<String, usize>,
}

impl ErrorSummary {
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

impl fmt::Display for ErrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total == 0 {
            return f.write_str(NO_ERRORS);
        }

        writeln!(f, "Total errors: {}", self.total)?;

        writeln!(f, "By kind:")?;
        for (kind, count) in &self.by_kind {
            writeln!(f, "  {}: {}", kind, count)?;
        }

        if !self.by_file.is_empty() {
            writeln!(f, "By file:")?;
            for (file, count) in &self.by_file {
                writeln!(f, "  {}: {}", file, count)?;
            }
        }

        if !self.by_table.is_empty() {
            writeln!(f, "By table:")?;
            for (table, count) in &self.by_table {
                writeln!(f, "  {}: {}", table, count)?;
            }
        }

        Ok(())
    }
}
