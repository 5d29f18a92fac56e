use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::parser::{RecordSet, UnitParser};
use crate::cancel::CancellationToken;
use crate::error::Result;

/// One input file bound to the parser responsible for it.
#[derive(Clone)]
pub struct ParseTask {
    pub path: PathBuf,
    parser: Arc<dyn UnitParser>,
}

impl ParseTask {
    pub fn new(path: PathBuf, parser: Arc<dyn UnitParser>) -> Self {
        Self { path, parser }
    }

    pub fn table_name(&self) -> &str {
        self.parser.table_name()
    }

    pub fn columns(&self) -> &[String] {
        self.parser.columns()
    }

    /// Key used for the pool job and for error context.
    pub fn id(&self) -> String {
        self.path.display().to_string()
    }

    /// Parses the file. Parse errors are carried inside the outcome.
    pub fn run(&self, cancel: &CancellationToken) -> ParseOutcome {
        let records = cancel
            .check()
            .and_then(|()| self.parser.parse(cancel, &self.path));
        self.outcome(records)
    }

    pub(crate) fn outcome(&self, records: Result<Box<dyn RecordSet>>) -> ParseOutcome {
        ParseOutcome {
            source: self.path.clone(),
            table: self.table_name().to_string(),
            columns: self.columns().to_vec(),
            records,
        }
    }
}

impl fmt::Debug for ParseTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseTask")
            .field("path", &self.path)
            .field("table", &self.table_name())
            .field("columns", &self.columns())
            .finish()
    }
}

/// The Phase 1 result for one unit, consumed once by Phase 2.
pub struct ParseOutcome {
    pub source: PathBuf,
    pub table: String,
    pub columns: Vec<String>,
    pub records: Result<Box<dyn RecordSet>>,
}

impl ParseOutcome {
    pub fn source_name(&self) -> String {
        self.source.display().to_string()
    }
}

impl fmt::Debug for ParseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let records = match &self.records {
            Ok(set) => format!("{} records", set.len()),
            Err(e) => format!("error: {}", e),
        };
        f.debug_struct("ParseOutcome")
            .field("source", &self.source)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("records", &records)
            .finish()
    }
}
