//! The parsing collaborator seam.
//!
//! Parsers are typed ([`RecordParser`]); the importer keeps heterogeneous
//! parsers in one task list through the object-safe [`UnitParser`] and only
//! touches records through [`RecordSet`] once Phase 2 converts them to rows.

use std::path::Path;
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::db::Row;
use crate::error::{ImportError, Result};

/// Parses one input file into records bound for a single table.
pub trait RecordParser: Send + Sync + 'static {
    type Record: Send + 'static;

    fn parse_file(&self, cancel: &CancellationToken, path: &Path) -> Result<Vec<Self::Record>>;

    fn table_name(&self) -> &str;

    /// Destination columns, in the order `to_row` produces values.
    fn columns(&self) -> &[String];

    fn to_row(&self, record: &Self::Record) -> Result<Row>;
}

/// Parsed records of one unit, opaque until converted to rows.
pub trait RecordSet: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts every record, rejecting rows whose width differs from the
    /// parser's column list.
    fn to_rows(&self) -> Result<Vec<Row>>;
}

/// Object-safe view of a [`RecordParser`].
pub trait UnitParser: Send + Sync {
    fn table_name(&self) -> &str;

    fn columns(&self) -> &[String];

    fn parse(&self, cancel: &CancellationToken, path: &Path) -> Result<Box<dyn RecordSet>>;
}

struct TypedRecords<P: RecordParser> {
    parser: Arc<P>,
    records: Vec<P::Record>,
}

impl<P: RecordParser> RecordSet for TypedRecords<P> {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn to_rows(&self) -> Result<Vec<Row>> {
        let width = self.parser.columns().len();
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let row = self.parser.to_row(record)?;
                if row.len() != width {
                    return Err(ImportError::ColumnMismatch {
                        row: index,
                        expected: width,
                        actual: row.len(),
                    });
                }
                Ok(row)
            })
            .collect()
    }
}

struct ErasedParser<P>(Arc<P>);

impl<P: RecordParser> UnitParser for ErasedParser<P> {
    fn table_name(&self) -> &str {
        self.0.table_name()
    }

    fn columns(&self) -> &[String] {
        self.0.columns()
    }

    fn parse(&self, cancel: &CancellationToken, path: &Path) -> Result<Box<dyn RecordSet>> {
        let records = self.0.parse_file(cancel, path)?;
        Ok(Box::new(TypedRecords {
            parser: Arc::clone(&self.0),
            records,
        }))
    }
}

/// Wraps a typed parser for storage next to parsers of other record types.
pub fn erase<P: RecordParser>(parser: Arc<P>) -> Arc<dyn UnitParser> {
    Arc::new(ErasedParser(parser))
}
