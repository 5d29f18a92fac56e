//! Transactional multi-row inserts.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

use super::transaction::with_transaction;
use super::Database;
use crate::cancel::CancellationToken;
use crate::error::{ImportError, Result};

/// One row of bound values in declared column order.
pub type Row = Vec<Value>;

/// Callback invoked after each chunk with (rows done, rows total).
pub type ProgressCallback = dyn Fn(usize, usize) + Send + Sync;

/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER` since 3.32.
const MAX_BOUND_PARAMETERS: usize = 32_766;

/// Builds `INSERT INTO <table> (<cols>) VALUES (?, ...), (?, ...)` with one
/// placeholder group per row.
///
/// Table and column names are interpolated as given and must come from
/// trusted code; values are always bound.
pub fn build_insert_statement<C: AsRef<str>>(table: &str, columns: &[C], row_count: usize) -> String {
    let column_list = columns
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(", ");
    let group = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![group.as_str(); row_count].join(", ");

    format!("INSERT INTO {} ({}) VALUES {}", table, column_list, values)
}

/// Inserts `rows` into `table` in chunks of `batch_size`, all inside one
/// transaction.
///
/// Argument and row-shape validation happens before the transaction is
/// opened. Cancellation is checked before every chunk; a cancelled or failed
/// call leaves no rows behind. Returns the number of rows inserted.
pub fn insert_rows<C: AsRef<str>>(
    cancel: &CancellationToken,
    conn: &mut Connection,
    table: &str,
    columns: &[C],
    rows: &[Row],
    batch_size: usize,
    on_progress: Option<&ProgressCallback>,
) -> Result<usize> {
    if table.is_empty() {
        return Err(ImportError::validation("table name must not be empty"));
    }
    if columns.is_empty() {
        return Err(ImportError::validation("column list must not be empty"));
    }
    if batch_size == 0 {
        return Err(ImportError::validation("batch size must be greater than zero"));
    }
    for (index, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(ImportError::ColumnMismatch {
                row: index,
                expected: columns.len(),
                actual: row.len(),
            });
        }
    }
    if rows.is_empty() {
        return Ok(0);
    }

    let max_rows = (MAX_BOUND_PARAMETERS / columns.len()).max(1);
    let chunk_size = if batch_size > max_rows {
        log::debug!(
            "Batch size {} exceeds the bound-parameter limit for {} columns, using {}",
            batch_size,
            columns.len(),
            max_rows
        );
        max_rows
    } else {
        batch_size
    };

    let total = rows.len();
    with_transaction(conn, |tx| {
        let mut done = 0;
        for chunk in rows.chunks(chunk_size) {
            cancel.check()?;

            let sql = build_insert_statement(table, columns, chunk.len());
            let mut stmt = tx.prepare_cached(&sql)?;
            stmt.execute(params_from_iter(chunk.iter().flatten()))?;

            done += chunk.len();
            log::trace!("Inserted {}/{} rows into {}", done, total, table);
            if let Some(callback) = on_progress {
                callback(done, total);
            }
        }
        Ok(done)
    })
}

/// Batch insert settings shared across the units of one import run.
pub struct BatchWriter {
    batch_size: usize,
    on_progress: Option<Box<ProgressCallback>>,
}

impl BatchWriter {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            on_progress: None,
        }
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Locks the database's single connection and inserts `rows`.
    pub fn insert<C: AsRef<str>>(
        &self,
        cancel: &CancellationToken,
        db: &Database,
        table: &str,
        columns: &[C],
        rows: &[Row],
    ) -> Result<usize> {
        db.with_conn_mut(|conn| {
            insert_rows(
                cancel,
                conn,
                table,
                columns,
                rows,
                self.batch_size,
                self.on_progress.as_deref(),
            )
        })
    }
}
